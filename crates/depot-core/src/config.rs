//! Configuration loading and typed config structures for the Depot supply
//! chain.
//!
//! The canonical configuration lives in `depot-config.yaml`. Every field has
//! a default, so an empty file (or no file) yields a runnable two-robot
//! setup on the default topics. Environment variables override the values a
//! container deployment typically sets:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `NATS_URL` | `infrastructure.nats_url` |
//! | `DEPOT_ROLE` | `node.role` |
//! | `EC_NAME` | `node.name` (selects the robot entry for the robot role) |
//! | `PACKET_TYPE_1_UNIT` | opening stock of kind 1 for the supplier or storage role |
//! | `PACKET_TYPE_2_UNIT` | opening stock of kind 2 for the supplier or storage role |

use std::collections::BTreeSet;
use std::path::Path;

use core::num::NonZeroU32;

use depot_agents::{EstimatorConfig, RobotConfig};
use depot_types::PackageType;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DepotConfig {
    /// Which role this process runs, and as whom.
    #[serde(default)]
    pub node: NodeConfig,

    /// Channel names.
    #[serde(default)]
    pub topics: TopicConfig,

    /// Supplier (negotiation coordinator) parameters.
    #[serde(default)]
    pub supplier: SupplierConfig,

    /// Storage (ledger agent) parameters.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Robot roster.
    #[serde(default = "default_robots")]
    pub robots: Vec<RobotEntry>,

    /// Tick generator parameters.
    #[serde(default)]
    pub clock: ClockConfig,

    /// In-process simulation parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DepotConfig {
    /// Load configuration from a YAML file, apply environment overrides,
    /// and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if an override or a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown role or a
    /// non-numeric stock override.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (variable name to value).
    ///
    /// The role is resolved first, so the stock overrides land on the
    /// ledger of the role being run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown role or a
    /// non-numeric stock override.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("NATS_URL") {
            self.infrastructure.nats_url = val;
        }
        if let Some(val) = lookup("DEPOT_ROLE") {
            self.node.role = val.parse()?;
        }
        if let Some(val) = lookup("EC_NAME") {
            self.node.name = Some(val);
        }

        let type_1 = lookup("PACKET_TYPE_1_UNIT")
            .map(|v| parse_units("PACKET_TYPE_1_UNIT", &v))
            .transpose()?;
        let type_2 = lookup("PACKET_TYPE_2_UNIT")
            .map(|v| parse_units("PACKET_TYPE_2_UNIT", &v))
            .transpose()?;
        let target = match self.node.role {
            Role::Supplier => Some((&mut self.supplier.initial_type_1, &mut self.supplier.initial_type_2)),
            Role::Storage => Some((&mut self.storage.initial_type_1, &mut self.storage.initial_type_2)),
            Role::Robot | Role::Clock | Role::Simulate => None,
        };
        if let Some((slot_1, slot_2)) = target {
            if let Some(units) = type_1 {
                *slot_1 = units;
            }
            if let Some(units) = type_2 {
                *slot_2 = units;
            }
        }
        Ok(())
    }

    /// Check value ranges and cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = self.supplier.cfp_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(invalid(format!("supplier.cfp_probability {p} is not within 0..=1")));
        }
        if self.supplier.cfp_quantity == 0 {
            return Err(invalid("supplier.cfp_quantity must be at least 1"));
        }
        let dup = self.simulation.duplicate_probability;
        if !(0.0..=1.0).contains(&dup) {
            return Err(invalid(format!(
                "simulation.duplicate_probability {dup} is not within 0..=1"
            )));
        }
        let fail = self.simulation.job_failure_probability;
        if !(0.0..=1.0).contains(&fail) {
            return Err(invalid(format!(
                "simulation.job_failure_probability {fail} is not within 0..=1"
            )));
        }
        if self.simulation.time_units_per_tick == 0 {
            return Err(invalid("simulation.time_units_per_tick must be at least 1"));
        }
        if self.clock.interval_ms == 0 {
            return Err(invalid("clock.interval_ms must be at least 1"));
        }

        let mut names = BTreeSet::new();
        for robot in &self.robots {
            if !names.insert(robot.name.as_str()) {
                return Err(invalid(format!("duplicate robot name {}", robot.name)));
            }
            let _ = robot.to_robot_config()?;
        }
        Ok(())
    }

    /// The roster entry named `name`.
    pub fn robot(&self, name: &str) -> Option<&RobotEntry> {
        self.robots.iter().find(|r| r.name == name)
    }

    /// Coordinator settings bound to the configured topics.
    pub fn coordinator_settings(&self) -> Result<CoordinatorSettings, ConfigError> {
        let cfp_quantity = NonZeroU32::new(self.supplier.cfp_quantity)
            .ok_or_else(|| invalid("supplier.cfp_quantity must be at least 1"))?;
        Ok(CoordinatorSettings {
            name: self.node_name_or(&self.supplier.name),
            tick_topic: self.topics.tick.clone(),
            cfp_topic: self.topics.cfp.clone(),
            proposal_topic: self.topics.proposal.clone(),
            award_topic: self.topics.award.clone(),
            stock_topic: self.topics.supplier_stock.clone(),
            confirmation_topics: self.supplier.confirmation_topics.clone(),
            initial_type_1: self.supplier.initial_type_1,
            initial_type_2: self.supplier.initial_type_2,
            cfp_quantity,
            cfp_probability: self.supplier.cfp_probability,
            replenish_threshold_ticks: self.supplier.replenish_threshold_ticks,
            replenish_quantity: self.supplier.replenish_quantity,
            seed: self.supplier.seed,
        })
    }

    /// Storage settings bound to the configured topics.
    pub fn storage_settings(&self) -> StorageSettings {
        StorageSettings {
            name: self.node_name_or(&self.storage.name),
            tick_topic: self.topics.tick.clone(),
            stock_topic: self.topics.storage_stock.clone(),
            inbound_topics: self.storage.inbound_topics.clone(),
            outbound_topics: self.storage.outbound_topics.clone(),
            initial_type_1: self.storage.initial_type_1,
            initial_type_2: self.storage.initial_type_2,
        }
    }

    /// Worker settings for the roster entry `entry`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the entry's values are out of
    /// range.
    pub fn worker_settings(&self, entry: &RobotEntry) -> Result<WorkerSettings, ConfigError> {
        let (robot, estimator) = entry.to_robot_config()?;
        Ok(WorkerSettings {
            robot,
            estimator,
            tick_topic: self.topics.tick.clone(),
            cfp_topic: self.topics.cfp.clone(),
            proposal_topic: self.topics.proposal.clone(),
            award_topic: self.topics.award.clone(),
            processed_topic: entry.processed_topic.clone(),
            status_topic: entry.status_topic.clone(),
        })
    }

    fn node_name_or(&self, fallback: &str) -> String {
        match self.node.role {
            Role::Supplier | Role::Storage => self
                .node
                .name
                .clone()
                .unwrap_or_else(|| fallback.to_owned()),
            Role::Robot | Role::Clock | Role::Simulate => fallback.to_owned(),
        }
    }
}

fn parse_units(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e| invalid(format!("{key}={value:?} is not a unit count: {e}")))
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// The part a `depot-node` process plays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Negotiation coordinator with the supplier ledger.
    #[default]
    Supplier,
    /// Ledger agent for the storage.
    Storage,
    /// One worker robot, selected by name.
    Robot,
    /// Tick generator.
    Clock,
    /// Every agent in one process over an in-memory bus.
    Simulate,
}

impl core::str::FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supplier" => Ok(Self::Supplier),
            "storage" => Ok(Self::Storage),
            "robot" | "roboter" => Ok(Self::Robot),
            "clock" | "tickgen" => Ok(Self::Clock),
            "simulate" | "simulation" => Ok(Self::Simulate),
            other => Err(invalid(format!("unknown role {other:?}"))),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Supplier => "supplier",
            Self::Storage => "storage",
            Self::Robot => "robot",
            Self::Clock => "clock",
            Self::Simulate => "simulate",
        };
        f.write_str(s)
    }
}

/// Process-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeConfig {
    /// Role to run.
    #[serde(default)]
    pub role: Role,

    /// Agent name; for the robot role it selects the roster entry.
    #[serde(default)]
    pub name: Option<String>,

    /// Real-time milliseconds per job time unit.
    #[serde(default = "default_time_unit_ms")]
    pub time_unit_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: Role::default(),
            name: None,
            time_unit_ms: default_time_unit_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// Shared channel names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopicConfig {
    /// Tick channel.
    #[serde(default = "default_tick_topic")]
    pub tick: String,

    /// Call-for-proposals channel.
    #[serde(default = "default_cfp_topic")]
    pub cfp: String,

    /// Proposal channel.
    #[serde(default = "default_proposal_topic")]
    pub proposal: String,

    /// Award channel.
    #[serde(default = "default_award_topic")]
    pub award: String,

    /// Supplier stock snapshot channel.
    #[serde(default = "default_supplier_stock_topic")]
    pub supplier_stock: String,

    /// Storage stock snapshot channel.
    #[serde(default = "default_storage_stock_topic")]
    pub storage_stock: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            tick: default_tick_topic(),
            cfp: default_cfp_topic(),
            proposal: default_proposal_topic(),
            award: default_award_topic(),
            supplier_stock: default_supplier_stock_topic(),
            storage_stock: default_storage_stock_topic(),
        }
    }
}

// ---------------------------------------------------------------------------
// Supplier
// ---------------------------------------------------------------------------

/// Supplier parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SupplierConfig {
    /// Agent name.
    #[serde(default = "default_supplier_name")]
    pub name: String,

    /// Opening stock of kind 1.
    #[serde(default = "default_supplier_units")]
    pub initial_type_1: u32,

    /// Opening stock of kind 2.
    #[serde(default = "default_supplier_units")]
    pub initial_type_2: u32,

    /// Confirmation channels that decrement the supplier ledger.
    #[serde(default = "default_supplier_confirmation_topics")]
    pub confirmation_topics: Vec<String>,

    /// Quantity announced in every call for proposals.
    #[serde(default = "default_cfp_quantity")]
    pub cfp_quantity: u32,

    /// Chance per tick and kind that a call for proposals is announced.
    #[serde(default = "default_cfp_probability")]
    pub cfp_probability: f64,

    /// Ticks at zero stock before a refill.
    #[serde(default = "default_replenish_threshold_ticks")]
    pub replenish_threshold_ticks: u32,

    /// Level a refill restocks to.
    #[serde(default = "default_replenish_quantity")]
    pub replenish_quantity: u32,

    /// Seed for priorities and announcement draws; `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            name: default_supplier_name(),
            initial_type_1: default_supplier_units(),
            initial_type_2: default_supplier_units(),
            confirmation_topics: default_supplier_confirmation_topics(),
            cfp_quantity: default_cfp_quantity(),
            cfp_probability: default_cfp_probability(),
            replenish_threshold_ticks: default_replenish_threshold_ticks(),
            replenish_quantity: default_replenish_quantity(),
            seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Storage parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Agent name.
    #[serde(default = "default_storage_name")]
    pub name: String,

    /// Opening stock of kind 1.
    #[serde(default)]
    pub initial_type_1: u32,

    /// Opening stock of kind 2.
    #[serde(default)]
    pub initial_type_2: u32,

    /// Confirmation channels that deliver into storage.
    #[serde(default = "default_inbound_topics")]
    pub inbound_topics: Vec<String>,

    /// Confirmation channels that dispatch out of storage.
    #[serde(default = "default_outbound_topics")]
    pub outbound_topics: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            name: default_storage_name(),
            initial_type_1: 0,
            initial_type_2: 0,
            inbound_topics: default_inbound_topics(),
            outbound_topics: default_outbound_topics(),
        }
    }
}

// ---------------------------------------------------------------------------
// Robots
// ---------------------------------------------------------------------------

/// Bid estimator selection in YAML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorSettings {
    /// Uniform random estimate in `min..=max`.
    Uniform {
        /// Smallest estimate (at least 1).
        #[serde(default = "default_estimate_min")]
        min: u32,
        /// Largest estimate.
        #[serde(default = "default_estimate_max")]
        max: u32,
        /// Optional seed.
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Deterministic estimate from priority, quantity, and battery.
    Load {
        /// Extra time units below half battery.
        #[serde(default = "default_low_battery_penalty")]
        low_battery_penalty: u32,
    },
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self::Uniform {
            min: default_estimate_min(),
            max: default_estimate_max(),
            seed: None,
        }
    }
}

impl EstimatorSettings {
    /// Convert to the agent-side estimator configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a uniform bound is zero.
    pub fn to_estimator_config(&self) -> Result<EstimatorConfig, ConfigError> {
        match *self {
            Self::Uniform { min, max, seed } => Ok(EstimatorConfig::Uniform {
                min: NonZeroU32::new(min)
                    .ok_or_else(|| invalid("estimator.min must be at least 1"))?,
                max: NonZeroU32::new(max)
                    .ok_or_else(|| invalid("estimator.max must be at least 1"))?,
                seed,
            }),
            Self::Load {
                low_battery_penalty,
            } => Ok(EstimatorConfig::Load {
                low_battery_penalty,
            }),
        }
    }
}

/// One robot in the roster.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RobotEntry {
    /// Robot identity.
    pub name: String,

    /// Package kind the robot handles (1 or 2).
    pub capability: PackageType,

    /// Channel the robot publishes confirmations on.
    pub processed_topic: String,

    /// Channel the robot publishes status reports on.
    pub status_topic: String,

    /// Battery level at start-up.
    #[serde(default = "default_initial_battery")]
    pub initial_battery: u32,

    /// Below this level the robot charges instead of bidding.
    #[serde(default = "default_low_battery_threshold")]
    pub low_battery_threshold: u32,

    /// Battery gained per tick while charging.
    #[serde(default = "default_charge_per_tick")]
    pub charge_per_tick: u32,

    /// Battery consumed per job time unit.
    #[serde(default = "default_drain_per_unit")]
    pub drain_per_unit: u32,

    /// Ticks to wait for an award (default: 2); 0 waits indefinitely.
    #[serde(default = "default_award_timeout_ticks")]
    pub award_timeout_ticks: u32,

    /// Bid estimator.
    #[serde(default)]
    pub estimator: EstimatorSettings,
}

impl RobotEntry {
    /// A roster entry with default battery parameters on the default
    /// per-robot topics `roboter/{index}/processed` and `.../status`.
    pub fn numbered(index: u32, capability: PackageType) -> Self {
        Self {
            name: format!("roboter-{index}"),
            capability,
            processed_topic: format!("roboter/{index}/processed"),
            status_topic: format!("roboter/{index}/status"),
            initial_battery: default_initial_battery(),
            low_battery_threshold: default_low_battery_threshold(),
            charge_per_tick: default_charge_per_tick(),
            drain_per_unit: default_drain_per_unit(),
            award_timeout_ticks: default_award_timeout_ticks(),
            estimator: EstimatorSettings::default(),
        }
    }

    /// Split into the agent-side robot and estimator configurations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a value is out of range.
    pub fn to_robot_config(&self) -> Result<(RobotConfig, EstimatorConfig), ConfigError> {
        let mut robot = RobotConfig::new(self.name.clone(), self.capability);
        robot.initial_battery = self.initial_battery;
        robot.low_battery_threshold = self.low_battery_threshold;
        robot.charge_per_tick = self.charge_per_tick;
        robot.drain_per_unit = self.drain_per_unit;
        robot.award_timeout_ticks = self.award_timeout_ticks;
        robot.validate().map_err(|e| invalid(e.to_string()))?;
        if self.processed_topic.trim().is_empty() {
            return Err(invalid(format!("robot {} has no processed_topic", self.name)));
        }
        Ok((robot, self.estimator.to_estimator_config()?))
    }
}

// ---------------------------------------------------------------------------
// Clock, simulation, infrastructure, logging
// ---------------------------------------------------------------------------

/// Tick generator parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClockConfig {
    /// Real-time milliseconds between ticks.
    #[serde(default = "default_clock_interval_ms")]
    pub interval_ms: u64,

    /// Stop after this many ticks; 0 runs until interrupted.
    #[serde(default)]
    pub max_ticks: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_clock_interval_ms(),
            max_ticks: 0,
        }
    }
}

/// In-process simulation parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Ticks to run.
    #[serde(default = "default_simulation_ticks")]
    pub ticks: u64,

    /// Seed for the bus (delivery order and duplicate injection).
    #[serde(default = "default_simulation_seed")]
    pub seed: u64,

    /// Virtual job time units between two ticks.
    #[serde(default = "default_time_units_per_tick")]
    pub time_units_per_tick: u32,

    /// Chance that a published message is delivered twice.
    #[serde(default)]
    pub duplicate_probability: f64,

    /// Chance that a finished job reports a fault instead of completing.
    #[serde(default)]
    pub job_failure_probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: default_simulation_ticks(),
            seed: default_simulation_seed(),
            time_units_per_tick: default_time_units_per_tick(),
            duplicate_probability: 0.0,
            job_failure_probability: 0.0,
        }
    }
}

/// Infrastructure connection strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// NATS messaging URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Fmt,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings handed to agents
// ---------------------------------------------------------------------------

/// Everything a coordinator needs, resolved from the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    /// Agent name.
    pub name: String,
    /// Tick channel.
    pub tick_topic: String,
    /// Call-for-proposals channel.
    pub cfp_topic: String,
    /// Proposal channel.
    pub proposal_topic: String,
    /// Award channel.
    pub award_topic: String,
    /// Stock snapshot channel.
    pub stock_topic: String,
    /// Confirmation channels that decrement the ledger.
    pub confirmation_topics: Vec<String>,
    /// Opening stock of kind 1.
    pub initial_type_1: u32,
    /// Opening stock of kind 2.
    pub initial_type_2: u32,
    /// Quantity per call for proposals.
    pub cfp_quantity: NonZeroU32,
    /// Chance per tick and kind of an announcement.
    pub cfp_probability: f64,
    /// Ticks at zero stock before a refill.
    pub replenish_threshold_ticks: u32,
    /// Refill level.
    pub replenish_quantity: u32,
    /// Optional seed.
    pub seed: Option<u64>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        let config = DepotConfig::default();
        let supplier = &config.supplier;
        Self {
            name: supplier.name.clone(),
            tick_topic: config.topics.tick.clone(),
            cfp_topic: config.topics.cfp.clone(),
            proposal_topic: config.topics.proposal.clone(),
            award_topic: config.topics.award.clone(),
            stock_topic: config.topics.supplier_stock.clone(),
            confirmation_topics: supplier.confirmation_topics.clone(),
            initial_type_1: supplier.initial_type_1,
            initial_type_2: supplier.initial_type_2,
            cfp_quantity: NonZeroU32::MIN,
            cfp_probability: supplier.cfp_probability,
            replenish_threshold_ticks: supplier.replenish_threshold_ticks,
            replenish_quantity: supplier.replenish_quantity,
            seed: None,
        }
    }
}

/// Everything a storage agent needs, resolved from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    /// Agent name.
    pub name: String,
    /// Tick channel.
    pub tick_topic: String,
    /// Stock snapshot channel.
    pub stock_topic: String,
    /// Channels whose confirmations add stock.
    pub inbound_topics: Vec<String>,
    /// Channels whose confirmations remove stock.
    pub outbound_topics: Vec<String>,
    /// Opening stock of kind 1.
    pub initial_type_1: u32,
    /// Opening stock of kind 2.
    pub initial_type_2: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        DepotConfig::default().storage_settings()
    }
}

/// Everything a worker needs, resolved from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Robot state machine parameters.
    pub robot: RobotConfig,
    /// Bid estimator.
    pub estimator: EstimatorConfig,
    /// Tick channel.
    pub tick_topic: String,
    /// Call-for-proposals channel.
    pub cfp_topic: String,
    /// Proposal channel.
    pub proposal_topic: String,
    /// Award channel.
    pub award_topic: String,
    /// Channel for this robot's confirmations.
    pub processed_topic: String,
    /// Channel for this robot's status reports.
    pub status_topic: String,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_time_unit_ms() -> u64 {
    1_000
}

fn default_tick_topic() -> String {
    "tickgen/tick".to_owned()
}

fn default_cfp_topic() -> String {
    "supplier/cfp".to_owned()
}

fn default_proposal_topic() -> String {
    "supplier/proposal".to_owned()
}

fn default_award_topic() -> String {
    "supplier/award".to_owned()
}

fn default_supplier_stock_topic() -> String {
    "supplier/stock".to_owned()
}

fn default_storage_stock_topic() -> String {
    "storage/stock".to_owned()
}

fn default_supplier_name() -> String {
    "supplier".to_owned()
}

const fn default_supplier_units() -> u32 {
    100
}

fn default_supplier_confirmation_topics() -> Vec<String> {
    vec![
        "roboter/1/processed".to_owned(),
        "roboter/2/processed".to_owned(),
    ]
}

const fn default_cfp_quantity() -> u32 {
    1
}

const fn default_cfp_probability() -> f64 {
    1.0
}

const fn default_replenish_threshold_ticks() -> u32 {
    depot_ledger::replenish::DEFAULT_THRESHOLD_TICKS
}

const fn default_replenish_quantity() -> u32 {
    depot_ledger::replenish::DEFAULT_REFILL_QUANTITY
}

fn default_storage_name() -> String {
    "storage".to_owned()
}

fn default_inbound_topics() -> Vec<String> {
    vec![
        "roboter/1/processed".to_owned(),
        "roboter/2/processed".to_owned(),
    ]
}

fn default_outbound_topics() -> Vec<String> {
    vec!["roboter/3/processed".to_owned()]
}

fn default_robots() -> Vec<RobotEntry> {
    vec![
        RobotEntry::numbered(1, PackageType::Type1),
        RobotEntry::numbered(2, PackageType::Type2),
    ]
}

const fn default_initial_battery() -> u32 {
    depot_agents::MAX_BATTERY
}

const fn default_low_battery_threshold() -> u32 {
    20
}

const fn default_charge_per_tick() -> u32 {
    10
}

const fn default_drain_per_unit() -> u32 {
    1
}

const fn default_award_timeout_ticks() -> u32 {
    2
}

const fn default_estimate_min() -> u32 {
    1
}

const fn default_estimate_max() -> u32 {
    5
}

const fn default_low_battery_penalty() -> u32 {
    2
}

const fn default_clock_interval_ms() -> u64 {
    1_000
}

const fn default_simulation_ticks() -> u64 {
    500
}

const fn default_simulation_seed() -> u64 {
    42
}

const fn default_time_units_per_tick() -> u32 {
    1
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = DepotConfig::parse("").unwrap();
        assert_eq!(config, DepotConfig::default());
        assert_eq!(config.topics.tick, "tickgen/tick");
        assert_eq!(config.robots.len(), 2);
        assert_eq!(config.supplier.initial_type_1, 100);
        assert_eq!(config.storage.initial_type_1, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_partial_yaml() {
        let yaml = r"
node:
  role: robot
  name: roboter-2
supplier:
  cfp_probability: 0.5
robots:
  - name: roboter-1
    capability: 1
    processed_topic: roboter/1/processed
    status_topic: roboter/1/status
  - name: roboter-2
    capability: 2
    processed_topic: roboter/2/processed
    status_topic: roboter/2/status
    estimator:
      kind: load
      low_battery_penalty: 4
logging:
  format: json
";
        let config = DepotConfig::parse(yaml).unwrap();
        assert_eq!(config.node.role, Role::Robot);
        assert_eq!(config.logging.format, LogFormat::Json);
        let robot = config.robot("roboter-2").unwrap();
        assert_eq!(robot.capability, PackageType::Type2);
        assert_eq!(
            robot.estimator,
            EstimatorSettings::Load {
                low_battery_penalty: 4
            }
        );
        assert_eq!(robot.low_battery_threshold, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_capability_rejected() {
        let yaml = r"
robots:
  - name: roboter-9
    capability: 3
    processed_topic: roboter/9/processed
    status_topic: roboter/9/status
";
        assert!(DepotConfig::parse(yaml).is_err());
    }

    #[test]
    fn stock_overrides_follow_role() {
        let mut config = DepotConfig::default();
        config
            .apply_overrides(env(&[
                ("DEPOT_ROLE", "storage"),
                ("PACKET_TYPE_1_UNIT", "7"),
                ("NATS_URL", "nats://broker:4222"),
            ]))
            .unwrap();
        assert_eq!(config.node.role, Role::Storage);
        assert_eq!(config.storage.initial_type_1, 7);
        assert_eq!(config.supplier.initial_type_1, 100);
        assert_eq!(config.infrastructure.nats_url, "nats://broker:4222");
    }

    #[test]
    fn bad_overrides_rejected() {
        let mut config = DepotConfig::default();
        assert!(config.apply_overrides(env(&[("DEPOT_ROLE", "janitor")])).is_err());
        assert!(
            config
                .apply_overrides(env(&[("PACKET_TYPE_2_UNIT", "lots")]))
                .is_err()
        );
    }

    #[test]
    fn ec_name_names_the_ledger_agent() {
        let mut config = DepotConfig::default();
        config
            .apply_overrides(env(&[("DEPOT_ROLE", "supplier"), ("EC_NAME", "supplier-a")]))
            .unwrap();
        assert_eq!(config.coordinator_settings().unwrap().name, "supplier-a");
    }

    #[test]
    fn validation_catches_ranges() {
        let mut config = DepotConfig::default();
        config.supplier.cfp_probability = 1.5;
        assert!(config.validate().is_err());

        let mut config = DepotConfig::default();
        config.robots.push(RobotEntry::numbered(1, PackageType::Type2));
        assert!(config.validate().is_err());

        let mut config = DepotConfig::default();
        config.robots = vec![RobotEntry {
            estimator: EstimatorSettings::Uniform {
                min: 0,
                max: 3,
                seed: None,
            },
            ..RobotEntry::numbered(1, PackageType::Type1)
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn worker_settings_carry_robot_topics() {
        let config = DepotConfig::default();
        let entry = config.robot("roboter-1").unwrap();
        let settings = config.worker_settings(entry).unwrap();
        assert_eq!(settings.processed_topic, "roboter/1/processed");
        assert_eq!(settings.status_topic, "roboter/1/status");
        assert_eq!(settings.robot.capability, PackageType::Type1);
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let shipped = DepotConfig::parse(include_str!("../../../depot-config.yaml")).unwrap();
        shipped.validate().unwrap();
        let defaults = DepotConfig::default();
        assert_eq!(shipped.topics, defaults.topics);
        assert_eq!(shipped.supplier, defaults.supplier);
        assert_eq!(shipped.storage, defaults.storage);
        assert_eq!(shipped.robots.len(), 2);
        assert_eq!(shipped.robot("roboter-2").unwrap().capability, PackageType::Type2);
    }
}
