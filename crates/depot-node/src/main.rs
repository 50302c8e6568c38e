//! Node entry point for the Depot supply chain.
//!
//! One binary, five roles. The role comes from `node.role` in the config
//! file or from `DEPOT_ROLE`:
//!
//! ```text
//! clock ──tick──▶ supplier ──cfp──▶ robots ──proposal──▶ supplier ──award──▶ robots
//!                                   robots ──processed──▶ supplier + storage
//! ```
//!
//! `simulate` runs every agent in one process over an in-memory bus and
//! does not need NATS.

mod clock;
mod error;
mod nats;
mod reactor;

use std::path::PathBuf;
use std::time::Duration;

use depot_core::config::LoggingConfig;
use depot_core::{
    Coordinator, DepotConfig, LogFormat, Participant, Role, Simulation, StorageAgent, WorkerAgent,
};
use depot_types::PackageType;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::NodeError;
use crate::nats::NatsBus;
use crate::reactor::Reactor;

/// Config file used when `DEPOT_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "depot-config.yaml";

/// Application entry point.
///
/// Loads configuration, initializes logging, and runs the selected role
/// until it finishes or Ctrl-C is received.
///
/// # Errors
///
/// Returns an error if configuration, connection, or start-up fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    init_logging(&config.logging);

    info!(
        role = %config.node.role,
        name = config.node.name.as_deref().unwrap_or("-"),
        nats_url = config.infrastructure.nats_url,
        "depot-node starting"
    );

    match config.node.role {
        Role::Simulate => simulate(&config)?,
        Role::Clock => {
            let bus = NatsBus::connect(&config.infrastructure.nats_url).await?;
            clock::run(&bus, &config.topics.tick, &config.clock).await?;
        }
        Role::Supplier => {
            let agent = Coordinator::new(config.coordinator_settings()?);
            serve(agent, &config).await?;
        }
        Role::Storage => {
            let agent = StorageAgent::new(config.storage_settings());
            serve(agent, &config).await?;
        }
        Role::Robot => {
            let name = config.node.name.as_deref().ok_or_else(|| {
                NodeError::Role("robot role needs node.name or EC_NAME".to_owned())
            })?;
            let entry = config
                .robot(name)
                .ok_or_else(|| NodeError::Role(format!("no robot named {name:?} configured")))?;
            let agent = WorkerAgent::new(config.worker_settings(entry)?)?;
            serve(agent, &config).await?;
        }
    }

    info!("depot-node stopped");
    Ok(())
}

/// Read the config file named by `DEPOT_CONFIG`. Without a file the
/// defaults are used; environment overrides apply either way.
fn load_config() -> Result<DepotConfig, NodeError> {
    let path = std::env::var("DEPOT_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        return Ok(DepotConfig::from_file(&path)?);
    }
    let mut config = DepotConfig::default();
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    match config.format {
        LogFormat::Fmt => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

async fn serve<A: Participant>(agent: A, config: &DepotConfig) -> Result<(), NodeError> {
    let bus = NatsBus::connect(&config.infrastructure.nats_url).await?;
    let time_unit = Duration::from_millis(config.node.time_unit_ms);
    Reactor::new(agent, bus, time_unit).run().await
}

fn simulate(config: &DepotConfig) -> Result<(), NodeError> {
    let mut simulation = Simulation::from_config(config)?;
    let report = simulation.run();

    for kind in PackageType::ALL {
        let supplier = report.supplier_totals.get(&kind).copied().unwrap_or_default();
        let storage = report.storage_totals.get(&kind).copied().unwrap_or_default();
        info!(
            kind = %kind,
            confirmations = report.confirmations.get(&kind).copied().unwrap_or(0),
            supplier_stock = report.supplier_stock.count(kind),
            supplier_out = supplier.stocked_out,
            supplier_refused = supplier.refused,
            supplier_restocked = supplier.restocked,
            storage_stock = report.storage_stock.count(kind),
            storage_in = storage.stocked_in,
            storage_out = storage.stocked_out,
            "ledger summary"
        );
    }
    info!(
        ticks = report.ticks,
        deliveries = report.deliveries,
        dropped = report.dropped,
        duplicates_injected = report.duplicates_injected,
        jobs_failed = report.jobs_failed,
        "simulation summary"
    );

    if report.is_consistent() {
        info!("ledgers consistent");
    } else {
        warn!(
            supplier = ?report.supplier_conservation,
            storage = ?report.storage_conservation,
            "ledgers inconsistent"
        );
    }
    Ok(())
}
