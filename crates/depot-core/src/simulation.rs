//! Single-process simulation over an in-memory bus.
//!
//! Every agent runs against a discrete-event queue keyed by virtual time.
//! Ticks arrive every `time_units_per_tick` units; an awarded job completes
//! `duration` units after the award. Publications are delivered at the
//! instant they were made, in publication order, to every agent whose
//! dispatch table binds the channel. The bus can deliver a message twice to
//! exercise at-least-once handling.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat};
use depot_agents::{AgentError, EstimatorConfig, Job, JobError};
use depot_ledger::{ConservationResult, FlowTotals};
use depot_types::{PackageType, StockSnapshot, Tick};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, DepotConfig, SimulationConfig};
use crate::coordinator::Coordinator;
use crate::dispatch::{Delivery, DispatchTable, Participant};
use crate::outbox::{Command, Envelope, Outbox, Outgoing, Publisher};
use crate::storage::StorageAgent;
use crate::worker::WorkerAgent;

/// First virtual tick timestamp, in seconds since the Unix epoch.
const EPOCH_OFFSET_SECS: i64 = 1_700_000_000;

/// Errors raised while building a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The configuration is invalid.
    #[error("simulation config error: {0}")]
    Config(#[from] ConfigError),

    /// A robot could not be built.
    #[error("simulation agent error: {0}")]
    Agent(#[from] AgentError),
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    /// Ticks generated.
    pub ticks: u64,
    /// Messages published, by kind (before duplication).
    pub published: BTreeMap<&'static str, u64>,
    /// Handler invocations.
    pub deliveries: u64,
    /// Deliveries dropped as undecodable.
    pub dropped: u64,
    /// Extra copies injected by the bus.
    pub duplicates_injected: u64,
    /// Jobs that ended in a simulated fault.
    pub jobs_failed: u64,
    /// Confirmations published, by kind.
    pub confirmations: BTreeMap<PackageType, u64>,
    /// Final supplier stock.
    pub supplier_stock: StockSnapshot,
    /// Final storage stock.
    pub storage_stock: StockSnapshot,
    /// Supplier movement totals, by kind.
    pub supplier_totals: BTreeMap<PackageType, FlowTotals>,
    /// Storage movement totals, by kind.
    pub storage_totals: BTreeMap<PackageType, FlowTotals>,
    /// Supplier journal check.
    pub supplier_conservation: ConservationResult,
    /// Storage journal check.
    pub storage_conservation: ConservationResult,
}

impl SimulationReport {
    /// Whether both ledgers balance and every confirmation was applied
    /// exactly once on each side: per kind, supplier removals plus refusals
    /// equal storage deliveries equal confirmations published.
    pub fn is_consistent(&self) -> bool {
        if !self.supplier_conservation.is_balanced() || !self.storage_conservation.is_balanced() {
            return false;
        }
        PackageType::ALL.iter().all(|kind| {
            let sent = self.confirmations.get(kind).copied().unwrap_or(0);
            let supplier = self.supplier_totals.get(kind).copied().unwrap_or_default();
            let storage = self.storage_totals.get(kind).copied().unwrap_or_default();
            supplier.stocked_out.saturating_add(supplier.refused) == sent
                && storage.stocked_in == sent
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Deliver { channel: String, payload: Vec<u8> },
    Complete { worker: usize, job: Job },
}

#[derive(Debug, Default)]
struct Stats {
    published: BTreeMap<&'static str, u64>,
    deliveries: u64,
    dropped: u64,
    duplicates_injected: u64,
    jobs_failed: u64,
    confirmations: BTreeMap<PackageType, u64>,
}

fn bump<K: Ord>(map: &mut BTreeMap<K, u64>, key: K) {
    let slot = map.entry(key).or_insert(0);
    *slot = slot.saturating_add(1);
}

fn tally(stats: &mut Stats, delivery: Delivery) {
    match delivery {
        Delivery::Handled => stats.deliveries = stats.deliveries.saturating_add(1),
        Delivery::Dropped => {
            stats.deliveries = stats.deliveries.saturating_add(1);
            stats.dropped = stats.dropped.saturating_add(1);
        }
        Delivery::Unrouted => {}
    }
}

/// RFC 3339 timestamp of virtual tick `n`.
fn tick_timestamp(n: u64) -> String {
    i64::try_from(n)
        .ok()
        .and_then(|n| EPOCH_OFFSET_SECS.checked_add(n))
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map_or_else(
            || format!("tick-{n}"),
            |t| t.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
}

/// All agents on one in-memory bus.
#[derive(Debug)]
pub struct Simulation {
    coordinator: Coordinator,
    coordinator_routes: DispatchTable<Coordinator>,
    storage: StorageAgent,
    storage_routes: DispatchTable<StorageAgent>,
    workers: Vec<(WorkerAgent, DispatchTable<WorkerAgent>)>,
    queue: BTreeMap<(u64, u64), Event>,
    now: u64,
    seq: u64,
    ticks: u64,
    rng: StdRng,
    settings: SimulationConfig,
    tick_topic: String,
    stats: Stats,
}

impl Simulation {
    /// Build every agent named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Config`] if validation fails and
    /// [`SimulationError::Agent`] if a robot cannot be built.
    pub fn from_config(config: &DepotConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let coordinator = Coordinator::new(config.coordinator_settings()?);
        let coordinator_routes = coordinator.routes();
        let storage = StorageAgent::new(config.storage_settings());
        let storage_routes = storage.routes();

        let mut workers = Vec::with_capacity(config.robots.len());
        for (index, entry) in (0_u64..).zip(&config.robots) {
            let mut settings = config.worker_settings(entry)?;
            // Unseeded robots draw from the run seed so a run can be replayed.
            if let EstimatorConfig::Uniform { seed, .. } = &mut settings.estimator {
                let _ = seed.get_or_insert(config.simulation.seed.wrapping_add(index));
            }
            let worker = WorkerAgent::new(settings)?;
            let routes = worker.routes();
            workers.push((worker, routes));
        }

        info!(
            robots = workers.len(),
            ticks = config.simulation.ticks,
            seed = config.simulation.seed,
            "Simulation assembled"
        );

        Ok(Self {
            coordinator,
            coordinator_routes,
            storage,
            storage_routes,
            workers,
            queue: BTreeMap::new(),
            now: 0,
            seq: 0,
            ticks: 0,
            rng: StdRng::seed_from_u64(config.simulation.seed),
            settings: config.simulation.clone(),
            tick_topic: config.topics.tick.clone(),
            stats: Stats::default(),
        })
    }

    /// The supplier.
    pub const fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// The storage.
    pub const fn storage(&self) -> &StorageAgent {
        &self.storage
    }

    /// The robots, in roster order.
    pub fn workers(&self) -> impl Iterator<Item = &WorkerAgent> {
        self.workers.iter().map(|(w, _)| w)
    }

    /// Current virtual time, in job time units.
    pub const fn now(&self) -> u64 {
        self.now
    }

    /// Run the configured number of ticks, let in-flight jobs finish, and
    /// report.
    pub fn run(&mut self) -> SimulationReport {
        for _ in 0..self.settings.ticks {
            self.step();
        }
        self.settle();
        let report = self.report();
        info!(
            ticks = report.ticks,
            deliveries = report.deliveries,
            duplicates = report.duplicates_injected,
            consistent = report.is_consistent(),
            "Simulation finished"
        );
        report
    }

    /// Publish the next tick and process every event up to it.
    pub fn step(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
        let at = self
            .ticks
            .saturating_mul(u64::from(self.settings.time_units_per_tick));
        self.now = self.now.max(at);
        let timestamp = tick_timestamp(self.ticks);
        debug!(tick = self.ticks, time = at, %timestamp, "Virtual tick");
        let tick_topic = self.tick_topic.clone();
        self.publish(&tick_topic, Outgoing::Tick(Tick::new(timestamp)));
        self.run_until(Some(at));
    }

    /// Process remaining events without generating ticks.
    pub fn settle(&mut self) {
        self.run_until(None);
    }

    /// Snapshot of the run so far.
    pub fn report(&self) -> SimulationReport {
        let supplier = self.coordinator.inventory();
        let storage = self.storage.inventory();
        let timestamp = tick_timestamp(self.ticks);
        SimulationReport {
            ticks: self.ticks,
            published: self.stats.published.clone(),
            deliveries: self.stats.deliveries,
            dropped: self.stats.dropped,
            duplicates_injected: self.stats.duplicates_injected,
            jobs_failed: self.stats.jobs_failed,
            confirmations: self.stats.confirmations.clone(),
            supplier_stock: supplier.snapshot(&timestamp),
            storage_stock: storage.snapshot(&timestamp),
            supplier_totals: PackageType::ALL
                .iter()
                .map(|&k| (k, supplier.totals(k)))
                .collect(),
            storage_totals: PackageType::ALL
                .iter()
                .map(|&k| (k, storage.totals(k)))
                .collect(),
            supplier_conservation: supplier.verify_conservation(),
            storage_conservation: storage.verify_conservation(),
        }
    }

    fn push(&mut self, at: u64, event: Event) {
        self.seq = self.seq.saturating_add(1);
        self.queue.insert((at, self.seq), event);
    }

    fn run_until(&mut self, horizon: Option<u64>) {
        while let Some(entry) = self.queue.first_entry() {
            if horizon.is_some_and(|h| entry.key().0 > h) {
                break;
            }
            let ((at, _), event) = entry.remove_entry();
            self.now = at;
            self.handle(event);
        }
    }

    fn handle(&mut self, event: Event) {
        let mut produced: Vec<(Option<usize>, Command)> = Vec::new();
        let mut out = Outbox::new();

        match event {
            Event::Deliver { channel, payload } => {
                if self.coordinator_routes.handles(&channel) {
                    let d = self.coordinator_routes.dispatch(
                        &mut self.coordinator,
                        &channel,
                        &payload,
                        &mut out,
                    );
                    tally(&mut self.stats, d);
                    produced.extend(out.drain().into_iter().map(|c| (None, c)));
                }
                if self.storage_routes.handles(&channel) {
                    let d = self
                        .storage_routes
                        .dispatch(&mut self.storage, &channel, &payload, &mut out);
                    tally(&mut self.stats, d);
                    produced.extend(out.drain().into_iter().map(|c| (None, c)));
                }
                for (index, (worker, routes)) in self.workers.iter_mut().enumerate() {
                    if routes.handles(&channel) {
                        let d = routes.dispatch(worker, &channel, &payload, &mut out);
                        tally(&mut self.stats, d);
                        produced.extend(out.drain().into_iter().map(|c| (Some(index), c)));
                    }
                }
            }
            Event::Complete { worker, job } => {
                let result = if self.rng.random_bool(self.settings.job_failure_probability) {
                    self.stats.jobs_failed = self.stats.jobs_failed.saturating_add(1);
                    Err(JobError::Interrupted {
                        reason: "simulated fault".to_owned(),
                    })
                } else {
                    Ok(())
                };
                if let Some((agent, _)) = self.workers.get_mut(worker) {
                    agent.on_job_finished(&job, result, &mut out);
                    produced.extend(out.drain().into_iter().map(|c| (Some(worker), c)));
                }
            }
        }

        for (source, command) in produced {
            match command {
                Command::Publish(Envelope { channel, message }) => self.publish(&channel, message),
                Command::ScheduleCompletion { job } => {
                    let Some(worker) = source else {
                        warn!("Completion scheduled by a non-robot agent ignored");
                        continue;
                    };
                    let at = self.now.saturating_add(u64::from(job.duration.get()));
                    self.push(at, Event::Complete { worker, job });
                }
            }
        }
    }
}

impl Publisher for Simulation {
    fn publish(&mut self, channel: &str, message: Outgoing) {
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(channel, error = %e, "Message could not be encoded, not published");
                return;
            }
        };
        bump(&mut self.stats.published, message.kind());
        if let Outgoing::Confirmation(c) = &message
            && let Some(kind) = c.package_type
        {
            bump(&mut self.stats.confirmations, kind);
        }

        let duplicate = self.rng.random_bool(self.settings.duplicate_probability);
        if duplicate {
            self.stats.duplicates_injected = self.stats.duplicates_injected.saturating_add(1);
            self.push(
                self.now,
                Event::Deliver {
                    channel: channel.to_owned(),
                    payload: payload.clone(),
                },
            );
        }
        self.push(
            self.now,
            Event::Deliver {
                channel: channel.to_owned(),
                payload,
            },
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_rfc3339() {
        assert_eq!(tick_timestamp(0), "2023-11-14T22:13:20Z");
        assert_eq!(tick_timestamp(1), "2023-11-14T22:13:21Z");
    }

    #[test]
    fn short_run_is_consistent() {
        let mut config = DepotConfig::default();
        config.simulation.ticks = 30;
        config.supplier.seed = Some(3);
        let mut sim = Simulation::from_config(&config).unwrap();
        let report = sim.run();
        assert_eq!(report.ticks, 30);
        assert!(report.is_consistent(), "{report:?}");
        assert!(report.published.get("award").copied().unwrap_or(0) > 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = DepotConfig::default();
        config.simulation.duplicate_probability = 2.0;
        assert!(matches!(
            Simulation::from_config(&config),
            Err(SimulationError::Config(_))
        ));
    }
}
