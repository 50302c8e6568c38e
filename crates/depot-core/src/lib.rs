//! Negotiation, ledger agents, and simulation for the Depot supply chain.
//!
//! Agents are plain structs owning their state. Each one is bound to its
//! channels through a [`DispatchTable`] and talks to the outside world only
//! through an [`Outbox`]. The same agents run over NATS in `depot-node` and
//! over the in-memory bus in [`simulation`].
//!
//! # Modules
//!
//! - [`protocol`] -- Payload decoding and error classes ([`ProtocolError`])
//! - [`outbox`] -- Outbound commands ([`Outbox`], [`Publisher`])
//! - [`dispatch`] -- Channel routing ([`DispatchTable`], [`Participant`])
//! - [`clock`] -- Duplicate-aware tick counting ([`TickClock`])
//! - [`dedup`] -- Bounded memory of seen keys ([`RecentSet`], [`RecentRounds`])
//! - [`config`] -- YAML configuration ([`DepotConfig`])
//! - [`coordinator`] -- The supplier ([`Coordinator`])
//! - [`storage`] -- The storage ledger agent ([`StorageAgent`])
//! - [`worker`] -- A robot bound to channels ([`WorkerAgent`])
//! - [`simulation`] -- Discrete-event in-process run ([`Simulation`])

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod dispatch;
pub mod outbox;
pub mod protocol;
pub mod simulation;
pub mod storage;
pub mod worker;

// Re-export primary types at crate root for convenience.
pub use clock::{TickAdvance, TickClock};
pub use config::{
    ConfigError, CoordinatorSettings, DepotConfig, LogFormat, Role, RobotEntry, StorageSettings,
    WorkerSettings,
};
pub use coordinator::{ConfirmationVerdict, Coordinator, ProposalVerdict, Round, select_winner};
pub use dedup::{RecentRounds, RecentSet};
pub use dispatch::{Delivery, DispatchTable, Handler, Participant};
pub use outbox::{Command, Envelope, Outbox, Outgoing, Publisher};
pub use protocol::{ProtocolError, decode, decode_tick};
pub use simulation::{Simulation, SimulationError, SimulationReport};
pub use storage::{Direction, StorageAgent, StorageVerdict};
pub use worker::WorkerAgent;
