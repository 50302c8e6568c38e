//! Error types for the node binary.
//!
//! Only start-up problems are fatal: a bad configuration, an unknown robot,
//! or an unreachable NATS server. Once the reactor runs, message-level
//! failures are logged and skipped.

use depot_agents::AgentError;
use depot_core::{ConfigError, SimulationError};

/// Errors that can stop a node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The robot could not be built.
    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    /// The simulation could not be built.
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),

    /// Failed to connect to or communicate with the NATS server.
    #[error("NATS error: {0}")]
    Nats(String),

    /// The selected role cannot run with the given configuration.
    #[error("role error: {0}")]
    Role(String),
}
