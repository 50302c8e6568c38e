//! Worker robot logic for the Depot supply chain.
//!
//! This crate contains the logic layer for robots -- everything that operates
//! on a robot's own state without touching I/O. The core crate binds it to
//! bus channels; the node binary runs it against NATS.
//!
//! # Modules
//!
//! - [`battery`] -- Battery level with clamped drain and charge ([`Battery`])
//! - [`config`] -- Tunable robot parameters ([`RobotConfig`])
//! - [`error`] -- Error types ([`AgentError`], [`JobError`])
//! - [`estimator`] -- Bid duration estimators ([`DurationEstimator`])
//! - [`robot`] -- The bidding and execution state machine ([`Robot`])

pub mod battery;
pub mod config;
pub mod error;
pub mod estimator;
pub mod robot;

// Re-export primary types at crate root for convenience.
pub use battery::{Battery, MAX_BATTERY};
pub use config::RobotConfig;
pub use error::{AgentError, JobError};
pub use estimator::{DurationEstimator, EstimatorConfig, LoadEstimator, UniformEstimator};
pub use robot::{AwardOutcome, CfpResponse, IgnoreReason, Job, Robot, SkipReason, TickOutcome};
