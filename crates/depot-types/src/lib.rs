//! Shared type definitions for the Depot supply chain.
//!
//! Every process on the bus (supplier, robots, storage) speaks the message
//! shapes defined here. Nothing in this crate performs I/O.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers (negotiation rounds)
//! - [`enums`] -- Package kinds, priorities, robot status, job status
//! - [`estimate`] -- Positive, finite bid durations ([`EstimatedTime`])
//! - [`messages`] -- Wire payloads: CfP, proposal, award, confirmation,
//!   stock snapshot, robot report, and the tick event

pub mod enums;
pub mod estimate;
pub mod ids;
pub mod messages;

// Re-export all public types at crate root for convenience.
pub use enums::{JobStatus, PackageType, Priority, RobotStatus, UnknownPackageType};
pub use estimate::{EstimatedTime, InvalidEstimate};
pub use ids::RoundId;
pub use messages::{
    Award, CallForProposals, Confirmation, Proposal, RobotReport, StockSnapshot, Tick,
};
