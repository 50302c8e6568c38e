//! Error types for the depot-agents crate.
//!
//! Robot handlers never fail outward: a message the robot cannot act on is
//! reported as an outcome, not an error. Errors here cover configuration and
//! the execution of an awarded job.

/// Errors raised while building a robot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    /// A configuration value is out of range.
    #[error("invalid robot configuration: {reason}")]
    InvalidConfig {
        /// Description of what is wrong.
        reason: String,
    },
}

/// Errors that end an awarded job without a confirmation.
///
/// Whatever the error, the robot leaves `Busy` when the job is finished.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    /// The job's duration cannot be represented as a timer.
    #[error("job duration of {units} units overflows the timer")]
    DurationOverflow {
        /// Duration in time units.
        units: u32,
    },

    /// The execution was interrupted before completion.
    #[error("job interrupted: {reason}")]
    Interrupted {
        /// Description of the interruption.
        reason: String,
    },
}
