//! Wire payloads exchanged over the bus.
//!
//! Every JSON message is a flat object. The `round` field is optional on all
//! negotiation messages: peers that never send it still interoperate, they
//! just lose late-proposal and duplicate detection.
//!
//! | Message | Publisher | Consumers |
//! |---------|-----------|-----------|
//! | [`Tick`] | clock | everyone |
//! | [`CallForProposals`] | supplier | robots |
//! | [`Proposal`] | robots | supplier |
//! | [`Award`] | supplier | robots |
//! | [`Confirmation`] | winning robot | supplier, storage |
//! | [`StockSnapshot`] | supplier, storage | observers |
//! | [`RobotReport`] | robots | observers |

use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::enums::{JobStatus, PackageType, Priority, RobotStatus};
use crate::estimate::EstimatedTime;
use crate::ids::RoundId;

/// The external pacing signal.
///
/// The timestamp is opaque: it is compared for equality (to spot duplicate
/// deliveries) and echoed into snapshots, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tick {
    /// Timestamp token published by the clock.
    pub timestamp: String,
}

impl Tick {
    /// Build a tick from a timestamp token.
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
        }
    }
}

/// Announcement of available work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallForProposals {
    /// Kind of package to move.
    pub package_type: PackageType,
    /// Handling priority.
    pub priority: Priority,
    /// Number of packages (always positive).
    pub quantity: NonZeroU32,
    /// Negotiation round opened by this announcement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundId>,
}

/// A robot's bid on a call for proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Bidder identity.
    pub name: String,
    /// Kind of package the bid is for.
    pub package_type: PackageType,
    /// Priority echoed from the call.
    pub priority: Priority,
    /// Quantity echoed from the call.
    pub quantity: NonZeroU32,
    /// Estimated completion time in time units; may be fractional.
    pub estimated_time: EstimatedTime,
    /// Round this bid answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundId>,
}

/// The coordinator's selection of exactly one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    /// Name of the winning bidder.
    pub winner: String,
    /// Kind of package awarded.
    pub package_type: PackageType,
    /// The winner's own estimate; rounded up, it becomes the job duration.
    pub estimated_time: EstimatedTime,
    /// Round being closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundId>,
}

/// Signal that an awarded job finished.
///
/// Older robots publish only the name or only the package kind. Ledgers
/// need the kind; a confirmation without one is dropped by them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// Robot that did the work.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Kind of package moved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_type: Option<PackageType>,
    /// Always [`JobStatus::Completed`].
    pub status: JobStatus,
    /// Round the job was awarded in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundId>,
}

/// Current stock of a ledger, republished every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    /// Units of package kind 1.
    pub package_type_1: u32,
    /// Units of package kind 2.
    pub package_type_2: u32,
    /// Timestamp of the tick that triggered the snapshot.
    pub timestamp: String,
}

impl StockSnapshot {
    /// Units of the given kind in this snapshot.
    pub const fn count(&self, kind: PackageType) -> u32 {
        match kind {
            PackageType::Type1 => self.package_type_1,
            PackageType::Type2 => self.package_type_2,
        }
    }
}

/// A robot's periodic status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotReport {
    /// Robot identity.
    pub name: String,
    /// Current lifecycle state.
    pub status: RobotStatus,
    /// Battery level in percent.
    pub battery: u32,
    /// Timestamp of the tick that triggered the report.
    pub timestamp: String,
}
