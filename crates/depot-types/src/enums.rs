//! Enumeration types shared by every participant on the bus.
//!
//! Wire spellings follow the deployed message format: package kinds are the
//! integers `1` and `2`, priorities are `leicht`, `mittel`, and `schwer`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

// ---------------------------------------------------------------------------
// Package kinds
// ---------------------------------------------------------------------------

/// A kind of package handled by the supply chain.
///
/// Serialized as the bare integer used on the wire (`1` or `2`). Any other
/// integer fails deserialization with [`UnknownPackageType`]; there is no
/// safe default for an unknown kind, so such messages are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PackageType {
    /// Package kind `1`.
    Type1,
    /// Package kind `2`.
    Type2,
}

impl PackageType {
    /// Every package kind, in ascending wire order.
    pub const ALL: [Self; 2] = [Self::Type1, Self::Type2];

    /// The integer used for this kind on the wire.
    pub const fn wire_value(self) -> u8 {
        match self {
            Self::Type1 => 1,
            Self::Type2 => 2,
        }
    }
}

/// Error returned when a wire integer names no known package kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown package type: {0}")]
pub struct UnknownPackageType(pub u8);

impl TryFrom<u8> for PackageType {
    type Error = UnknownPackageType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Type1),
            2 => Ok(Self::Type2),
            other => Err(UnknownPackageType(other)),
        }
    }
}

impl From<PackageType> for u8 {
    fn from(kind: PackageType) -> Self {
        kind.wire_value()
    }
}

impl core::fmt::Display for PackageType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "type {}", self.wire_value())
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Handling priority announced with a call for proposals.
///
/// Deserialization is lenient: an unrecognised spelling is logged and
/// replaced by [`Priority::Medium`], the documented safe default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    /// Light load (`leicht`).
    Light,
    /// Medium load (`mittel`).
    #[default]
    Medium,
    /// Heavy load (`schwer`).
    Heavy,
}

impl Priority {
    /// Every priority, lightest first.
    pub const ALL: [Self; 3] = [Self::Light, Self::Medium, Self::Heavy];

    /// The spelling used on the wire.
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Light => "leicht",
            Self::Medium => "mittel",
            Self::Heavy => "schwer",
        }
    }

    /// Parse a wire spelling, returning `None` when it is not recognised.
    ///
    /// Matching ignores ASCII case and surrounding whitespace.
    pub fn from_wire(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_wire().eq_ignore_ascii_case(value))
    }
}

impl core::fmt::Display for Priority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw).unwrap_or_else(|| {
            warn!(priority = raw, "unknown priority, defaulting to mittel");
            Self::Medium
        }))
    }
}

// ---------------------------------------------------------------------------
// Robot status
// ---------------------------------------------------------------------------

/// Lifecycle state of a worker robot.
///
/// ```text
/// Ready -> AwaitingAward -> Busy -> Ready
///   |                                 ^
///   +-------> Charging ---------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    /// Idle and eligible to bid.
    #[default]
    Ready,
    /// A proposal was sent; waiting for the round's award.
    AwaitingAward,
    /// Executing an awarded job.
    Busy,
    /// Recharging the battery; not bidding.
    Charging,
}

impl core::fmt::Display for RobotStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::Ready => "ready",
            Self::AwaitingAward => "awaiting_award",
            Self::Busy => "busy",
            Self::Charging => "charging",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Outcome reported by a confirmation. Only completed jobs are confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The awarded job finished.
    #[default]
    Completed,
}
