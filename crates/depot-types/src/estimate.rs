//! Bid duration estimates.
//!
//! Robots may bid fractional time units (`2.5`). The estimate is kept as a
//! float for winner selection and only rounded up to whole time units when
//! a job is scheduled.

use core::cmp::Ordering;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// A positive, finite estimated completion time in time units.
///
/// Zero, negative, NaN, and infinite values are rejected on construction
/// and on deserialization, so the total order below is the numeric order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct EstimatedTime(f64);

/// Error returned for an estimate that is not positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("estimated time must be positive and finite, got {0}")]
pub struct InvalidEstimate(pub f64);

impl EstimatedTime {
    /// Validate `value`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidEstimate`] unless `value` is finite and above zero.
    pub fn new(value: f64) -> Result<Self, InvalidEstimate> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(InvalidEstimate(value))
        }
    }

    /// An estimate of exactly `units` time units.
    pub fn from_units(units: NonZeroU32) -> Self {
        Self(f64::from(units.get()))
    }

    /// The raw value.
    pub const fn get(self) -> f64 {
        self.0
    }

    /// Whole time units to schedule: rounded up, saturating at `u32::MAX`.
    pub fn ceil_units(self) -> NonZeroU32 {
        let ceiled = self.0.ceil();
        if ceiled >= f64::from(u32::MAX) {
            return NonZeroU32::MAX;
        }
        // In range: positive and below u32::MAX after the check above.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let units = ceiled as u32;
        NonZeroU32::new(units).unwrap_or(NonZeroU32::MIN)
    }
}

impl PartialEq for EstimatedTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EstimatedTime {}

impl PartialOrd for EstimatedTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EstimatedTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl TryFrom<f64> for EstimatedTime {
    type Error = InvalidEstimate;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EstimatedTime> for f64 {
    fn from(estimate: EstimatedTime) -> Self {
        estimate.0
    }
}

impl core::fmt::Display for EstimatedTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_and_non_finite() {
        assert!(EstimatedTime::new(0.0).is_err());
        assert!(EstimatedTime::new(-1.5).is_err());
        assert!(EstimatedTime::new(f64::NAN).is_err());
        assert!(EstimatedTime::new(f64::INFINITY).is_err());
        assert!(EstimatedTime::new(0.25).is_ok());
    }

    #[test]
    fn fractions_round_up_to_whole_units() {
        assert_eq!(EstimatedTime::new(2.5).unwrap().ceil_units().get(), 3);
        assert_eq!(EstimatedTime::new(3.0).unwrap().ceil_units().get(), 3);
        assert_eq!(EstimatedTime::new(0.1).unwrap().ceil_units().get(), 1);
        assert_eq!(EstimatedTime::new(1e12).unwrap().ceil_units(), NonZeroU32::MAX);
    }

    #[test]
    fn orders_numerically() {
        let short = EstimatedTime::new(1.5).unwrap();
        let long = EstimatedTime::new(2.0).unwrap();
        assert!(short < long);
        assert_eq!(EstimatedTime::from_units(NonZeroU32::new(2).unwrap()), long);
    }

    #[test]
    fn wire_accepts_integers_and_fractions() {
        let whole: EstimatedTime = serde_json::from_str("4").unwrap();
        assert_eq!(whole.ceil_units().get(), 4);
        let half: EstimatedTime = serde_json::from_str("2.5").unwrap();
        assert_eq!(serde_json::to_string(&half).unwrap(), "2.5");
        assert!(serde_json::from_str::<EstimatedTime>("0").is_err());
        assert!(serde_json::from_str::<EstimatedTime>("-3").is_err());
    }
}
