//! Bid duration estimators.
//!
//! A robot answers a call for proposals with an estimated completion time.
//! Two estimators exist:
//!
//! - [`UniformEstimator`] -- a bounded random value, fractional, optionally
//!   seeded so a run can be replayed.
//! - [`LoadEstimator`] -- a deterministic function of priority, quantity, and
//!   battery level. A weak battery bids slower, which lets fresher robots win.

use core::num::NonZeroU32;

use depot_types::{CallForProposals, EstimatedTime, Priority};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::battery::Battery;

/// Source of bid durations.
pub trait DurationEstimator: Send + core::fmt::Debug {
    /// Estimate how many time units the announced job will take.
    fn estimate(&mut self, cfp: &CallForProposals, battery: Battery) -> EstimatedTime;

    /// Short name for log fields.
    fn name(&self) -> &'static str;
}

/// Estimator selection, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstimatorConfig {
    /// Uniform random estimate in `min..=max`, not restricted to whole units.
    Uniform {
        /// Smallest estimate.
        min: NonZeroU32,
        /// Largest estimate.
        max: NonZeroU32,
        /// Seed for reproducible runs; `None` seeds from the OS.
        seed: Option<u64>,
    },
    /// Deterministic estimate from the job load.
    Load {
        /// Extra time units added when the battery is below half.
        low_battery_penalty: u32,
    },
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::Uniform {
            min: NonZeroU32::MIN,
            max: NonZeroU32::new(5).unwrap_or(NonZeroU32::MIN),
            seed: None,
        }
    }
}

impl EstimatorConfig {
    /// Build the configured estimator.
    pub fn build(&self) -> Box<dyn DurationEstimator> {
        match *self {
            Self::Uniform { min, max, seed } => Box::new(UniformEstimator::new(min, max, seed)),
            Self::Load {
                low_battery_penalty,
            } => Box::new(LoadEstimator::new(low_battery_penalty)),
        }
    }
}

/// Uniform random estimates within fixed bounds.
#[derive(Debug)]
pub struct UniformEstimator {
    rng: StdRng,
    min: NonZeroU32,
    max: NonZeroU32,
}

impl UniformEstimator {
    /// Create an estimator over `min..=max`. Swapped bounds are reordered.
    pub fn new(min: NonZeroU32, max: NonZeroU32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self {
            rng,
            min: min.min(max),
            max: max.max(min),
        }
    }
}

impl DurationEstimator for UniformEstimator {
    fn estimate(&mut self, _cfp: &CallForProposals, _battery: Battery) -> EstimatedTime {
        let low = f64::from(self.min.get());
        let high = f64::from(self.max.get());
        let raw: f64 = self.rng.random_range(low..=high);
        EstimatedTime::new(raw).unwrap_or_else(|_| EstimatedTime::from_units(self.min))
    }

    fn name(&self) -> &'static str {
        "uniform"
    }
}

/// Deterministic estimate: priority weight times quantity, plus a penalty
/// when the battery is below half.
///
/// | Priority | Units per package |
/// |----------|-------------------|
/// | leicht   | 1 |
/// | mittel   | 2 |
/// | schwer   | 3 |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadEstimator {
    low_battery_penalty: u32,
}

impl LoadEstimator {
    /// Create a load estimator.
    pub const fn new(low_battery_penalty: u32) -> Self {
        Self {
            low_battery_penalty,
        }
    }

    const fn priority_weight(priority: Priority) -> u32 {
        match priority {
            Priority::Light => 1,
            Priority::Medium => 2,
            Priority::Heavy => 3,
        }
    }
}

impl DurationEstimator for LoadEstimator {
    fn estimate(&mut self, cfp: &CallForProposals, battery: Battery) -> EstimatedTime {
        let base = Self::priority_weight(cfp.priority).saturating_mul(cfp.quantity.get());
        let penalty = if battery.is_below(50) {
            self.low_battery_penalty
        } else {
            0
        };
        EstimatedTime::from_units(NonZeroU32::new(base.saturating_add(penalty)).unwrap_or(NonZeroU32::MIN))
    }

    fn name(&self) -> &'static str {
        "load"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use depot_types::PackageType;

    use super::*;

    fn cfp(priority: Priority, quantity: u32) -> CallForProposals {
        CallForProposals {
            package_type: PackageType::Type1,
            priority,
            quantity: NonZeroU32::new(quantity).unwrap(),
            round: None,
        }
    }

    #[test]
    fn uniform_stays_in_bounds() {
        let mut est = UniformEstimator::new(
            NonZeroU32::new(2).unwrap(),
            NonZeroU32::new(4).unwrap(),
            Some(7),
        );
        for _ in 0..200 {
            let v = est.estimate(&cfp(Priority::Medium, 1), Battery::default()).get();
            assert!((2.0..=4.0).contains(&v), "estimate {v} out of bounds");
        }
    }

    #[test]
    fn uniform_is_reproducible_with_seed() {
        let bounds = (NonZeroU32::MIN, NonZeroU32::new(100).unwrap());
        let mut a = UniformEstimator::new(bounds.0, bounds.1, Some(42));
        let mut b = UniformEstimator::new(bounds.0, bounds.1, Some(42));
        let job = cfp(Priority::Light, 1);
        let seq_a: Vec<EstimatedTime> = (0..10).map(|_| a.estimate(&job, Battery::default())).collect();
        let seq_b: Vec<EstimatedTime> = (0..10).map(|_| b.estimate(&job, Battery::default())).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn uniform_reorders_swapped_bounds() {
        let mut est = UniformEstimator::new(
            NonZeroU32::new(9).unwrap(),
            NonZeroU32::new(3).unwrap(),
            Some(1),
        );
        let v = est.estimate(&cfp(Priority::Heavy, 1), Battery::default()).get();
        assert!((3.0..=9.0).contains(&v));
    }

    #[test]
    fn load_scales_with_priority_and_quantity() {
        let mut est = LoadEstimator::new(2);
        assert_eq!(est.estimate(&cfp(Priority::Light, 1), Battery::default()).ceil_units().get(), 1);
        assert_eq!(est.estimate(&cfp(Priority::Heavy, 2), Battery::default()).ceil_units().get(), 6);
    }

    #[test]
    fn load_penalizes_weak_battery() {
        let mut est = LoadEstimator::new(2);
        assert_eq!(est.estimate(&cfp(Priority::Medium, 1), Battery::new(49)).ceil_units().get(), 4);
        assert_eq!(est.estimate(&cfp(Priority::Medium, 1), Battery::new(50)).ceil_units().get(), 2);
    }

    #[test]
    fn config_builds_named_estimators() {
        assert_eq!(EstimatorConfig::default().build().name(), "uniform");
        let load = EstimatorConfig::Load {
            low_battery_penalty: 1,
        };
        assert_eq!(load.build().name(), "load");
    }
}
