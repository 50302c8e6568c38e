//! Staggered refill policy for the supplier.
//!
//! When a kind runs out, the supplier does not refill immediately. Each tick
//! observed at zero stock advances a per-kind counter; when the counter
//! reaches the threshold the kind is refilled to a fixed quantity and the
//! counter resets to zero. This models supply latency.

use std::collections::BTreeMap;

use depot_types::PackageType;

/// Default ticks spent at zero stock before a refill.
pub const DEFAULT_THRESHOLD_TICKS: u32 = 10;

/// Default refill level.
pub const DEFAULT_REFILL_QUANTITY: u32 = 100;

/// Outcome of observing one kind's stock on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplenishDecision {
    /// Stock is positive; nothing to do.
    Stocked,
    /// Stock is zero and the refill is not yet due.
    Waiting {
        /// Ticks observed at zero so far.
        elapsed: u32,
        /// Ticks required before a refill.
        threshold: u32,
    },
    /// Stock is zero and the refill is due now. The counter was reset.
    Refill {
        /// Level to restock to.
        quantity: u32,
    },
}

/// Per-kind refill counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplenishmentPolicy {
    threshold_ticks: u32,
    refill_quantity: u32,
    counters: BTreeMap<PackageType, u32>,
}

impl Default for ReplenishmentPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_TICKS, DEFAULT_REFILL_QUANTITY)
    }
}

impl ReplenishmentPolicy {
    /// Create a policy. A threshold of 0 behaves like 1 (refill on the first
    /// tick at zero).
    pub fn new(threshold_ticks: u32, refill_quantity: u32) -> Self {
        Self {
            threshold_ticks: threshold_ticks.max(1),
            refill_quantity,
            counters: BTreeMap::new(),
        }
    }

    /// Ticks required at zero stock before a refill.
    pub const fn threshold_ticks(&self) -> u32 {
        self.threshold_ticks
    }

    /// Level a refill restocks to.
    pub const fn refill_quantity(&self) -> u32 {
        self.refill_quantity
    }

    /// Current counter for `kind`.
    pub fn counter(&self, kind: PackageType) -> u32 {
        self.counters.get(&kind).copied().unwrap_or(0)
    }

    /// Observe `kind` at `stock` units for one tick.
    pub fn observe(&mut self, kind: PackageType, stock: u32) -> ReplenishDecision {
        if stock > 0 {
            self.counters.remove(&kind);
            return ReplenishDecision::Stocked;
        }

        let elapsed = self.counter(kind).saturating_add(1);
        if elapsed >= self.threshold_ticks {
            self.counters.remove(&kind);
            ReplenishDecision::Refill {
                quantity: self.refill_quantity,
            }
        } else {
            self.counters.insert(kind, elapsed);
            ReplenishDecision::Waiting {
                elapsed,
                threshold: self.threshold_ticks,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refill_on_tenth_tick_at_zero() {
        let mut policy = ReplenishmentPolicy::default();
        for expected in 1..10 {
            assert_eq!(
                policy.observe(PackageType::Type1, 0),
                ReplenishDecision::Waiting {
                    elapsed: expected,
                    threshold: 10
                }
            );
        }
        assert_eq!(policy.counter(PackageType::Type1), 9);
        assert_eq!(
            policy.observe(PackageType::Type1, 0),
            ReplenishDecision::Refill { quantity: 100 }
        );
        assert_eq!(policy.counter(PackageType::Type1), 0);
    }

    #[test]
    fn counters_are_per_kind() {
        let mut policy = ReplenishmentPolicy::new(3, 50);
        let _ = policy.observe(PackageType::Type1, 0);
        let _ = policy.observe(PackageType::Type1, 0);
        assert_eq!(policy.counter(PackageType::Type1), 2);
        assert_eq!(policy.counter(PackageType::Type2), 0);
        assert_eq!(policy.observe(PackageType::Type2, 8), ReplenishDecision::Stocked);
    }

    #[test]
    fn zero_threshold_refills_immediately() {
        let mut policy = ReplenishmentPolicy::new(0, 5);
        assert_eq!(
            policy.observe(PackageType::Type2, 0),
            ReplenishDecision::Refill { quantity: 5 }
        );
    }

    #[test]
    fn stocked_clears_counter() {
        let mut policy = ReplenishmentPolicy::new(4, 5);
        let _ = policy.observe(PackageType::Type1, 0);
        assert_eq!(policy.observe(PackageType::Type1, 1), ReplenishDecision::Stocked);
        assert_eq!(policy.counter(PackageType::Type1), 0);
    }
}
