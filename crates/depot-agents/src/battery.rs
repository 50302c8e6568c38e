//! Battery level of a robot.
//!
//! The level only falls while a job executes and only rises while the robot
//! is charging. It is always clamped to `0..=100`. All arithmetic saturates;
//! no panics, no silent wrap-around.

/// Full charge, in percent.
pub const MAX_BATTERY: u32 = 100;

/// A battery level in percent, always within `0..=MAX_BATTERY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Battery(u32);

impl Default for Battery {
    fn default() -> Self {
        Self(MAX_BATTERY)
    }
}

impl Battery {
    /// Create a battery at `level`, clamped to [`MAX_BATTERY`].
    pub fn new(level: u32) -> Self {
        Self(level.min(MAX_BATTERY))
    }

    /// Current level in percent.
    pub const fn level(self) -> u32 {
        self.0
    }

    /// Whether the battery is full.
    pub const fn is_full(self) -> bool {
        self.0 >= MAX_BATTERY
    }

    /// Whether the level is strictly below `threshold`.
    pub const fn is_below(self, threshold: u32) -> bool {
        self.0 < threshold
    }

    /// Consume `per_unit` percent for each of `units` time units.
    ///
    /// Returns the amount actually consumed (never more than the level).
    pub fn drain(&mut self, units: u32, per_unit: u32) -> u32 {
        let wanted = units.saturating_mul(per_unit);
        let consumed = wanted.min(self.0);
        self.0 = self.0.saturating_sub(consumed);
        consumed
    }

    /// Add `amount` percent, clamped to [`MAX_BATTERY`].
    ///
    /// Returns the amount actually added.
    pub fn charge(&mut self, amount: u32) -> u32 {
        let before = self.0;
        self.0 = self.0.saturating_add(amount).min(MAX_BATTERY);
        self.0.saturating_sub(before)
    }
}

impl core::fmt::Display for Battery {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_to_max() {
        assert_eq!(Battery::new(250).level(), 100);
        assert!(Battery::new(100).is_full());
    }

    #[test]
    fn drain_saturates_at_zero() {
        let mut battery = Battery::new(15);
        assert_eq!(battery.drain(10, 2), 15);
        assert_eq!(battery.level(), 0);
    }

    #[test]
    fn drain_scales_with_rate() {
        let mut battery = Battery::new(80);
        assert_eq!(battery.drain(4, 3), 12);
        assert_eq!(battery.level(), 68);
    }

    #[test]
    fn charge_clamps_to_max() {
        let mut battery = Battery::new(95);
        assert_eq!(battery.charge(10), 5);
        assert!(battery.is_full());
    }

    #[test]
    fn threshold_is_strict() {
        assert!(Battery::new(19).is_below(20));
        assert!(!Battery::new(20).is_below(20));
    }
}
