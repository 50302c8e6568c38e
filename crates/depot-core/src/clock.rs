//! Tick bookkeeping for agents.
//!
//! The clock is external; each agent remembers the timestamps of its recent
//! ticks and how many distinct ticks it has handled. A timestamp seen again,
//! whether right away or after a later tick, is a duplicate delivery and
//! must not advance any state.

use crate::dedup::RecentSet;

/// Number of recent tick timestamps remembered.
pub const TICK_MEMORY: usize = 64;

/// Result of observing a tick timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAdvance {
    /// A new tick; carries its 1-based sequence number.
    New(u64),
    /// A timestamp among the recently seen ticks.
    Duplicate,
}

/// Per-agent tick counter with duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickClock {
    seen: RecentSet<String>,
    count: u64,
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickClock {
    /// Create a clock that has seen no ticks.
    pub const fn new() -> Self {
        Self::with_memory(TICK_MEMORY)
    }

    /// Create a clock remembering the last `memory` timestamps.
    pub const fn with_memory(memory: usize) -> Self {
        Self {
            seen: RecentSet::with_capacity(memory),
            count: 0,
        }
    }

    /// Observe `timestamp`.
    pub fn advance(&mut self, timestamp: &str) -> TickAdvance {
        if !self.seen.insert(timestamp.to_owned()) {
            return TickAdvance::Duplicate;
        }
        self.count = self.count.saturating_add(1);
        TickAdvance::New(self.count)
    }

    /// Distinct ticks seen so far.
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// The most recent new timestamp.
    pub fn last(&self) -> Option<&str> {
        self.seen.newest().map(String::as_str)
    }
}
