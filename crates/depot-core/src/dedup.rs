//! Bounded memory of recently seen keys.
//!
//! Messages are delivered at least once and possibly out of order. Agents
//! remember the keys they already applied (settled round ids, tick
//! timestamps) and ignore repeats. Memory is bounded: the oldest key is
//! forgotten once the capacity is reached. Confirmations without a round id
//! cannot be deduplicated and are always applied.

use std::collections::{BTreeSet, VecDeque};

use depot_types::RoundId;

/// Default number of remembered rounds.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Recently seen keys, oldest forgotten first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentSet<T> {
    capacity: usize,
    order: VecDeque<T>,
    seen: BTreeSet<T>,
}

/// Recently settled round ids.
pub type RecentRounds = RecentSet<RoundId>;

impl<T: Ord + Clone> Default for RecentSet<T> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<T: Ord + Clone> RecentSet<T> {
    /// Remember at most `capacity` keys (at least one).
    pub const fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: if capacity == 0 { 1 } else { capacity },
            order: VecDeque::new(),
            seen: BTreeSet::new(),
        }
    }

    /// Record `key`. Returns `false` if it is already remembered.
    pub fn insert(&mut self, key: T) -> bool {
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        if self.order.len() > self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        true
    }

    /// Whether `key` is remembered.
    pub fn contains(&self, key: &T) -> bool {
        self.seen.contains(key)
    }

    /// Number of remembered keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The most recently recorded key.
    pub fn newest(&self) -> Option<&T> {
        self.order.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_are_rejected() {
        let mut rounds = RecentRounds::default();
        let id = RoundId::new();
        assert!(rounds.insert(id));
        assert!(!rounds.insert(id));
        assert_eq!(rounds.len(), 1);
    }

    #[test]
    fn oldest_is_forgotten_at_capacity() {
        let mut rounds = RecentRounds::with_capacity(2);
        let a = RoundId::new();
        let b = RoundId::new();
        let c = RoundId::new();
        assert!(rounds.insert(a));
        assert!(rounds.insert(b));
        assert!(rounds.insert(c));
        assert!(!rounds.contains(&a));
        assert!(rounds.contains(&b));
        assert!(rounds.contains(&c));
        assert_eq!(rounds.len(), 2);
    }

    #[test]
    fn zero_capacity_keeps_one() {
        let mut keys: RecentSet<String> = RecentSet::with_capacity(0);
        assert!(keys.insert("a".to_owned()));
        assert!(keys.insert("b".to_owned()));
        assert_eq!(keys.len(), 1);
        assert_eq!(keys.newest().map(String::as_str), Some("b"));
    }
}
