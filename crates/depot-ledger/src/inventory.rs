//! Per-kind stock counts with a bounded movement journal.
//!
//! The [`Inventory`] is owned by exactly one agent and mutated only by that
//! agent's handlers. Every accepted or refused movement is added to running
//! per-kind totals, so the count can be audited at any time, and appended
//! to a journal that keeps only the most recent entries.

use std::collections::{BTreeMap, VecDeque};

use depot_types::{PackageType, StockSnapshot};
use serde::Serialize;
use tracing::trace;

use crate::LedgerError;
use crate::conservation::{self, ConservationResult, FlowTotals};

/// Kind of movement recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Movement {
    /// Units arrived (inbound delivery).
    StockIn,
    /// Units left (picked up or dispatched).
    StockOut,
    /// Units created by a supply refill.
    Restock,
    /// A decrement was refused because it would go below zero.
    Refused,
}

/// Default number of journal entries kept per inventory.
pub const DEFAULT_JOURNAL_CAPACITY: usize = 4096;

/// One journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Position in the journal, starting at 0.
    pub sequence: u64,
    /// Local tick count of the owning agent when the movement happened.
    pub tick: u64,
    /// Kind moved.
    pub package_type: PackageType,
    /// Direction of the movement.
    pub movement: Movement,
    /// Units moved (units requested, for refused movements).
    pub quantity: u32,
}

/// Stock counts for every package kind plus their movement journal.
#[derive(Debug, Clone)]
pub struct Inventory {
    /// Owner name, used in log fields.
    owner: String,
    /// Counts at construction time.
    opening: BTreeMap<PackageType, u32>,
    /// Live counts.
    counts: BTreeMap<PackageType, u32>,
    /// Movement totals since construction.
    flows: BTreeMap<PackageType, FlowTotals>,
    /// Most recent movements, oldest first.
    entries: VecDeque<LedgerEntry>,
    /// Maximum journal length (at least one).
    journal_capacity: usize,
    /// Sequence number of the next journal entry.
    next_sequence: u64,
}

impl Inventory {
    /// Create an inventory with the given opening counts.
    pub fn new(owner: impl Into<String>, type_1: u32, type_2: u32) -> Self {
        Self::with_journal_capacity(owner, type_1, type_2, DEFAULT_JOURNAL_CAPACITY)
    }

    /// Create an inventory that keeps at most `capacity` journal entries.
    pub fn with_journal_capacity(
        owner: impl Into<String>,
        type_1: u32,
        type_2: u32,
        capacity: usize,
    ) -> Self {
        let opening: BTreeMap<PackageType, u32> =
            [(PackageType::Type1, type_1), (PackageType::Type2, type_2)]
                .into_iter()
                .collect();
        Self {
            owner: owner.into(),
            counts: opening.clone(),
            opening,
            flows: BTreeMap::new(),
            entries: VecDeque::new(),
            journal_capacity: capacity.max(1),
            next_sequence: 0,
        }
    }

    /// Owner name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Current units of `kind`.
    pub fn count(&self, kind: PackageType) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Opening units of `kind`.
    pub fn opening(&self, kind: PackageType) -> u32 {
        self.opening.get(&kind).copied().unwrap_or(0)
    }

    /// Retained journal entries, oldest first.
    pub const fn entries(&self) -> &VecDeque<LedgerEntry> {
        &self.entries
    }

    /// Maximum number of retained journal entries.
    pub const fn journal_capacity(&self) -> usize {
        self.journal_capacity
    }

    /// Movements journaled since construction, including evicted ones.
    pub const fn movements(&self) -> u64 {
        self.next_sequence
    }

    /// Add `quantity` units of `kind`. Returns the new count.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroQuantity`] for a zero quantity and
    /// [`LedgerError::Overflow`] if the count would exceed `u32::MAX`.
    pub fn stock_in(
        &mut self,
        tick: u64,
        kind: PackageType,
        quantity: u32,
    ) -> Result<u32, LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::ZeroQuantity);
        }
        let updated = self
            .count(kind)
            .checked_add(quantity)
            .ok_or(LedgerError::Overflow { package_type: kind })?;
        self.counts.insert(kind, updated);
        self.journal(tick, kind, Movement::StockIn, quantity);
        Ok(updated)
    }

    /// Remove `quantity` units of `kind`. Returns the new count.
    ///
    /// A decrement below zero is refused: the count is unchanged and a
    /// [`Movement::Refused`] entry is journaled.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ZeroQuantity`] for a zero quantity and
    /// [`LedgerError::Insufficient`] when fewer than `quantity` units remain.
    pub fn stock_out(
        &mut self,
        tick: u64,
        kind: PackageType,
        quantity: u32,
    ) -> Result<u32, LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::ZeroQuantity);
        }
        let available = self.count(kind);
        let Some(updated) = available.checked_sub(quantity) else {
            self.journal(tick, kind, Movement::Refused, quantity);
            return Err(LedgerError::Insufficient {
                package_type: kind,
                requested: quantity,
                available,
            });
        };
        self.counts.insert(kind, updated);
        self.journal(tick, kind, Movement::StockOut, quantity);
        Ok(updated)
    }

    /// Raise the count of `kind` to `level`. Returns the units added.
    ///
    /// A refill never lowers stock: when the count is already at or above
    /// `level`, nothing is recorded and 0 is returned.
    pub fn restock(&mut self, tick: u64, kind: PackageType, level: u32) -> u32 {
        let added = level.saturating_sub(self.count(kind));
        if added > 0 {
            self.counts.insert(kind, level);
            self.journal(tick, kind, Movement::Restock, added);
        }
        added
    }

    /// Snapshot of the current counts, stamped with `timestamp`.
    pub fn snapshot(&self, timestamp: &str) -> StockSnapshot {
        StockSnapshot {
            package_type_1: self.count(PackageType::Type1),
            package_type_2: self.count(PackageType::Type2),
            timestamp: timestamp.to_owned(),
        }
    }

    /// Movement totals for `kind` since construction.
    pub fn totals(&self, kind: PackageType) -> FlowTotals {
        self.flows.get(&kind).copied().unwrap_or_default()
    }

    /// Compare the opening counts plus the running totals with the live
    /// counts.
    pub fn verify_conservation(&self) -> ConservationResult {
        conservation::verify_totals(&self.opening, &self.counts, &self.flows)
    }

    fn journal(&mut self, tick: u64, kind: PackageType, movement: Movement, quantity: u32) {
        let sequence = self.next_sequence;
        self.next_sequence = sequence.saturating_add(1);
        self.flows.entry(kind).or_default().record(movement, quantity);
        trace!(
            owner = %self.owner,
            sequence,
            tick,
            package_type = %kind,
            ?movement,
            quantity,
            "Journal entry"
        );
        if self.entries.len() >= self.journal_capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LedgerEntry {
            sequence,
            tick,
            package_type: kind,
            movement,
            quantity,
        });
    }
}
