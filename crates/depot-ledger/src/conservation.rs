//! Conservation check for an inventory journal.
//!
//! Units enter a ledger through `StockIn` and `Restock` and leave through
//! `StockOut`. `Refused` movements change nothing. For every kind K:
//!
//! ```text
//! opening(K) + stock_in(K) + restock(K) - stock_out(K) == count(K)
//! ```
//!
//! The inventory keeps running [`FlowTotals`] per kind, so the check holds
//! even after old journal lines have been evicted. Journals can still be
//! replayed directly with [`verify_conservation`].

use std::collections::{BTreeMap, BTreeSet};

use depot_types::PackageType;

use crate::LedgerAnomaly;
use crate::inventory::{LedgerEntry, Movement};

/// The result of a conservation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// The journal explains the live counts.
    Balanced,
    /// One or more kinds do not balance.
    Anomaly(LedgerAnomaly),
}

impl ConservationResult {
    /// Whether the check passed.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Movement totals for one package kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowTotals {
    /// Units added by deliveries.
    pub stocked_in: u64,
    /// Units removed.
    pub stocked_out: u64,
    /// Units added by refills.
    pub restocked: u64,
    /// Units whose removal was refused.
    pub refused: u64,
}

impl FlowTotals {
    /// Add one movement. Sums saturate.
    pub fn record(&mut self, movement: Movement, quantity: u32) {
        let slot = match movement {
            Movement::StockIn => &mut self.stocked_in,
            Movement::StockOut => &mut self.stocked_out,
            Movement::Restock => &mut self.restocked,
            Movement::Refused => &mut self.refused,
        };
        *slot = slot.saturating_add(u64::from(quantity));
    }
}

/// Sum the journal movements for `kind`.
///
/// Sums saturate; a `u64` journal total is far beyond any realistic run.
pub fn flow_totals<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    kind: PackageType,
) -> FlowTotals {
    entries
        .into_iter()
        .filter(|e| e.package_type == kind)
        .fold(FlowTotals::default(), |mut totals, entry| {
            totals.record(entry.movement, entry.quantity);
            totals
        })
}

/// Replay `entries` from `opening` and compare against `live`.
pub fn verify_conservation(
    opening: &BTreeMap<PackageType, u32>,
    live: &BTreeMap<PackageType, u32>,
    entries: &[LedgerEntry],
) -> ConservationResult {
    let mut flows: BTreeMap<PackageType, FlowTotals> = BTreeMap::new();
    for entry in entries {
        flows
            .entry(entry.package_type)
            .or_default()
            .record(entry.movement, entry.quantity);
    }
    verify_totals(opening, live, &flows)
}

/// Compare `opening` plus the per-kind `flows` against `live`.
pub fn verify_totals(
    opening: &BTreeMap<PackageType, u32>,
    live: &BTreeMap<PackageType, u32>,
    flows: &BTreeMap<PackageType, FlowTotals>,
) -> ConservationResult {
    let kinds: BTreeSet<PackageType> = opening
        .keys()
        .chain(live.keys())
        .chain(flows.keys())
        .copied()
        .collect();

    let mut imbalances: BTreeMap<PackageType, (u64, u64)> = BTreeMap::new();

    for kind in kinds {
        let totals = flows.get(&kind).copied().unwrap_or_default();
        let start = u64::from(opening.get(&kind).copied().unwrap_or(0));
        let actual = u64::from(live.get(&kind).copied().unwrap_or(0));

        let expected = start
            .checked_add(totals.stocked_in)
            .and_then(|v| v.checked_add(totals.restocked))
            .and_then(|v| v.checked_sub(totals.stocked_out));

        match expected {
            Some(expected) if expected == actual => {}
            Some(expected) => {
                imbalances.insert(kind, (expected, actual));
            }
            // The journal removed more than ever entered: always an anomaly.
            None => {
                imbalances.insert(kind, (0, actual));
            }
        }
    }

    if imbalances.is_empty() {
        ConservationResult::Balanced
    } else {
        let kinds: Vec<String> = imbalances.keys().map(ToString::to_string).collect();
        ConservationResult::Anomaly(LedgerAnomaly {
            message: format!("journal does not balance for {}", kinds.join(", ")),
            imbalances,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn entry(sequence: u64, kind: PackageType, movement: Movement, quantity: u32) -> LedgerEntry {
        LedgerEntry {
            sequence,
            tick: 1,
            package_type: kind,
            movement,
            quantity,
        }
    }

    #[test]
    fn balanced_journal() {
        let opening: BTreeMap<_, _> = [(PackageType::Type1, 10)].into_iter().collect();
        let live: BTreeMap<_, _> = [(PackageType::Type1, 12)].into_iter().collect();
        let entries = vec![
            entry(0, PackageType::Type1, Movement::StockIn, 5),
            entry(1, PackageType::Type1, Movement::StockOut, 3),
            entry(2, PackageType::Type1, Movement::Refused, 40),
        ];
        assert_eq!(
            verify_conservation(&opening, &live, &entries),
            ConservationResult::Balanced
        );
    }

    #[test]
    fn tampered_count_is_an_anomaly() {
        let opening: BTreeMap<_, _> = [(PackageType::Type2, 0)].into_iter().collect();
        let live: BTreeMap<_, _> = [(PackageType::Type2, 4)].into_iter().collect();
        let entries = vec![entry(0, PackageType::Type2, Movement::StockIn, 3)];
        match verify_conservation(&opening, &live, &entries) {
            ConservationResult::Anomaly(anomaly) => {
                assert_eq!(anomaly.imbalances.get(&PackageType::Type2), Some(&(3, 4)));
                assert!(anomaly.message.contains("type 2"));
            }
            ConservationResult::Balanced => panic!("expected an anomaly"),
        }
    }

    #[test]
    fn journal_underflow_is_an_anomaly() {
        let opening = BTreeMap::new();
        let live = BTreeMap::new();
        let entries = vec![entry(0, PackageType::Type1, Movement::StockOut, 1)];
        assert!(!verify_conservation(&opening, &live, &entries).is_balanced());
    }

    #[test]
    fn totals_split_by_movement() {
        let entries = vec![
            entry(0, PackageType::Type1, Movement::Restock, 100),
            entry(1, PackageType::Type1, Movement::StockOut, 1),
            entry(2, PackageType::Type2, Movement::StockOut, 1),
            entry(3, PackageType::Type1, Movement::Refused, 1),
        ];
        let totals = flow_totals(&entries, PackageType::Type1);
        assert_eq!(
            totals,
            FlowTotals {
                stocked_in: 0,
                stocked_out: 1,
                restocked: 100,
                refused: 1,
            }
        );
    }

    #[test]
    fn running_totals_balance_without_a_journal() {
        let opening: BTreeMap<_, _> = [(PackageType::Type1, 2)].into_iter().collect();
        let live: BTreeMap<_, _> = [(PackageType::Type1, 1)].into_iter().collect();
        let mut flow = FlowTotals::default();
        flow.record(Movement::StockOut, 1);
        flow.record(Movement::Refused, 5);
        let flows: BTreeMap<_, _> = [(PackageType::Type1, flow)].into_iter().collect();
        assert!(verify_totals(&opening, &live, &flows).is_balanced());

        flow.record(Movement::StockIn, 1);
        let flows: BTreeMap<_, _> = [(PackageType::Type1, flow)].into_iter().collect();
        assert!(!verify_totals(&opening, &live, &flows).is_balanced());
    }
}
