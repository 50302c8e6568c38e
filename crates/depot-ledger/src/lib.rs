//! Inventory ledgers for the Depot supply chain.
//!
//! The supplier and the storage each own one [`Inventory`]: an integer count
//! per package kind, running movement totals, and a bounded journal of the
//! most recent movements. The two ledgers track different legs of the flow
//! and are never shared; they converge only through confirmations delivered
//! over the bus.
//!
//! # Modules
//!
//! - [`inventory`] -- The [`Inventory`] struct: counts, journal, snapshots.
//! - [`replenish`] -- The staggered refill policy used by the supplier.
//! - [`conservation`] -- Checks movement totals against the live counts.
//!
//! # Floor Rule
//!
//! A count never goes below zero. A decrement that would underflow is
//! refused with [`LedgerError::Insufficient`], journaled as
//! [`Movement::Refused`], and leaves the count untouched.
//!
//! # Usage
//!
//! ```
//! use depot_ledger::{Inventory, ConservationResult};
//! use depot_types::PackageType;
//!
//! let mut supplier = Inventory::new("supplier", 1, 0);
//! assert!(supplier.stock_out(1, PackageType::Type1, 1).is_ok());
//! assert!(supplier.stock_out(2, PackageType::Type1, 1).is_err());
//! assert_eq!(supplier.count(PackageType::Type1), 0);
//! assert_eq!(supplier.verify_conservation(), ConservationResult::Balanced);
//! ```

pub mod conservation;
pub mod inventory;
pub mod replenish;

// Re-export primary types at crate root.
pub use conservation::{ConservationResult, FlowTotals};
pub use inventory::{Inventory, LedgerEntry, Movement};
pub use replenish::{ReplenishDecision, ReplenishmentPolicy};

use std::collections::BTreeMap;

use depot_types::PackageType;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when mutating an inventory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Quantity must be strictly positive.
    #[error("ledger movement quantity must be non-zero")]
    ZeroQuantity,

    /// A decrement would take the count below zero.
    #[error("insufficient stock of {package_type}: requested {requested}, available {available}")]
    Insufficient {
        /// Kind being decremented.
        package_type: PackageType,
        /// Units requested.
        requested: u32,
        /// Units on hand.
        available: u32,
    },

    /// An increment would overflow the count.
    #[error("stock overflow for {package_type}")]
    Overflow {
        /// Kind being incremented.
        package_type: PackageType,
    },
}

// ---------------------------------------------------------------------------
// Anomaly type
// ---------------------------------------------------------------------------

/// A conservation violation: the journal does not explain the live counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnomaly {
    /// Per-kind mismatch: (`expected_from_journal`, `actual_count`).
    pub imbalances: BTreeMap<PackageType, (u64, u64)>,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
