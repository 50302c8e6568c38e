//! The storage ledger agent.
//!
//! Storage trusts the transport for direction: a confirmation on an inbound
//! channel is a delivery into storage, one on an outbound channel is a
//! dispatch out of it. The payload never decides the direction.

use std::collections::BTreeSet;

use depot_ledger::{ConservationResult, Inventory};
use depot_types::{Confirmation, Tick};
use tracing::{debug, info, warn};

use crate::clock::{TickAdvance, TickClock};
use crate::config::StorageSettings;
use crate::dedup::RecentRounds;
use crate::dispatch::{DispatchTable, Participant};
use crate::outbox::{Outbox, Outgoing, Publisher};
use crate::protocol::{self, ProtocolError};

/// Movement direction of a confirmation channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Deliveries into storage.
    Inbound,
    /// Dispatches out of storage.
    Outbound,
}

/// What the storage did with a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageVerdict {
    /// The ledger moved; carries the new count.
    Applied(u32),
    /// The round was already applied in this direction.
    Duplicate,
    /// The confirmation carries no package kind.
    MissingKind,
    /// The channel has no direction.
    UnknownChannel,
    /// An outbound decrement would go below zero.
    Refused,
}

/// The storage agent.
#[derive(Debug)]
pub struct StorageAgent {
    settings: StorageSettings,
    inbound: BTreeSet<String>,
    outbound: BTreeSet<String>,
    inventory: Inventory,
    clock: TickClock,
    seen_inbound: RecentRounds,
    seen_outbound: RecentRounds,
}

impl StorageAgent {
    /// Create a storage agent with its opening stock.
    pub fn new(settings: StorageSettings) -> Self {
        Self {
            inbound: settings.inbound_topics.iter().cloned().collect(),
            outbound: settings.outbound_topics.iter().cloned().collect(),
            inventory: Inventory::new(
                settings.name.clone(),
                settings.initial_type_1,
                settings.initial_type_2,
            ),
            clock: TickClock::new(),
            seen_inbound: RecentRounds::default(),
            seen_outbound: RecentRounds::default(),
            settings,
        }
    }

    /// The storage ledger.
    pub const fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Replay the storage journal against its live counts.
    pub fn verify_conservation(&self) -> ConservationResult {
        self.inventory.verify_conservation()
    }

    /// Direction bound to `channel`. A channel listed both ways counts as
    /// inbound.
    pub fn direction(&self, channel: &str) -> Option<Direction> {
        if self.inbound.contains(channel) {
            Some(Direction::Inbound)
        } else if self.outbound.contains(channel) {
            Some(Direction::Outbound)
        } else {
            None
        }
    }

    /// Publish the current stock. Never changes stock.
    pub fn on_tick(&mut self, tick: &Tick, out: &mut impl Publisher) {
        if self.clock.advance(&tick.timestamp) == TickAdvance::Duplicate {
            debug!(storage = %self.settings.name, timestamp = %tick.timestamp, "Duplicate tick ignored");
            return;
        }
        let snapshot = self.inventory.snapshot(&tick.timestamp);
        info!(
            storage = %self.settings.name,
            package_type_1 = snapshot.package_type_1,
            package_type_2 = snapshot.package_type_2,
            "Stock published"
        );
        out.publish(&self.settings.stock_topic, Outgoing::Stock(snapshot));
    }

    /// Apply a confirmation that arrived on `channel`.
    pub fn on_confirmation(&mut self, channel: &str, confirmation: &Confirmation) -> StorageVerdict {
        let Some(direction) = self.direction(channel) else {
            warn!(storage = %self.settings.name, channel, "Confirmation on unbound channel ignored");
            return StorageVerdict::UnknownChannel;
        };
        self.apply(direction, confirmation)
    }

    /// Apply a confirmation in a known direction: one unit in or out.
    pub fn apply(&mut self, direction: Direction, confirmation: &Confirmation) -> StorageVerdict {
        let Some(kind) = confirmation.package_type else {
            warn!(
                storage = %self.settings.name,
                ?direction,
                robot = ?confirmation.name,
                "Confirmation without package type dropped"
            );
            return StorageVerdict::MissingKind;
        };
        if let Some(round) = confirmation.round {
            let seen = match direction {
                Direction::Inbound => &mut self.seen_inbound,
                Direction::Outbound => &mut self.seen_outbound,
            };
            if !seen.insert(round) {
                debug!(storage = %self.settings.name, ?direction, round = %round, "Duplicate confirmation ignored");
                return StorageVerdict::Duplicate;
            }
        }

        let tick = self.clock.count();
        match direction {
            Direction::Inbound => match self.inventory.stock_in(tick, kind, 1) {
                Ok(count) => {
                    info!(storage = %self.settings.name, package_type = %kind, count, "Package stored");
                    StorageVerdict::Applied(count)
                }
                Err(e) => {
                    warn!(storage = %self.settings.name, package_type = %kind, error = %e, "Store refused");
                    StorageVerdict::Refused
                }
            },
            Direction::Outbound => match self.inventory.stock_out(tick, kind, 1) {
                Ok(count) => {
                    info!(storage = %self.settings.name, package_type = %kind, count, "Package removed");
                    StorageVerdict::Applied(count)
                }
                Err(e) => {
                    warn!(
                        storage = %self.settings.name,
                        package_type = %kind,
                        error = %e,
                        "Inconsistent removal, stock left unchanged"
                    );
                    StorageVerdict::Refused
                }
            },
        }
    }

    fn handle_tick(&mut self, payload: &[u8], out: &mut Outbox) -> Result<(), ProtocolError> {
        let tick = protocol::decode_tick(&self.settings.tick_topic, payload)?;
        self.on_tick(&tick, out);
        Ok(())
    }

    fn handle_inbound(&mut self, payload: &[u8], _out: &mut Outbox) -> Result<(), ProtocolError> {
        self.handle_directed(Direction::Inbound, payload)
    }

    fn handle_outbound(&mut self, payload: &[u8], _out: &mut Outbox) -> Result<(), ProtocolError> {
        self.handle_directed(Direction::Outbound, payload)
    }

    fn handle_directed(&mut self, direction: Direction, payload: &[u8]) -> Result<(), ProtocolError> {
        let confirmation: Confirmation = protocol::decode("confirmation", payload)?;
        let _ = self.apply(direction, &confirmation);
        Ok(())
    }
}

impl Participant for StorageAgent {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn routes(&self) -> DispatchTable<Self> {
        let mut table = DispatchTable::new();
        for topic in &self.outbound {
            table = table.on(topic.clone(), Self::handle_outbound);
        }
        // Inbound bindings win for a channel listed both ways.
        for topic in &self.inbound {
            table = table.on(topic.clone(), Self::handle_inbound);
        }
        table.on(self.settings.tick_topic.clone(), Self::handle_tick)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use depot_types::{JobStatus, PackageType, RoundId};

    use super::*;

    fn storage() -> StorageAgent {
        StorageAgent::new(StorageSettings::default())
    }

    fn confirmation(kind: PackageType, round: Option<RoundId>) -> Confirmation {
        Confirmation {
            name: Some("roboter-1".to_owned()),
            package_type: Some(kind),
            status: JobStatus::Completed,
            round,
        }
    }

    #[test]
    fn direction_comes_from_channel() {
        let mut s = storage();
        let c = confirmation(PackageType::Type1, None);
        assert_eq!(s.on_confirmation("roboter/1/processed", &c), StorageVerdict::Applied(1));
        assert_eq!(s.on_confirmation("roboter/2/processed", &c), StorageVerdict::Applied(2));
        assert_eq!(s.on_confirmation("roboter/3/processed", &c), StorageVerdict::Applied(1));
        assert_eq!(s.on_confirmation("roboter/9/processed", &c), StorageVerdict::UnknownChannel);
        assert!(s.verify_conservation().is_balanced());
    }

    #[test]
    fn outbound_below_zero_refused() {
        let mut s = storage();
        let c = confirmation(PackageType::Type2, None);
        assert_eq!(s.on_confirmation("roboter/3/processed", &c), StorageVerdict::Refused);
        assert_eq!(s.inventory().count(PackageType::Type2), 0);
        assert!(s.verify_conservation().is_balanced());
    }

    #[test]
    fn duplicate_confirmation_counted_once() {
        let mut s = storage();
        let c = confirmation(PackageType::Type1, Some(RoundId::new()));
        assert_eq!(s.on_confirmation("roboter/1/processed", &c), StorageVerdict::Applied(1));
        assert_eq!(s.on_confirmation("roboter/1/processed", &c), StorageVerdict::Duplicate);
        assert_eq!(s.inventory().count(PackageType::Type1), 1);
    }

    #[test]
    fn tick_publishes_without_mutation() {
        let mut s = storage();
        let mut out = Outbox::new();
        s.on_tick(&Tick::new("t1"), &mut out);
        s.on_tick(&Tick::new("t1"), &mut out);
        let published: Vec<_> = out.published().collect();
        assert_eq!(published.len(), 1);
        let envelope = published.first().unwrap();
        assert_eq!(envelope.channel, "storage/stock");
        assert!(s.inventory().entries().is_empty());
    }

    #[test]
    fn dispatch_routes_by_direction() {
        let mut s = storage();
        let table = s.routes();
        let mut out = Outbox::new();
        let raw = br#"{"name": "roboter-2", "package_type": 2, "status": "completed"}"#;
        let _ = table.dispatch(&mut s, "roboter/2/processed", raw, &mut out);
        assert_eq!(s.inventory().count(PackageType::Type2), 1);
        let _ = table.dispatch(&mut s, "roboter/3/processed", raw, &mut out);
        assert_eq!(s.inventory().count(PackageType::Type2), 0);
    }
}
