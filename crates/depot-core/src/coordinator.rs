//! The negotiation coordinator (supplier).
//!
//! Each tick the coordinator first closes the rounds opened on the previous
//! tick, then opens at most one new round per package kind, then publishes
//! its stock. A round is an explicit owned value: one call for proposals,
//! the proposals that answered it, and at most one award. Rounds never
//! survive the award step.
//!
//! # Tick Cycle
//!
//! 1. Ignore a tick whose timestamp repeats the previous one.
//! 2. Award every open round (lowest estimate wins, first seen on ties) and
//!    clear all rounds.
//! 3. For kind 1 then kind 2: with stock, announce a call for proposals;
//!    without stock, advance the replenishment counter and refill when due.
//! 4. Publish the supplier stock snapshot.

use std::collections::BTreeMap;

use core::num::NonZeroU32;

use depot_ledger::{ConservationResult, Inventory, ReplenishDecision, ReplenishmentPolicy};
use depot_types::{
    Award, CallForProposals, Confirmation, PackageType, Priority, Proposal, RoundId, Tick,
};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::clock::{TickAdvance, TickClock};
use crate::config::CoordinatorSettings;
use crate::dedup::RecentRounds;
use crate::dispatch::{DispatchTable, Participant};
use crate::outbox::{Outbox, Outgoing, Publisher};
use crate::protocol::{self, ProtocolError};

/// One open negotiation round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    /// Round identity, carried on every message of the round.
    pub id: RoundId,
    /// Kind announced.
    pub package_type: PackageType,
    /// Tick the round was opened on.
    pub opened_tick: u64,
    /// Proposals in arrival order.
    pub proposals: Vec<Proposal>,
}

/// What the coordinator did with a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalVerdict {
    /// Added to the open round.
    Accepted,
    /// No round is open for the kind; the award step already ran.
    Late,
    /// The proposal names a different round than the open one.
    StaleRound,
    /// The bidder already has a proposal in this round.
    Duplicate,
}

/// What the coordinator did with a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationVerdict {
    /// The ledger was decremented; carries the remaining stock.
    Applied(u32),
    /// The round was already confirmed.
    Duplicate,
    /// The confirmation carries no package kind.
    MissingKind,
    /// The decrement would go below zero and was refused.
    Refused,
}

/// Pick the winning proposal: the minimum estimated time, ties going to the
/// proposal that arrived first.
pub fn select_winner(proposals: &[Proposal]) -> Option<&Proposal> {
    let mut best: Option<&Proposal> = None;
    for proposal in proposals {
        match best {
            Some(current) if proposal.estimated_time >= current.estimated_time => {}
            _ => best = Some(proposal),
        }
    }
    best
}

/// The supplier: coordinator of the contract net and owner of the supplier
/// ledger.
#[derive(Debug)]
pub struct Coordinator {
    settings: CoordinatorSettings,
    inventory: Inventory,
    policy: ReplenishmentPolicy,
    clock: TickClock,
    rounds: BTreeMap<PackageType, Round>,
    confirmed: RecentRounds,
    rng: StdRng,
    cfp_probability: f64,
    awards_issued: u64,
}

impl Coordinator {
    /// Create a coordinator with its opening stock.
    pub fn new(settings: CoordinatorSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        // Out-of-range probabilities are rejected by config validation;
        // anything that slips through announces every tick.
        let cfp_probability = if (0.0..=1.0).contains(&settings.cfp_probability) {
            settings.cfp_probability
        } else {
            1.0
        };
        Self {
            inventory: Inventory::new(
                settings.name.clone(),
                settings.initial_type_1,
                settings.initial_type_2,
            ),
            policy: ReplenishmentPolicy::new(
                settings.replenish_threshold_ticks,
                settings.replenish_quantity,
            ),
            clock: TickClock::new(),
            rounds: BTreeMap::new(),
            confirmed: RecentRounds::default(),
            rng,
            cfp_probability,
            awards_issued: 0,
            settings,
        }
    }

    /// The supplier ledger.
    pub const fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// The replenishment counters.
    pub const fn policy(&self) -> &ReplenishmentPolicy {
        &self.policy
    }

    /// The round currently open for `kind`.
    pub fn open_round(&self, kind: PackageType) -> Option<&Round> {
        self.rounds.get(&kind)
    }

    /// Number of open rounds.
    pub fn open_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Distinct ticks handled.
    pub const fn ticks(&self) -> u64 {
        self.clock.count()
    }

    /// Awards published by the tick-driven award step.
    pub const fn awards_issued(&self) -> u64 {
        self.awards_issued
    }

    /// Replay the supplier journal against its live counts.
    pub fn verify_conservation(&self) -> ConservationResult {
        self.inventory.verify_conservation()
    }

    /// Handle a tick.
    pub fn on_tick(&mut self, tick: &Tick, out: &mut impl Publisher) {
        let tick_no = match self.clock.advance(&tick.timestamp) {
            TickAdvance::New(n) => n,
            TickAdvance::Duplicate => {
                debug!(supplier = %self.settings.name, timestamp = %tick.timestamp, "Duplicate tick ignored");
                return;
            }
        };
        info!(supplier = %self.settings.name, tick = tick_no, timestamp = %tick.timestamp, "Tick received");

        let awards = self.select_winner_and_award(out);
        if !awards.is_empty() {
            self.awards_issued = self
                .awards_issued
                .saturating_add(u64::try_from(awards.len()).unwrap_or(u64::MAX));
            let winners: Vec<&str> = awards.iter().map(|a| a.winner.as_str()).collect();
            debug!(supplier = %self.settings.name, awards = awards.len(), ?winners, "Award step finished");
        }

        for kind in PackageType::ALL {
            let stock = self.inventory.count(kind);
            match self.policy.observe(kind, stock) {
                ReplenishDecision::Stocked => {
                    if self.rng.random_bool(self.cfp_probability) {
                        self.announce(tick_no, kind, out);
                    }
                }
                ReplenishDecision::Waiting { elapsed, threshold } => {
                    debug!(
                        supplier = %self.settings.name,
                        package_type = %kind,
                        elapsed,
                        threshold,
                        "Out of stock, waiting for delivery"
                    );
                }
                ReplenishDecision::Refill { quantity } => {
                    let added = self.inventory.restock(tick_no, kind, quantity);
                    info!(
                        supplier = %self.settings.name,
                        package_type = %kind,
                        added,
                        stock = self.inventory.count(kind),
                        "New packages delivered to supplier"
                    );
                }
            }
        }

        let snapshot = self.inventory.snapshot(&tick.timestamp);
        out.publish(&self.settings.stock_topic, Outgoing::Stock(snapshot));
    }

    fn announce(&mut self, tick_no: u64, kind: PackageType, out: &mut impl Publisher) {
        let priority = Priority::ALL
            .choose(&mut self.rng)
            .copied()
            .unwrap_or_default();
        let round = Round {
            id: RoundId::new(),
            package_type: kind,
            opened_tick: tick_no,
            proposals: Vec::new(),
        };
        let cfp = CallForProposals {
            package_type: kind,
            priority,
            quantity: self.settings.cfp_quantity,
            round: Some(round.id),
        };
        info!(
            supplier = %self.settings.name,
            package_type = %kind,
            priority = %priority,
            quantity = cfp.quantity.get(),
            round = %round.id,
            "CfP announced"
        );
        self.rounds.insert(kind, round);
        out.publish(&self.settings.cfp_topic, Outgoing::Cfp(cfp));
    }

    /// Handle a proposal.
    pub fn on_proposal(&mut self, proposal: Proposal) -> ProposalVerdict {
        let Some(round) = self.rounds.get_mut(&proposal.package_type) else {
            debug!(
                supplier = %self.settings.name,
                bidder = %proposal.name,
                package_type = %proposal.package_type,
                "Late proposal dropped"
            );
            return ProposalVerdict::Late;
        };
        if let Some(id) = proposal.round
            && id != round.id
        {
            debug!(
                supplier = %self.settings.name,
                bidder = %proposal.name,
                round = %id,
                open_round = %round.id,
                "Proposal for a closed round dropped"
            );
            return ProposalVerdict::StaleRound;
        }
        if round.proposals.iter().any(|p| p.name == proposal.name) {
            debug!(supplier = %self.settings.name, bidder = %proposal.name, "Duplicate proposal dropped");
            return ProposalVerdict::Duplicate;
        }
        info!(
            supplier = %self.settings.name,
            bidder = %proposal.name,
            package_type = %proposal.package_type,
            estimated_time = %proposal.estimated_time,
            "Proposal received"
        );
        round.proposals.push(proposal);
        ProposalVerdict::Accepted
    }

    /// Close every open round: award the best proposal of each non-empty
    /// round, then clear all rounds.
    pub fn select_winner_and_award(&mut self, out: &mut impl Publisher) -> Vec<Award> {
        let rounds = std::mem::take(&mut self.rounds);
        let mut awards = Vec::new();
        for round in rounds.into_values() {
            let Some(winner) = select_winner(&round.proposals) else {
                debug!(
                    supplier = %self.settings.name,
                    package_type = %round.package_type,
                    round = %round.id,
                    "No proposals, round closed without award"
                );
                continue;
            };
            let award = Award {
                winner: winner.name.clone(),
                package_type: round.package_type,
                estimated_time: winner.estimated_time,
                round: Some(round.id),
            };
            info!(
                supplier = %self.settings.name,
                winner = %award.winner,
                package_type = %award.package_type,
                estimated_time = %award.estimated_time,
                bids = round.proposals.len(),
                "Award published"
            );
            out.publish(&self.settings.award_topic, Outgoing::Award(award.clone()));
            awards.push(award);
        }
        awards
    }

    /// Handle a confirmation: one unit of the confirmed kind leaves the
    /// supplier.
    pub fn on_confirmation(&mut self, confirmation: &Confirmation) -> ConfirmationVerdict {
        let Some(kind) = confirmation.package_type else {
            warn!(
                supplier = %self.settings.name,
                robot = ?confirmation.name,
                "Confirmation without package type dropped"
            );
            return ConfirmationVerdict::MissingKind;
        };
        if let Some(round) = confirmation.round
            && !self.confirmed.insert(round)
        {
            debug!(supplier = %self.settings.name, round = %round, "Duplicate confirmation ignored");
            return ConfirmationVerdict::Duplicate;
        }

        match self.inventory.stock_out(self.clock.count(), kind, 1) {
            Ok(remaining) => {
                info!(
                    supplier = %self.settings.name,
                    package_type = %kind,
                    robot = ?confirmation.name,
                    remaining,
                    "Stock reduced"
                );
                ConfirmationVerdict::Applied(remaining)
            }
            Err(e) => {
                warn!(
                    supplier = %self.settings.name,
                    package_type = %kind,
                    error = %e,
                    "Inconsistent confirmation, stock left unchanged"
                );
                ConfirmationVerdict::Refused
            }
        }
    }

    /// Quantity announced per call for proposals.
    pub const fn cfp_quantity(&self) -> NonZeroU32 {
        self.settings.cfp_quantity
    }

    fn handle_tick(&mut self, payload: &[u8], out: &mut Outbox) -> Result<(), ProtocolError> {
        let tick = protocol::decode_tick(&self.settings.tick_topic, payload)?;
        self.on_tick(&tick, out);
        Ok(())
    }

    fn handle_proposal(&mut self, payload: &[u8], _out: &mut Outbox) -> Result<(), ProtocolError> {
        let proposal = protocol::decode(&self.settings.proposal_topic, payload)?;
        let _ = self.on_proposal(proposal);
        Ok(())
    }

    fn handle_confirmation(&mut self, payload: &[u8], _out: &mut Outbox) -> Result<(), ProtocolError> {
        let confirmation: Confirmation = protocol::decode("confirmation", payload)?;
        let _ = self.on_confirmation(&confirmation);
        Ok(())
    }
}

impl Participant for Coordinator {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn routes(&self) -> DispatchTable<Self> {
        let mut table = DispatchTable::new()
            .on(self.settings.tick_topic.clone(), Self::handle_tick)
            .on(self.settings.proposal_topic.clone(), Self::handle_proposal);
        for topic in &self.settings.confirmation_topics {
            table = table.on(topic.clone(), Self::handle_confirmation);
        }
        table
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use depot_types::{EstimatedTime, JobStatus};

    use super::*;

    fn proposal(name: &str, estimate: u32) -> Proposal {
        proposal_at(name, EstimatedTime::from_units(NonZeroU32::new(estimate).unwrap()))
    }

    fn proposal_at(name: &str, estimated_time: EstimatedTime) -> Proposal {
        Proposal {
            name: name.to_owned(),
            package_type: PackageType::Type1,
            priority: Priority::Medium,
            quantity: NonZeroU32::MIN,
            estimated_time,
            round: None,
        }
    }

    fn coordinator(type_1: u32, type_2: u32) -> Coordinator {
        Coordinator::new(CoordinatorSettings {
            initial_type_1: type_1,
            initial_type_2: type_2,
            seed: Some(9),
            ..CoordinatorSettings::default()
        })
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
    fn lowest_estimate_wins() {
        let proposals = vec![proposal("a", 5), proposal("b", 2), proposal("c", 4)];
        assert_eq!(select_winner(&proposals).unwrap().name, "b");
    }

    #[test]
    fn ties_go_to_first_seen() {
        let proposals = vec![proposal("a", 3), proposal("b", 3), proposal("c", 3)];
        assert_eq!(select_winner(&proposals).unwrap().name, "a");
        assert!(select_winner(&[]).is_none());
    }

    #[test]
    fn fractional_estimates_compare_exactly() {
        let half = |v: f64| EstimatedTime::new(v).unwrap();
        let proposals = vec![
            proposal("a", 3),
            proposal_at("b", half(2.5)),
            proposal_at("c", half(2.5)),
            proposal_at("d", half(2.75)),
        ];
        let winner = select_winner(&proposals).unwrap();
        assert_eq!(winner.name, "b");
        assert_eq!(winner.estimated_time.ceil_units().get(), 3);
    }

    #[test]
    fn tick_announces_both_kinds_and_publishes_stock() {
        let mut c = coordinator(5, 5);
        let mut out = Outbox::new();
        c.on_tick(&Tick::new("t1"), &mut out);

        let kinds: Vec<&str> = out.published().map(|e| e.message.kind()).collect();
        assert_eq!(kinds, vec!["cfp", "cfp", "stock"]);
        assert_eq!(c.open_rounds(), 2);
        let round = c.open_round(PackageType::Type1).unwrap();
        assert_eq!(round.opened_tick, 1);
    }

    #[test]
    fn duplicate_tick_changes_nothing() {
        let mut c = coordinator(5, 5);
        let mut out = Outbox::new();
        c.on_tick(&Tick::new("t1"), &mut out);
        let _ = out.drain();
        c.on_tick(&Tick::new("t1"), &mut out);
        assert!(out.is_empty());
        assert_eq!(c.ticks(), 1);
    }

    #[test]
    fn next_tick_awards_and_clears() {
        let mut c = coordinator(5, 0);
        let mut out = Outbox::new();
        c.on_tick(&Tick::new("t1"), &mut out);
        let round = c.open_round(PackageType::Type1).unwrap().id;

        let mut slow = proposal("roboter-2", 4);
        slow.round = Some(round);
        let mut fast = proposal("roboter-1", 2);
        fast.round = Some(round);
        assert_eq!(c.on_proposal(slow), ProposalVerdict::Accepted);
        assert_eq!(c.on_proposal(fast), ProposalVerdict::Accepted);

        let _ = out.drain();
        c.on_tick(&Tick::new("t2"), &mut out);
        let awards: Vec<&Award> = out
            .published()
            .filter_map(|e| match &e.message {
                Outgoing::Award(a) => Some(a),
                _ => None,
            })
            .collect();
        assert_eq!(awards.len(), 1);
        let award = awards.first().unwrap();
        assert_eq!(award.winner, "roboter-1");
        assert_eq!(award.round, Some(round));
        // The old round is gone; a new one was opened for kind 1.
        assert_ne!(c.open_round(PackageType::Type1).unwrap().id, round);
        assert_eq!(c.awards_issued(), 1);
    }

    #[test]
    fn empty_round_produces_no_award() {
        let mut c = coordinator(5, 5);
        let mut out = Outbox::new();
        c.on_tick(&Tick::new("t1"), &mut out);
        let awards = c.select_winner_and_award(&mut out);
        assert!(awards.is_empty());
        assert_eq!(c.open_rounds(), 0);
        assert_eq!(c.awards_issued(), 0);
    }

    #[test]
    fn late_stale_and_duplicate_proposals_dropped() {
        let mut c = coordinator(5, 5);
        assert_eq!(c.on_proposal(proposal("a", 1)), ProposalVerdict::Late);

        let mut out = Outbox::new();
        c.on_tick(&Tick::new("t1"), &mut out);
        let mut stale = proposal("a", 1);
        stale.round = Some(RoundId::new());
        assert_eq!(c.on_proposal(stale), ProposalVerdict::StaleRound);

        assert_eq!(c.on_proposal(proposal("a", 3)), ProposalVerdict::Accepted);
        assert_eq!(c.on_proposal(proposal("a", 1)), ProposalVerdict::Duplicate);
        assert_eq!(c.open_round(PackageType::Type1).unwrap().proposals.len(), 1);
    }

    #[test]
    fn confirmations_drain_to_zero_and_refuse_below() {
        let mut c = coordinator(100, 0);
        for expected in (0..100).rev() {
            assert_eq!(
                c.on_confirmation(&confirmation(PackageType::Type1, None)),
                ConfirmationVerdict::Applied(expected)
            );
        }
        assert_eq!(
            c.on_confirmation(&confirmation(PackageType::Type1, None)),
            ConfirmationVerdict::Refused
        );
        assert_eq!(c.inventory().count(PackageType::Type1), 0);
        assert!(c.verify_conservation().is_balanced());
    }

    #[test]
    fn duplicate_confirmation_counted_once() {
        let mut c = coordinator(10, 10);
        let round = Some(RoundId::new());
        assert_eq!(
            c.on_confirmation(&confirmation(PackageType::Type2, round)),
            ConfirmationVerdict::Applied(9)
        );
        assert_eq!(
            c.on_confirmation(&confirmation(PackageType::Type2, round)),
            ConfirmationVerdict::Duplicate
        );
        assert_eq!(c.inventory().count(PackageType::Type2), 9);
    }

    #[test]
    fn confirmation_without_kind_dropped() {
        let mut c = coordinator(10, 10);
        let mut conf = confirmation(PackageType::Type1, None);
        conf.package_type = None;
        assert_eq!(c.on_confirmation(&conf), ConfirmationVerdict::MissingKind);
        assert_eq!(c.inventory().count(PackageType::Type1), 10);
    }

    #[test]
    fn replenishes_after_ten_ticks_at_zero() {
        let mut c = coordinator(0, 5);
        let mut out = Outbox::new();
        for n in 1..10 {
            c.on_tick(&Tick::new(format!("t{n}")), &mut out);
            assert_eq!(c.inventory().count(PackageType::Type1), 0);
            assert!(c.open_round(PackageType::Type1).is_none());
        }
        assert_eq!(c.policy().counter(PackageType::Type1), 9);
        c.on_tick(&Tick::new("t10"), &mut out);
        assert_eq!(c.inventory().count(PackageType::Type1), 100);
        assert_eq!(c.policy().counter(PackageType::Type1), 0);
        assert!(c.verify_conservation().is_balanced());
    }

    #[test]
    fn zero_probability_never_announces() {
        let mut c = Coordinator::new(CoordinatorSettings {
            cfp_probability: 0.0,
            seed: Some(1),
            ..CoordinatorSettings::default()
        });
        let mut out = Outbox::new();
        for n in 0..20 {
            c.on_tick(&Tick::new(format!("t{n}")), &mut out);
        }
        assert!(out.published().all(|e| e.message.kind() == "stock"));
    }

    #[test]
    fn routes_cover_tick_proposal_and_confirmations() {
        let c = coordinator(1, 1);
        let table = c.routes();
        let channels: Vec<&str> = table.channels().collect();
        assert_eq!(
            channels,
            vec![
                "roboter/1/processed",
                "roboter/2/processed",
                "supplier/proposal",
                "tickgen/tick",
            ]
        );
    }

    #[test]
    fn malformed_proposal_is_dropped_by_dispatch() {
        let mut c = coordinator(1, 1);
        let table = c.routes();
        let mut out = Outbox::new();
        let delivery = table.dispatch(&mut c, "supplier/proposal", b"{\"name\":", &mut out);
        assert_eq!(delivery, crate::dispatch::Delivery::Dropped);
    }
}
