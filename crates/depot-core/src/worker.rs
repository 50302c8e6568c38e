//! Binds a [`Robot`] state machine to bus channels.
//!
//! The worker decodes calls for proposals, awards, and ticks, drives the
//! robot, and turns its outcomes into outbox commands: a proposal to
//! publish, a job to schedule, a confirmation and status report to publish.

use depot_agents::{AgentError, AwardOutcome, CfpResponse, Job, JobError, Robot, TickOutcome};
use depot_types::{Award, CallForProposals, Tick};
use tracing::debug;

use crate::clock::{TickAdvance, TickClock};
use crate::config::WorkerSettings;
use crate::dispatch::{DispatchTable, Participant};
use crate::outbox::{Outbox, Outgoing, Publisher};
use crate::protocol::{self, ProtocolError};

/// A robot bound to its channels.
#[derive(Debug)]
pub struct WorkerAgent {
    robot: Robot,
    tick_topic: String,
    cfp_topic: String,
    proposal_topic: String,
    award_topic: String,
    processed_topic: String,
    status_topic: String,
    clock: TickClock,
    confirmations_sent: u64,
}

impl WorkerAgent {
    /// Build the robot and bind it.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] if the robot configuration is
    /// out of range.
    pub fn new(settings: WorkerSettings) -> Result<Self, AgentError> {
        let robot = Robot::new(settings.robot, settings.estimator.build())?;
        Ok(Self {
            robot,
            tick_topic: settings.tick_topic,
            cfp_topic: settings.cfp_topic,
            proposal_topic: settings.proposal_topic,
            award_topic: settings.award_topic,
            processed_topic: settings.processed_topic,
            status_topic: settings.status_topic,
            clock: TickClock::new(),
            confirmations_sent: 0,
        })
    }

    /// The robot state machine.
    pub const fn robot(&self) -> &Robot {
        &self.robot
    }

    /// Channel this worker publishes confirmations on.
    pub fn processed_topic(&self) -> &str {
        &self.processed_topic
    }

    /// Confirmations published so far.
    pub const fn confirmations_sent(&self) -> u64 {
        self.confirmations_sent
    }

    /// Handle a call for proposals.
    pub fn on_cfp(&mut self, cfp: &CallForProposals, out: &mut impl Publisher) {
        if let CfpResponse::Propose(proposal) = self.robot.on_cfp(cfp) {
            out.publish(&self.proposal_topic, Outgoing::Proposal(proposal));
        }
    }

    /// Handle an award. A win is scheduled through the outbox.
    pub fn on_award(&mut self, award: &Award, out: &mut Outbox) {
        match self.robot.on_award(award) {
            AwardOutcome::Won(job) => out.schedule(job),
            AwardOutcome::Lost { .. } | AwardOutcome::Ignored(_) => {}
        }
    }

    /// Handle a tick: charge, expire a stale bid, report status.
    pub fn on_tick(&mut self, tick: &Tick, out: &mut impl Publisher) {
        if self.clock.advance(&tick.timestamp) == TickAdvance::Duplicate {
            debug!(robot = %self.robot.name(), timestamp = %tick.timestamp, "Duplicate tick ignored");
            return;
        }
        let outcome = self.robot.on_tick();
        if outcome != TickOutcome::Idle {
            debug!(robot = %self.robot.name(), ?outcome, "Tick handled");
        }
        let report = self.robot.report(&tick.timestamp);
        out.publish(&self.status_topic, Outgoing::Report(report));
    }

    /// A scheduled job finished.
    pub fn finish(&mut self, job: &Job, result: Result<(), JobError>, out: &mut impl Publisher) {
        if let Some(confirmation) = self.robot.finish_job(job, result) {
            self.confirmations_sent = self.confirmations_sent.saturating_add(1);
            out.publish(&self.processed_topic, Outgoing::Confirmation(confirmation));
        }
    }

    fn handle_tick(&mut self, payload: &[u8], out: &mut Outbox) -> Result<(), ProtocolError> {
        let tick = protocol::decode_tick(&self.tick_topic, payload)?;
        self.on_tick(&tick, out);
        Ok(())
    }

    fn handle_cfp(&mut self, payload: &[u8], out: &mut Outbox) -> Result<(), ProtocolError> {
        let cfp: CallForProposals = protocol::decode(&self.cfp_topic, payload)?;
        self.on_cfp(&cfp, out);
        Ok(())
    }

    fn handle_award(&mut self, payload: &[u8], out: &mut Outbox) -> Result<(), ProtocolError> {
        let award: Award = protocol::decode(&self.award_topic, payload)?;
        self.on_award(&award, out);
        Ok(())
    }
}

impl Participant for WorkerAgent {
    fn name(&self) -> &str {
        self.robot.name()
    }

    fn routes(&self) -> DispatchTable<Self> {
        DispatchTable::new()
            .on(self.tick_topic.clone(), Self::handle_tick)
            .on(self.cfp_topic.clone(), Self::handle_cfp)
            .on(self.award_topic.clone(), Self::handle_award)
    }

    fn on_job_finished(&mut self, job: &Job, result: Result<(), JobError>, outbox: &mut Outbox) {
        self.finish(job, result, outbox);
    }
}
