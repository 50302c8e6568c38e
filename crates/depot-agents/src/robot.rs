//! The robot's bidding and execution state machine.
//!
//! ```text
//!            cfp (bid)            award (won)           job finished
//!   Ready ──────────────► AwaitingAward ──────► Busy ─────────────────► Ready
//!     ▲  │                     │ award (lost), newer round, timeout       │
//!     │  │ battery low         ▼                                           │
//!     │  └──────────────► Charging ◄──────────── battery low after job ────┘
//!     └──── battery full ──────┘
//! ```
//!
//! A pending bid is released by the award of its round, by an award or CfP
//! for a newer round of the same kind (its own round closed without it),
//! or by `award_timeout_ticks`.
//!
//! Handlers are synchronous and never block. Job execution is not performed
//! here: winning an award returns a [`Job`] that the caller schedules, and
//! the caller reports back through [`Robot::finish_job`].

use core::num::NonZeroU32;

use depot_types::{
    Award, CallForProposals, Confirmation, JobStatus, PackageType, Proposal, RobotReport,
    RobotStatus, RoundId,
};
use tracing::{debug, info, warn};

use crate::battery::Battery;
use crate::config::RobotConfig;
use crate::error::{AgentError, JobError};
use crate::estimator::DurationEstimator;

/// An awarded job waiting for its completion event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Round the job was awarded in.
    pub round: Option<RoundId>,
    /// Kind of package being moved.
    pub package_type: PackageType,
    /// Duration in time units, taken from the award.
    pub duration: NonZeroU32,
}

/// How the robot answered a call for proposals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CfpResponse {
    /// Publish this proposal. The robot is now awaiting the award.
    Propose(Proposal),
    /// No bid.
    Skip(SkipReason),
}

/// Why a call for proposals produced no bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The robot cannot handle this package kind.
    CapabilityMismatch,
    /// The robot is not `Ready`.
    NotReady(RobotStatus),
    /// The battery is below the threshold; the robot started charging.
    LowBattery,
    /// The robot already bid in this round (duplicate delivery).
    AlreadyBid,
}

/// How the robot reacted to an award.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwardOutcome {
    /// The robot won and is now `Busy`. Schedule this job.
    Won(Job),
    /// Another robot won, or a newer round of the same kind was awarded;
    /// this robot is `Ready` again.
    Lost {
        /// The winning robot.
        winner: String,
    },
    /// The award does not concern the robot's pending bid.
    Ignored(IgnoreReason),
}

/// Why an award was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The robot has no pending bid.
    NotAwaiting(RobotStatus),
    /// The award closes a round older than the pending bid.
    OtherRound,
    /// The award is for a package kind the robot did not bid on.
    OtherKind,
}

/// What happened to the robot on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing changed.
    Idle,
    /// The battery charged but is not full yet.
    Charging {
        /// Percent added this tick.
        added: u32,
        /// Level after charging.
        level: u32,
    },
    /// The battery reached full charge; the robot is `Ready`.
    ChargeComplete,
    /// A `Ready` robot with a low battery started charging.
    StartedCharging,
    /// The pending bid waited too long and was given up.
    AwardTimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingBid {
    round: Option<RoundId>,
    package_type: PackageType,
    waited_ticks: u32,
}

/// A worker robot.
#[derive(Debug)]
pub struct Robot {
    config: RobotConfig,
    estimator: Box<dyn DurationEstimator>,
    battery: Battery,
    status: RobotStatus,
    pending: Option<PendingBid>,
    job: Option<Job>,
    last_bid_round: Option<RoundId>,
}

impl Robot {
    /// Create a `Ready` robot.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn new(
        config: RobotConfig,
        estimator: Box<dyn DurationEstimator>,
    ) -> Result<Self, AgentError> {
        config.validate()?;
        let battery = Battery::new(config.initial_battery);
        Ok(Self {
            config,
            estimator,
            battery,
            status: RobotStatus::Ready,
            pending: None,
            job: None,
            last_bid_round: None,
        })
    }

    /// Robot identity.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The package kind this robot handles.
    pub const fn capability(&self) -> PackageType {
        self.config.capability
    }

    /// Current lifecycle state.
    pub const fn status(&self) -> RobotStatus {
        self.status
    }

    /// Current battery level.
    pub const fn battery(&self) -> Battery {
        self.battery
    }

    /// The job in progress, if `Busy`.
    pub const fn current_job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    /// The robot's configuration.
    pub const fn config(&self) -> &RobotConfig {
        &self.config
    }

    fn battery_low(&self) -> bool {
        self.battery.is_below(self.config.low_battery_threshold)
    }

    fn settle(&mut self) {
        self.pending = None;
        self.job = None;
        self.status = if self.battery_low() {
            RobotStatus::Charging
        } else {
            RobotStatus::Ready
        };
    }

    /// Whether a message for `round` of `kind` shows that the pending bid's
    /// round has already closed.
    fn pending_superseded_by(&self, kind: PackageType, round: Option<RoundId>) -> bool {
        match (self.pending.as_ref(), round) {
            (Some(pending), Some(newer)) => {
                pending.package_type == kind && pending.round.is_some_and(|ours| ours < newer)
            }
            _ => false,
        }
    }

    /// React to a call for proposals.
    pub fn on_cfp(&mut self, cfp: &CallForProposals) -> CfpResponse {
        if self.status == RobotStatus::AwaitingAward
            && self.pending_superseded_by(cfp.package_type, cfp.round)
        {
            info!(
                robot = %self.config.name,
                package_type = %cfp.package_type,
                "New round announced, pending bid dropped"
            );
            self.settle();
        }

        if self.status != RobotStatus::Ready {
            debug!(
                robot = %self.config.name,
                status = %self.status,
                package_type = %cfp.package_type,
                "Ignoring CfP while not ready"
            );
            return CfpResponse::Skip(SkipReason::NotReady(self.status));
        }

        if self.battery_low() {
            info!(
                robot = %self.config.name,
                battery = %self.battery,
                threshold = self.config.low_battery_threshold,
                "Battery low, charging instead of bidding"
            );
            self.status = RobotStatus::Charging;
            return CfpResponse::Skip(SkipReason::LowBattery);
        }

        if cfp.package_type != self.config.capability {
            debug!(
                robot = %self.config.name,
                package_type = %cfp.package_type,
                capability = %self.config.capability,
                "CfP does not match capability"
            );
            return CfpResponse::Skip(SkipReason::CapabilityMismatch);
        }

        if cfp.round.is_some() && cfp.round == self.last_bid_round {
            debug!(robot = %self.config.name, "Duplicate CfP for a round already bid on");
            return CfpResponse::Skip(SkipReason::AlreadyBid);
        }

        let estimated_time = self.estimator.estimate(cfp, self.battery);
        let proposal = Proposal {
            name: self.config.name.clone(),
            package_type: cfp.package_type,
            priority: cfp.priority,
            quantity: cfp.quantity,
            estimated_time,
            round: cfp.round,
        };

        self.pending = Some(PendingBid {
            round: cfp.round,
            package_type: cfp.package_type,
            waited_ticks: 0,
        });
        self.last_bid_round = cfp.round;
        self.status = RobotStatus::AwaitingAward;

        info!(
            robot = %self.config.name,
            package_type = %cfp.package_type,
            priority = %cfp.priority,
            quantity = cfp.quantity.get(),
            estimated_time = %estimated_time,
            estimator = self.estimator.name(),
            "Proposal submitted"
        );
        CfpResponse::Propose(proposal)
    }

    /// React to an award.
    pub fn on_award(&mut self, award: &Award) -> AwardOutcome {
        let Some(pending) = self.pending.as_ref().filter(|_| self.status == RobotStatus::AwaitingAward)
        else {
            debug!(
                robot = %self.config.name,
                status = %self.status,
                winner = %award.winner,
                "Ignoring award without a pending bid"
            );
            return AwardOutcome::Ignored(IgnoreReason::NotAwaiting(self.status));
        };

        if award.package_type != pending.package_type {
            return AwardOutcome::Ignored(IgnoreReason::OtherKind);
        }
        if let (Some(ours), Some(theirs)) = (pending.round, award.round)
            && ours != theirs
        {
            if ours > theirs {
                debug!(robot = %self.config.name, "Ignoring award for an earlier round");
                return AwardOutcome::Ignored(IgnoreReason::OtherRound);
            }
            info!(
                robot = %self.config.name,
                winner = %award.winner,
                "Newer round awarded, pending bid dropped"
            );
            self.settle();
            return AwardOutcome::Lost {
                winner: award.winner.clone(),
            };
        }

        if award.winner == self.config.name {
            let job = Job {
                round: pending.round.or(award.round),
                package_type: pending.package_type,
                duration: award.estimated_time.ceil_units(),
            };
            self.pending = None;
            self.job = Some(job.clone());
            self.status = RobotStatus::Busy;
            info!(
                robot = %self.config.name,
                package_type = %job.package_type,
                duration = job.duration.get(),
                "Award won, job started"
            );
            AwardOutcome::Won(job)
        } else {
            info!(
                robot = %self.config.name,
                winner = %award.winner,
                "Award lost, ready again"
            );
            self.pending = None;
            self.status = RobotStatus::Ready;
            AwardOutcome::Lost {
                winner: award.winner.clone(),
            }
        }
    }

    /// Report the end of `job`.
    ///
    /// On success the battery drains by the job duration and a confirmation
    /// is returned for publishing. On failure nothing is published and the
    /// battery is untouched. In both cases the robot leaves `Busy` for
    /// `Ready`, or `Charging` when the battery is low. A completion for a job
    /// the robot is not executing is ignored.
    pub fn finish_job(&mut self, job: &Job, result: Result<(), JobError>) -> Option<Confirmation> {
        if self.status != RobotStatus::Busy || self.job.as_ref() != Some(job) {
            warn!(
                robot = %self.config.name,
                status = %self.status,
                "Completion for a job that is not running, ignored"
            );
            return None;
        }

        let confirmation = match result {
            Ok(()) => {
                let consumed = self
                    .battery
                    .drain(job.duration.get(), self.config.drain_per_unit);
                info!(
                    robot = %self.config.name,
                    package_type = %job.package_type,
                    consumed,
                    battery = %self.battery,
                    "Job completed"
                );
                Some(Confirmation {
                    name: Some(self.config.name.clone()),
                    package_type: Some(job.package_type),
                    status: JobStatus::Completed,
                    round: job.round,
                })
            }
            Err(e) => {
                warn!(
                    robot = %self.config.name,
                    package_type = %job.package_type,
                    error = %e,
                    "Job failed, no confirmation sent"
                );
                None
            }
        };

        self.settle();
        confirmation
    }

    /// Advance one tick: charge, time out a stale bid, or start charging.
    pub fn on_tick(&mut self) -> TickOutcome {
        match self.status {
            RobotStatus::Charging => {
                let added = self.battery.charge(self.config.charge_per_tick);
                if self.battery.is_full() {
                    self.status = RobotStatus::Ready;
                    info!(robot = %self.config.name, "Battery full, ready");
                    TickOutcome::ChargeComplete
                } else {
                    debug!(robot = %self.config.name, battery = %self.battery, "Charging");
                    TickOutcome::Charging {
                        added,
                        level: self.battery.level(),
                    }
                }
            }
            RobotStatus::AwaitingAward => {
                let timeout = self.config.award_timeout_ticks;
                let Some(pending) = self.pending.as_mut() else {
                    self.settle();
                    return TickOutcome::Idle;
                };
                pending.waited_ticks = pending.waited_ticks.saturating_add(1);
                if timeout > 0 && pending.waited_ticks > timeout {
                    warn!(
                        robot = %self.config.name,
                        waited_ticks = pending.waited_ticks,
                        "No award received, bid given up"
                    );
                    self.settle();
                    TickOutcome::AwardTimedOut
                } else {
                    TickOutcome::Idle
                }
            }
            RobotStatus::Ready if self.battery_low() => {
                self.status = RobotStatus::Charging;
                info!(robot = %self.config.name, battery = %self.battery, "Battery low, charging");
                TickOutcome::StartedCharging
            }
            RobotStatus::Ready | RobotStatus::Busy => TickOutcome::Idle,
        }
    }

    /// Status report for the tick at `timestamp`.
    pub fn report(&self, timestamp: &str) -> RobotReport {
        RobotReport {
            name: self.config.name.clone(),
            status: self.status,
            battery: self.battery.level(),
            timestamp: timestamp.to_owned(),
        }
    }
}
