//! Event loop that drives one agent over NATS.
//!
//! The reactor owns the agent and handles one event at a time: a message
//! from any bound subject, a finished job timer, or Ctrl-C. After every
//! event it drains the agent's outbox: publications go to NATS, scheduled
//! jobs become `tokio` timers that report back over an mpsc channel.

use std::time::Duration;

use depot_agents::{Job, JobError};
use depot_core::{Command, Delivery, DispatchTable, Outbox, Participant};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::NodeError;
use crate::nats::NatsBus;

/// Capacity of the job completion channel.
const COMPLETION_CHANNEL_CAPACITY: usize = 64;

/// Wall-clock delay for a job of `job.duration` time units.
///
/// # Errors
///
/// Returns [`JobError::DurationOverflow`] if the delay does not fit a
/// [`Duration`].
pub fn job_delay(time_unit: Duration, job: &Job) -> Result<Duration, JobError> {
    let units = job.duration.get();
    time_unit
        .checked_mul(units)
        .ok_or(JobError::DurationOverflow { units })
}

/// One agent bound to a NATS connection.
pub struct Reactor<A: Participant> {
    agent: A,
    routes: DispatchTable<A>,
    bus: NatsBus,
    time_unit: Duration,
    outbox: Outbox,
    completions_tx: mpsc::Sender<Job>,
    completions_rx: mpsc::Receiver<Job>,
}

impl<A: Participant> Reactor<A> {
    /// Bind `agent` to `bus`. A job time unit lasts `time_unit` of real time.
    pub fn new(agent: A, bus: NatsBus, time_unit: Duration) -> Self {
        let routes = agent.routes();
        let (completions_tx, completions_rx) = mpsc::channel(COMPLETION_CHANNEL_CAPACITY);
        Self {
            agent,
            routes,
            bus,
            time_unit,
            outbox: Outbox::new(),
            completions_tx,
            completions_rx,
        }
    }

    /// Subscribe and run until Ctrl-C or until every subscription closes.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::Nats`] if subscribing or the final flush fails.
    /// Errors on individual messages are logged and skipped.
    pub async fn run(mut self) -> Result<(), NodeError> {
        let mut messages = self.bus.subscribe_all(self.routes.channels()).await?;
        info!(agent = self.agent.name(), "reactor started");

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                message = messages.next() => {
                    let Some(message) = message else {
                        warn!(agent = self.agent.name(), "all subscriptions closed");
                        break;
                    };
                    let delivery = self.routes.dispatch(
                        &mut self.agent,
                        message.subject.as_str(),
                        &message.payload,
                        &mut self.outbox,
                    );
                    if delivery != Delivery::Handled {
                        debug!(subject = message.subject.as_str(), ?delivery, "message not handled");
                    }
                }
                Some(job) = self.completions_rx.recv() => {
                    self.agent.on_job_finished(&job, Ok(()), &mut self.outbox);
                }
                _ = &mut shutdown => {
                    info!(agent = self.agent.name(), "shutdown requested");
                    break;
                }
            }
            self.flush_outbox().await;
        }

        self.bus.flush().await
    }

    /// Carry out every buffered command, including any the agent adds
    /// while a job fails to schedule.
    async fn flush_outbox(&mut self) {
        while !self.outbox.is_empty() {
            for command in self.outbox.drain() {
                match command {
                    Command::Publish(envelope) => {
                        if let Err(e) = self.bus.publish(&envelope).await {
                            warn!(error = %e, "publish failed, message lost");
                        }
                    }
                    Command::ScheduleCompletion { job } => self.schedule(job),
                }
            }
        }
    }

    fn schedule(&mut self, job: Job) {
        match job_delay(self.time_unit, &job) {
            Ok(delay) => {
                debug!(
                    kind = %job.package_type,
                    units = job.duration.get(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "job timer armed"
                );
                let tx = self.completions_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if tx.send(job).await.is_err() {
                        debug!("reactor gone before job finished");
                    }
                });
            }
            Err(e) => {
                warn!(error = %e, "job cannot be timed");
                self.agent.on_job_finished(&job, Err(e), &mut self.outbox);
            }
        }
    }
}
