//! Outbound side of an agent.
//!
//! Handlers never talk to the transport. They push [`Command`]s into an
//! [`Outbox`]; the reactor that owns the agent drains it after every event
//! and carries the commands out (publish over NATS, arm a job timer, or
//! enqueue a virtual-time event in the simulation).

use depot_agents::Job;
use depot_types::{
    Award, CallForProposals, Confirmation, Proposal, RobotReport, StockSnapshot, Tick,
};

use crate::protocol::ProtocolError;

/// A message ready to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Pacing signal (raw UTF-8 on the wire).
    Tick(Tick),
    /// Call for proposals.
    Cfp(CallForProposals),
    /// A robot's bid.
    Proposal(Proposal),
    /// The coordinator's award.
    Award(Award),
    /// A finished job.
    Confirmation(Confirmation),
    /// A ledger snapshot.
    Stock(StockSnapshot),
    /// A robot's status report.
    Report(RobotReport),
}

impl Outgoing {
    /// Short name of the message kind, for log fields.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Tick(_) => "tick",
            Self::Cfp(_) => "cfp",
            Self::Proposal(_) => "proposal",
            Self::Award(_) => "award",
            Self::Confirmation(_) => "confirmation",
            Self::Stock(_) => "stock",
            Self::Report(_) => "report",
        }
    }

    /// Serialize the message to its wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if JSON serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let json = match self {
            Self::Tick(tick) => return Ok(tick.timestamp.clone().into_bytes()),
            Self::Cfp(m) => serde_json::to_vec(m),
            Self::Proposal(m) => serde_json::to_vec(m),
            Self::Award(m) => serde_json::to_vec(m),
            Self::Confirmation(m) => serde_json::to_vec(m),
            Self::Stock(m) => serde_json::to_vec(m),
            Self::Report(m) => serde_json::to_vec(m),
        };
        json.map_err(|e| ProtocolError::Encode {
            kind: self.kind(),
            reason: e.to_string(),
        })
    }
}

/// A message addressed to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Destination channel.
    pub channel: String,
    /// The message.
    pub message: Outgoing,
}

/// Work an agent asks its reactor to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Publish a message.
    Publish(Envelope),
    /// Report `job` as finished once its duration has elapsed.
    ScheduleCompletion {
        /// The awarded job.
        job: Job,
    },
}

/// Anything messages can be published through.
pub trait Publisher {
    /// Publish `message` on `channel`.
    fn publish(&mut self, channel: &str, message: Outgoing);
}

/// Buffered commands produced while handling one event.
#[derive(Debug, Default)]
pub struct Outbox {
    commands: Vec<Command>,
}

impl Outbox {
    /// Create an empty outbox.
    pub const fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Ask the reactor to complete `job` after its duration.
    pub fn schedule(&mut self, job: Job) {
        self.commands.push(Command::ScheduleCompletion { job });
    }

    /// Take every buffered command, leaving the outbox empty.
    pub fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Buffered commands, oldest first.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Buffered publications, oldest first.
    pub fn published(&self) -> impl Iterator<Item = &Envelope> {
        self.commands.iter().filter_map(|c| match c {
            Command::Publish(envelope) => Some(envelope),
            Command::ScheduleCompletion { .. } => None,
        })
    }
}

impl Publisher for Outbox {
    fn publish(&mut self, channel: &str, message: Outgoing) {
        self.commands.push(Command::Publish(Envelope {
            channel: channel.to_owned(),
            message,
        }));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use core::num::NonZeroU32;

    use depot_types::{PackageType, Priority};

    use super::*;

    #[test]
    fn tick_encodes_as_raw_text() {
        let bytes = Outgoing::Tick(Tick::new("2024-05-01T10:00:00Z")).encode().unwrap();
        assert_eq!(bytes, b"2024-05-01T10:00:00Z");
    }

    #[test]
    fn cfp_encodes_as_json() {
        let cfp = CallForProposals {
            package_type: PackageType::Type1,
            priority: Priority::Light,
            quantity: NonZeroU32::MIN,
            round: None,
        };
        let bytes = Outgoing::Cfp(cfp).encode().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value.get("priority"), Some(&serde_json::json!("leicht")));
        assert_eq!(value.get("package_type"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn drain_empties_in_order() {
        let mut outbox = Outbox::new();
        outbox.publish("a", Outgoing::Tick(Tick::new("1")));
        outbox.schedule(Job {
            round: None,
            package_type: PackageType::Type2,
            duration: NonZeroU32::MIN,
        });
        outbox.publish("b", Outgoing::Tick(Tick::new("2")));
        assert_eq!(outbox.published().count(), 2);

        let commands = outbox.drain();
        assert_eq!(commands.len(), 3);
        assert!(matches!(commands.get(1), Some(Command::ScheduleCompletion { .. })));
        assert!(outbox.is_empty());
    }
}
