//! Channel routing for agents.
//!
//! Every agent is bound to its channels once, at construction, through a
//! [`DispatchTable`]: channel name to handler function. The reactor
//! subscribes to exactly [`DispatchTable::channels`] and feeds every payload
//! through [`DispatchTable::dispatch`]. A handler error never escapes: it is
//! logged and the message is dropped with no state change.

use std::collections::BTreeMap;

use depot_agents::{Job, JobError};
use tracing::{debug, warn};

use crate::outbox::Outbox;
use crate::protocol::ProtocolError;

/// Handler bound to one channel.
pub type Handler<A> = fn(&mut A, &[u8], &mut Outbox) -> Result<(), ProtocolError>;

/// What happened to a delivered payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A handler accepted the payload.
    Handled,
    /// The handler rejected the payload; it was logged and dropped.
    Dropped,
    /// No handler is bound to the channel.
    Unrouted,
}

/// Channel to handler routing for agents of type `A`.
pub struct DispatchTable<A> {
    routes: BTreeMap<String, Handler<A>>,
}

impl<A> core::fmt::Debug for DispatchTable<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("channels", &self.routes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<A> Default for DispatchTable<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> DispatchTable<A> {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            routes: BTreeMap::new(),
        }
    }

    /// Bind `handler` to `channel`. A later binding for the same channel
    /// replaces the earlier one.
    #[must_use]
    pub fn on(mut self, channel: impl Into<String>, handler: Handler<A>) -> Self {
        self.routes.insert(channel.into(), handler);
        self
    }

    /// Bound channels, in sorted order.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Whether `channel` has a handler.
    pub fn handles(&self, channel: &str) -> bool {
        self.routes.contains_key(channel)
    }

    /// Route `payload` from `channel` to its handler.
    pub fn dispatch(
        &self,
        agent: &mut A,
        channel: &str,
        payload: &[u8],
        outbox: &mut Outbox,
    ) -> Delivery {
        let Some(handler) = self.routes.get(channel) else {
            debug!(channel, "No handler bound, message ignored");
            return Delivery::Unrouted;
        };
        match handler(agent, payload, outbox) {
            Ok(()) => Delivery::Handled,
            Err(e) => {
                warn!(channel, error = %e, "Dropping undecodable message");
                Delivery::Dropped
            }
        }
    }
}

/// An agent that can be driven by a reactor.
pub trait Participant: Sized {
    /// Agent identity, for log fields.
    fn name(&self) -> &str;

    /// Build the agent's channel bindings.
    fn routes(&self) -> DispatchTable<Self>;

    /// A scheduled job finished. Only robots schedule jobs.
    fn on_job_finished(&mut self, _job: &Job, _result: Result<(), JobError>, _outbox: &mut Outbox) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        hits: u32,
    }

    fn count(agent: &mut Counter, payload: &[u8], _out: &mut Outbox) -> Result<(), ProtocolError> {
        if payload.is_empty() {
            return Err(ProtocolError::Malformed {
                channel: "count".to_owned(),
                reason: "empty".to_owned(),
            });
        }
        agent.hits = agent.hits.saturating_add(1);
        Ok(())
    }

    #[test]
    fn routes_by_channel() {
        let table = DispatchTable::new().on("count", count);
        let mut agent = Counter::default();
        let mut outbox = Outbox::new();
        assert_eq!(table.dispatch(&mut agent, "count", b"x", &mut outbox), Delivery::Handled);
        assert_eq!(table.dispatch(&mut agent, "other", b"x", &mut outbox), Delivery::Unrouted);
        assert_eq!(agent.hits, 1);
        assert!(table.handles("count"));
        assert_eq!(table.channels().collect::<Vec<_>>(), vec!["count"]);
    }

    #[test]
    fn handler_error_drops_without_change() {
        let table = DispatchTable::new().on("count", count);
        let mut agent = Counter::default();
        let mut outbox = Outbox::new();
        assert_eq!(table.dispatch(&mut agent, "count", b"", &mut outbox), Delivery::Dropped);
        assert_eq!(agent.hits, 0);
    }
}
