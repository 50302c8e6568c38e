//! Tick generator.
//!
//! Publishes the current UTC time as raw RFC 3339 text on the tick subject
//! at a fixed interval. A late interval is skipped, not bunched up.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use depot_core::config::ClockConfig;
use depot_core::{Envelope, Outgoing};
use depot_types::Tick;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::error::NodeError;
use crate::nats::NatsBus;

/// Publish ticks on `topic` until Ctrl-C or `max_ticks` is reached.
///
/// # Errors
///
/// Returns [`NodeError::Role`] for a zero interval, or [`NodeError::Nats`]
/// if the final flush fails.
pub async fn run(bus: &NatsBus, topic: &str, config: &ClockConfig) -> Result<(), NodeError> {
    if config.interval_ms == 0 {
        return Err(NodeError::Role("clock.interval_ms must be at least 1".to_owned()));
    }
    let mut interval = tokio::time::interval(Duration::from_millis(config.interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        topic,
        interval_ms = config.interval_ms,
        max_ticks = config.max_ticks,
        "tick generator started"
    );

    let mut sent: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
                let envelope = Envelope {
                    channel: topic.to_owned(),
                    message: Outgoing::Tick(Tick::new(timestamp.clone())),
                };
                if let Err(e) = bus.publish(&envelope).await {
                    warn!(error = %e, "tick not published");
                    continue;
                }
                sent = sent.saturating_add(1);
                info!(tick = sent, timestamp, "tick published");
                if config.max_ticks > 0 && sent >= config.max_ticks {
                    info!(ticks = sent, "tick limit reached");
                    break;
                }
            }
            _ = &mut shutdown => {
                info!(ticks = sent, "shutdown requested");
                break;
            }
        }
    }

    bus.flush().await
}
