//! Payload decoding for inbound bus messages.
//!
//! JSON payloads are decoded with `serde_json`; the tick payload is a raw
//! UTF-8 timestamp. Decode failures are split into two classes so logs can
//! tell a broken peer (malformed bytes, missing fields) from a peer speaking
//! an unexpected vocabulary (unknown package kind, zero quantity, unknown
//! status).

use depot_types::Tick;
use serde::de::DeserializeOwned;
use serde_json::error::Category;

/// Errors raised while decoding or encoding a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The payload is not well-formed (syntax, truncation, missing field,
    /// invalid UTF-8).
    #[error("malformed payload on {channel}: {reason}")]
    Malformed {
        /// Channel the payload arrived on.
        channel: String,
        /// Decoder message.
        reason: String,
    },

    /// The payload is well-formed but carries a value outside the domain.
    #[error("invalid value on {channel}: {reason}")]
    InvalidValue {
        /// Channel the payload arrived on.
        channel: String,
        /// Decoder message.
        reason: String,
    },

    /// An outbound message could not be serialized.
    #[error("failed to encode {kind}: {reason}")]
    Encode {
        /// Message kind.
        kind: &'static str,
        /// Serializer message.
        reason: String,
    },
}

/// Decode a JSON payload received on `channel`.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] for syntax errors, truncated input,
/// and missing fields, and [`ProtocolError::InvalidValue`] for values the
/// domain types reject.
pub fn decode<T: DeserializeOwned>(channel: &str, payload: &[u8]) -> Result<T, ProtocolError> {
    serde_json::from_slice(payload).map_err(|e| classify(channel, &e))
}

/// Decode a tick payload: a non-empty UTF-8 timestamp, surrounding
/// whitespace trimmed.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] for invalid UTF-8 or an empty
/// timestamp.
pub fn decode_tick(channel: &str, payload: &[u8]) -> Result<Tick, ProtocolError> {
    let text = core::str::from_utf8(payload).map_err(|e| ProtocolError::Malformed {
        channel: channel.to_owned(),
        reason: format!("tick is not UTF-8: {e}"),
    })?;
    let timestamp = text.trim();
    if timestamp.is_empty() {
        return Err(ProtocolError::Malformed {
            channel: channel.to_owned(),
            reason: "empty tick timestamp".to_owned(),
        });
    }
    Ok(Tick::new(timestamp))
}

fn classify(channel: &str, error: &serde_json::Error) -> ProtocolError {
    let reason = error.to_string();
    match error.classify() {
        Category::Data if !reason.starts_with("missing field") => ProtocolError::InvalidValue {
            channel: channel.to_owned(),
            reason,
        },
        Category::Data | Category::Syntax | Category::Eof | Category::Io => {
            ProtocolError::Malformed {
                channel: channel.to_owned(),
                reason,
            }
        }
    }
}
