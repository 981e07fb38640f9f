//! Wire frame codec
//!
//! One event per text frame, of the form `"<ACTION> <json>"`. The action is
//! the unparsed token before the first space; the remainder must parse as
//! JSON. Decoding never panics; a bad frame surfaces as a typed error the
//! ingress loop can log and absorb without touching the store.

use serde_json::Value;
use thiserror::Error;

/// Failures raised while decoding a wire frame
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame carries no payload: {frame:?}")]
    MissingPayload { frame: String },

    #[error("payload of {action} frame is not valid JSON: {source}")]
    InvalidJson {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A decoded frame: unparsed action token plus its JSON payload
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub action: String,
    pub payload: Value,
}

/// Split a frame on the first space and parse the remainder as JSON.
pub fn decode(frame: &str) -> Result<RawFrame, CodecError> {
    let (action, rest) = frame.split_once(' ').ok_or_else(|| CodecError::MissingPayload {
        frame: frame.to_string(),
    })?;
    let payload = serde_json::from_str(rest).map_err(|source| CodecError::InvalidJson {
        action: action.to_string(),
        source,
    })?;
    Ok(RawFrame {
        action: action.to_string(),
        payload,
    })
}

/// Exact inverse of [`decode`]: lossless for any payload produced here,
/// since object key order is preserved end to end.
pub fn encode(action: &str, payload: &Value) -> String {
    format!("{action} {payload}")
}
