//! Inbound stream events
//!
//! The known action set is a closed enum matched exhaustively; anything else
//! decodes to [`Event::Unknown`] so the ingress loop can note it and move on.

use crate::models::{MultiMap, RequestState, RequestTiming};
use crate::protocol::codec::{self, CodecError, RawFrame};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire action tokens emitted by the proxy
pub mod action {
    pub const NEW: &str = "NEW";
    pub const STATE: &str = "STATE";
    pub const TUNNEL: &str = "TUNNEL";
    pub const REQUEST: &str = "REQUEST";
    pub const RESPONSE: &str = "RESPONSE";
    pub const SET_BYTES_TRANSFERRED: &str = "SET-BYTES-TRANSFERRED";
    pub const APPROVAL_WAIT: &str = "APPROVAL-WAIT";
    /// Token spelled exactly as the proxy emits it
    pub const APPROVAL_RECEIVED: &str = "APPROVAL-RECIEVED";
    pub const APPROVAL_CANCELED: &str = "APPROVAL-CANCELED";
    pub const ERROR: &str = "ERROR";
    pub const DONE: &str = "DONE";
}

/// Failures raised while decoding a frame into a typed event
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("malformed {action} payload: {source}")]
    Payload {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Payload of a `NEW` frame: the identity fields known at creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(rename = "clientIP", default)]
    pub client_ip: String,
    #[serde(default)]
    pub client_application: String,
    #[serde(default)]
    pub client_authorization: String,
    #[serde(default)]
    pub host: String,
}

/// Payload of a `STATE` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub id: String,
    pub state: RequestState,
}

/// Payload of frames that carry nothing beyond the request id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRef {
    pub id: String,
}

/// Payload of a `REQUEST` frame: the parsed request head
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHead {
    pub id: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: MultiMap,
    #[serde(default)]
    pub headers: MultiMap,
    #[serde(rename = "bodyID", default)]
    pub body_id: String,
    #[serde(default)]
    pub body_length: u64,
    #[serde(default)]
    pub bytes_transferred: u64,
}

/// Payload of a `RESPONSE` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseHead {
    pub id: String,
    pub status_code: u16,
    #[serde(default)]
    pub headers: MultiMap,
    #[serde(rename = "bodyID", default)]
    pub body_id: String,
    #[serde(default)]
    pub body_length: u64,
}

/// Payload of a `SET-BYTES-TRANSFERRED` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteCount {
    pub id: String,
    #[serde(default)]
    pub bytes_transferred: u64,
}

/// Payload of an `ERROR` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub id: String,
    #[serde(default)]
    pub bytes_transferred: Option<u64>,
    #[serde(rename = "timing_total", default)]
    pub timing_total: Option<i64>,
    #[serde(default)]
    pub timing: Option<RequestTiming>,
    #[serde(default)]
    pub error: String,
}

/// Payload of a `DONE` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub id: String,
    #[serde(rename = "timing_total", default)]
    pub timing_total: Option<i64>,
    #[serde(default)]
    pub timing: Option<RequestTiming>,
}

/// One decoded inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    New(Announcement),
    State(StateChange),
    Tunnel(RequestRef),
    Request(RequestHead),
    Response(ResponseHead),
    BytesTransferred(ByteCount),
    ApprovalWait(RequestRef),
    ApprovalReceived(RequestRef),
    ApprovalCanceled(RequestRef),
    Error(ErrorReport),
    Done(Completion),
    /// Action token outside the known set; never mutates the store
    Unknown(RawFrame),
}

impl Event {
    /// Decode a raw text frame into a typed event.
    pub fn decode(frame: &str) -> Result<Event, ProtocolError> {
        Self::from_frame(codec::decode(frame)?)
    }

    /// Interpret an already-split frame.
    pub fn from_frame(frame: RawFrame) -> Result<Event, ProtocolError> {
        let action = frame.action.clone();
        match action.as_str() {
            action::NEW => Ok(Event::New(payload(action::NEW, frame)?)),
            action::STATE => Ok(Event::State(payload(action::STATE, frame)?)),
            action::TUNNEL => Ok(Event::Tunnel(payload(action::TUNNEL, frame)?)),
            action::REQUEST => Ok(Event::Request(payload(action::REQUEST, frame)?)),
            action::RESPONSE => Ok(Event::Response(payload(action::RESPONSE, frame)?)),
            action::SET_BYTES_TRANSFERRED => Ok(Event::BytesTransferred(payload(
                action::SET_BYTES_TRANSFERRED,
                frame,
            )?)),
            action::APPROVAL_WAIT => {
                Ok(Event::ApprovalWait(payload(action::APPROVAL_WAIT, frame)?))
            }
            action::APPROVAL_RECEIVED => Ok(Event::ApprovalReceived(payload(
                action::APPROVAL_RECEIVED,
                frame,
            )?)),
            action::APPROVAL_CANCELED => Ok(Event::ApprovalCanceled(payload(
                action::APPROVAL_CANCELED,
                frame,
            )?)),
            action::ERROR => Ok(Event::Error(payload(action::ERROR, frame)?)),
            action::DONE => Ok(Event::Done(payload(action::DONE, frame)?)),
            _ => Ok(Event::Unknown(frame)),
        }
    }

    /// The wire action token this event decoded from
    pub fn action(&self) -> &str {
        match self {
            Event::New(_) => action::NEW,
            Event::State(_) => action::STATE,
            Event::Tunnel(_) => action::TUNNEL,
            Event::Request(_) => action::REQUEST,
            Event::Response(_) => action::RESPONSE,
            Event::BytesTransferred(_) => action::SET_BYTES_TRANSFERRED,
            Event::ApprovalWait(_) => action::APPROVAL_WAIT,
            Event::ApprovalReceived(_) => action::APPROVAL_RECEIVED,
            Event::ApprovalCanceled(_) => action::APPROVAL_CANCELED,
            Event::Error(_) => action::ERROR,
            Event::Done(_) => action::DONE,
            Event::Unknown(frame) => &frame.action,
        }
    }

    /// The request id the event refers to, when the action carries one
    pub fn id(&self) -> Option<&str> {
        match self {
            Event::New(a) => Some(&a.id),
            Event::State(s) => Some(&s.id),
            Event::Tunnel(r) | Event::ApprovalWait(r) | Event::ApprovalReceived(r)
            | Event::ApprovalCanceled(r) => Some(&r.id),
            Event::Request(h) => Some(&h.id),
            Event::Response(h) => Some(&h.id),
            Event::BytesTransferred(b) => Some(&b.id),
            Event::Error(e) => Some(&e.id),
            Event::Done(c) => Some(&c.id),
            Event::Unknown(_) => None,
        }
    }
}

fn payload<T: DeserializeOwned>(action: &'static str, frame: RawFrame) -> Result<T, ProtocolError> {
    serde_json::from_value(frame.payload)
        .map_err(|source| ProtocolError::Payload { action, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_new_announcement() {
        let frame = r#"NEW {"id":"r1","secure":true,"clientIP":"10.0.0.1","host":"example.com","clientAuthorization":""}"#;
        match Event::decode(frame).expect("decodes") {
            Event::New(a) => {
                assert_eq!(a.id, "r1");
                assert!(a.secure);
                assert_eq!(a.client_ip, "10.0.0.1");
                assert_eq!(a.host, "example.com");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_request_head_with_empty_maps() {
        let frame = r#"REQUEST {"id":"r1","method":"GET","path":"/","query":{},"headers":{},"bodyID":"","bodyLength":0,"bytesTransferred":0}"#;
        match Event::decode(frame).expect("decodes") {
            Event::Request(head) => {
                assert_eq!(head.method, "GET");
                assert_eq!(head.path, "/");
                assert!(head.query.is_empty());
                assert!(head.headers.is_empty());
                assert_eq!(head.body_length, 0);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_done_with_timing_tree() {
        let frame = r#"DONE {"id":"r1","bytesTransferred":512,"timing":{"majorTimeKeys":["dns"],"majorTimeValues":[{"duration":100,"minorTimeKeys":null,"minorTimeValues":null}]},"timing_total":100}"#;
        match Event::decode(frame).expect("decodes") {
            Event::Done(done) => {
                assert_eq!(done.timing_total, Some(100));
                let timing = done.timing.expect("timing present");
                assert_eq!(timing.major_time_keys, vec!["dns".to_string()]);
                assert_eq!(timing.major_time_values[0].duration, 100);
                assert!(timing.major_time_values[0].minor_time_keys.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn misspelled_approval_token_is_the_known_one() {
        let event = Event::decode(r#"APPROVAL-RECIEVED {"id":"r3"}"#).expect("decodes");
        assert!(matches!(event, Event::ApprovalReceived(_)));
        assert_eq!(event.id(), Some("r3"));
    }

    #[test]
    fn unrecognized_action_becomes_unknown() {
        let event = Event::decode(r#"FLUSH {"id":"r1"}"#).expect("decodes");
        match event {
            Event::Unknown(frame) => assert_eq!(frame.action, "FLUSH"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn bad_payload_shape_is_a_typed_error() {
        let err = Event::decode(r#"STATE {"id":"r1","state":"Lingering"}"#).expect_err("must fail");
        assert!(matches!(err, ProtocolError::Payload { action: "STATE", .. }));
    }
}
