//! Outbound command encoding
//!
//! Commands share the `"<ACTION> <json>"` wire format with inbound events
//! and are fire-and-forget: the proxy answers, if at all, with ordinary
//! stream events.

use crate::models::Request;
use crate::protocol::codec;
use serde_json::json;

/// Wire action tokens this client sends
pub mod action {
    pub const APPROVAL_APPROVE: &str = "APPROVAL-APPROVE";
    pub const APPROVAL_CANCEL: &str = "APPROVAL-CANCEL";
    pub const UPDATE_REQUEST: &str = "UPDATE-REQUEST";
}

/// An outbound intent directed at the proxy
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Release a request held in `WaitingApproval`
    Approve { id: String },
    /// Cancel a request held in `WaitingApproval`
    Cancel { id: String },
    /// Replace a request's editable fields before the proxy forwards it
    UpdateRequest(Box<Request>),
}

impl Command {
    pub fn action(&self) -> &'static str {
        match self {
            Command::Approve { .. } => action::APPROVAL_APPROVE,
            Command::Cancel { .. } => action::APPROVAL_CANCEL,
            Command::UpdateRequest(_) => action::UPDATE_REQUEST,
        }
    }

    /// Serialize into a wire frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let payload = match self {
            Command::Approve { id } | Command::Cancel { id } => json!({ "id": id }),
            Command::UpdateRequest(request) => serde_json::to_value(request)?,
        };
        Ok(codec::encode(self.action(), &payload))
    }
}
