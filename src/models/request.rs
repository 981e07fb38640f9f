//! Proxied request model
//!
//! Represents a single HTTP/HTTPS transaction observed by the remote proxy,
//! assembled incrementally from stream events.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Multi-valued header/query map, mirroring the proxy's wire shape.
pub type MultiMap = HashMap<String, Vec<String>>;

/// Lifecycle state of a proxied request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    /// Announced by the proxy, no request line seen yet
    Created,
    /// Request is being forwarded upstream
    Processing,
    /// Held by the proxy until approved or canceled
    WaitingApproval,
    /// Canceled before completion
    Canceled,
    /// Completed successfully
    Done,
    /// Failed with an error
    Error,
}

impl RequestState {
    /// Terminal states never regress, though field updates may still arrive.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Done | RequestState::Canceled | RequestState::Error
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Created => "Created",
            RequestState::Processing => "Processing",
            RequestState::WaitingApproval => "WaitingApproval",
            RequestState::Canceled => "Canceled",
            RequestState::Done => "Done",
            RequestState::Error => "Error",
        }
    }
}

/// One major timing bucket, optionally decomposed into named minor buckets.
/// All durations are in nanoseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBucket {
    pub duration: i64,
    pub minor_time_keys: Option<Vec<String>>,
    pub minor_time_values: Option<Vec<i64>>,
}

/// Duration breakdown reported on terminal events, as parallel key/value
/// arrays the way the proxy serializes them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTiming {
    pub major_time_keys: Vec<String>,
    pub major_time_values: Vec<TimingBucket>,
}

/// Response portion of a request, present once a response has been observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    pub status_code: u16,
    pub headers: MultiMap,
    #[serde(rename = "bodyID", default, skip_serializing_if = "Option::is_none")]
    pub body_id: Option<String>,
    /// Locally edited response body, forwarded on UPDATE-REQUEST
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub body_length: u64,
}

/// A single proxied transaction, keyed by the proxy-assigned id.
///
/// Identity fields are populated at creation; the progressive fields fill in
/// as the corresponding events arrive and are never cleared once set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Unique identifier, assigned by the remote proxy
    pub id: String,

    /// Current lifecycle state
    pub state: RequestState,

    /// Whether the client used TLS towards the proxy
    pub secure: bool,

    /// Address of the client that issued the request
    #[serde(rename = "clientIP", default)]
    pub client_ip: String,

    /// Name of the client process, when the proxy could resolve it
    #[serde(default)]
    pub client_application: String,

    /// Raw Proxy-Authorization credential as sent by the client
    #[serde(default)]
    pub client_authorization: String,

    /// Username parsed from a Basic credential at creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_authorization_user: Option<String>,

    /// Password parsed from a Basic credential at creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_authorization_password: Option<String>,

    /// Target host
    #[serde(default)]
    pub host: String,

    // Progressive fields, set once the request line has been observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<MultiMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<MultiMap>,
    #[serde(rename = "bodyID", default, skip_serializing_if = "Option::is_none")]
    pub body_id: Option<String>,
    /// Locally edited request body, forwarded on UPDATE-REQUEST
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_transferred: Option<u64>,

    /// Response data, present iff a response event has been processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseData>,

    /// Total duration in nanoseconds, reported on Done/Error
    #[serde(rename = "timing_total", default, skip_serializing_if = "Option::is_none")]
    pub timing_total: Option<i64>,

    /// Duration breakdown, reported on Done/Error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<RequestTiming>,

    /// Failure message, populated on the Error transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Request {
    /// Create a freshly announced request in the `Created` state, deriving
    /// the Basic-auth user/password pair when one is present.
    pub fn new(
        id: String,
        secure: bool,
        client_ip: String,
        client_application: String,
        client_authorization: String,
        host: String,
    ) -> Self {
        let (user, password) = match parse_basic_authorization(&client_authorization) {
            Some((user, password)) => (Some(user), Some(password)),
            None => (None, None),
        };
        Self {
            id,
            state: RequestState::Created,
            secure,
            client_ip,
            client_application,
            client_authorization,
            client_authorization_user: user,
            client_authorization_password: password,
            host,
            method: None,
            path: None,
            query: None,
            headers: None,
            body_id: None,
            body: None,
            body_length: None,
            bytes_transferred: None,
            response: None,
            timing_total: None,
            timing: None,
            error: None,
        }
    }

    /// Scheme derived from the connection type
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// Full URL of the request, as far as it is known yet
    pub fn full_url(&self) -> String {
        format!(
            "{}://{}{}",
            self.scheme(),
            self.host,
            self.path.as_deref().unwrap_or("")
        )
    }
}

/// Parse a `Basic <base64>` credential into its user/password pair.
/// Anything else (other schemes, bad base64, missing colon) yields `None`.
fn parse_basic_authorization(raw: &str) -> Option<(String, String)> {
    let encoded = raw.strip_prefix("Basic ").or_else(|| raw.strip_prefix("basic "))?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Filter options for querying a store snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestFilter {
    /// Match a specific HTTP method (case-insensitive)
    pub method: Option<String>,
    /// Case-insensitive host substring
    pub host_contains: Option<String>,
    /// Case-insensitive path substring
    pub path_contains: Option<String>,
    /// Match a specific lifecycle state
    pub state: Option<RequestState>,
}

impl RequestFilter {
    pub fn matches(&self, req: &Request) -> bool {
        if let Some(method) = &self.method {
            match &req.method {
                Some(m) if m.eq_ignore_ascii_case(method) => {}
                _ => return false,
            }
        }
        if let Some(host) = &self.host_contains {
            if !req
                .host
                .to_ascii_lowercase()
                .contains(&host.to_ascii_lowercase())
            {
                return false;
            }
        }
        if let Some(path) = &self.path_contains {
            let matched = req
                .path
                .as_deref()
                .map(|p| p.to_ascii_lowercase().contains(&path.to_ascii_lowercase()))
                .unwrap_or(false);
            if !matched {
                return false;
            }
        }
        if let Some(state) = self.state {
            if req.state != state {
                return false;
            }
        }
        true
    }
}
