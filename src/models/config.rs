//! Remote proxy configuration model
//!
//! Mirrors the JSON shape served by the proxy's `/config` endpoint.

use serde::{Deserialize, Serialize};

/// Configuration of the remote intercepting proxy.
///
/// Read and written as a whole via `GET /config` / `POST /config`; this
/// crate never interprets the toggles beyond carrying them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Whether the proxy decrypts TLS traffic
    pub mitm_enabled: bool,
    /// Whether the proxy injects the client address as a real-IP header
    pub real_ip_header: bool,
    /// Whether request bodies are captured
    pub capture_request_body: bool,
    /// Whether response bodies are captured
    pub capture_response_body: bool,
    /// Whether requests are held for approval before forwarding
    pub approval_required: bool,
    /// Whether the proxy resolves the client process name
    pub lookup_client_process: bool,
    /// Whether the proxy emits timeline-based updates
    pub timeline_updates: bool,
    /// Lifetime of generated leaf certificates, in hours
    pub certificate_lifetime_hours: u32,
    /// Artificial delay applied to forwarded requests, in milliseconds
    pub delay_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            mitm_enabled: false,
            real_ip_header: false,
            capture_request_body: false,
            capture_response_body: false,
            approval_required: false,
            lookup_client_process: false,
            timeline_updates: false,
            certificate_lifetime_hours: 24,
            delay_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_with_camel_case_keys() {
        let config = ProxyConfig {
            mitm_enabled: true,
            certificate_lifetime_hours: 48,
            delay_ms: 250,
            ..Default::default()
        };
        let value = serde_json::to_value(&config).expect("serializes");
        assert_eq!(value["mitmEnabled"], true);
        assert_eq!(value["certificateLifetimeHours"], 48);
        assert_eq!(value["delayMs"], 250);

        let parsed: ProxyConfig = serde_json::from_value(value).expect("parses");
        assert_eq!(parsed, config);
    }
}
