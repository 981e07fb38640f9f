//! Proxy client
//!
//! Ties together the streaming connection, the synchronization session, and
//! the proxy's REST surface into the one object an embedding application
//! holds on to.

use crate::connection::ConnectionManager;
use crate::models::{ProxyConfig, Request, RequestFilter};
use crate::protocol::command::Command;
use crate::sync::session::{SyncNotification, SyncSession};
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::broadcast;
use url::Url;

/// Client for one remote intercepting proxy.
pub struct ProxyClient {
    base_url: Url,
    http: reqwest::Client,
    session: Arc<SyncSession>,
    connection: ConnectionManager,
}

impl ProxyClient {
    /// Create a client for the proxy reachable at `base_url`
    /// (e.g. `http://127.0.0.1:8080`). No I/O happens until
    /// [`ProxyClient::connect`] or a REST call.
    pub fn new(base_url: Url) -> Self {
        let session = Arc::new(SyncSession::new());
        let connection = ConnectionManager::new(Arc::clone(&session));
        Self {
            base_url,
            http: reqwest::Client::new(),
            session,
            connection,
        }
    }

    // --- streaming lifecycle ---

    /// Open the streaming connection, replacing any previous one.
    pub async fn connect(&self) -> anyhow::Result<()> {
        self.connection.connect(&self.base_url).await
    }

    /// Close the streaming connection, if open.
    pub fn disconnect(&self) {
        self.connection.close();
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    /// Subscribe to store and connection notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotification> {
        self.session.subscribe()
    }

    // --- store access ---

    /// Read-only copy of the request record, newest first.
    pub fn snapshot(&self) -> Vec<Request> {
        self.session.snapshot()
    }

    /// Snapshot restricted to entries matching the filter.
    pub fn filtered(&self, filter: &RequestFilter) -> Vec<Request> {
        self.session.filtered(filter)
    }

    pub fn get_request(&self, id: &str) -> Option<Request> {
        self.session.get(id)
    }

    /// Suspend live application of stream events; arrivals queue up.
    pub fn pause(&self) {
        self.session.pause();
    }

    /// Replay queued events in arrival order and go live again.
    pub fn resume(&self) {
        self.session.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.session.is_paused()
    }

    // --- outbound commands ---

    /// Release a request held for approval. Fire-and-forget: the state
    /// change arrives, if at all, as an inbound event.
    pub fn approve_request(&self, id: &str) {
        self.connection.send_command(Command::Approve { id: id.to_string() });
    }

    /// Cancel a request held for approval. Fire-and-forget.
    pub fn cancel_request(&self, id: &str) {
        self.connection.send_command(Command::Cancel { id: id.to_string() });
    }

    /// Overwrite a request's editable fields locally and forward the edited
    /// entity to the proxy. Returns false (and sends nothing) when the id is
    /// not in the store.
    pub fn update_request(&self, edited: Request) -> bool {
        if !self.session.apply_edit(&edited) {
            return false;
        }
        self.connection
            .send_command(Command::UpdateRequest(Box::new(edited)));
        true
    }

    // --- REST collaborator surface ---

    /// Fetch the proxy's configuration.
    pub async fn fetch_config(&self) -> anyhow::Result<ProxyConfig> {
        let url = self.base_url.join("/config")?;
        let config = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("fetching {url}"))?
            .error_for_status()?
            .json()
            .await
            .context("decoding proxy config")?;
        Ok(config)
    }

    /// Replace the proxy's configuration.
    pub async fn update_config(&self, config: &ProxyConfig) -> anyhow::Result<()> {
        let url = self.base_url.join("/config")?;
        self.http
            .post(url.clone())
            .json(config)
            .send()
            .await
            .with_context(|| format!("posting {url}"))?
            .error_for_status()?;
        Ok(())
    }

    /// Fetch one page of historical requests.
    pub async fn fetch_requests(&self, offset: usize, limit: usize) -> anyhow::Result<Vec<Request>> {
        let mut url = self.base_url.join("/requests")?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &limit.to_string());
        let requests = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("fetching {url}"))?
            .error_for_status()?
            .json()
            .await
            .context("decoding request page")?;
        Ok(requests)
    }

    /// Fetch historical requests matching a raw filter query string.
    pub async fn fetch_requests_matching(&self, query: &str) -> anyhow::Result<Vec<Request>> {
        let mut url = self.base_url.join("/requestsMatchingFilter")?;
        url.set_query(Some(query));
        let requests = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("fetching {url}"))?
            .error_for_status()?
            .json()
            .await
            .context("decoding filtered requests")?;
        Ok(requests)
    }

    /// Fetch one page of history and merge it into the live store at the
    /// given offset, serialized behind the same ingress as stream events.
    /// Returns how many entries were actually inserted.
    pub async fn load_history(&self, offset: usize, limit: usize) -> anyhow::Result<usize> {
        let batch = self.fetch_requests(offset, limit).await?;
        Ok(self.session.merge_history(offset, batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ProxyClient {
        ProxyClient::new(Url::parse("http://127.0.0.1:8080").unwrap())
    }

    #[test]
    fn client_starts_disconnected_and_empty() {
        let client = client();
        assert!(!client.is_connected());
        assert!(!client.is_paused());
        assert!(client.snapshot().is_empty());
    }

    #[test]
    fn update_request_for_unknown_id_sends_nothing() {
        let client = client();
        let ghost = Request::new(
            "ghost".to_string(),
            false,
            "10.0.0.1".to_string(),
            String::new(),
            String::new(),
            "example.com".to_string(),
        );
        assert!(!client.update_request(ghost));
        assert!(client.snapshot().is_empty());
    }
}
