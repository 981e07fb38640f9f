//! Synchronization session
//!
//! Owns the request store and the buffering controller behind a single lock,
//! which is the engine's one ingress point: stream frames, pause/resume,
//! historical merges, and local edits all serialize through it. Each inbound
//! frame is processed to completion before the next is considered, so the
//! reducer never runs concurrently with itself or with the external write
//! paths.

use crate::models::{Request, RequestFilter};
use crate::protocol::event::Event;
use crate::sync::buffer::EventBuffer;
use crate::sync::reducer;
use crate::sync::store::RequestStore;
use std::sync::Mutex;
use tokio::sync::broadcast;

const NOTIFICATION_CAPACITY: usize = 256;

/// Change notifications emitted to external observers (the view layer).
/// A lagging subscriber never blocks the ingress path.
#[derive(Debug, Clone)]
pub enum SyncNotification {
    /// A request entity was created or mutated
    RequestChanged { id: String },
    /// A historical page was merged into the store
    HistoryMerged { inserted: usize },
    /// Live application of events was suspended
    Paused,
    /// The replay queue was drained and live application resumed
    Resumed,
    /// The streaming connection closed; no reconnect is attempted here
    ConnectionClosed { reason: Option<String> },
}

struct Inner {
    store: RequestStore,
    buffer: EventBuffer,
}

pub struct SyncSession {
    inner: Mutex<Inner>,
    notifications: broadcast::Sender<SyncNotification>,
}

impl Default for SyncSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncSession {
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                store: RequestStore::new(),
                buffer: EventBuffer::new(),
            }),
            notifications,
        }
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotification> {
        self.notifications.subscribe()
    }

    /// Ingest one raw frame from the streaming connection. Malformed frames
    /// are logged and absorbed; the store is left untouched and the next
    /// frame is processed normally.
    pub fn handle_frame(&self, frame: &str) {
        let event = match Event::decode(frame) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed frame");
                return;
            }
        };
        self.handle_event(event);
    }

    /// Ingest one decoded event, honoring the buffering gate.
    pub fn handle_event(&self, event: Event) {
        let changed = {
            let mut inner = self.inner.lock().expect("session lock poisoned");
            match inner.buffer.admit(event) {
                Some(event) => reducer::apply(&mut inner.store, event),
                None => None,
            }
        };
        if let Some(id) = changed {
            self.notify(SyncNotification::RequestChanged { id });
        }
    }

    /// Suspend live application; subsequent events queue up in arrival
    /// order. Idempotent.
    pub fn pause(&self) {
        {
            let mut inner = self.inner.lock().expect("session lock poisoned");
            if inner.buffer.is_paused() {
                return;
            }
            inner.buffer.pause();
        }
        tracing::debug!("live updates paused");
        self.notify(SyncNotification::Paused);
    }

    /// Drain the replay queue through the reducer in arrival order, then
    /// return to live mode. A no-op when not paused.
    pub fn resume(&self) {
        let changed: Vec<String> = {
            let mut inner = self.inner.lock().expect("session lock poisoned");
            if !inner.buffer.is_paused() {
                return;
            }
            let mut changed = Vec::new();
            while let Some(event) = inner.buffer.next_replay() {
                if let Some(id) = reducer::apply(&mut inner.store, event) {
                    changed.push(id);
                }
            }
            inner.buffer.finish_replay();
            changed
        };
        tracing::debug!(replayed = changed.len(), "live updates resumed");
        for id in changed {
            self.notify(SyncNotification::RequestChanged { id });
        }
        self.notify(SyncNotification::Resumed);
    }

    /// Merge a batch of historical requests fetched out-of-band, behind the
    /// same lock as stream processing so the merge cannot interleave with a
    /// half-applied event. Returns how many entries were inserted.
    pub fn merge_history(&self, offset: usize, batch: Vec<Request>) -> usize {
        let inserted = {
            let mut inner = self.inner.lock().expect("session lock poisoned");
            inner.store.merge_history(offset, batch)
        };
        if inserted > 0 {
            tracing::debug!(inserted, offset, "merged historical requests");
            self.notify(SyncNotification::HistoryMerged { inserted });
        }
        inserted
    }

    /// Overwrite one entity's editable fields from a locally edited copy.
    /// Returns false when the id is not in the store.
    pub fn apply_edit(&self, edited: &Request) -> bool {
        let applied = {
            let mut inner = self.inner.lock().expect("session lock poisoned");
            inner.store.apply_edit(edited)
        };
        if applied {
            self.notify(SyncNotification::RequestChanged {
                id: edited.id.clone(),
            });
        } else {
            tracing::warn!(id = %edited.id, "edit for unknown request id, ignoring");
        }
        applied
    }

    /// Surface a transport-level close to observers. Called by the
    /// connection manager; the session itself takes no further action.
    pub fn notify_connection_closed(&self, reason: Option<String>) {
        tracing::info!(reason = reason.as_deref().unwrap_or("stream ended"), "streaming connection closed");
        self.notify(SyncNotification::ConnectionClosed { reason });
    }

    /// Read-only copy of the store, newest first.
    pub fn snapshot(&self) -> Vec<Request> {
        self.inner.lock().expect("session lock poisoned").store.snapshot()
    }

    /// Snapshot restricted to entries matching the filter.
    pub fn filtered(&self, filter: &RequestFilter) -> Vec<Request> {
        self.inner.lock().expect("session lock poisoned").store.filtered(filter)
    }

    /// Look up a single request by id.
    pub fn get(&self, id: &str) -> Option<Request> {
        self.inner
            .lock()
            .expect("session lock poisoned")
            .store
            .get(id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("session lock poisoned").store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("session lock poisoned").store.is_empty()
    }

    /// Whether live application is currently suspended.
    pub fn is_paused(&self) -> bool {
        self.inner.lock().expect("session lock poisoned").buffer.is_paused()
    }

    fn notify(&self, notification: SyncNotification) {
        // Send only fails when nobody is subscribed, which is fine.
        let _ = self.notifications.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestState;

    fn new_frame(id: &str) -> String {
        format!(
            r#"NEW {{"id":"{id}","secure":false,"clientIP":"10.0.0.1","host":"example.com","clientAuthorization":""}}"#
        )
    }

    #[test]
    fn frames_apply_live_by_default() {
        let session = SyncSession::new();
        session.handle_frame(&new_frame("r1"));
        assert_eq!(session.len(), 1);
        assert_eq!(session.get("r1").unwrap().state, RequestState::Created);
    }

    #[test]
    fn malformed_frame_is_absorbed_and_stream_continues() {
        let session = SyncSession::new();
        session.handle_frame(&new_frame("r1"));

        session.handle_frame("NEW {broken");
        session.handle_frame("NOPAYLOAD");

        session.handle_frame(&new_frame("r2"));
        assert_eq!(session.len(), 2, "later frames still processed");
    }

    #[test]
    fn pause_queues_and_resume_replays_in_order() {
        let session = SyncSession::new();
        session.handle_frame(&new_frame("r1"));

        session.pause();
        session.handle_frame(r#"APPROVAL-WAIT {"id":"r1"}"#);
        session.handle_frame(r#"APPROVAL-RECIEVED {"id":"r1"}"#);
        assert_eq!(
            session.get("r1").unwrap().state,
            RequestState::Created,
            "no application while paused"
        );

        session.resume();
        assert_eq!(session.get("r1").unwrap().state, RequestState::Processing);
        assert!(!session.is_paused());
    }

    #[test]
    fn resume_without_pause_is_a_noop() {
        let session = SyncSession::new();
        session.resume();
        assert!(!session.is_paused());
    }

    #[test]
    fn notifications_carry_changed_ids() {
        let session = SyncSession::new();
        let mut rx = session.subscribe();

        session.handle_frame(&new_frame("r1"));
        match rx.try_recv().expect("notification emitted") {
            SyncNotification::RequestChanged { id } => assert_eq!(id, "r1"),
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[test]
    fn edits_apply_and_unknown_edit_is_rejected() {
        let session = SyncSession::new();
        session.handle_frame(&new_frame("r1"));

        let mut edited = session.get("r1").unwrap();
        edited.method = Some("DELETE".to_string());
        assert!(session.apply_edit(&edited));
        assert_eq!(session.get("r1").unwrap().method.as_deref(), Some("DELETE"));

        let mut ghost = edited.clone();
        ghost.id = "ghost".to_string();
        assert!(!session.apply_edit(&ghost));
    }
}
