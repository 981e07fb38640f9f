//! Event reducer
//!
//! Applies one decoded stream event to the request store, implementing the
//! request lifecycle: Created -> Processing -> {WaitingApproval <->
//! Processing} -> {Done | Canceled | Error}. Terminal states never regress;
//! late events for a finished request still update its non-state fields.
//!
//! Every arm is fail-open: an event for an unknown id, or an unrecognized
//! action, is logged and dropped without touching the store.

use crate::models::{Request, RequestState, ResponseData};
use crate::protocol::event::Event;
use crate::sync::store::RequestStore;

/// Apply a single event. Returns the id of the mutated entity, or `None`
/// when the event was a no-op.
pub fn apply(store: &mut RequestStore, event: Event) -> Option<String> {
    match event {
        Event::New(announcement) => {
            let entity = Request::new(
                announcement.id.clone(),
                announcement.secure,
                announcement.client_ip,
                announcement.client_application,
                announcement.client_authorization,
                announcement.host,
            );
            if store.upsert_new(entity) {
                tracing::warn!(id = %announcement.id, "duplicate NEW for known request, entity overwritten");
            }
            Some(announcement.id)
        }

        Event::State(change) => {
            let next = change.state;
            update_known(store, &change.id, "STATE", |entity| {
                advance_state(entity, next);
            })
        }

        Event::Tunnel(r) => update_known(store, &r.id, "TUNNEL", |entity| {
            advance_state(entity, RequestState::Processing);
        }),

        Event::Request(head) => {
            let id = head.id.clone();
            update_known(store, &id, "REQUEST", move |entity| {
                advance_state(entity, RequestState::Processing);
                entity.method = Some(head.method);
                entity.path = Some(head.path);
                entity.query = Some(head.query);
                entity.headers = Some(head.headers);
                if !head.body_id.is_empty() {
                    entity.body_id = Some(head.body_id);
                }
                entity.body_length = Some(head.body_length);
                entity.bytes_transferred = Some(head.bytes_transferred);
            })
        }

        Event::Response(head) => {
            let id = head.id.clone();
            update_known(store, &id, "RESPONSE", move |entity| {
                entity.response = Some(ResponseData {
                    status_code: head.status_code,
                    headers: head.headers,
                    body_id: (!head.body_id.is_empty()).then_some(head.body_id),
                    body: None,
                    body_length: head.body_length,
                });
            })
        }

        Event::BytesTransferred(count) => {
            update_known(store, &count.id, "SET-BYTES-TRANSFERRED", |entity| {
                entity.bytes_transferred = Some(count.bytes_transferred);
            })
        }

        Event::ApprovalWait(r) => update_known(store, &r.id, "APPROVAL-WAIT", |entity| {
            advance_state(entity, RequestState::WaitingApproval);
        }),

        Event::ApprovalReceived(r) => update_known(store, &r.id, "APPROVAL-RECIEVED", |entity| {
            advance_state(entity, RequestState::Processing);
        }),

        Event::ApprovalCanceled(r) => update_known(store, &r.id, "APPROVAL-CANCELED", |entity| {
            advance_state(entity, RequestState::Canceled);
        }),

        Event::Error(report) => {
            let id = report.id.clone();
            update_known(store, &id, "ERROR", move |entity| {
                advance_state(entity, RequestState::Error);
                if let Some(bytes) = report.bytes_transferred {
                    entity.bytes_transferred = Some(bytes);
                }
                entity.timing_total = report.timing_total;
                entity.timing = report.timing;
                entity.error = Some(report.error);
            })
        }

        Event::Done(completion) => {
            let id = completion.id.clone();
            update_known(store, &id, "DONE", move |entity| {
                advance_state(entity, RequestState::Done);
                entity.timing_total = completion.timing_total;
                entity.timing = completion.timing;
            })
        }

        Event::Unknown(frame) => {
            tracing::info!(action = %frame.action, "unrecognized stream action, ignoring");
            None
        }
    }
}

/// Mutate the entity if the id is known; warn and skip otherwise. Events may
/// legitimately race with a historical-load merge, so a miss is never fatal.
fn update_known<F>(store: &mut RequestStore, id: &str, action: &str, mutator: F) -> Option<String>
where
    F: FnOnce(&mut Request),
{
    if store.update(id, mutator) {
        Some(id.to_string())
    } else {
        tracing::warn!(action, id, "event for unknown request id, ignoring");
        None
    }
}

/// Move the lifecycle forward. Terminal states hold.
fn advance_state(entity: &mut Request, next: RequestState) {
    if entity.state.is_terminal() {
        tracing::debug!(id = %entity.id, current = entity.state.as_str(), requested = next.as_str(),
            "state transition after terminal state suppressed");
        return;
    }
    entity.state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::event::Event;

    fn apply_frame(store: &mut RequestStore, frame: &str) -> Option<String> {
        apply(store, Event::decode(frame).expect("frame decodes"))
    }

    fn announce(store: &mut RequestStore, id: &str) {
        apply_frame(
            store,
            &format!(
                r#"NEW {{"id":"{id}","secure":false,"clientIP":"10.0.0.1","host":"example.com","clientAuthorization":""}}"#
            ),
        );
    }

    #[test]
    fn full_lifecycle_reaches_done() {
        let mut store = RequestStore::new();
        announce(&mut store, "r1");
        assert_eq!(store.get("r1").unwrap().state, RequestState::Created);

        apply_frame(&mut store, r#"REQUEST {"id":"r1","method":"GET","path":"/","query":{},"headers":{},"bodyID":"","bodyLength":0,"bytesTransferred":0}"#);
        let entity = store.get("r1").unwrap();
        assert_eq!(entity.state, RequestState::Processing);
        assert_eq!(entity.method.as_deref(), Some("GET"));
        assert_eq!(entity.body_length, Some(0));

        apply_frame(&mut store, r#"RESPONSE {"id":"r1","statusCode":200,"headers":{"Content-Type":["text/html"]},"bodyLength":512}"#);
        let response = store.get("r1").unwrap().response.as_ref().expect("response set");
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body_length, 512);

        apply_frame(&mut store, r#"DONE {"id":"r1","timing":{"majorTimeKeys":["dns"],"majorTimeValues":[{"duration":100,"minorTimeKeys":null,"minorTimeValues":null}]},"timing_total":100}"#);
        let entity = store.get("r1").unwrap();
        assert_eq!(entity.state, RequestState::Done);
        assert_eq!(entity.timing_total, Some(100));
    }

    #[test]
    fn approval_round_trip_toggles_states() {
        let mut store = RequestStore::new();
        announce(&mut store, "r1");

        apply_frame(&mut store, r#"APPROVAL-WAIT {"id":"r1"}"#);
        assert_eq!(store.get("r1").unwrap().state, RequestState::WaitingApproval);

        apply_frame(&mut store, r#"APPROVAL-RECIEVED {"id":"r1"}"#);
        assert_eq!(store.get("r1").unwrap().state, RequestState::Processing);

        apply_frame(&mut store, r#"APPROVAL-WAIT {"id":"r1"}"#);
        apply_frame(&mut store, r#"APPROVAL-CANCELED {"id":"r1"}"#);
        assert_eq!(store.get("r1").unwrap().state, RequestState::Canceled);
    }

    #[test]
    fn terminal_state_never_regresses_but_fields_still_update() {
        let mut store = RequestStore::new();
        announce(&mut store, "r1");
        apply_frame(&mut store, r#"DONE {"id":"r1","timing_total":100}"#);
        assert_eq!(store.get("r1").unwrap().state, RequestState::Done);

        // Stray early-stage events arriving late
        apply_frame(&mut store, r#"TUNNEL {"id":"r1"}"#);
        apply_frame(&mut store, r#"STATE {"id":"r1","state":"Processing"}"#);
        assert_eq!(store.get("r1").unwrap().state, RequestState::Done);

        // Field-bearing events still land
        apply_frame(&mut store, r#"SET-BYTES-TRANSFERRED {"id":"r1","bytesTransferred":2048}"#);
        assert_eq!(store.get("r1").unwrap().bytes_transferred, Some(2048));
    }

    #[test]
    fn error_event_records_failure_details() {
        let mut store = RequestStore::new();
        announce(&mut store, "r1");
        apply_frame(&mut store, r#"ERROR {"id":"r1","bytesTransferred":17,"timing_total":5000,"error":"connection reset by peer"}"#);

        let entity = store.get("r1").unwrap();
        assert_eq!(entity.state, RequestState::Error);
        assert_eq!(entity.bytes_transferred, Some(17));
        assert_eq!(entity.timing_total, Some(5000));
        assert_eq!(entity.error.as_deref(), Some("connection reset by peer"));
    }

    #[test]
    fn duplicate_new_overwrites_without_growing_the_store() {
        let mut store = RequestStore::new();
        announce(&mut store, "r1");
        apply_frame(&mut store, r#"REQUEST {"id":"r1","method":"GET","path":"/","query":{},"headers":{},"bodyID":"","bodyLength":0,"bytesTransferred":0}"#);

        announce(&mut store, "r1");
        assert_eq!(store.len(), 1);
        let entity = store.get("r1").unwrap();
        assert_eq!(entity.state, RequestState::Created);
        assert!(entity.method.is_none(), "overwrite resets progressive fields");
    }

    #[test]
    fn unknown_id_is_a_noop() {
        let mut store = RequestStore::new();
        announce(&mut store, "r1");
        let before = store.snapshot();

        let changed = apply_frame(&mut store, r#"STATE {"id":"ghost","state":"Processing"}"#);
        assert!(changed.is_none());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn unknown_action_is_a_noop() {
        let mut store = RequestStore::new();
        announce(&mut store, "r1");
        let before = store.snapshot();

        let changed = apply_frame(&mut store, r#"FLUSH {"id":"r1"}"#);
        assert!(changed.is_none());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn state_event_applies_carried_value_verbatim() {
        let mut store = RequestStore::new();
        announce(&mut store, "r1");
        apply_frame(&mut store, r#"STATE {"id":"r1","state":"WaitingApproval"}"#);
        assert_eq!(store.get("r1").unwrap().state, RequestState::WaitingApproval);
    }
}
