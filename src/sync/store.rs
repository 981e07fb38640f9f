//! Ordered, id-keyed request store
//!
//! The authoritative in-memory record of observed requests, newest first.
//! The store itself is passive; all mutation goes through the owning
//! session, which serializes writers.

use crate::models::{Request, RequestFilter};

#[derive(Debug, Default)]
pub struct RequestStore {
    /// Newest first; new requests are prepended, never appended
    entries: Vec<Request>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|req| req.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Request> {
        self.entries.iter().find(|req| req.id == id)
    }

    /// Insert a freshly announced request at the front. If the id is already
    /// present the existing entity is overwritten in place, keeping its list
    /// position; returns whether that happened.
    pub fn upsert_new(&mut self, entity: Request) -> bool {
        match self.entries.iter_mut().find(|req| req.id == entity.id) {
            Some(existing) => {
                *existing = entity;
                true
            }
            None => {
                self.entries.insert(0, entity);
                false
            }
        }
    }

    /// Mutate the entity with the given id in place. Returns false (and does
    /// nothing) when the id is absent.
    pub fn update<F>(&mut self, id: &str, mutator: F) -> bool
    where
        F: FnOnce(&mut Request),
    {
        match self.entries.iter_mut().find(|req| req.id == id) {
            Some(entity) => {
                mutator(entity);
                true
            }
            None => false,
        }
    }

    /// Read-only copy of the whole record, newest first. Callers never see
    /// internal aliases, so a half-applied mutation cannot be observed.
    pub fn snapshot(&self) -> Vec<Request> {
        self.entries.clone()
    }

    /// Snapshot restricted to entries matching the filter.
    pub fn filtered(&self, filter: &RequestFilter) -> Vec<Request> {
        self.entries
            .iter()
            .filter(|req| filter.matches(req))
            .cloned()
            .collect()
    }

    /// Splice a batch of historical requests in at `offset`, preserving the
    /// batch's relative order and leaving entries outside the affected slice
    /// untouched. Entries whose id is already present lost the race against
    /// the live stream and are skipped. Returns how many were inserted.
    pub fn merge_history(&mut self, offset: usize, batch: Vec<Request>) -> usize {
        let offset = offset.min(self.entries.len());
        let mut inserted = 0;
        for entity in batch {
            if self.contains(&entity.id) {
                continue;
            }
            self.entries.insert(offset + inserted, entity);
            inserted += 1;
        }
        inserted
    }

    /// Overwrite one entity's editable fields from a locally edited copy.
    /// Returns false when the id is absent.
    pub fn apply_edit(&mut self, edited: &Request) -> bool {
        self.update(&edited.id, |entity| {
            entity.host = edited.host.clone();
            entity.method = edited.method.clone();
            entity.headers = edited.headers.clone();
            entity.path = edited.path.clone();
            entity.query = edited.query.clone();
            entity.body = edited.body.clone();
            entity.response = edited.response.clone();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestState;

    fn request(id: &str) -> Request {
        Request::new(
            id.to_string(),
            false,
            "10.0.0.1".to_string(),
            String::new(),
            String::new(),
            "example.com".to_string(),
        )
    }

    #[test]
    fn new_requests_are_prepended() {
        let mut store = RequestStore::new();
        store.upsert_new(request("a"));
        store.upsert_new(request("b"));
        store.upsert_new(request("c"));

        let ids: Vec<_> = store.snapshot().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn duplicate_upsert_overwrites_in_place() {
        let mut store = RequestStore::new();
        store.upsert_new(request("a"));
        store.upsert_new(request("b"));

        let mut replacement = request("a");
        replacement.host = "replaced.example.com".to_string();
        assert!(store.upsert_new(replacement));

        assert_eq!(store.len(), 2);
        let ids: Vec<_> = store.snapshot().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "a"], "position is kept");
        assert_eq!(store.get("a").unwrap().host, "replaced.example.com");
    }

    #[test]
    fn update_on_missing_id_is_a_noop() {
        let mut store = RequestStore::new();
        store.upsert_new(request("a"));
        assert!(!store.update("ghost", |req| req.state = RequestState::Done));
        assert_eq!(store.get("a").unwrap().state, RequestState::Created);
    }

    #[test]
    fn merge_history_inserts_at_offset_preserving_order() {
        let mut store = RequestStore::new();
        store.upsert_new(request("live2"));
        store.upsert_new(request("live1"));

        let inserted = store.merge_history(1, vec![request("h1"), request("h2")]);
        assert_eq!(inserted, 2);

        let ids: Vec<_> = store.snapshot().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["live1", "h1", "h2", "live2"]);
    }

    #[test]
    fn merge_history_skips_ids_already_present() {
        let mut store = RequestStore::new();
        store.upsert_new(request("a"));

        let inserted = store.merge_history(1, vec![request("a"), request("b")]);
        assert_eq!(inserted, 1);
        assert_eq!(store.len(), 2);

        let ids: Vec<_> = store.snapshot().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn merge_history_clamps_offset_past_the_end() {
        let mut store = RequestStore::new();
        store.upsert_new(request("a"));

        let inserted = store.merge_history(40, vec![request("b")]);
        assert_eq!(inserted, 1);
        let ids: Vec<_> = store.snapshot().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn apply_edit_overwrites_editable_fields_only() {
        let mut store = RequestStore::new();
        let mut original = request("a");
        original.state = RequestState::WaitingApproval;
        original.bytes_transferred = Some(42);
        store.upsert_new(original);

        let mut edited = request("a");
        edited.method = Some("PUT".to_string());
        edited.path = Some("/edited".to_string());
        edited.body = Some("payload".to_string());
        assert!(store.apply_edit(&edited));

        let entity = store.get("a").unwrap();
        assert_eq!(entity.method.as_deref(), Some("PUT"));
        assert_eq!(entity.path.as_deref(), Some("/edited"));
        assert_eq!(entity.body.as_deref(), Some("payload"));
        assert_eq!(entity.state, RequestState::WaitingApproval, "state untouched");
        assert_eq!(entity.bytes_transferred, Some(42), "progress untouched");
    }

    #[test]
    fn filtered_snapshot_applies_the_filter() {
        let mut store = RequestStore::new();
        let mut done = request("a");
        done.state = RequestState::Done;
        store.upsert_new(done);
        store.upsert_new(request("b"));

        let filter = RequestFilter {
            state: Some(RequestState::Done),
            ..Default::default()
        };
        let matches = store.filtered(&filter);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
    }
}
