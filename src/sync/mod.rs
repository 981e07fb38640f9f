//! Stream synchronization engine
//!
//! Incrementally builds the in-memory request record from decoded stream
//! events: a passive ordered store, a pure per-action reducer, a FIFO
//! buffering gate, and the session that serializes all of it behind one
//! ingress point.

pub mod buffer;
pub mod reducer;
pub mod session;
pub mod store;

pub use buffer::{BufferMode, EventBuffer};
pub use session::{SyncNotification, SyncSession};
pub use store::RequestStore;
