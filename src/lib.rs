//! # Periscope Core
//!
//! Client-side state synchronization engine for the Periscope traffic
//! inspector. Consumes the event stream of a remote intercepting proxy over
//! a single persistent connection and maintains a consistent, queryable
//! in-memory record of in-flight and completed requests.
//!
//! ## Features
//!
//! - Text frame codec for the `"<ACTION> <JSON>"` wire format
//! - Ordered, id-keyed request store with newest-first iteration
//! - Per-action reducer driving the request lifecycle state machine
//! - Pause/buffer/replay gating for frozen views of the store
//! - Fire-and-forget approve/cancel/update commands
//! - REST access to proxy configuration and request history
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Inspector UI (out of scope)              │
//! ├──────────────────────────────────────────────────────────┤
//! │                   Periscope Core (Rust)                  │
//! │  ┌────────────┐  ┌───────┐  ┌─────────┐  ┌────────────┐  │
//! │  │ Connection │  │ Codec │  │ Reducer │  │  Request   │  │
//! │  │  Manager   │──│       │──│ +Buffer │──│   Store    │  │
//! │  └────────────┘  └───────┘  └─────────┘  └────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//!                ▲ requestsWS stream / REST ▲
//!                └───── remote proxy ───────┘
//! ```

pub mod api;
pub mod connection;
pub mod models;
pub mod protocol;
pub mod sync;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
