//! Wire protocol for the proxy's streaming connection
//!
//! Text frames of the form `"<ACTION> <json>"`, in both directions: inbound
//! events describing request lifecycle progress, outbound commands carrying
//! approve/cancel/update intents.

pub mod codec;
pub mod command;
pub mod event;

pub use codec::{CodecError, RawFrame};
pub use command::Command;
pub use event::{Event, ProtocolError};
