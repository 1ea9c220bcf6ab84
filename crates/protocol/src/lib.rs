//! Debugger Protocol - Wire Types and Codec
//!
//! The packet layer of the debugger agent. Everything here is synchronous and
//! runtime-free: the agent crate owns sockets, tasks and timeouts.
//!
//! ## Core Design
//!
//! ```text
//! raw JSON string → decode() → Packet::{Request, Response, Event}
//!                                          ↓
//!                                 HandleTable<'packet> (borrowed refs)
//! ```
//!
//! A handle table borrows from the packet it was built from, so it cannot
//! outlive the message. No handle state survives between packets.

pub mod codec;
pub mod error;
pub mod handles;
pub mod types;

pub use codec::{decode, encode, encode_packet, resolve_handle};
pub use error::{DecodeError, ProtocolError, Result};
pub use handles::{HandleTable, DEFAULT_MAX_REF_DEPTH};
pub use types::*;
