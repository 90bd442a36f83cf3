//! Live-reload channel.
//!
//! A minimal WebSocket subset written directly on top of the upgraded
//! connection: clients send `watch:<entry>` and receive `update` whenever
//! that entry is rebuilt.

mod connection;
mod frame;
mod handshake;
mod sessions;

pub(crate) use connection::serve_socket;
pub use frame::FrameError;
pub(crate) use handshake::{accept_key, is_upgrade_request};
pub(crate) use sessions::SessionRegistry;
