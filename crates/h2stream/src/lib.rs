#![warn(missing_docs)]
//! HTTP/2 stream state machine with per-stream flow control and priority
//! tracking.
//!
//! This crate implements the stream layer of an HTTP/2 endpoint (RFC 7540
//! §5): the seven-state lifecycle machine, send/receive dispatch for
//! HEADERS, DATA, PRIORITY, RST_STREAM and PUSH_PROMISE, credit-based flow
//! control at stream and connection level, and the priority dependency
//! forest. It is sans-io: the byte-level frame codec, connection preface,
//! and transport are external collaborators that exchange structured
//! [`Frame`] values with it.
//!
//! # Key types
//!
//! - [`H2Connection`] — one endpoint of a connection: the stream registry
//!   plus shared HPACK, settings, and window state. Send operations queue
//!   frames for the codec; [`H2Connection::receive_frame`] dispatches
//!   inbound frames and surfaces [`H2Event`]s.
//! - [`H2Stream`] — a single stream: its state machine, two flow-control
//!   [`Window`]s, [`Priority`] record, and the most recently received
//!   headers and DATA payload.
//! - [`H2ConnectionTable`] — thread-safe table of many connections keyed
//!   by an arbitrary `K`, serializing all stream operations per key.
//!
//! # Examples
//!
//! ## Minimal exchange between two endpoints
//!
//! ```
//! use h2stream::{H2Connection, H2Event};
//!
//! let mut client = H2Connection::client();
//! let mut server = H2Connection::server();
//!
//! // Open a stream and send a request that finishes our side.
//! let id = client.open_stream();
//! client.send_headers(
//!     id,
//!     None,
//!     &[
//!         (":method".into(), "GET".into()),
//!         (":path".into(), "/".into()),
//!         (":scheme".into(), "https".into()),
//!         (":authority".into(), "example.com".into()),
//!     ],
//!     true,
//! )?;
//!
//! // Ship the queued frames through the codec to the peer.
//! while let Some(frame) = client.poll_frame() {
//!     server.receive_frame(frame)?;
//! }
//!
//! while let Some(event) = server.poll_event() {
//!     if let H2Event::HeadersReceived { stream_id, .. } = event {
//!         println!("request on stream {stream_id}");
//!     }
//! }
//! # Ok::<(), h2stream::StreamError>(())
//! ```
//!
//! # Feature flags
//!
//! - **`tracing`** — emit `tracing::warn!` events for non-fatal protocol
//!   issues (ignored frames, stream reaping, etc.)

mod connection;
mod error;
mod frame;
mod priority;
mod stream;
mod window;


#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { ::tracing::warn!($($arg)*) }
}
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}
use std::{hash::Hash, sync::Mutex};

use dashmap::DashMap;

pub use connection::{ConnCore, H2Connection, H2Event, H2Limits, H2Settings, PushStreams, Role};
pub use error::{ErrorCode, StreamError, StreamErrorKind};
pub use frame::Frame;
pub use priority::{DEFAULT_WEIGHT, Priority};
pub use stream::{
    DataOptions,
    FieldList,
    H2Stream,
    StreamEvent,
    StreamId,
    StreamState,
};
pub use window::{DEFAULT_WINDOW_SIZE, MAX_WINDOW_SIZE, Window};
pub(crate) use trace_warn;

/// Thread-safe table of HTTP/2 connections with generic keys.
///
/// Uses `DashMap<K, Mutex<H2Connection>>` to provide per-key
/// serialization. The DashMap shard lock is held only briefly (to look up
/// or insert the entry), while the per-key Mutex serializes concurrent
/// same-key stream operations, making each operation atomic with respect
/// to every other operation on the same connection.
pub struct H2ConnectionTable<K> {
    connections: DashMap<K, Mutex<H2Connection>>,
}

impl<K: Hash + Eq + Clone> H2ConnectionTable<K> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection under `key`, replacing any previous one.
    pub fn insert(&self, key: K, connection: H2Connection) {
        self.connections.insert(key, Mutex::new(connection));
    }

    /// Run `f` against the connection registered under `key`, holding its
    /// lock for the duration. Returns `None` if the key is unknown.
    pub fn with<T>(&self, key: &K, f: impl FnOnce(&mut H2Connection) -> T) -> Option<T> {
        let entry = self.connections.get(key)?;
        let mut connection = entry.lock().unwrap_or_else(|e| e.into_inner());
        Some(f(&mut connection))
    }

    /// Run `f` against the connection registered under `key`, creating it
    /// with `make` first if the key is unknown.
    pub fn with_or_insert<T>(
        &self,
        key: K,
        make: impl FnOnce() -> H2Connection,
        f: impl FnOnce(&mut H2Connection) -> T,
    ) -> T {
        // Atomic insert-if-absent
        self.connections
            .entry(key.clone())
            .or_insert_with(|| Mutex::new(make()));

        // Shared shard read lock + per-key mutex lock
        let entry = self.connections.get(&key).expect("entry was just ensured");
        let mut connection = entry.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut connection)
    }

    /// Remove and return the connection under `key` (call when the
    /// transport closes).
    pub fn remove(&self, key: &K) -> Option<H2Connection> {
        self.connections
            .remove(key)
            .map(|(_, mutex)| mutex.into_inner().unwrap_or_else(|e| e.into_inner()))
    }

    /// Check if a connection is registered under `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.connections.contains_key(key)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl<K: Hash + Eq + Clone> Default for H2ConnectionTable<K> {
    fn default() -> Self {
        Self::new()
    }
}
