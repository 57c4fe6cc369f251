#![allow(dead_code)]
//! Endpoint-pair helpers for integration tests
//!
//! These functions wire two in-memory endpoints together so tests can
//! drive full request/response exchanges and observe both state machines.

use h2stream::{ErrorCode, FieldList, H2Connection, H2Event, StreamId};

/// Request pseudo-headers for `path`.
pub fn request_fields(path: &str) -> FieldList {
    vec![
        (":method".to_string(), "GET".to_string()),
        (":path".to_string(), path.to_string()),
        (":scheme".to_string(), "https".to_string()),
        (":authority".to_string(), "example.com".to_string()),
    ]
}

/// Response pseudo-headers with the given status.
pub fn response_fields(status: u16) -> FieldList {
    vec![(":status".to_string(), status.to_string())]
}

/// A fresh client/server endpoint pair.
pub fn connected_pair() -> (H2Connection, H2Connection) {
    (H2Connection::client(), H2Connection::server())
}

/// Move all queued frames from `from` into `to`, expecting no protocol
/// errors. Returns the number of frames delivered.
pub fn pump(from: &mut H2Connection, to: &mut H2Connection) -> usize {
    let mut delivered = 0;
    while let Some(frame) = from.poll_frame() {
        to.receive_frame(frame).expect("peer should accept frame");
        delivered += 1;
    }
    delivered
}

/// Open a client stream, send its request headers, and deliver them.
pub fn open_request_stream(
    client: &mut H2Connection,
    server: &mut H2Connection,
    path: &str,
    end_stream: bool,
) -> StreamId {
    let id = client.open_stream();
    client
        .send_headers(id, None, &request_fields(path), end_stream)
        .expect("request headers should be legal");
    pump(client, server);
    id
}

/// Drain all pending events from `conn`.
pub fn drain_events(conn: &mut H2Connection) -> Vec<H2Event> {
    let mut events = Vec::new();
    while let Some(ev) = conn.poll_event() {
        events.push(ev);
    }
    events
}

/// Close-event payloads observed for `id`, in order.
pub fn closed_events(events: &[H2Event], id: StreamId) -> Vec<Option<ErrorCode>> {
    events
        .iter()
        .filter_map(|ev| match ev {
            H2Event::Closed { stream_id, error } if *stream_id == id => Some(*error),
            _ => None,
        })
        .collect()
}
