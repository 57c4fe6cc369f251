//! Fuzz target: stream operation sequences
//!
//! Drives arbitrary send-side operations against a client/server pair,
//! shuttling frames between them, and asserts the structural invariants
//! the state machine guarantees: closed is absorbing, and no stream ever
//! depends on itself.

#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use h2stream::{
    DataOptions,
    ErrorCode,
    H2Connection,
    Priority,
    StreamId,
    StreamState,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Open,
    SendHeaders { stream: u8, end_stream: bool },
    SendData { stream: u8, len: u8, end_stream: bool, pad: Option<u8> },
    SendReset { stream: u8, code: u32 },
    SendPushPromise { stream: u8 },
    SendFailure { stream: u8, status: u16 },
    ApplyPriority { stream: u8, dep: u8, exclusive: bool, weight: u16 },
    SendWindowUpdate { stream: u8, increment: u32 },
    PumpClientToServer,
    PumpServerToClient,
    ReapClient,
    ReapServer,
}

fn pick(ids: &[StreamId], index: u8) -> Option<StreamId> {
    if ids.is_empty() {
        None
    } else {
        Some(ids[index as usize % ids.len()])
    }
}

fn fields() -> Vec<(String, String)> {
    vec![
        (":method".to_string(), "GET".to_string()),
        (":path".to_string(), "/".to_string()),
    ]
}

fn pump(from: &mut H2Connection, to: &mut H2Connection) {
    while let Some(frame) = from.poll_frame() {
        // Protocol errors are expected under fuzzing; panics are not.
        let _ = to.receive_frame(frame);
    }
}

fn check_invariants(conn: &H2Connection, ids: &[StreamId], closed: &[StreamId]) {
    for id in closed {
        if let Some(stream) = conn.stream(*id) {
            assert_eq!(
                stream.state(),
                StreamState::Closed,
                "closed must be absorbing for stream {id}"
            );
        }
    }
    for id in ids {
        if conn.stream(*id).is_some() {
            assert_ne!(conn.parent(*id), Some(*id), "self-dependency on stream {id}");
        }
    }
}

fuzz_target!(|ops: Vec<Op>| {
    let mut client = H2Connection::client();
    let mut server = H2Connection::server();
    let mut ids: Vec<StreamId> = Vec::new();

    for op in ops {
        match op {
            Op::Open => {
                if ids.len() < 64 {
                    ids.push(client.open_stream());
                }
            },
            Op::SendHeaders { stream, end_stream } => {
                if let Some(id) = pick(&ids, stream) {
                    let _ = client.send_headers(id, None, &fields(), end_stream);
                }
            },
            Op::SendData {
                stream,
                len,
                end_stream,
                pad,
            } => {
                if let Some(id) = pick(&ids, stream) {
                    let opts = DataOptions {
                        pad_length: pad,
                        ..DataOptions::default()
                    };
                    let payload = Bytes::from(vec![0u8; len as usize]);
                    let _ = client.send_data_opts(id, payload, end_stream, opts);
                }
            },
            Op::SendReset { stream, code } => {
                if let Some(id) = pick(&ids, stream) {
                    let _ = client.send_reset(id, ErrorCode::from_wire(code));
                }
            },
            Op::SendPushPromise { stream } => {
                if let Some(id) = pick(&ids, stream) {
                    if let Ok(promised) = server.send_push_promise(id, &fields()) {
                        ids.push(promised);
                    }
                }
            },
            Op::SendFailure { stream, status } => {
                if let Some(id) = pick(&ids, stream) {
                    let _ = server.send_failure(id, status, "failed");
                }
            },
            Op::ApplyPriority {
                stream,
                dep,
                exclusive,
                weight,
            } => {
                if let Some(id) = pick(&ids, stream) {
                    let dep = pick(&ids, dep).unwrap_or(StreamId(0));
                    let _ = client.apply_priority(id, Priority::new(dep, exclusive, weight));
                }
            },
            Op::SendWindowUpdate { stream, increment } => {
                if let Some(id) = pick(&ids, stream) {
                    let _ = client.send_window_update(id, increment);
                }
            },
            Op::PumpClientToServer => pump(&mut client, &mut server),
            Op::PumpServerToClient => pump(&mut server, &mut client),
            Op::ReapClient => {
                client.reap_closed();
            },
            Op::ReapServer => {
                server.reap_closed();
            },
        }

        let closed: Vec<StreamId> = ids
            .iter()
            .copied()
            .filter(|id| {
                client
                    .stream(*id)
                    .is_some_and(|s| s.state() == StreamState::Closed)
            })
            .collect();
        check_invariants(&client, &ids, &closed);
        check_invariants(&server, &ids, &[]);

        while client.poll_event().is_some() {}
        while server.poll_event().is_some() {}
    }
});
