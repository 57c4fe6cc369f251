//! Fuzz target: structured inbound frames
//!
//! Feeds semi-valid structured frames into a server endpoint. Inputs are
//! structurally well-formed (valid stream ids, bounded payloads) with
//! random field values, which exercises admission, dispatch, and
//! flow-control accounting more deeply than raw bytes would.

#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use h2stream::{ErrorCode, Frame, H2Connection, Priority, StreamId};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum FuzzFrame {
    Data {
        stream_id: u32,
        payload: Vec<u8>,
        pad: Option<u8>,
        end_stream: bool,
    },
    Headers {
        stream_id: u32,
        /// Indexed static-table fields keep the block decodable.
        indexed: Vec<u8>,
        with_priority: bool,
        dep: u32,
        exclusive: bool,
        weight: u16,
        end_stream: bool,
    },
    Priority {
        stream_id: u32,
        dep: u32,
        exclusive: bool,
        weight: u16,
    },
    RstStream {
        stream_id: u32,
        code: u32,
    },
    PushPromise {
        stream_id: u32,
        promised_id: u32,
    },
    WindowUpdate {
        stream_id: u32,
        increment: u32,
    },
}

impl FuzzFrame {
    fn to_frame(&self) -> Frame {
        let sid = |raw: u32| StreamId(raw & 0x7FFF_FFFF);
        match self {
            Self::Data {
                stream_id,
                payload,
                pad,
                end_stream,
            } => {
                let mut payload = payload.clone();
                payload.truncate(16_384);
                Frame::Data {
                    stream_id: sid(*stream_id),
                    data: Bytes::from(payload),
                    pad_length: *pad,
                    end_stream: *end_stream,
                }
            },
            Self::Headers {
                stream_id,
                indexed,
                with_priority,
                dep,
                exclusive,
                weight,
                end_stream,
            } => {
                // Static-table indexed fields (1..=61) decode without any
                // dynamic state.
                let block: Vec<u8> = indexed
                    .iter()
                    .take(32)
                    .map(|i| 0x80 | (i % 61 + 1))
                    .collect();
                Frame::Headers {
                    stream_id: sid(*stream_id),
                    block: Bytes::from(block),
                    priority: with_priority
                        .then(|| Priority::new(sid(*dep), *exclusive, *weight)),
                    end_stream: *end_stream,
                }
            },
            Self::Priority {
                stream_id,
                dep,
                exclusive,
                weight,
            } => Frame::Priority {
                stream_id: sid(*stream_id),
                priority: Priority::new(sid(*dep), *exclusive, *weight),
            },
            Self::RstStream { stream_id, code } => Frame::RstStream {
                stream_id: sid(*stream_id),
                error_code: ErrorCode::from_wire(*code),
            },
            Self::PushPromise {
                stream_id,
                promised_id,
            } => Frame::PushPromise {
                stream_id: sid(*stream_id),
                promised_id: sid(*promised_id),
                block: Bytes::from_static(&[0x82]),
            },
            Self::WindowUpdate {
                stream_id,
                increment,
            } => Frame::WindowUpdate {
                stream_id: sid(*stream_id),
                increment: *increment,
            },
        }
    }
}

fuzz_target!(|frames: Vec<FuzzFrame>| {
    let mut server = H2Connection::server();

    for frame in &frames {
        // Errors are expected; panics and self-dependencies are not.
        let _ = server.receive_frame(frame.to_frame());
        while let Some(frame) = server.poll_frame() {
            drop(frame);
        }
        while server.poll_event().is_some() {}
    }

    for id in server.children(StreamId(0)) {
        assert_ne!(server.parent(id), Some(id));
    }
    server.reap_closed();
});
