use bytes::Bytes;

use crate::error::ErrorCode;
use crate::priority::Priority;
use crate::stream::StreamId;

/// Structured frame values exchanged with the byte-level codec.
///
/// The stream layer deals in these values only; reading and writing the
/// 9-byte frame header, padding octets, and CONTINUATION reassembly belong
/// to the codec. A `Headers` or `PushPromise` block is therefore always a
/// complete HPACK-encoded fragment, and a `Data` frame records the padding
/// it was (or will be) carried with, because padding counts against flow
/// control (RFC 7540 §6.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// DATA frame (type 0x0)
    Data {
        /// Target stream
        stream_id:  StreamId,
        /// Unpadded payload octets
        data:       Bytes,
        /// Padding length, if the PADDED flag is set
        pad_length: Option<u8>,
        /// END_STREAM flag
        end_stream: bool,
    },
    /// HEADERS frame (type 0x1), with CONTINUATIONs already assembled
    Headers {
        /// Target stream
        stream_id:  StreamId,
        /// Complete HPACK-encoded header block
        block:      Bytes,
        /// Priority fields, if the PRIORITY flag is set
        priority:   Option<Priority>,
        /// END_STREAM flag
        end_stream: bool,
    },
    /// PRIORITY frame (type 0x2)
    Priority {
        /// Target stream
        stream_id: StreamId,
        /// The new priority record
        priority:  Priority,
    },
    /// RST_STREAM frame (type 0x3)
    RstStream {
        /// Target stream
        stream_id:  StreamId,
        /// Reason for the reset
        error_code: ErrorCode,
    },
    /// PUSH_PROMISE frame (type 0x5), with CONTINUATIONs already assembled
    PushPromise {
        /// Stream the promise is sent on
        stream_id:   StreamId,
        /// Stream reserved for the promised response
        promised_id: StreamId,
        /// Complete HPACK-encoded block of the synthesized request headers
        block:       Bytes,
    },
    /// WINDOW_UPDATE frame (type 0x8); stream id 0 targets the connection
    WindowUpdate {
        /// Target stream, or 0 for the connection window
        stream_id: StreamId,
        /// Octets of credit to add
        increment: u32,
    },
}

impl Frame {
    /// The stream this frame targets (0 for connection-level WINDOW_UPDATE).
    pub fn stream_id(&self) -> StreamId {
        match self {
            Self::Data { stream_id, .. }
            | Self::Headers { stream_id, .. }
            | Self::Priority { stream_id, .. }
            | Self::RstStream { stream_id, .. }
            | Self::PushPromise { stream_id, .. }
            | Self::WindowUpdate { stream_id, .. } => *stream_id,
        }
    }

    /// Octets this frame charges against flow-control windows: the payload
    /// plus, when padded, the pad-length octet and the padding itself.
    /// Only DATA is flow controlled; every other frame charges zero.
    pub fn flow_controlled_len(&self) -> u32 {
        match self {
            Self::Data {
                data, pad_length, ..
            } => {
                let padding = match pad_length {
                    Some(n) => 1 + *n as u32,
                    None => 0,
                };
                data.len() as u32 + padding
            },
            _ => 0,
        }
    }

    /// Frame name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Data { .. } => "DATA",
            Self::Headers { .. } => "HEADERS",
            Self::Priority { .. } => "PRIORITY",
            Self::RstStream { .. } => "RST_STREAM",
            Self::PushPromise { .. } => "PUSH_PROMISE",
            Self::WindowUpdate { .. } => "WINDOW_UPDATE",
        }
    }
}
