use crate::stream::{StreamEvent, StreamId, StreamState};

/// RFC 7540 §7 error codes, as carried by RST_STREAM (and GOAWAY) frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// Graceful shutdown, no error
    NoError = 0x0,
    /// Generic protocol violation
    ProtocolError = 0x1,
    /// Unexpected internal failure
    InternalError = 0x2,
    /// Flow-control limits violated
    FlowControlError = 0x3,
    /// Frame received on an already closed stream
    StreamClosed = 0x5,
    /// Frame with an invalid size
    FrameSizeError = 0x6,
    /// Stream refused before any processing
    RefusedStream = 0x7,
    /// Stream no longer needed by the endpoint
    Cancel = 0x8,
    /// Header compression state cannot be maintained
    CompressionError = 0x9,
}

impl ErrorCode {
    /// The 32-bit value carried on the wire.
    pub fn to_wire(self) -> u32 {
        self as u32
    }

    /// Decode a wire value. Unknown or unsupported codes are treated as
    /// `InternalError` (RFC 7540 §7 permits this equivalence).
    pub fn from_wire(value: u32) -> Self {
        match value {
            0x0 => Self::NoError,
            0x1 => Self::ProtocolError,
            0x2 => Self::InternalError,
            0x3 => Self::FlowControlError,
            0x5 => Self::StreamClosed,
            0x6 => Self::FrameSizeError,
            0x7 => Self::RefusedStream,
            0x8 => Self::Cancel,
            0x9 => Self::CompressionError,
            _ => Self::InternalError,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoError => "NO_ERROR",
            Self::ProtocolError => "PROTOCOL_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::FlowControlError => "FLOW_CONTROL_ERROR",
            Self::StreamClosed => "STREAM_CLOSED",
            Self::FrameSizeError => "FRAME_SIZE_ERROR",
            Self::RefusedStream => "REFUSED_STREAM",
            Self::Cancel => "CANCEL",
            Self::CompressionError => "COMPRESSION_ERROR",
        };
        write!(f, "{name}")
    }
}

/// Classification of stream-level errors (public API)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// Event not legal in the stream's current state (§5.1 state machine)
    IllegalTransition {
        /// State the stream was in when the event arrived
        state: StreamState,
        /// The offending event
        event: StreamEvent,
    },
    /// Priority record would make a stream depend on itself
    SelfDependency,
    /// Window expansion past the 2^31 - 1 flow-control maximum
    WindowOverflow,
    /// Window charge below the flow-control minimum
    WindowUnderflow,
    /// Window already overdrawn; no further frames may be charged until a
    /// WINDOW_UPDATE refills it
    WindowExhausted,
    /// Frame larger than the available credit, and the caller required
    /// credit up front
    InsufficientCredit,
    /// WINDOW_UPDATE carried a zero increment
    ZeroWindowIncrement,
    /// HPACK encode/decode failed (detail in the `String`)
    Hpack(String),
    /// Peer sent a frame for a stream that is already closed
    StreamClosed,
    /// Frame references a stream id the registry does not know
    UnknownStream,
    /// Stream id violates parity or monotonicity rules
    InvalidStreamId,
    /// Remote peer exceeded the concurrent stream limit
    StreamLimitExceeded,
    /// Push promise not permitted by endpoint role or peer settings
    PushDisallowed,
}

impl StreamErrorKind {
    /// The RFC 7540 error code this kind maps to when the connection
    /// converts the failure into an outbound RST_STREAM.
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            Self::IllegalTransition { .. }
            | Self::SelfDependency
            | Self::ZeroWindowIncrement
            | Self::UnknownStream
            | Self::InvalidStreamId
            | Self::PushDisallowed => ErrorCode::ProtocolError,
            Self::WindowOverflow
            | Self::WindowUnderflow
            | Self::WindowExhausted
            | Self::InsufficientCredit => ErrorCode::FlowControlError,
            Self::Hpack(_) => ErrorCode::CompressionError,
            Self::StreamClosed => ErrorCode::StreamClosed,
            Self::StreamLimitExceeded => ErrorCode::RefusedStream,
        }
    }
}

impl std::fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IllegalTransition { state, event } => {
                write!(f, "{event} not permitted in stream state {state}")
            },
            Self::SelfDependency => write!(f, "stream priority depends on itself"),
            Self::WindowOverflow => {
                write!(f, "window update would exceed the 2^31-1 flow-control limit")
            },
            Self::WindowUnderflow => write!(f, "window charge below the flow-control minimum"),
            Self::WindowExhausted => write!(f, "flow-control window exhausted"),
            Self::InsufficientCredit => {
                write!(f, "frame larger than the available flow-control credit")
            },
            Self::ZeroWindowIncrement => write!(f, "WINDOW_UPDATE with zero increment"),
            Self::Hpack(msg) => write!(f, "HPACK error: {msg}"),
            Self::StreamClosed => write!(f, "frame received on a closed stream"),
            Self::UnknownStream => write!(f, "frame references an unknown stream"),
            Self::InvalidStreamId => {
                write!(f, "stream id violates parity or monotonicity rules")
            },
            Self::StreamLimitExceeded => write!(f, "concurrent stream limit reached"),
            Self::PushDisallowed => {
                write!(f, "push promise not permitted by endpoint role or peer settings")
            },
        }
    }
}

/// Stream-level error with optional stream context (public API)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    /// What went wrong
    pub kind:      StreamErrorKind,
    /// The stream that caused the error, if applicable
    pub stream_id: Option<StreamId>,
}

impl StreamError {
    /// Create an error without stream context.
    pub fn new(kind: StreamErrorKind) -> Self {
        Self {
            kind,
            stream_id: None,
        }
    }

    /// Create an error with the offending stream id attached.
    pub fn with_stream(kind: StreamErrorKind, stream_id: StreamId) -> Self {
        Self {
            kind,
            stream_id: Some(stream_id),
        }
    }

    /// Attach a stream id if none was recorded yet.
    pub(crate) fn on_stream(mut self, stream_id: StreamId) -> Self {
        self.stream_id.get_or_insert(stream_id);
        self
    }

    /// The RFC 7540 error code this error maps to on the wire.
    pub fn wire_code(&self) -> ErrorCode {
        self.kind.wire_code()
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(sid) = self.stream_id {
            write!(f, "[stream {sid}] {}", self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl std::error::Error for StreamError {}
