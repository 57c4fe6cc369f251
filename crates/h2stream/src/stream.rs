use bytes::Bytes;

use crate::connection::{ConnCore, H2Event, PushStreams};
use crate::error::{ErrorCode, StreamError, StreamErrorKind};
use crate::frame::Frame;
use crate::priority::{DEFAULT_WEIGHT, Priority};
use crate::window::Window;

/// Newtype for HTTP/2 stream identifiers (RFC 7540 §5.1.1: 31-bit unsigned
/// integer). Id 0 names the connection itself and never appears in the
/// stream registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u32);

impl StreamId {
    /// True for client-initiated streams (odd ids).
    pub fn is_client_initiated(self) -> bool {
        self.0 % 2 == 1
    }

    /// True for server-initiated streams (even ids, excluding 0).
    pub fn is_server_initiated(self) -> bool {
        self.0 != 0 && self.0 % 2 == 0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StreamId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl From<StreamId> for u32 {
    fn from(v: StreamId) -> Self {
        v.0
    }
}

/// Decoded header field list, in wire order.
pub type FieldList = Vec<(String, String)>;

/// Lifecycle state of a stream (RFC 7540 §5.1).
///
/// `Idle` is initial, `Closed` is terminal and absorbing; every transition
/// between them is driven by exactly one [`StreamEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// No frames exchanged yet
    Idle,
    /// Reserved by a PUSH_PROMISE we sent
    ReservedLocal,
    /// Reserved by a PUSH_PROMISE the peer sent
    ReservedRemote,
    /// Both sides may send
    Open,
    /// We sent END_STREAM; only the peer may still send
    HalfClosedLocal,
    /// Peer sent END_STREAM; only we may still send
    HalfClosedRemote,
    /// Terminal
    Closed,
}

impl StreamState {
    /// A stream is active iff it is neither idle nor closed.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle | Self::Closed)
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ReservedLocal => "reserved (local)",
            Self::ReservedRemote => "reserved (remote)",
            Self::Open => "open",
            Self::HalfClosedLocal => "half-closed (local)",
            Self::HalfClosedRemote => "half-closed (remote)",
            Self::Closed => "closed",
        };
        write!(f, "{name}")
    }
}

/// Events that drive the stream state machine. HEADERS and DATA events
/// carry the END_STREAM flag, which decides between staying open and
/// half-closing the sending side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// We emit HEADERS
    SendHeaders {
        /// END_STREAM flag
        end_stream: bool,
    },
    /// We emit DATA
    SendData {
        /// END_STREAM flag
        end_stream: bool,
    },
    /// We emit RST_STREAM
    SendReset,
    /// We emit PUSH_PROMISE on this stream
    SendPushPromise,
    /// Peer HEADERS arrived
    ReceiveHeaders {
        /// END_STREAM flag
        end_stream: bool,
    },
    /// Peer DATA arrived
    ReceiveData {
        /// END_STREAM flag
        end_stream: bool,
    },
    /// Peer RST_STREAM arrived
    ReceiveReset,
    /// Peer PUSH_PROMISE arrived on this stream
    ReceivePushPromise,
    /// This stream was reserved by a PUSH_PROMISE we sent
    ReserveLocal,
    /// This stream was reserved by a PUSH_PROMISE the peer sent
    ReserveRemote,
}

impl std::fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SendHeaders { .. } => "send_headers",
            Self::SendData { .. } => "send_data",
            Self::SendReset => "send_reset_stream",
            Self::SendPushPromise => "send_push_promise",
            Self::ReceiveHeaders { .. } => "receive_headers",
            Self::ReceiveData { .. } => "receive_data",
            Self::ReceiveReset => "receive_reset_stream",
            Self::ReceivePushPromise => "receive_push_promise",
            Self::ReserveLocal => "reserve_local",
            Self::ReserveRemote => "reserve_remote",
        };
        write!(f, "{name}")
    }
}

/// Options for [`H2Stream::send_data_opts`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DataOptions {
    /// Refuse (FLOW_CONTROL_ERROR) instead of overdrawing when the frame is
    /// larger than the credit available on either window. When false, the
    /// charge may take a window negative by one frame's worth; the next
    /// DATA is then refused until a WINDOW_UPDATE refills the window.
    pub require_credit: bool,
    /// Padding the codec will carry this frame with. Padding counts against
    /// flow control (pad-length octet plus padding octets).
    pub pad_length:     Option<u8>,
}

/// A single HTTP/2 stream: the state machine, its two flow-control
/// windows, its priority record, and the most recently received header
/// list and DATA payload as the application's read surface.
///
/// Streams are owned by the connection registry. Every operation takes the
/// connection's [`ConnCore`] — the connection minus its registry — which
/// supplies HPACK coding, frame output, connection-level windows, and
/// push-promise stream allocation.
#[derive(Debug)]
pub struct H2Stream {
    pub(crate) id: StreamId,
    pub(crate) state: StreamState,
    /// Octets the peer may still send us.
    pub(crate) local_window: Window,
    /// Octets we may still send the peer.
    pub(crate) remote_window: Window,
    pub(crate) priority: Priority,
    /// Most recently received decoded header list.
    pub(crate) headers: FieldList,
    /// Most recently received unpadded DATA payload.
    pub(crate) data: Bytes,
    /// Error code recorded when closure was caused by a reset.
    pub(crate) close_reason: Option<ErrorCode>,
    /// Whether we emitted the RST_STREAM that closed this stream. Late
    /// peer frames racing our reset are then dropped instead of rejected.
    pub(crate) reset_sent: bool,
}

impl H2Stream {
    pub(crate) fn new(id: StreamId, core: &ConnCore) -> Self {
        Self {
            id,
            state: StreamState::Idle,
            local_window: Window::new(core.local_settings().initial_window_size as i32),
            remote_window: Window::new(core.remote_settings().initial_window_size as i32),
            priority: Priority::default(),
            headers: Vec::new(),
            data: Bytes::new(),
            close_reason: None,
            reset_sent: false,
        }
    }

    /// Stream identifier.
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// True iff the stream is neither idle nor closed.
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Receive-side flow-control window (octets the peer may still send).
    pub fn local_window(&self) -> &Window {
        &self.local_window
    }

    /// Send-side flow-control window (octets we may still send).
    pub fn remote_window(&self) -> &Window {
        &self.remote_window
    }

    /// Current priority record.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Most recently received decoded header list.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Most recently received unpadded DATA payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Error code the stream closed with, if closure was caused by a reset.
    pub fn close_reason(&self) -> Option<ErrorCode> {
        self.close_reason
    }

    /// True iff this stream was closed by an RST_STREAM we emitted.
    pub fn reset_sent(&self) -> bool {
        self.reset_sent
    }

    /// The state transition table (RFC 7540 §5.1). Pure: computes the
    /// successor state for `event` or rejects it, so callers can validate
    /// before performing side effects.
    pub(crate) fn next_state(
        state: StreamState,
        event: StreamEvent,
    ) -> Result<StreamState, StreamErrorKind> {
        use StreamEvent as E;
        use StreamState as S;
        let next = match (state, event) {
            (S::Idle, E::SendHeaders { end_stream: true }) => S::HalfClosedLocal,
            (S::Idle, E::SendHeaders { end_stream: false }) => S::Open,
            (S::Idle, E::ReceiveHeaders { end_stream: true }) => S::HalfClosedRemote,
            (S::Idle, E::ReceiveHeaders { end_stream: false }) => S::Open,
            (S::Idle, E::ReserveLocal) => S::ReservedLocal,
            (S::Idle, E::ReserveRemote) => S::ReservedRemote,

            (S::ReservedLocal, E::SendHeaders { .. }) => S::HalfClosedRemote,
            (S::ReservedLocal, E::SendReset | E::ReceiveReset) => S::Closed,

            (S::ReservedRemote, E::ReceiveHeaders { .. }) => S::HalfClosedLocal,
            (S::ReservedRemote, E::SendReset | E::ReceiveReset) => S::Closed,

            (S::Open, E::SendHeaders { end_stream } | E::SendData { end_stream }) => {
                if end_stream {
                    S::HalfClosedLocal
                } else {
                    S::Open
                }
            },
            (S::Open, E::ReceiveHeaders { end_stream } | E::ReceiveData { end_stream }) => {
                if end_stream {
                    S::HalfClosedRemote
                } else {
                    S::Open
                }
            },
            (S::Open, E::SendReset | E::ReceiveReset) => S::Closed,

            // Trailers-style HEADERS after our END_STREAM change nothing.
            (S::HalfClosedLocal, E::SendHeaders { .. }) => S::HalfClosedLocal,
            (S::HalfClosedLocal, E::ReceiveHeaders { end_stream } | E::ReceiveData { end_stream }) => {
                if end_stream {
                    S::Closed
                } else {
                    S::HalfClosedLocal
                }
            },
            (S::HalfClosedLocal, E::SendReset | E::ReceiveReset) => S::Closed,

            (S::HalfClosedRemote, E::SendHeaders { end_stream } | E::SendData { end_stream }) => {
                if end_stream {
                    S::Closed
                } else {
                    S::HalfClosedRemote
                }
            },
            (S::HalfClosedRemote, E::SendReset | E::ReceiveReset) => S::Closed,

            (S::Open | S::HalfClosedRemote, E::SendPushPromise) => state,
            (S::Open | S::HalfClosedLocal, E::ReceivePushPromise) => state,

            (
                S::Closed,
                E::ReceiveHeaders { .. }
                | E::ReceiveData { .. }
                | E::ReceiveReset
                | E::ReceivePushPromise,
            ) => return Err(StreamErrorKind::StreamClosed),
            (state, event) => return Err(StreamErrorKind::IllegalTransition { state, event }),
        };
        Ok(next)
    }

    fn check(&self, event: StreamEvent) -> Result<StreamState, StreamError> {
        Self::next_state(self.state, event).map_err(|kind| StreamError::with_stream(kind, self.id))
    }

    /// Install `next`, routing terminal transitions through [`close`].
    ///
    /// [`close`]: Self::close
    fn commit(&mut self, core: &mut ConnCore, next: StreamState, reset_code: Option<ErrorCode>) {
        if next == StreamState::Closed {
            self.close(core, reset_code);
        } else {
            self.state = next;
        }
    }

    /// Terminal transition. Idempotent: the `Closed` event fires exactly
    /// once per stream; re-closing an already closed stream is a no-op.
    /// `error` is non-null only when closure was caused by a reset.
    pub(crate) fn close(&mut self, core: &mut ConnCore, error: Option<ErrorCode>) {
        if self.state == StreamState::Closed {
            return;
        }
        self.state = StreamState::Closed;
        self.close_reason = error;
        core.push_event(H2Event::Closed {
            stream_id: self.id,
            error,
        });
    }

    /// Reservation transition for a freshly allocated push stream.
    pub(crate) fn reserve(
        &mut self,
        core: &mut ConnCore,
        event: StreamEvent,
    ) -> Result<(), StreamError> {
        let next = self.check(event)?;
        self.commit(core, next, None);
        Ok(())
    }

    /// Replace the priority record. Rejects self-dependency; never alters
    /// stream state. Reparenting of siblings on exclusive insertion is the
    /// registry's job ([`H2Connection::apply_priority`]).
    ///
    /// [`H2Connection::apply_priority`]: crate::H2Connection::apply_priority
    pub fn set_priority(&mut self, priority: Priority) -> Result<(), StreamError> {
        if priority.stream_dependency == self.id {
            return Err(StreamError::with_stream(
                StreamErrorKind::SelfDependency,
                self.id,
            ));
        }
        self.priority = priority;
        Ok(())
    }

    /// Encode `fields` through the connection's HPACK encoder and emit a
    /// HEADERS frame, advancing the state machine. CONTINUATION splitting
    /// for blocks larger than the peer's maximum frame size is the codec's
    /// concern. An attached priority record also updates this stream's own
    /// record.
    pub fn send_headers(
        &mut self,
        core: &mut ConnCore,
        priority: Option<Priority>,
        fields: &[(String, String)],
        end_stream: bool,
    ) -> Result<(), StreamError> {
        let next = self.check(StreamEvent::SendHeaders { end_stream })?;
        if let Some(p) = priority {
            self.set_priority(p)?;
        }
        let block = core.encode_headers(fields).map_err(|e| e.on_stream(self.id))?;
        core.write_frame(Frame::Headers {
            stream_id: self.id,
            block,
            priority,
            end_stream,
        });
        self.commit(core, next, None);
        Ok(())
    }

    /// Emit a DATA frame with default options. See [`send_data_opts`].
    ///
    /// [`send_data_opts`]: Self::send_data_opts
    pub fn send_data(
        &mut self,
        core: &mut ConnCore,
        data: Bytes,
        end_stream: bool,
    ) -> Result<(), StreamError> {
        self.send_data_opts(core, data, end_stream, DataOptions::default())
    }

    /// Emit a DATA frame, charging its flow-controlled length (payload plus
    /// padding) against this stream's send window and the connection's send
    /// window.
    ///
    /// The charge may overdraw either window by one frame's worth; an
    /// already exhausted window refuses the frame outright. The stream does
    /// not buffer: splitting a payload across the available credit is the
    /// caller's responsibility (see
    /// [`H2Connection::available_send_window`]).
    ///
    /// [`H2Connection::available_send_window`]: crate::H2Connection::available_send_window
    pub fn send_data_opts(
        &mut self,
        core: &mut ConnCore,
        data: Bytes,
        end_stream: bool,
        opts: DataOptions,
    ) -> Result<(), StreamError> {
        let next = self.check(StreamEvent::SendData { end_stream })?;
        let frame = Frame::Data {
            stream_id: self.id,
            data,
            pad_length: opts.pad_length,
            end_stream,
        };
        let len = frame.flow_controlled_len();
        if self.remote_window.is_exhausted() || core.remote_window().is_exhausted() {
            return Err(StreamError::with_stream(
                StreamErrorKind::WindowExhausted,
                self.id,
            ));
        }
        if opts.require_credit
            && (len as i64 > self.remote_window.available() as i64
                || len as i64 > core.remote_window().available() as i64)
        {
            return Err(StreamError::with_stream(
                StreamErrorKind::InsufficientCredit,
                self.id,
            ));
        }
        self.remote_window
            .consume(len)
            .map_err(|e| e.on_stream(self.id))?;
        core.consume_remote_window(len)?;
        core.write_frame(frame);
        self.commit(core, next, None);
        Ok(())
    }

    /// Emit RST_STREAM with `error_code` and transition to closed. The
    /// close event carries the code. Illegal from idle and closed.
    pub fn send_reset(
        &mut self,
        core: &mut ConnCore,
        error_code: ErrorCode,
    ) -> Result<(), StreamError> {
        self.check(StreamEvent::SendReset)?;
        core.write_frame(Frame::RstStream {
            stream_id: self.id,
            error_code,
        });
        self.reset_sent = true;
        self.close(core, Some(error_code));
        Ok(())
    }

    /// Reserve a new stream for a pushed response: allocates the promised
    /// stream from the connection, parents it under this stream, moves it
    /// to reserved (local), and emits PUSH_PROMISE on this stream carrying
    /// the promised id and the synthesized request headers. Returns the
    /// promised stream for the caller to register and later respond on.
    pub fn send_push_promise(
        &mut self,
        core: &mut ConnCore,
        fields: &[(String, String)],
    ) -> Result<H2Stream, StreamError> {
        self.check(StreamEvent::SendPushPromise)?;
        let mut promised = core.create_push_promise_stream()?;
        promised.priority = Priority::new(self.id, false, DEFAULT_WEIGHT);
        promised.reserve(core, StreamEvent::ReserveLocal)?;
        let block = core.encode_headers(fields).map_err(|e| e.on_stream(self.id))?;
        core.write_frame(Frame::PushPromise {
            stream_id: self.id,
            promised_id: promised.id,
            block,
        });
        Ok(promised)
    }

    /// Trailers-style failure response: emits a `:status` + `reason`
    /// HEADERS with END_STREAM while headers may still be sent, otherwise
    /// falls back to RST_STREAM with PROTOCOL_ERROR.
    pub fn send_failure(
        &mut self,
        core: &mut ConnCore,
        status: u16,
        reason: &str,
    ) -> Result<(), StreamError> {
        if Self::next_state(self.state, StreamEvent::SendHeaders { end_stream: true }).is_ok() {
            let fields = vec![
                (":status".to_string(), status.to_string()),
                ("reason".to_string(), reason.to_string()),
            ];
            self.send_headers(core, None, &fields, true)
        } else {
            self.send_reset(core, ErrorCode::ProtocolError)
        }
    }

    /// Decode a received header block into the stored header list and
    /// advance the state machine.
    ///
    /// The block is decoded before the state check so the connection's
    /// HPACK table stays synchronized even when the frame is then rejected;
    /// the stored list and stream state change only on success.
    pub fn receive_headers(
        &mut self,
        core: &mut ConnCore,
        block: &[u8],
        end_stream: bool,
    ) -> Result<(), StreamError> {
        let fields = core.decode_headers(block).map_err(|e| e.on_stream(self.id))?;
        let next = self.check(StreamEvent::ReceiveHeaders { end_stream })?;
        self.headers = fields;
        core.push_event(H2Event::HeadersReceived {
            stream_id: self.id,
            end_stream,
        });
        self.commit(core, next, None);
        Ok(())
    }

    /// Store a received DATA payload, charging its flow-controlled length
    /// (payload plus padding) against this stream's receive window and the
    /// connection's receive window, and advance the state machine. A window
    /// already overdrawn by a previous frame refuses the charge.
    pub fn receive_data(
        &mut self,
        core: &mut ConnCore,
        data: Bytes,
        pad_length: Option<u8>,
        end_stream: bool,
    ) -> Result<(), StreamError> {
        let next = self.check(StreamEvent::ReceiveData { end_stream })?;
        if self.local_window.is_exhausted() || core.local_window().is_exhausted() {
            return Err(StreamError::with_stream(
                StreamErrorKind::WindowExhausted,
                self.id,
            ));
        }
        let padding = match pad_length {
            Some(n) => 1 + n as u32,
            None => 0,
        };
        let len = data.len() as u32 + padding;
        self.local_window
            .consume(len)
            .map_err(|e| e.on_stream(self.id))?;
        core.consume_local_window(len)?;
        self.data = data;
        core.push_event(H2Event::DataReceived {
            stream_id: self.id,
            end_stream,
        });
        self.commit(core, next, None);
        Ok(())
    }

    /// Close with the peer's error code. Illegal from idle and closed.
    pub fn receive_reset(
        &mut self,
        core: &mut ConnCore,
        error_code: ErrorCode,
    ) -> Result<(), StreamError> {
        self.check(StreamEvent::ReceiveReset)?;
        self.close(core, Some(error_code));
        Ok(())
    }

    /// Accept a peer PUSH_PROMISE received on this stream: decodes the
    /// promised request headers, instantiates the promised stream via the
    /// connection, parents it under this stream, and moves it to reserved
    /// (remote). Returns the promised stream for the caller to register.
    pub fn receive_push_promise(
        &mut self,
        core: &mut ConnCore,
        promised_id: StreamId,
        block: &[u8],
    ) -> Result<H2Stream, StreamError> {
        self.check(StreamEvent::ReceivePushPromise)?;
        // Decode first: the HPACK table must advance even if the promised
        // id is then rejected.
        let fields = core.decode_headers(block).map_err(|e| e.on_stream(self.id))?;
        let mut promised = core.accept_push_promise_stream(promised_id)?;
        promised.priority = Priority::new(self.id, false, DEFAULT_WEIGHT);
        promised.reserve(core, StreamEvent::ReserveRemote)?;
        promised.headers = fields;
        core.push_event(H2Event::PushPromised {
            stream_id: self.id,
            promised_id,
        });
        Ok(promised)
    }

    /// `:method` pseudo-header of the stored header list.
    pub fn http_method(&self) -> Option<http::Method> {
        self.pseudo(":method")
            .and_then(|m| http::Method::from_bytes(m.as_bytes()).ok())
    }

    /// `:status` pseudo-header of the stored header list.
    pub fn http_status(&self) -> Option<http::StatusCode> {
        self.pseudo(":status")
            .and_then(|s| s.parse::<u16>().ok())
            .and_then(|s| http::StatusCode::from_u16(s).ok())
    }

    /// `:path` pseudo-header of the stored header list (defaults to "/").
    pub fn http_uri(&self) -> Option<http::Uri> {
        let path = self.pseudo(":path").unwrap_or("/");
        path.parse().ok()
    }

    /// Stored header list as an `http::HeaderMap`, with `:authority`
    /// mapped to `Host` and other pseudo-headers skipped.
    pub fn http_headers(&self) -> http::HeaderMap {
        let mut header_map = http::HeaderMap::new();

        if let Some(authority) = self.pseudo(":authority")
            && let Ok(v) = http::HeaderValue::from_str(authority)
        {
            header_map.insert(http::header::HOST, v);
        }

        for (name, value) in &self.headers {
            if name.starts_with(':') {
                continue;
            }
            let parsed = (
                http::header::HeaderName::from_bytes(name.as_bytes()),
                http::HeaderValue::from_str(value),
            );
            if let (Ok(n), Ok(v)) = parsed {
                header_map.append(n, v);
            }
        }

        header_map
    }

    fn pseudo(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}
