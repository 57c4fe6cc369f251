use std::collections::{HashMap, VecDeque};

use bytes::Bytes;

use crate::error::{ErrorCode, StreamError, StreamErrorKind};
use crate::frame::Frame;
use crate::priority::Priority;
use crate::stream::{DataOptions, FieldList, H2Stream, StreamId, StreamState};
use crate::window::{MAX_WINDOW_SIZE, Window};

/// Which side of the connection this endpoint is.
///
/// The role decides stream id parity (clients allocate odd ids, servers
/// even ids) and which side may originate push promises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Connection initiator; opens odd-numbered streams.
    Client,
    /// Connection acceptor; reserves even-numbered push streams.
    Server,
}

/// HTTP/2 connection settings (RFC 7540 §6.5.2).
///
/// One copy holds our advertised values (`local`), another the peer's
/// (`remote`). Stream windows are initialized from the matching
/// `initial_window_size`; later changes shift existing windows by the
/// delta (§6.9.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H2Settings {
    /// SETTINGS_HEADER_TABLE_SIZE (default: 4096)
    pub header_table_size:      u32,
    /// SETTINGS_ENABLE_PUSH (default: true)
    pub enable_push:            bool,
    /// SETTINGS_MAX_CONCURRENT_STREAMS advertised value (default: no limit)
    pub max_concurrent_streams: u32,
    /// SETTINGS_INITIAL_WINDOW_SIZE (default: 65535)
    pub initial_window_size:    u32,
    /// SETTINGS_MAX_FRAME_SIZE (default: 16384)
    pub max_frame_size:         u32,
    /// SETTINGS_MAX_HEADER_LIST_SIZE (default: unlimited)
    pub max_header_list_size:   u32,
}

impl Default for H2Settings {
    fn default() -> Self {
        Self {
            header_table_size: 4096,
            enable_push: true,
            max_concurrent_streams: u32::MAX,
            initial_window_size: 65535,
            max_frame_size: 16384,
            max_header_list_size: u32::MAX,
        }
    }
}

/// Hard local limits for stream management.
///
/// These are enforcement caps, independent of the advertised
/// [`H2Settings`] values, defending against stream flooding and HPACK
/// table growth from untrusted peers.
#[derive(Debug, Clone)]
pub struct H2Limits {
    /// Maximum concurrently active streams before new remote streams are
    /// refused (default: 100)
    pub max_concurrent_streams: usize,
    /// Hard cap for the HPACK dynamic table size (default: 65536)
    pub max_table_size:         usize,
}

impl Default for H2Limits {
    fn default() -> Self {
        Self {
            max_concurrent_streams: 100,
            max_table_size: 65536,
        }
    }
}

/// Events surfaced to the application by the receive path. Drain with
/// [`H2Connection::poll_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum H2Event {
    /// A header block was decoded into the stream's stored header list.
    HeadersReceived {
        /// Stream the block arrived on
        stream_id:  StreamId,
        /// Whether the peer finished its side
        end_stream: bool,
    },
    /// A DATA payload was stored on the stream.
    DataReceived {
        /// Stream the payload arrived on
        stream_id:  StreamId,
        /// Whether the peer finished its side
        end_stream: bool,
    },
    /// The peer promised a pushed response.
    PushPromised {
        /// Stream the promise arrived on
        stream_id:   StreamId,
        /// Stream reserved for the pushed response
        promised_id: StreamId,
    },
    /// The stream reached its terminal state. Fired exactly once per
    /// stream; `error` is present only when closure was caused by a reset.
    Closed {
        /// The closed stream
        stream_id: StreamId,
        /// Reset error code, if any
        error:     Option<ErrorCode>,
    },
}

/// Capability interface for allocating push-promise streams.
///
/// Supplied by the connection core: [`H2Stream::send_push_promise`] asks it
/// for the next even-id stream, [`H2Stream::receive_push_promise`] asks it
/// to validate and admit the peer's promised id.
pub trait PushStreams {
    /// Allocate the next server-initiated stream for an outgoing promise.
    fn create_push_promise_stream(&mut self) -> Result<H2Stream, StreamError>;

    /// Validate and instantiate the stream a peer promise names.
    fn accept_push_promise_stream(&mut self, id: StreamId) -> Result<H2Stream, StreamError>;
}

/// The connection minus its stream registry: HPACK coding state, settings,
/// connection-level windows, id allocation, and the outbound frame and
/// event queues.
///
/// Stream operations borrow this alongside the stream itself, which is how
/// a stream reaches its owning connection without a back-pointer.
pub struct ConnCore {
    role: Role,
    encoder: loona_hpack::Encoder<'static>,
    decoder: loona_hpack::Decoder<'static>,
    local_settings: H2Settings,
    remote_settings: H2Settings,
    limits: H2Limits,
    /// Octets the peer may still send us, connection-wide.
    local_window: Window,
    /// Octets we may still send the peer, connection-wide.
    remote_window: Window,
    /// Next locally-initiated stream id (odd for clients, even for servers).
    next_local_id: u32,
    /// Highest remote-initiated stream id seen, for monotonicity checks.
    highest_remote_id: StreamId,
    /// Frames awaiting the codec, in emission order.
    outbound: VecDeque<Frame>,
    /// Events awaiting the application.
    events: VecDeque<H2Event>,
}

impl ConnCore {
    fn new(role: Role, local_settings: H2Settings, limits: H2Limits) -> Self {
        let mut decoder = loona_hpack::Decoder::new();
        decoder.set_max_allowed_table_size(limits.max_table_size);
        let local_initial = local_settings.initial_window_size.min(MAX_WINDOW_SIZE as u32);
        let remote_settings = H2Settings::default();
        Self {
            role,
            encoder: loona_hpack::Encoder::new(),
            decoder,
            local_window: Window::new(local_initial as i32),
            remote_window: Window::new(remote_settings.initial_window_size as i32),
            local_settings,
            remote_settings,
            limits,
            next_local_id: match role {
                Role::Client => 1,
                Role::Server => 2,
            },
            highest_remote_id: StreamId(0),
            outbound: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    /// Which side of the connection this endpoint is.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Our advertised settings.
    pub fn local_settings(&self) -> &H2Settings {
        &self.local_settings
    }

    /// The peer's settings.
    pub fn remote_settings(&self) -> &H2Settings {
        &self.remote_settings
    }

    /// The hard local limits.
    pub fn limits(&self) -> &H2Limits {
        &self.limits
    }

    /// Connection-wide receive window.
    pub fn local_window(&self) -> &Window {
        &self.local_window
    }

    /// Connection-wide send window.
    pub fn remote_window(&self) -> &Window {
        &self.remote_window
    }

    /// Largest frame payload we may emit (the peer's MAX_FRAME_SIZE).
    pub fn maximum_frame_size(&self) -> u32 {
        self.remote_settings.max_frame_size
    }

    /// Largest DATA payload worth emitting right now: the peer's maximum
    /// frame size clamped by the connection send window.
    pub fn available_frame_size(&self) -> u32 {
        let credit = self.remote_window.available().max(0) as u32;
        self.maximum_frame_size().min(credit)
    }

    /// Allocate the next locally-initiated stream id.
    pub fn next_stream_id(&mut self) -> StreamId {
        let id = StreamId(self.next_local_id);
        self.next_local_id += 2;
        id
    }

    /// Queue a frame for the codec. Frames are drained in emission order
    /// by [`H2Connection::poll_frame`].
    pub fn write_frame(&mut self, frame: Frame) {
        self.outbound.push_back(frame);
    }

    /// Encode a header field list through the connection's HPACK encoder.
    pub fn encode_headers(&mut self, fields: &[(String, String)]) -> Result<Bytes, StreamError> {
        let headers: Vec<(&[u8], &[u8])> = fields
            .iter()
            .map(|(n, v)| (n.as_bytes(), v.as_bytes()))
            .collect();
        let mut block = Vec::new();
        self.encoder
            .encode_into(headers, &mut block)
            .map_err(|e| StreamError::new(StreamErrorKind::Hpack(format!("{e:?}"))))?;
        Ok(Bytes::from(block))
    }

    /// Decode a complete HPACK block into a header field list.
    pub fn decode_headers(&mut self, block: &[u8]) -> Result<FieldList, StreamError> {
        let decoded = self
            .decoder
            .decode(block)
            .map_err(|e| StreamError::new(StreamErrorKind::Hpack(format!("{e:?}"))))?;
        Ok(decoded
            .into_iter()
            .map(|(n, v)| {
                (
                    String::from_utf8_lossy(&n).into_owned(),
                    String::from_utf8_lossy(&v).into_owned(),
                )
            })
            .collect())
    }

    /// Charge `n` octets against the connection-wide send window.
    pub fn consume_remote_window(&mut self, n: u32) -> Result<(), StreamError> {
        self.remote_window.consume(n)
    }

    pub(crate) fn consume_local_window(&mut self, n: u32) -> Result<(), StreamError> {
        self.local_window.consume(n)
    }

    pub(crate) fn expand_remote_window(&mut self, n: u32) -> Result<(), StreamError> {
        self.remote_window.expand(n)
    }

    pub(crate) fn expand_local_window(&mut self, n: u32) -> Result<(), StreamError> {
        self.local_window.expand(n)
    }

    pub(crate) fn push_event(&mut self, event: H2Event) {
        self.events.push_back(event);
    }

    pub(crate) fn highest_remote_id(&self) -> StreamId {
        self.highest_remote_id
    }

    pub(crate) fn note_remote_id(&mut self, id: StreamId) {
        if id > self.highest_remote_id {
            self.highest_remote_id = id;
        }
    }
}

impl PushStreams for ConnCore {
    fn create_push_promise_stream(&mut self) -> Result<H2Stream, StreamError> {
        if self.role != Role::Server || !self.remote_settings.enable_push {
            return Err(StreamError::new(StreamErrorKind::PushDisallowed));
        }
        let id = self.next_stream_id();
        Ok(H2Stream::new(id, self))
    }

    fn accept_push_promise_stream(&mut self, id: StreamId) -> Result<H2Stream, StreamError> {
        if self.role != Role::Client || !self.local_settings.enable_push {
            return Err(StreamError::new(StreamErrorKind::PushDisallowed));
        }
        if !id.is_server_initiated() {
            return Err(StreamError::with_stream(
                StreamErrorKind::InvalidStreamId,
                id,
            ));
        }
        if id <= self.highest_remote_id {
            return Err(StreamError::with_stream(
                StreamErrorKind::InvalidStreamId,
                id,
            ));
        }
        self.note_remote_id(id);
        Ok(H2Stream::new(id, self))
    }
}

/// Connection-level state for a single HTTP/2 connection: the stream
/// registry plus the shared [`ConnCore`].
///
/// The connection is sans-io. Send operations queue structured frames
/// (drain with [`poll_frame`]); the receive path takes structured frames
/// from the codec via [`receive_frame`] and surfaces results as
/// [`H2Event`]s (drain with [`poll_event`]). Stream-level failures on the
/// receive path are converted into an outbound RST_STREAM carrying the
/// matching RFC 7540 error code; the connection itself stays alive.
///
/// [`poll_frame`]: Self::poll_frame
/// [`receive_frame`]: Self::receive_frame
/// [`poll_event`]: Self::poll_event
pub struct H2Connection {
    pub(crate) core:    ConnCore,
    pub(crate) streams: HashMap<StreamId, H2Stream>,
}

impl H2Connection {
    /// Create a connection endpoint with explicit settings and limits.
    /// `initial_window_size` values beyond 2^31 - 1 are clamped.
    pub fn new(role: Role, local_settings: H2Settings, limits: H2Limits) -> Self {
        Self {
            core: ConnCore::new(role, local_settings, limits),
            streams: HashMap::new(),
        }
    }

    /// Client endpoint with default settings and limits.
    pub fn client() -> Self {
        Self::new(Role::Client, H2Settings::default(), H2Limits::default())
    }

    /// Server endpoint with default settings and limits.
    pub fn server() -> Self {
        Self::new(Role::Server, H2Settings::default(), H2Limits::default())
    }

    /// Which side of the connection this endpoint is.
    pub fn role(&self) -> Role {
        self.core.role()
    }

    /// Shared connection state (settings, windows, frame-size bounds).
    pub fn core(&self) -> &ConnCore {
        &self.core
    }

    /// Open a new locally-initiated stream in the idle state and return
    /// its id.
    pub fn open_stream(&mut self) -> StreamId {
        let id = self.core.next_stream_id();
        let stream = H2Stream::new(id, &self.core);
        self.streams.insert(id, stream);
        id
    }

    /// Look up a stream by id.
    pub fn stream(&self, id: StreamId) -> Option<&H2Stream> {
        self.streams.get(&id)
    }

    /// Number of registered streams, including idle and closed ones not
    /// yet reaped.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Number of active streams (neither idle nor closed).
    pub fn active_stream_count(&self) -> usize {
        self.streams.values().filter(|s| s.is_active()).count()
    }

    /// Octets of DATA the given stream may emit right now: the smaller of
    /// its send window and the connection send window.
    pub fn available_send_window(&self, id: StreamId) -> Option<i32> {
        let stream = self.streams.get(&id)?;
        Some(
            stream
                .remote_window()
                .available()
                .min(self.core.remote_window().available()),
        )
    }

    /// Next frame awaiting the codec, in emission order.
    pub fn poll_frame(&mut self) -> Option<Frame> {
        self.core.outbound.pop_front()
    }

    /// Next event awaiting the application, in occurrence order.
    pub fn poll_event(&mut self) -> Option<H2Event> {
        self.core.events.pop_front()
    }

    /// Encode and emit HEADERS on `id`. See [`H2Stream::send_headers`].
    pub fn send_headers(
        &mut self,
        id: StreamId,
        priority: Option<Priority>,
        fields: &[(String, String)],
        end_stream: bool,
    ) -> Result<(), StreamError> {
        let stream = self
            .streams
            .get_mut(&id)
            .ok_or_else(|| StreamError::with_stream(StreamErrorKind::UnknownStream, id))?;
        stream.send_headers(&mut self.core, priority, fields, end_stream)?;
        if let Some(p) = priority {
            // Reparenting bookkeeping; self-dependency was already rejected
            // by the stream before the frame was emitted.
            self.apply_priority(id, p)?;
        }
        Ok(())
    }

    /// Emit DATA on `id` with default options. See [`H2Stream::send_data`].
    pub fn send_data(
        &mut self,
        id: StreamId,
        data: Bytes,
        end_stream: bool,
    ) -> Result<(), StreamError> {
        self.send_data_opts(id, data, end_stream, DataOptions::default())
    }

    /// Emit DATA on `id`. See [`H2Stream::send_data_opts`].
    pub fn send_data_opts(
        &mut self,
        id: StreamId,
        data: Bytes,
        end_stream: bool,
        opts: DataOptions,
    ) -> Result<(), StreamError> {
        let stream = self
            .streams
            .get_mut(&id)
            .ok_or_else(|| StreamError::with_stream(StreamErrorKind::UnknownStream, id))?;
        stream.send_data_opts(&mut self.core, data, end_stream, opts)
    }

    /// Emit RST_STREAM on `id`. See [`H2Stream::send_reset`].
    pub fn send_reset(&mut self, id: StreamId, error_code: ErrorCode) -> Result<(), StreamError> {
        let stream = self
            .streams
            .get_mut(&id)
            .ok_or_else(|| StreamError::with_stream(StreamErrorKind::UnknownStream, id))?;
        stream.send_reset(&mut self.core, error_code)
    }

    /// Promise a pushed response on `id`; registers and returns the id of
    /// the reserved stream. See [`H2Stream::send_push_promise`].
    pub fn send_push_promise(
        &mut self,
        id: StreamId,
        fields: &[(String, String)],
    ) -> Result<StreamId, StreamError> {
        let stream = self
            .streams
            .get_mut(&id)
            .ok_or_else(|| StreamError::with_stream(StreamErrorKind::UnknownStream, id))?;
        let promised = stream.send_push_promise(&mut self.core, fields)?;
        let promised_id = promised.id();
        self.streams.insert(promised_id, promised);
        Ok(promised_id)
    }

    /// Fail `id` with a trailers-style `:status` response or, when headers
    /// can no longer be sent, an RST_STREAM. See [`H2Stream::send_failure`].
    pub fn send_failure(
        &mut self,
        id: StreamId,
        status: u16,
        reason: &str,
    ) -> Result<(), StreamError> {
        let stream = self
            .streams
            .get_mut(&id)
            .ok_or_else(|| StreamError::with_stream(StreamErrorKind::UnknownStream, id))?;
        stream.send_failure(&mut self.core, status, reason)
    }

    /// Emit WINDOW_UPDATE, expanding the matching receive window: the
    /// connection window for stream id 0, the stream window otherwise.
    pub fn send_window_update(
        &mut self,
        stream_id: StreamId,
        increment: u32,
    ) -> Result<(), StreamError> {
        if increment == 0 {
            return Err(StreamError::with_stream(
                StreamErrorKind::ZeroWindowIncrement,
                stream_id,
            ));
        }
        if stream_id == StreamId(0) {
            self.core.expand_local_window(increment)?;
        } else {
            let stream = self
                .streams
                .get_mut(&stream_id)
                .ok_or_else(|| StreamError::with_stream(StreamErrorKind::UnknownStream, stream_id))?;
            stream
                .local_window
                .expand(increment)
                .map_err(|e| e.on_stream(stream_id))?;
        }
        self.core.write_frame(Frame::WindowUpdate {
            stream_id,
            increment,
        });
        Ok(())
    }

    /// Dispatch one inbound frame from the codec.
    ///
    /// On a stream-level error the connection emits RST_STREAM with the
    /// error's RFC 7540 code toward the peer, closes the stream, and
    /// returns the error; the connection stays usable.
    pub fn receive_frame(&mut self, frame: Frame) -> Result<(), StreamError> {
        let stream_id = frame.stream_id();
        match self.dispatch(frame) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.reset_on_error(stream_id, &e);
                Err(e)
            },
        }
    }

    /// True when we reset this stream ourselves and the peer's frame was
    /// already in flight; such frames are dropped, not rejected (§5.1).
    fn raced_local_reset(&self, stream_id: StreamId) -> bool {
        self.streams
            .get(&stream_id)
            .is_some_and(|s| s.state() == StreamState::Closed && s.reset_sent())
    }

    fn dispatch(&mut self, frame: Frame) -> Result<(), StreamError> {
        match frame {
            Frame::Headers {
                stream_id,
                block,
                priority,
                end_stream,
            } => {
                if stream_id == StreamId(0) {
                    return Err(StreamError::with_stream(
                        StreamErrorKind::InvalidStreamId,
                        stream_id,
                    ));
                }
                if self.raced_local_reset(stream_id) {
                    // Still decode so the HPACK table stays synchronized.
                    self.core.decode_headers(&block)?;
                    return Ok(());
                }
                if !self.streams.contains_key(&stream_id) {
                    let stream = self.admit_remote_stream(stream_id)?;
                    self.streams.insert(stream_id, stream);
                }
                if let Some(p) = priority {
                    self.apply_priority(stream_id, p)?;
                }
                let stream = self
                    .streams
                    .get_mut(&stream_id)
                    .ok_or_else(|| StreamError::with_stream(StreamErrorKind::UnknownStream, stream_id))?;
                stream.receive_headers(&mut self.core, &block, end_stream)
            },
            Frame::Data {
                stream_id,
                data,
                pad_length,
                end_stream,
            } => {
                if self.raced_local_reset(stream_id) {
                    return Ok(());
                }
                let stream = self
                    .streams
                    .get_mut(&stream_id)
                    .ok_or_else(|| StreamError::with_stream(StreamErrorKind::UnknownStream, stream_id))?;
                stream.receive_data(&mut self.core, data, pad_length, end_stream)
            },
            Frame::Priority {
                stream_id,
                priority,
            } => {
                if self.streams.contains_key(&stream_id) {
                    self.apply_priority(stream_id, priority)
                } else {
                    crate::trace_warn!("ignoring PRIORITY for unknown stream {stream_id}");
                    Ok(())
                }
            },
            Frame::RstStream {
                stream_id,
                error_code,
            } => {
                if self.raced_local_reset(stream_id) {
                    return Ok(());
                }
                match self.streams.get_mut(&stream_id) {
                    Some(stream) => stream.receive_reset(&mut self.core, error_code),
                    None => {
                        crate::trace_warn!("ignoring RST_STREAM for unknown stream {stream_id}");
                        Ok(())
                    },
                }
            },
            Frame::PushPromise {
                stream_id,
                promised_id,
                block,
            } => {
                if self.raced_local_reset(stream_id) {
                    self.core.decode_headers(&block)?;
                    return Ok(());
                }
                if self.active_stream_count() >= self.core.limits.max_concurrent_streams {
                    return Err(StreamError::with_stream(
                        StreamErrorKind::StreamLimitExceeded,
                        promised_id,
                    ));
                }
                let stream = self
                    .streams
                    .get_mut(&stream_id)
                    .ok_or_else(|| StreamError::with_stream(StreamErrorKind::UnknownStream, stream_id))?;
                let promised = stream.receive_push_promise(&mut self.core, promised_id, &block)?;
                self.streams.insert(promised_id, promised);
                Ok(())
            },
            Frame::WindowUpdate {
                stream_id,
                increment,
            } => {
                if increment == 0 {
                    return Err(StreamError::with_stream(
                        StreamErrorKind::ZeroWindowIncrement,
                        stream_id,
                    ));
                }
                if stream_id == StreamId(0) {
                    return self.core.expand_remote_window(increment);
                }
                match self.streams.get_mut(&stream_id) {
                    Some(stream) => stream
                        .remote_window
                        .expand(increment)
                        .map_err(|e| e.on_stream(stream_id)),
                    // Tolerated: the stream may have been reaped after
                    // closing while the peer's update was in flight.
                    None => {
                        crate::trace_warn!("ignoring WINDOW_UPDATE for unknown stream {stream_id}");
                        Ok(())
                    },
                }
            },
        }
    }

    /// Convert a receive-path failure into RST_STREAM toward the peer and
    /// close the stream. Streams that are idle, already closed, or were
    /// never admitted get no RST (RFC 7540 §6.4), except that an admission
    /// refusal answers with REFUSED_STREAM.
    fn reset_on_error(&mut self, stream_id: StreamId, error: &StreamError) {
        if stream_id == StreamId(0) {
            return;
        }
        match self.streams.get_mut(&stream_id) {
            Some(stream) if stream.state().is_active() => {
                let code = error.wire_code();
                self.core.write_frame(Frame::RstStream {
                    stream_id,
                    error_code: code,
                });
                stream.close(&mut self.core, Some(code));
            },
            Some(_) => {},
            None => {
                if matches!(error.kind, StreamErrorKind::StreamLimitExceeded) {
                    self.core.write_frame(Frame::RstStream {
                        stream_id,
                        error_code: ErrorCode::RefusedStream,
                    });
                }
            },
        }
    }

    /// Admit a peer-initiated stream first seen through HEADERS.
    fn admit_remote_stream(&mut self, id: StreamId) -> Result<H2Stream, StreamError> {
        // Clients only hear HEADERS on streams they opened or accepted.
        if self.core.role() != Role::Server {
            return Err(StreamError::with_stream(StreamErrorKind::UnknownStream, id));
        }
        if !id.is_client_initiated() {
            return Err(StreamError::with_stream(
                StreamErrorKind::InvalidStreamId,
                id,
            ));
        }
        if id <= self.core.highest_remote_id() {
            // Lower ids were implicitly or explicitly closed already.
            return Err(StreamError::with_stream(StreamErrorKind::StreamClosed, id));
        }
        if self.active_stream_count() >= self.core.limits.max_concurrent_streams {
            return Err(StreamError::with_stream(
                StreamErrorKind::StreamLimitExceeded,
                id,
            ));
        }
        self.core.note_remote_id(id);
        Ok(H2Stream::new(id, &self.core))
    }

    /// Install a priority record on `id` (RFC 7540 §5.3.1/§5.3.3).
    ///
    /// Rejects self-dependency. For an exclusive record, every other child
    /// of the new parent is first reparented onto `id`. Never alters stream
    /// state.
    pub fn apply_priority(&mut self, id: StreamId, priority: Priority) -> Result<(), StreamError> {
        if priority.stream_dependency == id {
            return Err(StreamError::with_stream(StreamErrorKind::SelfDependency, id));
        }
        if !self.streams.contains_key(&id) {
            return Err(StreamError::with_stream(StreamErrorKind::UnknownStream, id));
        }
        if priority.exclusive {
            for (tid, t) in self.streams.iter_mut() {
                if *tid != id && t.priority.stream_dependency == priority.stream_dependency {
                    t.priority.stream_dependency = id;
                }
            }
        }
        self.streams
            .get_mut(&id)
            .ok_or_else(|| StreamError::with_stream(StreamErrorKind::UnknownStream, id))?
            .set_priority(priority)
    }

    /// Streams whose priority record currently depends on `id`. Id 0 lists
    /// the children of the connection root. Sorted for determinism.
    pub fn children(&self, id: StreamId) -> Vec<StreamId> {
        let mut ids: Vec<StreamId> = self
            .streams
            .iter()
            .filter(|(tid, t)| **tid != id && t.priority.stream_dependency == id)
            .map(|(tid, _)| *tid)
            .collect();
        ids.sort();
        ids
    }

    /// The id of the stream `id` depends on (0 for the connection root),
    /// or `None` when `id` is not registered.
    pub fn parent(&self, id: StreamId) -> Option<StreamId> {
        self.streams.get(&id).map(|s| s.priority.stream_dependency)
    }

    /// Replace our advertised settings, shifting every stream's receive
    /// window by the initial-window delta (RFC 7540 §6.9.2).
    pub fn apply_local_settings(&mut self, settings: H2Settings) -> Result<(), StreamError> {
        if settings.initial_window_size > MAX_WINDOW_SIZE as u32 {
            return Err(StreamError::new(StreamErrorKind::WindowOverflow));
        }
        for stream in self.streams.values_mut() {
            stream
                .local_window
                .update_capacity(settings.initial_window_size as i32)?;
        }
        self.core.local_settings = settings;
        Ok(())
    }

    /// Install the peer's settings, shifting every stream's send window by
    /// the initial-window delta (RFC 7540 §6.9.2). The connection-level
    /// window is unaffected: only WINDOW_UPDATE changes it.
    pub fn apply_remote_settings(&mut self, settings: H2Settings) -> Result<(), StreamError> {
        if settings.initial_window_size > MAX_WINDOW_SIZE as u32 {
            return Err(StreamError::new(StreamErrorKind::WindowOverflow));
        }
        for stream in self.streams.values_mut() {
            stream
                .remote_window
                .update_capacity(settings.initial_window_size as i32)?;
        }
        self.core.remote_settings = settings;
        Ok(())
    }

    /// Drop closed streams from the registry, returning how many were
    /// reaped. Reaping never re-fires the close event.
    pub fn reap_closed(&mut self) -> usize {
        let before = self.streams.len();
        self.streams.retain(|_id, stream| {
            let closed = stream.state() == StreamState::Closed;
            if closed {
                crate::trace_warn!("reaping closed stream {_id}");
            }
            !closed
        });
        before - self.streams.len()
    }
}
