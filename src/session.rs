// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-client RFB protocol engine.
//!
//! A [`ClientSession`] owns one TCP connection end to end: version
//! handshake, optional VNC authentication, capability exchange, and the
//! steady-state loop that parses client messages while periodically
//! evaluating whether a framebuffer update is due.
//!
//! Partial messages are resumed across socket reads using explicit
//! [`SessionState::pending_message_type`] / `pending_byte_count` fields
//! rather than suspending mid-parse, so a `SetEncodings` message split
//! across two TCP segments picks up exactly where it left off.

use crate::auth;
use crate::config::Config;
use crate::encoding::{cursor as cursor_encoding, raw, tight};
use crate::error::{Result, VncError};
use crate::events::ServerEvent;
use crate::framebuffer::FramebufferSource;
use crate::input::{self, Key};
use crate::jpeg::JpegEncoder;
use crate::protocol::{
    PixelFormat, Rectangle, CLIENT_MSG_CLIENT_CUT_TEXT, CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST,
    CLIENT_MSG_KEY_EVENT, CLIENT_MSG_POINTER_EVENT, CLIENT_MSG_SET_ENCODINGS,
    CLIENT_MSG_SET_PIXEL_FORMAT, ENCODING_CURSOR, ENCODING_DESKTOP_SIZE, ENCODING_QUALITY_LEVEL_0,
    ENCODING_QUALITY_LEVEL_9, ENCODING_TIGHT, PROTOCOL_VERSION, SECURITY_RESULT_FAILED,
    SECURITY_RESULT_OK, SECURITY_TYPE_NONE, SECURITY_TYPE_VNC_AUTH, SERVER_MSG_FRAMEBUFFER_UPDATE,
};
use bytes::{Buf, BufMut, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Handshake phase, tracked mostly for diagnostics: `run` enforces the
/// transition order structurally rather than branching on this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Protocol,
    Challenge,
    Init,
    Connected,
}

#[derive(Debug, Default, Clone, Copy)]
struct Modifiers {
    shift: bool,
    control: bool,
    alt: bool,
    meta: bool,
}

/// Negotiated, per-client protocol state.
pub struct SessionState {
    pub phase: Phase,
    pub pixel_format: PixelFormat,
    pub encodings: Vec<i32>,
    pub cursor_enabled: bool,
    pub desktop_resize_enabled: bool,
    pub tight_enabled: bool,
    /// `-1` means "not negotiated"; `0..=9` is a valid Tight JPEG level.
    pub jpeg_quality_level: i8,
    pending_message_type: Option<u8>,
    pending_byte_count: Option<u32>,
    pub frame_requested: bool,
    pub frame_dirty: Arc<AtomicBool>,
    pub last_frame_size: (u16, u16),
}

impl SessionState {
    fn new(dirty: Arc<AtomicBool>) -> Self {
        Self {
            phase: Phase::Protocol,
            pixel_format: PixelFormat::default_format(),
            encodings: Vec::new(),
            cursor_enabled: false,
            desktop_resize_enabled: false,
            tight_enabled: false,
            jpeg_quality_level: -1,
            pending_message_type: None,
            pending_byte_count: None,
            frame_requested: false,
            frame_dirty: dirty,
            last_frame_size: (0, 0),
        }
    }
}

/// One client's RFB protocol engine, owning its transport stream end to end.
///
/// Generic over the stream type (`S`) so tests can drive it with
/// [`tokio_test::io::Mock`] instead of a real [`TcpStream`]; the dispatcher
/// in [`crate::server`] always instantiates it with `TcpStream`.
pub struct ClientSession<S> {
    stream: S,
    addr: SocketAddr,
    client_id: usize,
    config: Arc<Config>,
    source: Arc<dyn FramebufferSource>,
    events: mpsc::UnboundedSender<ServerEvent>,
    jpeg: Box<dyn JpegEncoder>,
    state: SessionState,
    read_buf: BytesMut,
    last_button_mask: u8,
    modifiers: Modifiers,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> ClientSession<S> {
    /// Constructs a session for an accepted connection.
    ///
    /// Returns the session along with a dirty-flag handle the dispatcher
    /// retains to mark this session dirty on "frame produced" without
    /// holding the session itself (which moves into its own task).
    #[must_use]
    pub fn new(
        stream: S,
        addr: SocketAddr,
        client_id: usize,
        config: Arc<Config>,
        source: Arc<dyn FramebufferSource>,
        events: mpsc::UnboundedSender<ServerEvent>,
        jpeg: Box<dyn JpegEncoder>,
    ) -> (Self, Arc<AtomicBool>) {
        let dirty = Arc::new(AtomicBool::new(false));
        let session = Self {
            stream,
            addr,
            client_id,
            config,
            source,
            events,
            jpeg,
            state: SessionState::new(dirty.clone()),
            read_buf: BytesMut::with_capacity(4096),
            last_button_mask: 0,
            modifiers: Modifiers::default(),
        };
        (session, dirty)
    }

    /// Drives the session to completion: handshake, then the connected
    /// message/update loop, until the peer disconnects or a fatal error
    /// occurs.
    pub async fn run(mut self) -> Result<()> {
        let _ = self.events.send(ServerEvent::ClientConnected {
            id: self.client_id,
            address: self.addr,
        });

        let result = self.run_inner().await;

        let _ = self.events.send(ServerEvent::ClientDisconnected {
            id: self.client_id,
        });

        match &result {
            Ok(()) | Err(VncError::ConnectionClosed) => Ok(()),
            Err(e) => {
                log::warn!("session {} ({}) ended: {e}", self.client_id, self.addr);
                Err(result.unwrap_err())
            }
        }
    }

    async fn run_inner(&mut self) -> Result<()> {
        self.stream.write_all(PROTOCOL_VERSION.as_bytes()).await?;
        self.read_exact_buffered(12).await?; // client version string, ignored
        self.negotiate_security().await?;
        self.complete_init().await?;
        self.connected_loop().await
    }

    async fn negotiate_security(&mut self) -> Result<()> {
        if self.config.password.is_empty() {
            self.write_u32(SECURITY_TYPE_NONE).await?;
            return Ok(());
        }

        self.write_u32(SECURITY_TYPE_VNC_AUTH).await?;
        self.state.phase = Phase::Challenge;

        let challenge = auth::generate_challenge();
        self.stream.write_all(&challenge).await?;

        let response_bytes = self.read_exact_buffered(16).await?;
        let mut response = [0u8; 16];
        response.copy_from_slice(&response_bytes);

        if auth::verify_response(&self.config.password, &challenge, &response) {
            self.write_u32(SECURITY_RESULT_OK).await?;
            Ok(())
        } else {
            self.write_u32(SECURITY_RESULT_FAILED).await?;
            Err(VncError::AuthFailed)
        }
    }

    async fn complete_init(&mut self) -> Result<()> {
        self.state.phase = Phase::Init;
        self.read_exact_buffered(1).await?; // client shared-flag, ignored

        let frame = self.source.current_frame();
        let (width, height) = frame
            .as_ref()
            .map_or((0, 0), |f| (f.width(), f.height()));
        self.state.last_frame_size = (width, height);

        let init = crate::protocol::ServerInit {
            framebuffer_width: width,
            framebuffer_height: height,
            pixel_format: PixelFormat::default_format(),
            name: self.config.server_name.clone(),
        };
        let mut buf = BytesMut::new();
        init.write_to(&mut buf);
        self.stream.write_all(&buf).await?;

        self.state.phase = Phase::Connected;
        Ok(())
    }

    async fn connected_loop(&mut self) -> Result<()> {
        let mut ticker: Option<tokio::time::Interval> = None;

        loop {
            tokio::select! {
                result = self.stream.read_buf(&mut self.read_buf) => {
                    let n = result?;
                    if n == 0 {
                        return Err(VncError::ConnectionClosed);
                    }
                    self.process_messages().await?;
                    if ticker.is_none() && self.state.frame_requested {
                        let period = Duration::from_millis(self.config.timer_interval_ms());
                        ticker = Some(tokio::time::interval(period));
                    }
                }
                _ = async { ticker.as_mut().unwrap().tick().await }, if ticker.is_some() => {
                    self.on_tick().await?;
                }
            }
        }
    }

    async fn process_messages(&mut self) -> Result<()> {
        loop {
            if self.state.pending_message_type.is_none() {
                if self.read_buf.is_empty() {
                    return Ok(());
                }
                let msg_type = self.read_buf.get_u8();
                self.state.pending_message_type = Some(msg_type);
            }

            let msg_type = self.state.pending_message_type.expect("just set");
            let done = match msg_type {
                CLIENT_MSG_SET_PIXEL_FORMAT => self.handle_set_pixel_format(),
                CLIENT_MSG_SET_ENCODINGS => self.handle_set_encodings().await?,
                CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST => self.handle_framebuffer_update_request(),
                CLIENT_MSG_KEY_EVENT => self.handle_key_event(),
                CLIENT_MSG_POINTER_EVENT => self.handle_pointer_event(),
                CLIENT_MSG_CLIENT_CUT_TEXT => self.handle_client_cut_text(),
                other => {
                    log::warn!("session {}: unknown message type {other}", self.client_id);
                    true
                }
            };

            if !done {
                return Ok(());
            }
            self.state.pending_message_type = None;
            self.state.pending_byte_count = None;
        }
    }

    fn handle_set_pixel_format(&mut self) -> bool {
        if self.read_buf.len() < 19 {
            return false;
        }
        self.read_buf.advance(3); // padding
        match PixelFormat::from_bytes(&mut self.read_buf) {
            Ok(mut format) => {
                if !format.true_color {
                    log::warn!(
                        "session {}: client requested a non-true-color pixel format, proceeding as true-color",
                        self.client_id
                    );
                    format.true_color = true;
                }
                if format.is_valid() {
                    self.state.pixel_format = format;
                } else {
                    log::warn!(
                        "session {}: rejecting invalid pixel format, keeping previous",
                        self.client_id
                    );
                }
            }
            Err(e) => log::warn!("session {}: malformed pixel format: {e}", self.client_id),
        }
        true
    }

    async fn handle_set_encodings(&mut self) -> Result<bool> {
        if self.state.pending_byte_count.is_none() {
            if self.read_buf.len() < 3 {
                return Ok(false);
            }
            self.read_buf.advance(1); // padding
            let count = u32::from(self.read_buf.get_u16());
            self.state.pending_byte_count = Some(count);
            self.state.tight_enabled = false;
            self.state.cursor_enabled = false;
            self.state.desktop_resize_enabled = false;
            self.state.jpeg_quality_level = -1;
        }

        let count = self.state.pending_byte_count.expect("just set");
        let needed = count as usize * 4;
        if self.read_buf.len() < needed {
            return Ok(false);
        }

        self.state.encodings.clear();
        let mut cursor_requested = false;
        for _ in 0..count {
            let encoding = self.read_buf.get_i32();
            self.state.encodings.push(encoding);
            match encoding {
                ENCODING_TIGHT => self.state.tight_enabled = true,
                ENCODING_CURSOR => {
                    self.state.cursor_enabled = true;
                    cursor_requested = true;
                }
                ENCODING_DESKTOP_SIZE => self.state.desktop_resize_enabled = true,
                e if (ENCODING_QUALITY_LEVEL_0..=ENCODING_QUALITY_LEVEL_9).contains(&e) => {
                    self.state.jpeg_quality_level = (32 + e) as i8;
                }
                _ => {}
            }
        }

        if cursor_requested {
            self.send_cursor_update().await?;
        }

        Ok(true)
    }

    fn handle_framebuffer_update_request(&mut self) -> bool {
        if self.read_buf.len() < 9 {
            return false;
        }
        let incremental = self.read_buf.get_u8() != 0;
        self.read_buf.advance(8); // requested rect geometry, unused: full framebuffer always sent
        if !incremental {
            self.state.frame_dirty.store(true, Ordering::Relaxed);
        }
        self.state.frame_requested = true;
        true
    }

    fn handle_key_event(&mut self) -> bool {
        if self.read_buf.len() < 7 {
            return false;
        }
        let down = self.read_buf.get_u8() != 0;
        self.read_buf.advance(2); // padding
        let keysym = self.read_buf.get_u32();

        let key = input::translate_keysym(keysym);
        match key {
            Key::Shift => self.modifiers.shift = down,
            Key::Control => self.modifiers.control = down,
            Key::Alt => self.modifiers.alt = down,
            Key::Meta => self.modifiers.meta = down,
            _ => {
                if down {
                    if let Some(ch) = input::control_char(keysym, self.modifiers.control) {
                        log::trace!(
                            "session {}: control char {:#x}",
                            self.client_id,
                            ch as u32
                        );
                    }
                }
            }
        }

        let _ = self.events.send(ServerEvent::KeyEvent {
            client_id: self.client_id,
            key,
            pressed: down,
        });
        true
    }

    fn handle_pointer_event(&mut self) -> bool {
        if self.read_buf.len() < 5 {
            return false;
        }
        let mask = self.read_buf.get_u8();
        let x = self.read_buf.get_u16();
        let y = self.read_buf.get_u16();

        let action = input::translate_pointer(self.last_button_mask, mask);
        self.last_button_mask = mask;

        let _ = self.events.send(ServerEvent::PointerEvent {
            client_id: self.client_id,
            x,
            y,
            action,
        });
        true
    }

    fn handle_client_cut_text(&mut self) -> bool {
        if self.state.pending_byte_count.is_none() {
            if self.read_buf.len() < 7 {
                return false;
            }
            self.read_buf.advance(3); // padding
            let len = self.read_buf.get_u32();
            self.state.pending_byte_count = Some(len);
        }

        let len = self.state.pending_byte_count.expect("just set") as usize;
        if self.read_buf.len() < len {
            return false;
        }
        self.read_buf.advance(len); // clipboard text is read and discarded
        true
    }

    async fn on_tick(&mut self) -> Result<()> {
        let Some(frame) = self.source.current_frame() else {
            return Ok(());
        };

        if (frame.width(), frame.height()) != self.state.last_frame_size {
            self.state.last_frame_size = (frame.width(), frame.height());
            if self.state.desktop_resize_enabled {
                self.send_desktop_size(frame.width(), frame.height()).await?;
            }
        }

        if !self.state.frame_requested || !self.state.frame_dirty.swap(false, Ordering::Relaxed) {
            return Ok(());
        }
        self.state.frame_requested = false;

        let mut body = BytesMut::new();
        let rect_count = if self.state.tight_enabled && self.state.jpeg_quality_level >= 0 {
            tight::write_full_update(
                &mut body,
                &frame,
                self.state.jpeg_quality_level as u8,
                self.jpeg.as_mut(),
            ) as u16
        } else {
            raw::write_rect(
                &mut body,
                &frame,
                0,
                0,
                frame.width(),
                frame.height(),
                &self.state.pixel_format,
            );
            1
        };

        self.send_update_header(rect_count).await?;
        self.stream.write_all(&body).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn send_desktop_size(&mut self, width: u16, height: u16) -> Result<()> {
        let mut body = BytesMut::new();
        Rectangle {
            x: 0,
            y: 0,
            width,
            height,
            encoding: ENCODING_DESKTOP_SIZE,
        }
        .write_header(&mut body);
        self.send_update_header(1).await?;
        self.stream.write_all(&body).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn send_cursor_update(&mut self) -> Result<()> {
        let cursor = self.source.cursor();
        let mut body = BytesMut::new();
        cursor_encoding::write_rect(&mut body, &cursor, &self.state.pixel_format);
        self.send_update_header(1).await?;
        self.stream.write_all(&body).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn send_update_header(&mut self, rect_count: u16) -> Result<()> {
        let mut header = BytesMut::with_capacity(4);
        header.put_u8(SERVER_MSG_FRAMEBUFFER_UPDATE);
        header.put_u8(0);
        header.put_u16(rect_count);
        self.stream.write_all(&header).await?;
        Ok(())
    }

    async fn write_u32(&mut self, value: u32) -> Result<()> {
        self.stream.write_all(&value.to_be_bytes()).await?;
        Ok(())
    }

    async fn read_exact_buffered(&mut self, n: usize) -> Result<BytesMut> {
        while self.read_buf.len() < n {
            let read = self.stream.read_buf(&mut self.read_buf).await?;
            if read == 0 {
                return Err(VncError::ConnectionClosed);
            }
        }
        Ok(self.read_buf.split_to(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::{Cursor, Framebuffer};
    use crate::jpeg::SoftwareJpeg;
    use std::sync::Mutex;
    use tokio_test::io::Builder;

    struct StaticSource {
        frame: Mutex<Option<Framebuffer>>,
    }

    impl FramebufferSource for StaticSource {
        fn current_frame(&self) -> Option<Framebuffer> {
            self.frame.lock().unwrap().clone()
        }
        fn cursor(&self) -> Cursor {
            Cursor::empty()
        }
        fn on_frame_produced(&self, _callback: Box<dyn Fn() + Send + Sync>) {}
    }

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    async fn make_pair() -> (TcpStream, TcpStream) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted, connected) =
            tokio::join!(listener.accept(), TcpStream::connect(addr));
        let (server, _) = accepted.unwrap();
        (server, connected.unwrap())
    }

    fn make_test_session<S: AsyncRead + AsyncWrite + Unpin + Send>(
        stream: S,
    ) -> ClientSession<S> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let source: Arc<dyn FramebufferSource> = Arc::new(StaticSource {
            frame: Mutex::new(None),
        });
        let (session, _dirty) = ClientSession::new(
            stream,
            "127.0.0.1:1".parse().unwrap(),
            1,
            Arc::new(Config::default()),
            source,
            tx,
            Box::new(SoftwareJpeg),
        );
        session
    }

    #[tokio::test]
    async fn handshake_with_no_auth_reaches_connected() {
        init_logger();
        let (server_sock, mut client_sock) = make_pair().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let source: Arc<dyn FramebufferSource> = Arc::new(StaticSource {
            frame: Mutex::new(Some(Framebuffer::new(2, 2, Arc::from(vec![0u8; 16])))),
        });
        let config = Arc::new(Config::default());
        let (mut session, _dirty) = ClientSession::new(
            server_sock,
            "127.0.0.1:1".parse().unwrap(),
            1,
            config,
            source,
            tx,
            Box::new(SoftwareJpeg),
        );

        let handle = tokio::spawn(async move {
            session.run_inner().await.ok();
        });

        // Client side of the handshake.
        let mut version = [0u8; 12];
        client_sock.read_exact(&mut version).await.unwrap();
        assert_eq!(&version, PROTOCOL_VERSION.as_bytes());
        client_sock.write_all(version.as_ref()).await.unwrap();

        let mut security = [0u8; 4];
        client_sock.read_exact(&mut security).await.unwrap();
        assert_eq!(u32::from_be_bytes(security), SECURITY_TYPE_NONE);

        client_sock.write_all(&[1]).await.unwrap(); // shared flag

        let mut server_init_head = [0u8; 4];
        client_sock.read_exact(&mut server_init_head).await.unwrap();
        assert_eq!(u16::from_be_bytes([server_init_head[0], server_init_head[1]]), 2);
        assert_eq!(u16::from_be_bytes([server_init_head[2], server_init_head[3]]), 2);

        handle.abort();
    }

    #[tokio::test]
    async fn set_encodings_resumes_across_a_split_read() {
        init_logger();
        // type(1) + pad(1) + count(u16)=1 + encoding(i32)=ENCODING_TIGHT, split
        // mid-way through the encoding's 4 bytes to force two TCP segments.
        let message = [
            CLIENT_MSG_SET_ENCODINGS,
            0,
            0,
            1,
            0,
            0,
            0,
            ENCODING_TIGHT as u8,
        ];
        let (first, second) = message.split_at(5);
        let mock = Builder::new().read(first).read(second).build();
        let mut session = make_test_session(mock);

        session.stream.read_buf(&mut session.read_buf).await.unwrap();
        session.process_messages().await.unwrap();
        assert!(session.state.pending_message_type.is_some());
        assert!(session.state.pending_byte_count.is_some());
        assert!(!session.state.tight_enabled);

        session.stream.read_buf(&mut session.read_buf).await.unwrap();
        session.process_messages().await.unwrap();
        assert!(session.state.pending_message_type.is_none());
        assert!(session.state.pending_byte_count.is_none());
        assert!(session.state.tight_enabled);
    }

    #[tokio::test]
    async fn client_cut_text_resumes_across_a_split_read() {
        init_logger();
        // type(1) + pad(3) + length(u32)=5 + "hello", split mid-way through
        // the length field so the header itself spans two reads.
        let mut message = vec![CLIENT_MSG_CLIENT_CUT_TEXT, 0, 0, 0, 0, 0];
        message.extend_from_slice(&[0, 5]);
        message.extend_from_slice(b"hello");
        let (first, second) = message.split_at(6);
        let mock = Builder::new().read(first).read(second).build();
        let mut session = make_test_session(mock);

        session.stream.read_buf(&mut session.read_buf).await.unwrap();
        session.process_messages().await.unwrap();
        assert!(session.state.pending_message_type.is_some());
        assert!(session.state.pending_byte_count.is_none());

        session.stream.read_buf(&mut session.read_buf).await.unwrap();
        session.process_messages().await.unwrap();
        assert!(session.state.pending_message_type.is_none());
        assert!(session.read_buf.is_empty());
    }
}
