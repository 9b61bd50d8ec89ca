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

//! The top-level dispatcher: binds a TCP listener, spawns one
//! [`crate::session::ClientSession`] task per accepted connection, and fans
//! "frame produced" notifications out to every live session.

use crate::config::Config;
use crate::error::{Result, VncError};
use crate::events::ServerEvent;
use crate::framebuffer::FramebufferSource;
use crate::jpeg::SoftwareJpeg;
use crate::session::ClientSession;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

const MAX_PORT_RETRIES: u16 = 16;

struct ClientHandle {
    id: usize,
    dirty: Arc<AtomicBool>,
}

/// Owns the listening socket and the set of connected clients.
pub struct VncServer {
    config: Arc<Config>,
    source: Arc<dyn FramebufferSource>,
    clients: Arc<Mutex<Vec<ClientHandle>>>,
    next_client_id: AtomicUsize,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
}

impl VncServer {
    /// Builds a server around `source`, returning it along with the
    /// receiving half of its event channel.
    #[must_use]
    pub fn new(
        config: Config,
        source: Arc<dyn FramebufferSource>,
    ) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let clients: Arc<Mutex<Vec<ClientHandle>>> = Arc::new(Mutex::new(Vec::new()));

        let callback_clients = clients.clone();
        source.on_frame_produced(Box::new(move || {
            let clients = callback_clients.lock().unwrap();
            for client in clients.iter() {
                client.dirty.store(true, Ordering::Relaxed);
            }
        }));

        let server = Self {
            config: Arc::new(config),
            source,
            clients,
            next_client_id: AtomicUsize::new(1),
            events_tx,
        };
        (server, events_rx)
    }

    /// Binds a TCP listener starting at `config.initial_port`, incrementing
    /// past it up to [`MAX_PORT_RETRIES`] times if the port is already in
    /// use, then accepts connections until the listener itself errors.
    ///
    /// # Errors
    ///
    /// Returns an error if no port in the retry range could be bound, or if
    /// the listener fails outright.
    pub async fn run(self) -> Result<()> {
        let listener = self.bind_with_retry().await?;
        log::info!("listening on {}", listener.local_addr()?);

        loop {
            let (stream, addr) = listener.accept().await?;
            self.spawn_client(stream, addr);
        }
    }

    async fn bind_with_retry(&self) -> Result<TcpListener> {
        let mut port = self.config.initial_port;
        for attempt in 0..=MAX_PORT_RETRIES {
            let addr = (std::net::Ipv4Addr::UNSPECIFIED, port);
            match TcpListener::bind(addr).await {
                Ok(listener) => {
                    if attempt > 0 {
                        log::info!("bound VNC listener on fallback port {port}");
                    }
                    return Ok(listener);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                    log::warn!("port {port} in use, trying {}", port + 1);
                    port += 1;
                }
                Err(e) => return Err(VncError::Io(e)),
            }
        }
        Err(VncError::Resource(format!(
            "no free port found in range {}..={}",
            self.config.initial_port,
            self.config.initial_port + MAX_PORT_RETRIES
        )))
    }

    fn spawn_client(&self, stream: tokio::net::TcpStream, addr: std::net::SocketAddr) {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (session, dirty) = ClientSession::new(
            stream,
            addr,
            id,
            self.config.clone(),
            self.source.clone(),
            self.events_tx.clone(),
            Box::new(SoftwareJpeg),
        );

        self.clients
            .lock()
            .unwrap()
            .push(ClientHandle { id, dirty });

        let clients = self.clients.clone();
        tokio::spawn(async move {
            if let Err(e) = session.run().await {
                log::debug!("client {id} ({addr}) session ended: {e}");
            }
            clients.lock().unwrap().retain(|c| c.id != id);
        });
    }
}
