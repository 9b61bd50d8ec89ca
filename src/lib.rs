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


//! # hostvnc
//!
//! An RFB 3.3 VNC server core that exposes a host application's rendered
//! window surface to remote viewers, without depending on any particular
//! windowing toolkit.
//!
//! The host hands the server a [`framebuffer::FramebufferSource`]
//! implementation; the server accepts TCP connections, runs the RFB
//! handshake, and streams framebuffer updates using Raw or Tight-JPEG
//! encoding depending on what each client negotiates. Input events
//! (keyboard, pointer) are translated into host-toolkit-independent
//! [`events::ServerEvent`]s and handed back over a channel.
//!
//! ## Scope
//!
//! This is RFB protocol version 3.3: the server unilaterally selects the
//! security type rather than negotiating a list, and TLS/VeNCrypt security
//! types are out of scope. Encodings are limited to Raw, Tight (JPEG
//! sub-mode only), and the Cursor and DesktopSize pseudo-encodings.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hostvnc::{Config, VncServer};
//! use std::sync::Arc;
//!
//! # struct MySource;
//! # impl hostvnc::framebuffer::FramebufferSource for MySource {
//! #     fn current_frame(&self) -> Option<hostvnc::framebuffer::Framebuffer> { None }
//! #     fn cursor(&self) -> hostvnc::framebuffer::Cursor { hostvnc::framebuffer::Cursor::empty() }
//! #     fn on_frame_produced(&self, _callback: Box<dyn Fn() + Send + Sync>) {}
//! # }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env();
//!     let source: Arc<dyn hostvnc::framebuffer::FramebufferSource> = Arc::new(MySource);
//!     let (server, mut events) = VncServer::new(config, source);
//!
//!     tokio::spawn(async move { server.run().await });
//!
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Host application (renderer)      │
//! │                                         │
//! │  • implements FramebufferSource         │
//! │  • consumes ServerEvent input           │
//! └──────────────────┬──────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │           VncServer (Public)            │
//! │                                         │
//! │  • TCP listener, port auto-increment    │
//! │  • Client task spawn/teardown           │
//! │  • Event channel fan-in                 │
//! └──────────────────┬──────────────────────┘
//!                    │
//!        ┌───────────┼───────────┐
//!        ▼           ▼           ▼
//!   ┌────────┐ ┌────────┐ ┌────────┐
//!   │Client 1│ │Client 2│ │Client N│
//!   │(session)│ │(session)│ │(session)│
//!   └────────┘ └────────┘ └────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod config;
mod des;
pub mod encoding;
pub mod error;
pub mod events;
pub mod framebuffer;
pub mod input;
pub mod jpeg;
pub mod protocol;
pub mod server;
pub mod session;
mod translate;

// Re-exports
pub use config::Config;
pub use error::{Result, VncError};
pub use events::ServerEvent;
pub use framebuffer::Framebuffer;
pub use protocol::PixelFormat;
pub use server::VncServer;
