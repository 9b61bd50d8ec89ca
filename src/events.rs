//! Server events that can be received by the application.

use crate::input::{Key, PointerAction};
use std::net::SocketAddr;

/// Events emitted by the VNC server.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A client has connected to the server.
    ClientConnected {
        /// Unique client identifier.
        id: usize,
        /// Client's socket address.
        address: SocketAddr,
    },

    /// A client has disconnected from the server.
    ClientDisconnected {
        /// Unique client identifier.
        id: usize,
    },

    /// Pointer movement or button event from a client, already diffed
    /// against the previous button mask by [`crate::input::translate_pointer`].
    PointerEvent {
        /// Client identifier.
        client_id: usize,
        /// X coordinate.
        x: u16,
        /// Y coordinate.
        y: u16,
        /// The move/press/release/wheel action derived from this event.
        action: PointerAction,
    },

    /// Key press or release event from a client, with the keysym already
    /// mapped to a toolkit-independent [`Key`] by [`crate::input::translate_keysym`].
    KeyEvent {
        /// Client identifier.
        client_id: usize,
        /// The translated key.
        key: Key,
        /// True if pressed, false if released.
        pressed: bool,
    },
}
