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

//! Error types for the VNC server library.

use std::io;
use thiserror::Error;

/// Result type for VNC operations.
pub type Result<T> = std::result::Result<T, VncError>;

/// Errors that can occur in VNC server operations.
#[derive(Debug, Error)]
pub enum VncError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the connection cleanly (zero-byte read).
    #[error("connection closed")]
    ConnectionClosed,

    /// VNC protocol error: a message was malformed or out of sequence.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Authentication failed (challenge response did not match).
    #[error("authentication failed")]
    AuthFailed,

    /// A client-declared `PixelFormat` failed validation.
    #[error("invalid pixel format")]
    InvalidPixelFormat,

    /// A client declared something this server only warns about and
    /// proceeds past, such as a non-true-color pixel format.
    #[error("configuration warning: {0}")]
    Config(String),

    /// A resource (encoder, buffer) could not be acquired.
    #[error("resource error: {0}")]
    Resource(String),
}
