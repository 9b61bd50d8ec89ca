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

//! VNC Remote Framebuffer (RFB) protocol constants and structures.
//!
//! This module fixes the wire-level building blocks for RFB protocol version
//! `3.3`: the version string, the client/server message types in scope, the
//! two encodings and two pseudo-encodings this server implements, and the
//! `PixelFormat`/`ServerInit`/`Rectangle` structures used to serialize them.

use crate::error::{Result, VncError};
use bytes::{Buf, BufMut, BytesMut};

/// The RFB protocol version string advertised by the server.
///
/// This server implements RFB protocol version 3.3: the server unilaterally
/// selects the security type rather than offering a list for the client to
/// choose from.
pub const PROTOCOL_VERSION: &str = "RFB 003.003\n";

// Client-to-Server Message Types

/// Message type: Client requests to change the pixel format.
pub const CLIENT_MSG_SET_PIXEL_FORMAT: u8 = 0;

/// Message type: Client specifies supported encodings.
pub const CLIENT_MSG_SET_ENCODINGS: u8 = 2;

/// Message type: Client requests a framebuffer update.
pub const CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST: u8 = 3;

/// Message type: Client sends a keyboard event.
pub const CLIENT_MSG_KEY_EVENT: u8 = 4;

/// Message type: Client sends a pointer (mouse) event.
pub const CLIENT_MSG_POINTER_EVENT: u8 = 5;

/// Message type: Client sends cut text (clipboard data). Read and discarded.
pub const CLIENT_MSG_CLIENT_CUT_TEXT: u8 = 6;

// Server-to-Client Message Types

/// Message type: Server sends a framebuffer update.
pub const SERVER_MSG_FRAMEBUFFER_UPDATE: u8 = 0;

// Encoding Types

/// Encoding type: Raw pixel data.
pub const ENCODING_RAW: i32 = 0;

/// Encoding type: Tight. Only the JPEG compression sub-mode is implemented.
pub const ENCODING_TIGHT: i32 = 7;

/// Pseudo-encoding: Rich Cursor.
pub const ENCODING_CURSOR: i32 = -239;

/// Pseudo-encoding: Desktop Size.
pub const ENCODING_DESKTOP_SIZE: i32 = -223;

/// Pseudo-encoding: lowest JPEG quality level accepted in the encoding list.
pub const ENCODING_QUALITY_LEVEL_0: i32 = -32;

/// Pseudo-encoding: highest JPEG quality level accepted in the encoding list.
pub const ENCODING_QUALITY_LEVEL_9: i32 = -23;

/// Tight control byte for the JPEG compression sub-mode: `(1<<7) | (1<<4)`.
pub const TIGHT_JPEG_CONTROL: u8 = (1 << 7) | (1 << 4);

// Security Types

/// Security type: None (no authentication).
pub const SECURITY_TYPE_NONE: u32 = 1;

/// Security type: VNC Authentication (DES challenge-response).
pub const SECURITY_TYPE_VNC_AUTH: u32 = 2;

// Security Results

/// Security result: authentication succeeded.
pub const SECURITY_RESULT_OK: u32 = 0;

/// Security result: authentication failed.
pub const SECURITY_RESULT_FAILED: u32 = 1;

/// Describes how a pixel is laid out on the wire: bit depth, per-channel
/// bit widths/shifts and endianness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelFormat {
    /// Number of bits per pixel (8, 16 or 32).
    pub bits_per_pixel: u8,
    /// Depth of the pixel in bits.
    pub depth: u8,
    /// `true` if multi-byte pixel values are big-endian on the wire.
    pub big_endian: bool,
    /// `true` if the format is true-color (the only mode this server serves).
    pub true_color: bool,
    /// Maximum red color value (`(1 << red_bits) - 1`).
    pub red_max: u16,
    /// Maximum green color value.
    pub green_max: u16,
    /// Maximum blue color value.
    pub blue_max: u16,
    /// Left-shift applied to the red component.
    pub red_shift: u8,
    /// Left-shift applied to the green component.
    pub green_shift: u8,
    /// Left-shift applied to the blue component.
    pub blue_shift: u8,
}

impl PixelFormat {
    /// The format this server advertises in `ServerInit`: 32 bpp, depth 24,
    /// true-color, host endianness, R-shift 16 / G-shift 8 / B-shift 0.
    #[must_use]
    pub fn default_format() -> Self {
        Self {
            bits_per_pixel: 32,
            depth: 24,
            big_endian: cfg!(target_endian = "big"),
            true_color: true,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 16,
            green_shift: 8,
            blue_shift: 0,
        }
    }

    /// `true` if this format is byte-for-byte the server default, permitting
    /// the fast 32-bit memcpy path in [`crate::encoding::raw`].
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default_format()
    }

    /// Validates a client-declared format against the server's supported
    /// subset: `bits_per_pixel ∈ {8, 16, 32}`, `depth` in `1..=32`, and (for
    /// true-color) that the channel bit widths fit within `depth`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if !matches!(self.bits_per_pixel, 8 | 16 | 32) {
            return false;
        }
        if self.depth == 0 || self.depth > 32 {
            return false;
        }
        if self.true_color {
            let bits_needed = |max: u16| -> u8 {
                if max == 0 {
                    0
                } else {
                    16 - max.leading_zeros() as u8
                }
            };
            let total =
                bits_needed(self.red_max) + bits_needed(self.green_max) + bits_needed(self.blue_max);
            if total > self.depth {
                return false;
            }
        }
        true
    }

    /// Serializes the 16-byte `PixelFormat` payload, including the leading
    /// and trailing 3-byte padding the wire format requires around it.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.bits_per_pixel);
        buf.put_u8(self.depth);
        buf.put_u8(u8::from(self.big_endian));
        buf.put_u8(u8::from(self.true_color));
        buf.put_u16(self.red_max);
        buf.put_u16(self.green_max);
        buf.put_u16(self.blue_max);
        buf.put_u8(self.red_shift);
        buf.put_u8(self.green_shift);
        buf.put_u8(self.blue_shift);
        buf.put_bytes(0, 3);
    }

    /// Deserializes a `SetPixelFormat` payload: 3 bytes padding, 16 bytes
    /// format, 3 bytes padding — 22 bytes total including the message's own
    /// leading padding, already consumed by the caller per [`crate::session`].
    ///
    /// # Errors
    ///
    /// Returns [`VncError::Io`] if fewer than 16 bytes remain.
    pub fn from_bytes(buf: &mut BytesMut) -> Result<Self> {
        if buf.len() < 16 {
            return Err(VncError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "not enough bytes for PixelFormat",
            )));
        }
        let pf = Self {
            bits_per_pixel: buf.get_u8(),
            depth: buf.get_u8(),
            big_endian: buf.get_u8() != 0,
            true_color: buf.get_u8() != 0,
            red_max: buf.get_u16(),
            green_max: buf.get_u16(),
            blue_max: buf.get_u16(),
            red_shift: buf.get_u8(),
            green_shift: buf.get_u8(),
            blue_shift: buf.get_u8(),
        };
        buf.advance(3);
        Ok(pf)
    }
}

/// The `ServerInit` message sent once, after the client-init byte is read.
#[derive(Debug, Clone)]
pub struct ServerInit {
    /// Width of the source framebuffer in pixels.
    pub framebuffer_width: u16,
    /// Height of the source framebuffer in pixels.
    pub framebuffer_height: u16,
    /// The pixel format the server will encode updates in.
    pub pixel_format: PixelFormat,
    /// Desktop name, sent as a length-prefixed UTF-8 string.
    pub name: String,
}

impl ServerInit {
    /// Serializes width, height, pixel format, and the length-prefixed name.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u16(self.framebuffer_width);
        buf.put_u16(self.framebuffer_height);
        self.pixel_format.write_to(buf);
        let name_bytes = self.name.as_bytes();
        buf.put_u32(name_bytes.len() as u32);
        buf.put_slice(name_bytes);
    }
}

/// A rectangle header as it appears before an encoded rectangle's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    /// X coordinate of the top-left corner.
    pub x: u16,
    /// Y coordinate of the top-left corner.
    pub y: u16,
    /// Width in pixels.
    pub width: u16,
    /// Height in pixels.
    pub height: u16,
    /// Encoding id, negative for pseudo-encodings.
    pub encoding: i32,
}

impl Rectangle {
    /// Writes the 12-byte rectangle header: four `u16` geometry fields
    /// followed by the `i32` encoding id.
    pub fn write_header(&self, buf: &mut BytesMut) {
        buf.put_u16(self.x);
        buf.put_u16(self.y);
        buf.put_u16(self.width);
        buf.put_u16(self.height);
        buf.put_i32(self.encoding);
    }

    /// Parses a 12-byte rectangle header, the inverse of [`Self::write_header`].
    ///
    /// This server never reads rectangles back from a client; it exists to
    /// keep the wire-type surface symmetric and to support the round-trip
    /// test below, the same role `tight::read_compact_length` plays for
    /// `write_compact_length`.
    ///
    /// # Errors
    ///
    /// Returns [`VncError::Io`] if fewer than 12 bytes remain.
    pub fn read_header(buf: &mut BytesMut) -> Result<Self> {
        if buf.len() < 12 {
            return Err(VncError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "not enough bytes for Rectangle header",
            )));
        }
        Ok(Self {
            x: buf.get_u16(),
            y: buf.get_u16(),
            width: buf.get_u16(),
            height: buf.get_u16(),
            encoding: buf.get_i32(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_format_round_trips() {
        let format = PixelFormat::default_format();
        let mut buf = BytesMut::new();
        format.write_to(&mut buf);
        assert_eq!(buf.len(), 16);
        let parsed = PixelFormat::from_bytes(&mut buf).unwrap();
        assert_eq!(parsed, format);
        assert!(parsed.is_default());
    }

    #[test]
    fn default_format_matches_spec_shifts() {
        let format = PixelFormat::default_format();
        assert_eq!(format.bits_per_pixel, 32);
        assert_eq!(format.depth, 24);
        assert_eq!(format.red_shift, 16);
        assert_eq!(format.green_shift, 8);
        assert_eq!(format.blue_shift, 0);
    }

    #[test]
    fn rejects_unsupported_bpp() {
        let mut format = PixelFormat::default_format();
        format.bits_per_pixel = 24;
        assert!(!format.is_valid());
    }

    #[test]
    fn rejects_channels_wider_than_depth() {
        let format = PixelFormat {
            bits_per_pixel: 16,
            depth: 8,
            big_endian: false,
            true_color: true,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 0,
            green_shift: 8,
            blue_shift: 16,
        };
        assert!(!format.is_valid());
    }

    #[test]
    fn rectangle_header_is_twelve_bytes() {
        let rect = Rectangle {
            x: 1,
            y: 2,
            width: 3,
            height: 4,
            encoding: ENCODING_RAW,
        };
        let mut buf = BytesMut::new();
        rect.write_header(&mut buf);
        assert_eq!(buf.len(), 12);
    }

    #[test]
    fn rectangle_header_round_trips() {
        let rect = Rectangle {
            x: 10,
            y: 20,
            width: 640,
            height: 480,
            encoding: ENCODING_TIGHT,
        };
        let mut buf = BytesMut::new();
        rect.write_header(&mut buf);
        let parsed = Rectangle::read_header(&mut buf).unwrap();
        assert_eq!(parsed, rect);
        assert!(buf.is_empty());
    }

    #[test]
    fn rectangle_header_rejects_short_buffer() {
        let mut buf = BytesMut::from(&[0u8; 11][..]);
        assert!(Rectangle::read_header(&mut buf).is_err());
    }
}
