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

//! Raw encoding: the simplest encoding, sending pixel data with no
//! compression. High bandwidth but always supported, and the fallback when
//! the client has not enabled Tight.

use crate::framebuffer::Framebuffer;
use crate::protocol::{PixelFormat, Rectangle, ENCODING_RAW};
use crate::translate;
use bytes::BytesMut;

/// Writes one Raw-encoded rectangle: header, then `height` scanlines of
/// `width` pixels each, converted to `format`.
///
/// # Panics
///
/// Panics if `(x, y, width, height)` extends past `image`'s bounds.
pub fn write_rect(
    buf: &mut BytesMut,
    image: &Framebuffer,
    x: u16,
    y: u16,
    width: u16,
    height: u16,
    format: &PixelFormat,
) {
    Rectangle {
        x,
        y,
        width,
        height,
        encoding: ENCODING_RAW,
    }
    .write_header(buf);

    let x_start = usize::from(x) * 4;
    let x_end = x_start + usize::from(width) * 4;

    for row in y..y + height {
        let scanline = image.scanline(row).expect("rect exceeds framebuffer bounds");
        let span = &scanline[x_start..x_end];
        if format.is_default() {
            buf.extend_from_slice(span);
        } else {
            buf.extend_from_slice(&translate::convert_span(span, format));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn writes_header_then_full_body() {
        let pixels: Arc<[u8]> = Arc::from(vec![1u8; 4 * 4 * 4]);
        let image = Framebuffer::new(4, 4, pixels);
        let format = PixelFormat::default_format();
        let mut buf = BytesMut::new();
        write_rect(&mut buf, &image, 0, 0, 4, 4, &format);

        // 12-byte header + 4*4*4 raw bytes for the default (pass-through) format.
        assert_eq!(buf.len(), 12 + 4 * 4 * 4);
        assert_eq!(&buf[8..12], &ENCODING_RAW.to_be_bytes());
    }

    #[test]
    fn subrect_only_emits_its_own_pixels() {
        let mut pixels = vec![0u8; 4 * 2 * 4];
        pixels[4..8].copy_from_slice(&[9, 9, 9, 9]); // pixel (1,0)
        let image = Framebuffer::new(4, 2, Arc::from(pixels));
        let format = PixelFormat::default_format();
        let mut buf = BytesMut::new();
        write_rect(&mut buf, &image, 1, 0, 1, 1, &format);
        assert_eq!(buf.len(), 12 + 4);
        assert_eq!(&buf[12..16], &[9, 9, 9, 9]);
    }
}
