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

//! The Cursor pseudo-encoding: a rectangle carrying cursor pixels plus a
//! 1-bit alpha mask, keyed by the RFB `-239` pseudo-encoding id.

use crate::framebuffer::Cursor;
use crate::protocol::{PixelFormat, Rectangle, ENCODING_CURSOR};
use crate::translate;
use bytes::BytesMut;

/// Writes the Cursor pseudo-rectangle: geometry (hotspot as position, shape
/// size as width/height), converted color pixels, then the row-packed
/// 1-bit alpha mask (MSB first, `ceil(width / 8)` bytes per row).
pub fn write_rect(buf: &mut BytesMut, cursor: &Cursor, format: &PixelFormat) {
    Rectangle {
        x: cursor.hotspot_x(),
        y: cursor.hotspot_y(),
        width: cursor.width(),
        height: cursor.height(),
        encoding: ENCODING_CURSOR,
    }
    .write_header(buf);

    if format.is_default() {
        buf.extend_from_slice(cursor.pixels());
    } else {
        buf.extend_from_slice(&translate::convert_span(cursor.pixels(), format));
    }

    let width = usize::from(cursor.width());
    let row_bytes = width.div_ceil(8);
    for y in 0..usize::from(cursor.height()) {
        let mut row = vec![0u8; row_bytes];
        for x in 0..width {
            let idx = (y * width + x) * 4;
            let alpha = cursor.pixels()[idx + 3];
            if alpha >= 128 {
                row[x / 8] |= 0x80 >> (x % 8);
            }
        }
        buf.extend_from_slice(&row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn mask_row_width_is_byte_aligned() {
        // 9px wide needs 2 mask bytes per row.
        let pixels: Arc<[u8]> = Arc::from(vec![255u8; 9 * 2 * 4]);
        let cursor = Cursor::new(9, 2, 0, 0, pixels);
        let format = PixelFormat::default_format();
        let mut buf = BytesMut::new();
        write_rect(&mut buf, &cursor, &format);

        let header_and_pixels = 12 + 9 * 2 * 4;
        let mask_bytes = buf.len() - header_and_pixels;
        assert_eq!(mask_bytes, 2 * 2);
    }

    #[test]
    fn opaque_pixel_sets_top_mask_bit() {
        let mut pixels = vec![0u8; 8 * 1 * 4];
        pixels[3] = 255; // pixel 0 alpha
        let cursor = Cursor::new(8, 1, 0, 0, Arc::from(pixels));
        let format = PixelFormat::default_format();
        let mut buf = BytesMut::new();
        write_rect(&mut buf, &cursor, &format);
        let mask_byte = buf[buf.len() - 1];
        assert_eq!(mask_byte, 0x80);
    }
}
