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

//! Tight encoding, JPEG compression sub-mode only.
//!
//! A source rectangle is split into slabs at most 2048 pixels wide (same Y
//! and height as the source) before each slab is JPEG-compressed
//! independently, matching how real Tight-JPEG streams stay under a
//! per-rectangle size a client's decoder expects.

use crate::framebuffer::Framebuffer;
use crate::jpeg::{quality_level_to_jpeg_quality, JpegEncoder};
use crate::protocol::{Rectangle, ENCODING_TIGHT, TIGHT_JPEG_CONTROL};
use bytes::{Buf, BufMut, BytesMut};

const MAX_SLAB_WIDTH: u16 = 2048;

/// Splits `(x, y, width, height)` into slabs at most [`MAX_SLAB_WIDTH`]
/// pixels wide, preserving `y` and `height`.
#[must_use]
pub fn split_slabs(x: u16, y: u16, width: u16, height: u16) -> Vec<(u16, u16, u16, u16)> {
    let mut slabs = Vec::new();
    let mut offset: u32 = 0;
    let width = u32::from(width);
    while offset < width {
        let slab_width = (width - offset).min(u32::from(MAX_SLAB_WIDTH));
        slabs.push((x + offset as u16, y, slab_width as u16, height));
        offset += slab_width;
    }
    slabs
}

/// Writes the Tight compact-length variable integer.
pub fn write_compact_length(buf: &mut BytesMut, len: usize) {
    if len < 128 {
        buf.put_u8(len as u8);
    } else if len < 16384 {
        buf.put_u8(((len & 0x7F) | 0x80) as u8);
        buf.put_u8((len >> 7) as u8);
    } else {
        buf.put_u8(((len & 0x7F) | 0x80) as u8);
        buf.put_u8((((len >> 7) & 0x7F) | 0x80) as u8);
        buf.put_u8((len >> 14) as u8);
    }
}

/// Reads a Tight compact-length variable integer, advancing `buf`.
#[must_use]
pub fn read_compact_length(buf: &mut BytesMut) -> usize {
    let b0 = buf.get_u8();
    if b0 & 0x80 == 0 {
        return usize::from(b0);
    }
    let b1 = buf.get_u8();
    if b1 & 0x80 == 0 {
        return usize::from(b0 & 0x7F) | (usize::from(b1) << 7);
    }
    let b2 = buf.get_u8();
    usize::from(b0 & 0x7F) | (usize::from(b1 & 0x7F) << 7) | (usize::from(b2) << 14)
}

/// Extracts a `(x, y, width, height)` region of `image` as packed RGBA
/// bytes (alpha forced opaque), the layout `jpeg_encoder` expects.
fn extract_rgba(image: &Framebuffer, x: u16, y: u16, width: u16, height: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(usize::from(width) * usize::from(height) * 4);
    let x_start = usize::from(x) * 4;
    let x_end = x_start + usize::from(width) * 4;
    for row in y..y + height {
        let scanline = image.scanline(row).expect("rect exceeds framebuffer bounds");
        for bgrx in scanline[x_start..x_end].chunks_exact(4) {
            out.push(bgrx[2]); // R
            out.push(bgrx[1]); // G
            out.push(bgrx[0]); // B
            out.push(0xFF); // A
        }
    }
    out
}

/// Writes a full framebuffer as one or more Tight-JPEG rectangles.
///
/// Returns the number of rectangles written, which the caller (see
/// [`crate::session`]) needs for the enclosing `FramebufferUpdate`'s
/// rectangle count.
pub fn write_full_update(
    buf: &mut BytesMut,
    image: &Framebuffer,
    jpeg_quality_level: u8,
    jpeg: &mut dyn JpegEncoder,
) -> usize {
    let slabs = split_slabs(0, 0, image.width(), image.height());
    let quality = quality_level_to_jpeg_quality(jpeg_quality_level);

    for &(x, y, width, height) in &slabs {
        let rgba = extract_rgba(image, x, y, width, height);
        let jpeg_bytes = match jpeg.encode(&rgba, width, height, quality) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Tight-JPEG encode failed ({e}), slab will be empty");
                Vec::new()
            }
        };

        Rectangle {
            x,
            y,
            width,
            height,
            encoding: ENCODING_TIGHT,
        }
        .write_header(buf);
        buf.put_u8(TIGHT_JPEG_CONTROL);
        write_compact_length(buf, jpeg_bytes.len());
        buf.extend_from_slice(&jpeg_bytes);
    }

    slabs.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::SoftwareJpeg;
    use std::sync::Arc;

    #[test]
    fn slabs_stay_under_max_width() {
        let slabs = split_slabs(0, 0, 5000, 100);
        assert!(slabs.iter().all(|&(_, _, w, _)| w <= MAX_SLAB_WIDTH));
        assert_eq!(slabs.iter().map(|&(_, _, w, _)| u32::from(w)).sum::<u32>(), 5000);
        for &(_, y, _, h) in &slabs {
            assert_eq!(y, 0);
            assert_eq!(h, 100);
        }
    }

    #[test]
    fn narrow_rect_is_a_single_slab() {
        let slabs = split_slabs(10, 20, 100, 50);
        assert_eq!(slabs, vec![(10, 20, 100, 50)]);
    }

    #[test]
    fn compact_length_round_trips() {
        for len in [0usize, 1, 42, 127, 128, 200, 16383, 16384, 20000, 1_000_000] {
            let mut buf = BytesMut::new();
            write_compact_length(&mut buf, len);
            let expected_bytes = if len < 128 {
                1
            } else if len < 16384 {
                2
            } else {
                3
            };
            assert_eq!(buf.len(), expected_bytes, "len={len}");
            let decoded = read_compact_length(&mut buf);
            assert_eq!(decoded, len);
        }
    }

    #[test]
    fn full_update_emits_one_rect_for_small_image() {
        let pixels: Arc<[u8]> = Arc::from(vec![0u8; 4 * 4 * 4]);
        let image = Framebuffer::new(4, 4, pixels);
        let mut jpeg = SoftwareJpeg;
        let mut buf = BytesMut::new();
        let count = write_full_update(&mut buf, &image, 9, &mut jpeg);
        assert_eq!(count, 1);
        // header (12) + control byte (1) + at least a 1-byte length.
        assert!(buf.len() > 13);
        assert_eq!(buf[12], TIGHT_JPEG_CONTROL);
    }
}
