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

//! Pixel format conversion from the fixed 32-bit BGRA source framebuffer to
//! a client's negotiated [`PixelFormat`].
//!
//! The source is always 32 bits per pixel, byte order `[B, G, R, X]`. Only
//! the destination format varies, which is narrower than a general N-to-M
//! pixel translator but covers everything [`crate::session::ClientSession`]
//! needs.

use crate::protocol::PixelFormat;
use bytes::BytesMut;

/// Converts a span of 32-bit BGRA source pixels into `format`'s wire layout.
///
/// Returns a fresh buffer sized `pixel_count * (format.bits_per_pixel / 8)`.
///
/// # Panics
///
/// Panics if `src.len()` is not a multiple of 4.
#[must_use]
pub fn convert_span(src: &[u8], format: &PixelFormat) -> BytesMut {
    assert_eq!(src.len() % 4, 0, "source must be 32-bit BGRA");

    if format.is_default() {
        // Fast path: BGRA source already matches the default wire format's
        // shifts (R=16 G=8 B=0), which is exactly BGRX little-endian.
        return BytesMut::from(src);
    }

    let pixel_count = src.len() / 4;
    let bytes_per_pixel = usize::from(format.bits_per_pixel / 8);
    let mut dst = BytesMut::with_capacity(pixel_count * bytes_per_pixel);

    for chunk in src.chunks_exact(4) {
        let (b, g, r) = (chunk[0], chunk[1], chunk[2]);
        pack_pixel(&mut dst, r, g, b, format);
    }

    dst
}

/// Packs one RGB triple into `format`'s layout and appends it to `dst`.
fn pack_pixel(dst: &mut BytesMut, r: u8, g: u8, b: u8, format: &PixelFormat) {
    let r_scaled = downscale_component(r, format.red_max);
    let g_scaled = downscale_component(g, format.green_max);
    let b_scaled = downscale_component(b, format.blue_max);

    let pixel_value = (u32::from(r_scaled) << format.red_shift)
        | (u32::from(g_scaled) << format.green_shift)
        | (u32::from(b_scaled) << format.blue_shift);

    match format.bits_per_pixel {
        8 => dst.extend_from_slice(&[pixel_value as u8]),
        16 => {
            let bytes = if format.big_endian {
                (pixel_value as u16).to_be_bytes()
            } else {
                (pixel_value as u16).to_le_bytes()
            };
            dst.extend_from_slice(&bytes);
        }
        _ => {
            let bytes = if format.big_endian {
                pixel_value.to_be_bytes()
            } else {
                pixel_value.to_le_bytes()
            };
            dst.extend_from_slice(&bytes);
        }
    }
}

/// Downscales a color component from 8-bit (0-255) to `0..=max` by right-
/// shifting away the low bits the narrower channel can't hold, the same
/// conversion a real RFB/Tight encoder applies (`value >> (8 - bits)`,
/// never a proportional rescale).
#[inline]
fn downscale_component(value: u8, max: u16) -> u16 {
    let bits = channel_bits(max);
    if bits == 0 {
        return 0;
    }
    if bits >= 8 {
        return u16::from(value);
    }
    u16::from(value >> (8 - bits))
}

/// Number of bits needed to represent `max`, i.e. the channel width implied
/// by a `*_max` field (`max == (1 << bits) - 1`).
#[inline]
fn channel_bits(max: u16) -> u32 {
    if max == 0 {
        0
    } else {
        16 - max.leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_format_is_a_pass_through() {
        let format = PixelFormat::default_format();
        let src = vec![10u8, 20, 30, 0, 1, 2, 3, 0];
        let dst = convert_span(&src, &format);
        assert_eq!(&dst[..], &src[..]);
    }

    #[test]
    fn converts_to_rgb565() {
        let format = PixelFormat {
            bits_per_pixel: 16,
            depth: 16,
            big_endian: false,
            true_color: true,
            red_max: 31,
            green_max: 63,
            blue_max: 31,
            red_shift: 11,
            green_shift: 5,
            blue_shift: 0,
        };
        // Pure red in BGRA: B=0 G=0 R=255
        let src = vec![0u8, 0, 255, 0];
        let dst = convert_span(&src, &format);
        assert_eq!(dst.len(), 2);
        let value = u16::from_le_bytes([dst[0], dst[1]]);
        assert_eq!(value, 0xF800);
    }

    #[test]
    fn converts_to_8bpp() {
        let format = PixelFormat {
            bits_per_pixel: 8,
            depth: 8,
            big_endian: false,
            true_color: true,
            red_max: 7,
            green_max: 7,
            blue_max: 3,
            red_shift: 0,
            green_shift: 3,
            blue_shift: 6,
        };
        let src = vec![0u8, 0, 0, 0]; // black
        let dst = convert_span(&src, &format);
        assert_eq!(dst.len(), 1);
        assert_eq!(dst[0], 0);
    }

    #[test]
    fn downscale_is_identity_at_255() {
        assert_eq!(downscale_component(128, 255), 128);
        assert_eq!(downscale_component(255, 31), 31);
        assert_eq!(downscale_component(0, 31), 0);
    }

    #[test]
    fn downscale_shifts_rather_than_rescales() {
        // A proportional rescale (value * max / 255) would give 128*31/255 = 15
        // here; the correct bit-shift conversion (value >> (8 - bits)) gives 16.
        assert_eq!(downscale_component(128, 31), 16);
        // Same divergence for a 6-bit channel: proportional gives 136*63/255 = 33,
        // the shift conversion gives 34.
        assert_eq!(downscale_component(136, 63), 34);
    }
}
