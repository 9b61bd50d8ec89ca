//! JPEG encoding for the Tight encoding's JPEG compression sub-mode.
//!
//! [`JpegEncoder`] is the interface [`crate::encoding::tight`] drives;
//! [`SoftwareJpeg`] is the default, pure-Rust implementation. A
//! hardware-accelerated implementation (e.g. VAAPI) can be swapped in
//! behind the same trait without touching the Tight wrapper.

use jpeg_encoder::{ColorType, Encoder};

/// Encodes a rectangle of pixels to a JPEG byte blob.
pub trait JpegEncoder: Send {
    /// Encodes `rgba` (4 bytes per pixel, `width * height * 4` total) at
    /// `quality` (1..=100).
    ///
    /// # Errors
    ///
    /// Returns an error string if the underlying encoder rejects the input.
    fn encode(&mut self, rgba: &[u8], width: u16, height: u16, quality: u8) -> Result<Vec<u8>, String>;
}

/// Pure-Rust software JPEG encoder, the server's default.
#[derive(Debug, Default)]
pub struct SoftwareJpeg;

impl JpegEncoder for SoftwareJpeg {
    fn encode(&mut self, rgba: &[u8], width: u16, height: u16, quality: u8) -> Result<Vec<u8>, String> {
        let mut output = Vec::new();
        let encoder = Encoder::new(&mut output, quality);
        encoder
            .encode(rgba, width, height, ColorType::Rgba)
            .map_err(|e| e.to_string())?;
        Ok(output)
    }
}

/// Maps a Tight "JPEG quality level" (0..=9, as negotiated via the
/// `-32..=-23` pseudo-encoding range) to a `jpeg_encoder` quality (1..=100).
#[must_use]
pub fn quality_level_to_jpeg_quality(level: u8) -> u8 {
    (level.min(9) + 1) * 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_formula_matches_boundaries() {
        assert_eq!(quality_level_to_jpeg_quality(0), 10);
        assert_eq!(quality_level_to_jpeg_quality(9), 100);
        assert_eq!(quality_level_to_jpeg_quality(4), 50);
    }

    #[test]
    fn quality_formula_clamps_above_nine() {
        assert_eq!(quality_level_to_jpeg_quality(200), 100);
    }

    #[test]
    fn software_jpeg_encodes_a_solid_rectangle() {
        let mut encoder = SoftwareJpeg;
        let pixels = vec![128u8; 16 * 16 * 4];
        let out = encoder.encode(&pixels, 16, 16, 80).unwrap();
        assert!(!out.is_empty());
        // JPEG SOI marker.
        assert_eq!(&out[0..2], &[0xFF, 0xD8]);
    }
}
