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

//! Value objects exchanged with the framebuffer producer, and the
//! [`FramebufferSource`] interface the producer implements.
//!
//! The producer (the host application's renderer) is an external
//! collaborator: this crate only defines the shape of what it hands over.

use std::sync::Arc;

/// An immutable snapshot of the rendered window surface.
///
/// Pixels are tightly packed, row-major, 32 bits per pixel, byte order
/// `[B, G, R, X]`. Cheap to clone: the backing buffer is reference-counted,
/// so handing the same snapshot to many sessions does not copy pixels.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: u16,
    height: u16,
    pixels: Arc<[u8]>,
}

impl Framebuffer {
    /// Builds a framebuffer snapshot.
    ///
    /// # Panics
    ///
    /// Panics if `pixels.len() != width * height * 4`.
    #[must_use]
    pub fn new(width: u16, height: u16, pixels: Arc<[u8]>) -> Self {
        let expected = usize::from(width) * usize::from(height) * 4;
        assert_eq!(
            pixels.len(),
            expected,
            "framebuffer pixel buffer size mismatch"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// The raw BGRX pixel buffer.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Byte slice for one scanline, or `None` if `y` is out of range.
    #[must_use]
    pub fn scanline(&self, y: u16) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let stride = usize::from(self.width) * 4;
        let start = usize::from(y) * stride;
        self.pixels.get(start..start + stride)
    }
}

/// A cursor shape: 32-bit BGRA pixels (alpha carries the 1-bit mask) plus a
/// hotspot offset within the image.
#[derive(Debug, Clone)]
pub struct Cursor {
    width: u16,
    height: u16,
    hotspot_x: u16,
    hotspot_y: u16,
    pixels: Arc<[u8]>,
}

impl Cursor {
    /// Builds a cursor shape.
    ///
    /// # Panics
    ///
    /// Panics if `pixels.len() != width * height * 4`.
    #[must_use]
    pub fn new(width: u16, height: u16, hotspot_x: u16, hotspot_y: u16, pixels: Arc<[u8]>) -> Self {
        let expected = usize::from(width) * usize::from(height) * 4;
        assert_eq!(pixels.len(), expected, "cursor pixel buffer size mismatch");
        Self {
            width,
            height,
            hotspot_x,
            hotspot_y,
            pixels,
        }
    }

    /// An empty 1x1 transparent cursor, used before the producer has
    /// published a real shape.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(1, 1, 0, 0, Arc::from(vec![0u8; 4]))
    }

    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    #[must_use]
    pub fn hotspot_x(&self) -> u16 {
        self.hotspot_x
    }

    #[must_use]
    pub fn hotspot_y(&self) -> u16 {
        self.hotspot_y
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// The producer interface [`crate::server::VncServer`] pulls from.
///
/// Implementations are expected to be cheap to call repeatedly:
/// `current_frame` and `cursor` are polled on every dispatcher tick, and
/// must not block on rendering work.
pub trait FramebufferSource: Send + Sync {
    /// Returns the most recent snapshot, or `None` before the first frame
    /// has been produced.
    fn current_frame(&self) -> Option<Framebuffer>;

    /// Returns the current cursor shape.
    fn cursor(&self) -> Cursor;

    /// Registers a callback invoked after each new frame becomes available.
    /// The callback's only expected action is marking sessions dirty; it
    /// must be safe to call from whatever thread renders frames.
    fn on_frame_produced(&self, callback: Box<dyn Fn() + Send + Sync>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framebuffer_scanline_bounds() {
        let fb = Framebuffer::new(2, 2, Arc::from(vec![0u8; 16]));
        assert!(fb.scanline(0).is_some());
        assert!(fb.scanline(1).is_some());
        assert!(fb.scanline(2).is_none());
        assert_eq!(fb.scanline(0).unwrap().len(), 8);
    }

    #[test]
    #[should_panic(expected = "size mismatch")]
    fn framebuffer_rejects_wrong_buffer_size() {
        let _ = Framebuffer::new(2, 2, Arc::from(vec![0u8; 4]));
    }

    #[test]
    fn empty_cursor_is_one_pixel() {
        let cursor = Cursor::empty();
        assert_eq!(cursor.width(), 1);
        assert_eq!(cursor.height(), 1);
        assert_eq!(cursor.pixels().len(), 4);
    }
}
