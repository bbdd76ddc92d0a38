//! Pixel buffer types for frames in CPU memory.
//!
//! A `FrameBuffer` is immutable once produced by a decoder, a video source or
//! a filter pass; sharing happens through `SharedFrameBuffer`.

use crate::error::{FlipbookError, Result};
use crate::geometry::Size;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA (32 bits per pixel)
    #[default]
    Rgba8,
    /// 8-bit BGRA (32 bits per pixel), the native camera buffer layout
    Bgra8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Bgra8 => 4,
        }
    }

    /// Calculate total bytes needed for a tightly packed frame of this format.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// Vertical order of rows in a raster produced by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RowOrder {
    /// Row 0 is the top of the image.
    #[default]
    TopDown,
    /// Row 0 is the bottom of the image (GL-style framebuffers).
    BottomUp,
}

/// A frame in CPU memory, single packed plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes per row
    pub stride: usize,
    /// Raw pixel data
    pub data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a new zeroed frame buffer with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let stride = width as usize * format.bytes_per_pixel();
        Self {
            format,
            width,
            height,
            stride,
            data: vec![0u8; stride * height as usize],
        }
    }

    /// Wrap tightly packed pixel data, validating its length.
    pub fn from_raw(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = format.frame_size(width, height);
        if data.len() != expected {
            return Err(FlipbookError::InvalidParameter(format!(
                "{}x{} {:?} frame needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            format,
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            data,
        })
    }

    /// Create a frame filled with a single RGBA color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(PixelFormat::Rgba8.frame_size(width, height))
            .collect();
        Self {
            format: PixelFormat::Rgba8,
            width,
            height,
            stride: width as usize * 4,
            data,
        }
    }

    /// Frame dimensions.
    #[inline]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds a complete, non-empty raster.
    ///
    /// Anything else cannot be handed to an encoder or uploaded to a texture.
    pub fn is_rasterizable(&self) -> bool {
        let row_bytes = self.width as usize * self.format.bytes_per_pixel();
        self.width > 0
            && self.height > 0
            && self.stride >= row_bytes
            && self.data.len() >= self.stride * (self.height as usize - 1) + row_bytes
    }

    /// Get a row of pixel data.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.format.bytes_per_pixel();
        &self.data[start..end]
    }

    /// Get a mutable row of pixel data.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.format.bytes_per_pixel();
        &mut self.data[start..end]
    }

    /// Pixel at (x, y) as RGBA regardless of storage format.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = x as usize * 4;
        let p = &self.row(y)[i..i + 4];
        match self.format {
            PixelFormat::Rgba8 => [p[0], p[1], p[2], p[3]],
            PixelFormat::Bgra8 => [p[2], p[1], p[0], p[3]],
        }
    }

    /// Tightly packed RGBA copy of this frame.
    pub fn to_rgba8(&self) -> FrameBuffer {
        let mut out = Self::new(self.width, self.height, PixelFormat::Rgba8);
        for y in 0..self.height {
            let src = self.row(y);
            let dst = out.row_mut(y);
            match self.format {
                PixelFormat::Rgba8 => dst.copy_from_slice(src),
                PixelFormat::Bgra8 => {
                    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                        d.copy_from_slice(&[s[2], s[1], s[0], s[3]]);
                    }
                }
            }
        }
        out
    }

    /// Create a test pattern frame (color bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Rgba8);
        let colors: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];

        for y in 0..height {
            let row = frame.row_mut(y);
            for x in 0..width {
                let i = (x * 4) as usize;
                let bar = (x as u64 * 8 / width as u64) as usize;
                row[i..i + 4].copy_from_slice(&colors[bar]);
            }
        }

        frame
    }
}

/// Arc-wrapped frame buffer for shared ownership.
pub type SharedFrameBuffer = Arc<FrameBuffer>;
