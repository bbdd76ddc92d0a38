//! Resolution tiers and per-frame preparation for video sampling.

use flipbook_core::{FlipbookError, FrameBuffer, Orientation, PixelFormat, Result, RowOrder, Size};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Downscale bucket picked from the longer edge of the encode target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionTier {
    VeryLow,
    Low,
    Medium,
    High,
    Original,
}

impl ResolutionTier {
    /// Tier for a display size.
    ///
    /// | longer edge | tier | scale |
    /// |---|---|---|
    /// | >= 1200 | VeryLow | 0.2 |
    /// | >= 800 | Low | 0.3 |
    /// | >= 400 | Medium | 0.5 |
    /// | > 0 | High | 0.7 |
    /// | 0 | Original | 1.0 |
    pub fn from_size(size: Size) -> Self {
        match size.longer_edge() {
            e if e >= 1200 => Self::VeryLow,
            e if e >= 800 => Self::Low,
            e if e >= 400 => Self::Medium,
            e if e > 0 => Self::High,
            _ => Self::Original,
        }
    }

    pub fn scale_factor(self) -> f32 {
        match self {
            Self::VeryLow => 0.2,
            Self::Low => 0.3,
            Self::Medium => 0.5,
            Self::High => 0.7,
            Self::Original => 1.0,
        }
    }

    /// Output size for an input of `size`, aspect ratio preserved.
    pub fn target_size(self, size: Size) -> Size {
        size.scaled(self.scale_factor())
    }
}

/// Copy a frame into an `image` RGBA raster.
pub fn to_rgba_image(frame: &FrameBuffer) -> Result<RgbaImage> {
    if !frame.is_rasterizable() {
        return Err(FlipbookError::InvalidParameter(format!(
            "frame {} is not rasterizable",
            frame.size()
        )));
    }
    let rgba = frame.to_rgba8();
    RgbaImage::from_raw(rgba.width, rgba.height, rgba.data)
        .ok_or_else(|| FlipbookError::InvalidParameter("frame buffer size mismatch".into()))
}

/// Wrap an `image` RGBA raster as a frame.
pub fn from_rgba_image(image: RgbaImage) -> Result<FrameBuffer> {
    let (width, height) = image.dimensions();
    FrameBuffer::from_raw(width, height, PixelFormat::Rgba8, image.into_raw())
}

/// Turn a sampled video frame into an upright, tier-scaled raster.
///
/// Bottom-up sources are flipped first, then the display orientation is
/// applied, then the result is downscaled with Lanczos3.
pub fn prepare_video_frame(
    frame: &FrameBuffer,
    row_order: RowOrder,
    orientation: Orientation,
    tier: ResolutionTier,
) -> Result<RgbaImage> {
    let mut image = to_rgba_image(frame)?;

    if row_order == RowOrder::BottomUp {
        imageops::flip_vertical_in_place(&mut image);
    }

    image = match orientation {
        Orientation::Up => image,
        Orientation::Right => imageops::rotate90(&image),
        Orientation::Down => imageops::rotate180(&image),
        Orientation::Left => imageops::rotate270(&image),
    };

    if tier == ResolutionTier::Original {
        return Ok(image);
    }
    let target = tier.target_size(Size::new(image.width(), image.height()));
    Ok(imageops::resize(&image, target.width, target.height, FilterType::Lanczos3))
}
