//! Dimensions, display orientation and render transforms.

use glam::Mat4;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};
use std::fmt;

/// 4x4 transform applied to the full-screen quad of a filter pass.
pub type Transform = Mat4;

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    /// Zero-size sentinel.
    pub const ZERO: Self = Self {
        width: 0,
        height: 0,
    };

    /// Create a new size.
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either edge is zero.
    #[inline]
    pub fn is_zero(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The larger of the two edges.
    #[inline]
    pub fn longer_edge(self) -> u32 {
        self.width.max(self.height)
    }

    /// Width and height exchanged.
    #[inline]
    pub fn swapped(self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Scale both edges by `factor`, rounding to the nearest pixel.
    ///
    /// Non-zero edges never collapse below one pixel.
    pub fn scaled(self, factor: f32) -> Self {
        let scale = |edge: u32| {
            if edge == 0 {
                0
            } else {
                ((edge as f32 * factor).round() as u32).max(1)
            }
        };
        Self::new(scale(self.width), scale(self.height))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Display orientation of a video track relative to its stored pixels.
///
/// `Right` means the stored raster must be rotated 90° clockwise to display
/// upright (the usual portrait phone recording).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Up,
    Down,
    Left,
    Right,
}

impl Orientation {
    /// Map a clockwise display rotation in degrees to an orientation.
    ///
    /// Rotations that are not a multiple of 90° fall back to `Up`.
    pub fn from_rotation_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => Self::Right,
            180 => Self::Down,
            270 => Self::Left,
            _ => Self::Up,
        }
    }

    /// Whether the displayed image is taller than the stored one is wide.
    #[inline]
    pub fn is_portrait(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    /// Size of the displayed image for a stored raster of `natural` size.
    pub fn display_size(self, natural: Size) -> Size {
        if self.is_portrait() {
            natural.swapped()
        } else {
            natural
        }
    }

    /// Quad transform that renders the stored raster upright, or `None`
    /// when no rotation is needed.
    pub fn transform(self) -> Option<Transform> {
        match self {
            Self::Up => None,
            Self::Down => Some(Mat4::from_rotation_z(PI)),
            Self::Left => Some(Mat4::from_rotation_z(-FRAC_PI_2)),
            Self::Right => Some(Mat4::from_rotation_z(FRAC_PI_2)),
        }
    }
}
