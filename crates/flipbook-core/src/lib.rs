//! Flipbook Core - Foundation types for animated-image processing
//!
//! This crate provides the fundamental types shared by the codec and the
//! filter pipeline:
//! - Pixel buffers (FrameBuffer, PixelFormat)
//! - Dimensions, display orientation and geometric transforms
//! - Exact sample timestamps (RationalTime, FrameRate, TimeRange)
//! - The crate-wide error type

pub mod error;
pub mod frame;
pub mod geometry;
pub mod time;

pub use error::{FlipbookError, Result};
pub use frame::{FrameBuffer, PixelFormat, RowOrder, SharedFrameBuffer};
pub use geometry::{Orientation, Size, Transform};
pub use time::{FrameRate, RationalTime, TimeRange};

/// Fallback delay for animation frames whose timing is unknown.
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;
