//! Flipbook Effects - shader filter stages and chains
//!
//! A [`FilterStage`] runs one shader program over a frame; a [`FilterChain`]
//! threads frames through an ordered list of stages. Both draw through a
//! shared [`flipbook_gpu::RenderBackend`], so they can be exercised without
//! a GPU by substituting the backend.

pub mod chain;
pub mod factory;
pub mod kind;
pub mod registry;
pub mod shaders;
pub mod stage;

pub use chain::{ChainState, FilterChain};
pub use factory::FilterFactory;
pub use kind::FilterKind;
pub use registry::{FilterRegistry, FilterSpec, ALPHA_BLEND, BASE_VERTEX};
pub use shaders::BuiltinShaders;
pub use stage::FilterStage;

use flipbook_core::{Result, SharedFrameBuffer, Size, Transform};
use std::time::Duration;

/// Something that turns one frame into another at a point in time.
pub trait PixelTransform {
    /// Declare the incoming frame size, an optional geometric transform and
    /// the requested output size (`Size::ZERO` keeps the input size). Must be
    /// called before the first [`process`](Self::process) and again whenever
    /// the upstream format changes.
    fn setup_format(&mut self, input: Size, transform: Option<Transform>, output: Size) -> Result<()>;

    /// Output size declared by the last `setup_format`.
    fn output_size(&self) -> Option<Size>;

    /// Transform one frame. `None` means no frame could be produced.
    fn process(&mut self, frame: &SharedFrameBuffer, time: Duration) -> Option<SharedFrameBuffer>;

    /// Release GPU resources. Safe to call more than once.
    fn cleanup(&mut self);
}
