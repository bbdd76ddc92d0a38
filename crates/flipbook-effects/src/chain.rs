//! Ordered list of filter stages.

use crate::stage::FilterStage;
use crate::PixelTransform;
use flipbook_core::{FlipbookError, Result, SharedFrameBuffer, Size, Transform};
use std::time::Duration;

/// Lifecycle of a [`FilterChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Uninitialized,
    Ready,
    Released,
}

/// Threads frames through its stages in order.
///
/// `setup_format` forwards the format stage by stage: each stage's output
/// size becomes the next stage's input size, and the transform and output
/// override apply to the first stage only. A frame that any stage fails to
/// produce is dropped for the whole chain.
#[derive(Debug)]
pub struct FilterChain {
    stages: Vec<FilterStage>,
    input: Option<Size>,
    state: ChainState,
}

impl FilterChain {
    pub fn new(stages: Vec<FilterStage>) -> Self {
        Self {
            stages,
            input: None,
            state: ChainState::Uninitialized,
        }
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Whether the first stage swaps its input dimensions.
    pub fn switch_input_dimensions(&self) -> bool {
        self.stages.first().is_some_and(FilterStage::switch_input_dimensions)
    }

    /// Takes effect on the next `setup_format`.
    pub fn set_switch_input_dimensions(&mut self, switch: bool) {
        if let Some(first) = self.stages.first_mut() {
            first.set_switch_input_dimensions(switch);
        }
    }

    /// Transform applied by the first stage.
    pub fn transform(&self) -> Option<Transform> {
        self.stages.first().and_then(FilterStage::transform)
    }
}

impl PixelTransform for FilterChain {
    fn setup_format(&mut self, input: Size, transform: Option<Transform>, output: Size) -> Result<()> {
        if self.state == ChainState::Released {
            return Err(FlipbookError::InvalidParameter("filter chain already released".into()));
        }

        let mut next_input = input;
        for (index, stage) in self.stages.iter_mut().enumerate() {
            if index == 0 {
                stage.setup_format(next_input, transform, output)?;
            } else {
                stage.setup_format(next_input, None, Size::ZERO)?;
            }
            next_input = stage.output_size().unwrap_or(next_input);
        }

        self.input = Some(input);
        self.state = ChainState::Ready;
        tracing::debug!(stages = self.stages.len(), %input, output = %next_input, "Filter chain ready");
        Ok(())
    }

    /// Output size of the last stage, or the input size for an empty chain.
    fn output_size(&self) -> Option<Size> {
        match self.stages.last() {
            Some(last) => last.output_size(),
            None => self.input,
        }
    }

    fn process(&mut self, frame: &SharedFrameBuffer, time: Duration) -> Option<SharedFrameBuffer> {
        if self.state != ChainState::Ready {
            tracing::debug!(state = ?self.state, "Filter chain not ready");
            return None;
        }

        let mut current = SharedFrameBuffer::clone(frame);
        for stage in &mut self.stages {
            current = stage.process(&current, time)?;
        }
        Some(current)
    }

    fn cleanup(&mut self) {
        if self.state == ChainState::Released {
            return;
        }
        for stage in &mut self.stages {
            stage.cleanup();
        }
        self.state = ChainState::Released;
        tracing::debug!(stages = self.stages.len(), "Filter chain released");
    }
}

impl Drop for FilterChain {
    fn drop(&mut self) {
        self.cleanup();
    }
}
