//! Frame timing normalization.
//!
//! Animated images carry a delay per frame. Simple "tick every N ms"
//! playback wants one interval for the whole sequence, so variable delays are
//! rewritten as integer repeat counts of their greatest common divisor.

use flipbook_core::{SharedFrameBuffer, DEFAULT_FRAME_DELAY_MS};
use std::sync::Arc;

/// One raster image and its on-screen duration.
#[derive(Debug, Clone)]
pub struct TimedFrame {
    pub image: SharedFrameBuffer,
    pub delay_ms: u32,
}

impl TimedFrame {
    pub fn new(image: SharedFrameBuffer, delay_ms: u32) -> Self {
        Self { image, delay_ms }
    }
}

/// Ordered frames with individual delays.
#[derive(Debug, Clone, Default)]
pub struct TimedFrameSequence {
    frames: Vec<TimedFrame>,
}

impl TimedFrameSequence {
    pub fn new(frames: Vec<TimedFrame>) -> Self {
        Self { frames }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimedFrame> {
        self.frames.iter()
    }

    pub fn get(&self, index: usize) -> Option<&TimedFrame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[TimedFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<TimedFrame> {
        self.frames
    }

    /// Per-frame delays in milliseconds, in order.
    pub fn delays(&self) -> Vec<u32> {
        self.frames.iter().map(|f| f.delay_ms).collect()
    }

    /// Sum of all delays.
    pub fn total_duration_ms(&self) -> u64 {
        self.frames.iter().map(|f| f.delay_ms as u64).sum()
    }

    /// Expand into a uniform-interval sequence. See [`normalize`].
    pub fn normalize(&self) -> UniformFrameSequence {
        normalize(self)
    }
}

impl From<Vec<TimedFrame>> for TimedFrameSequence {
    fn from(frames: Vec<TimedFrame>) -> Self {
        Self::new(frames)
    }
}

impl<'a> IntoIterator for &'a TimedFrameSequence {
    type Item = &'a TimedFrame;
    type IntoIter = std::slice::Iter<'a, TimedFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// Frames that all share one display interval.
///
/// Consecutive repeats of a source frame point at the same allocation.
#[derive(Debug, Clone, Default)]
pub struct UniformFrameSequence {
    pub frames: Vec<SharedFrameBuffer>,
    pub interval_ms: u32,
}

impl UniformFrameSequence {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.frames.len() as u64 * self.interval_ms as u64
    }
}

/// Greatest common divisor by Euclid's algorithm.
pub fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// GCD of a whole delay list.
///
/// An empty list yields [`DEFAULT_FRAME_DELAY_MS`]; a single delay is its
/// own GCD.
pub fn gcd_all(delays: &[u32]) -> u32 {
    match delays {
        [] => DEFAULT_FRAME_DELAY_MS,
        [first, rest @ ..] => rest.iter().fold(*first, |acc, &d| gcd(acc, d)),
    }
}

/// Rewrite a variable-delay sequence as repeated frames at one interval.
///
/// Frame `i` is repeated `delay_i / g` times where `g` is the GCD of all
/// delays, so `frame_count * interval == total duration` exactly. Zero
/// delays count as 1 ms. Fewer than two frames yields an empty result.
pub fn normalize(sequence: &TimedFrameSequence) -> UniformFrameSequence {
    if sequence.len() < 2 {
        return UniformFrameSequence::default();
    }

    let delays: Vec<u32> = sequence.iter().map(|f| f.delay_ms.max(1)).collect();
    let interval = gcd_all(&delays);
    let total: u64 = delays.iter().map(|&d| d as u64).sum();
    let frame_count = (total / interval as u64) as usize;

    let mut frames = Vec::with_capacity(frame_count);
    for (frame, &delay) in sequence.iter().zip(&delays) {
        let repeats = (delay / interval) as usize;
        frames.extend(std::iter::repeat_with(|| Arc::clone(&frame.image)).take(repeats));
    }

    debug_assert_eq!(frames.len(), frame_count, "gcd expansion drifted");
    frames.truncate(frame_count);

    tracing::debug!(
        source_frames = sequence.len(),
        frames = frames.len(),
        interval_ms = interval,
        "Normalized frame timing"
    );

    UniformFrameSequence {
        frames,
        interval_ms: interval,
    }
}
