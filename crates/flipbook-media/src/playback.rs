//! Playback ordering, trimming and speed for decoded animations.

use crate::timing::{TimedFrame, TimedFrameSequence};
use serde::{Deserialize, Serialize};

/// Frame ordering for playback and re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackMode {
    /// Forward, then start over.
    #[default]
    Loop,
    /// Forward then backward, without repeating the end frames.
    Rebound,
    /// Backward.
    Reverse,
}

/// Trim range, speed and ordering applied to a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Speed multiplier; 2.0 plays twice as fast.
    pub rate: f32,
    pub start_index: usize,
    /// Inclusive; `None` means the last frame.
    pub end_index: Option<usize>,
    pub mode: PlaybackMode,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            rate: 1.0,
            start_index: 0,
            end_index: None,
            mode: PlaybackMode::Loop,
        }
    }
}

impl PlaybackSettings {
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_range(mut self, start_index: usize, end_index: usize) -> Self {
        self.start_index = start_index;
        self.end_index = Some(end_index);
        self
    }

    pub fn with_mode(mut self, mode: PlaybackMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Apply trim, rate and mode to a sequence.
///
/// Out-of-range indices are clamped. Delays are divided by the rate and
/// rounded to whole milliseconds, never below 1. A non-positive rate plays
/// at normal speed.
pub fn frames_for_playback(sequence: &TimedFrameSequence, settings: &PlaybackSettings) -> TimedFrameSequence {
    let frames = sequence.frames();
    if frames.is_empty() {
        return TimedFrameSequence::empty();
    }

    let last = frames.len() - 1;
    let end = settings.end_index.unwrap_or(last).min(last);
    let start = settings.start_index.min(end);
    let rate = if settings.rate.is_finite() && settings.rate > 0.0 {
        settings.rate
    } else {
        1.0
    };

    let trimmed: Vec<TimedFrame> = frames[start..=end]
        .iter()
        .map(|f| TimedFrame {
            image: f.image.clone(),
            delay_ms: ((f.delay_ms as f32 / rate).round() as u32).max(1),
        })
        .collect();

    let ordered = match settings.mode {
        PlaybackMode::Loop => trimmed,
        PlaybackMode::Reverse => trimmed.into_iter().rev().collect(),
        PlaybackMode::Rebound => rebound(trimmed),
    };
    TimedFrameSequence::new(ordered)
}

/// `frames` followed by its reverse without the two end frames.
fn rebound(mut frames: Vec<TimedFrame>) -> Vec<TimedFrame> {
    let n = frames.len();
    if n < 3 {
        return frames;
    }
    let back: Vec<TimedFrame> = frames[1..n - 1].iter().rev().cloned().collect();
    frames.extend(back);
    frames
}

/// Frame on screen `ms` milliseconds into looped playback.
pub fn frame_at_time(sequence: &TimedFrameSequence, ms: u64) -> Option<(usize, &TimedFrame)> {
    let total = sequence.total_duration_ms();
    if total == 0 {
        return None;
    }
    let mut remaining = ms % total;
    for (index, frame) in sequence.iter().enumerate() {
        let delay = frame.delay_ms as u64;
        if remaining < delay {
            return Some((index, frame));
        }
        remaining -= delay;
    }
    None
}

/// Start time of frame `index` in milliseconds.
pub fn timestamp_at(sequence: &TimedFrameSequence, index: usize) -> u64 {
    sequence
        .iter()
        .take(index)
        .map(|f| f.delay_ms as u64)
        .sum()
}
