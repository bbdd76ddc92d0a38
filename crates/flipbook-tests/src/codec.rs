//! Integration tests for the animated-image codec.
//!
//! Encodes with flipbook-media, reads the result back and checks the timing
//! survives normalization.

use flipbook_core::{FrameBuffer, Orientation, RationalTime, Result, Size, TimeRange};
use flipbook_media::{
    frames_for_playback, AnimationDecoder, AnimationEncoder, AnimationSource, EncoderConfig, LoopCount,
    PlaybackMode, PlaybackSettings, ResolutionTier, TimedFrame, TimedFrameSequence, VideoSource,
};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

// ── Helpers ────────────────────────────────────────────────────

fn solid(rgba: [u8; 4]) -> TimedFrame {
    TimedFrame::new(Arc::new(FrameBuffer::solid(16, 12, rgba)), 0)
}

fn frames(delays: &[u32]) -> Vec<TimedFrame> {
    let colors = [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255], [255, 255, 0, 255]];
    delays
        .iter()
        .enumerate()
        .map(|(i, &delay)| TimedFrame {
            delay_ms: delay,
            ..solid(colors[i % colors.len()])
        })
        .collect()
}

fn encoder(dir: &tempfile::TempDir) -> AnimationEncoder {
    AnimationEncoder::new(EncoderConfig::default().with_temp_dir(dir.path()))
}

/// Video stand-in producing solid frames and recording sample times.
struct SyntheticVideo {
    size: Size,
    duration: RationalTime,
    orientation: Orientation,
    requested: Arc<Mutex<Vec<RationalTime>>>,
}

impl SyntheticVideo {
    fn new(size: Size, duration: RationalTime) -> Self {
        Self {
            size,
            duration,
            orientation: Orientation::Up,
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl VideoSource for SyntheticVideo {
    fn duration(&self) -> RationalTime {
        self.duration
    }

    fn natural_size(&self) -> Size {
        self.size
    }

    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn frame_at(&self, time: RationalTime) -> Result<FrameBuffer> {
        self.requested.lock().push(time);
        Ok(FrameBuffer::solid(self.size.width, self.size.height, [40, 80, 120, 255]))
    }
}

// ── Frame list round trip ──────────────────────────────────────

#[test]
fn encode_decode_preserves_timing() {
    let dir = tempfile::tempdir().unwrap();
    let path = encoder(&dir)
        .encode_frames(frames(&[100, 300]), LoopCount::Infinite)
        .unwrap()
        .wait()
        .unwrap();

    let decoder = AnimationDecoder::new();
    let source = AnimationSource::from(path);
    let sequence = decoder.decode(&source);
    assert_eq!(sequence.len(), 2);
    assert_eq!(sequence.delays(), vec![100, 300]);
    assert_eq!(decoder.native_size(&source), Size::new(16, 12));
    assert_eq!(decoder.loop_count(&source), Some(LoopCount::Infinite));

    let uniform = sequence.normalize();
    assert_eq!(uniform.interval_ms, 100);
    assert_eq!(uniform.frame_count(), 4);
    assert!(Arc::ptr_eq(&uniform.frames[1], &uniform.frames[3]));
    assert!(!Arc::ptr_eq(&uniform.frames[0], &uniform.frames[1]));
}

#[test]
fn single_frame_is_not_an_animation() {
    let dir = tempfile::tempdir().unwrap();
    let path = encoder(&dir)
        .encode_frames(frames(&[100]), LoopCount::Finite(2))
        .unwrap()
        .wait()
        .unwrap();

    let decoder = AnimationDecoder::new();
    let source = AnimationSource::from(path);
    assert!(decoder.decode(&source).is_empty());
    assert_eq!(decoder.frame_count(&source), 1);
    assert_eq!(decoder.loop_count(&source), Some(LoopCount::Finite(2)));
}

#[test]
fn empty_frame_list_rejected_before_io() {
    let dir = tempfile::tempdir().unwrap();
    assert!(encoder(&dir).encode_frames(Vec::new(), LoopCount::Infinite).is_err());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn playback_settings_survive_reencode() {
    let dir = tempfile::tempdir().unwrap();
    let source = TimedFrameSequence::new(frames(&[100, 100, 100, 100]));
    let rebound = frames_for_playback(
        &source,
        &PlaybackSettings::default()
            .with_rate(2.0)
            .with_mode(PlaybackMode::Rebound),
    );
    assert_eq!(rebound.len(), 6);

    let path = encoder(&dir)
        .encode_frames(rebound.into_frames(), LoopCount::Infinite)
        .unwrap()
        .wait()
        .unwrap();
    let decoded = AnimationDecoder::new().decode(&AnimationSource::from(path));
    assert_eq!(decoded.delays(), vec![50; 6]);
    assert_eq!(decoded.total_duration_ms(), 300);
}

// ── Video sampling ─────────────────────────────────────────────

#[test]
fn video_samples_downscaled_by_tier() {
    let dir = tempfile::tempdir().unwrap();
    let video = SyntheticVideo::new(Size::new(1600, 1200), RationalTime::new(2, 1));
    let requested = Arc::clone(&video.requested);
    assert_eq!(ResolutionTier::from_size(video.display_size()), ResolutionTier::VeryLow);

    let path = encoder(&dir)
        .encode_video(video, LoopCount::Infinite, 10)
        .unwrap()
        .wait()
        .unwrap();

    let times = requested.lock().clone();
    assert_eq!(times.len(), 20);
    assert_eq!(times[0], RationalTime::ZERO);
    assert_eq!(times[1], RationalTime::from_millis(100));
    assert!(times.windows(2).all(|w| w[0] < w[1]));
    let clip = TimeRange::new(RationalTime::ZERO, RationalTime::new(2, 1));
    assert!(times.iter().all(|&t| clip.contains(t)));
    assert_eq!(times[19].as_millis_floor(), 1900);

    let decoder = AnimationDecoder::new();
    let source = AnimationSource::from(path);
    assert_eq!(decoder.frame_count(&source), 20);
    assert_eq!(decoder.native_size(&source), Size::new(320, 240));
    assert_eq!(decoder.decode(&source).delays(), vec![100; 20]);
}

#[test]
fn rotated_video_uses_display_orientation() {
    let dir = tempfile::tempdir().unwrap();
    let mut video = SyntheticVideo::new(Size::new(600, 300), RationalTime::from_millis(300));
    video.orientation = Orientation::Right;

    let path = encoder(&dir)
        .encode_video(video, LoopCount::Infinite, 10)
        .unwrap()
        .wait()
        .unwrap();

    // 300x600 portrait, tier Medium (0.5).
    let size = AnimationDecoder::new().native_size(&AnimationSource::from(path));
    assert_eq!(size, Size::new(150, 300));
}

#[test]
fn cancelled_video_encode_reports_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let video = SyntheticVideo::new(Size::new(64, 64), RationalTime::new(600, 1));
    let task = encoder(&dir).encode_video(video, LoopCount::Infinite, 30).unwrap();
    task.cancel();

    match task.wait_timeout(Duration::from_secs(30)) {
        Some(result) => assert!(result.is_err()),
        None => panic!("cancelled encode did not finish"),
    }
}

// ── Properties ─────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn normalized_round_trip_keeps_total_duration(
        centis in proptest::collection::vec(1u32..40, 2..5),
    ) {
        let delays: Vec<u32> = centis.iter().map(|c| c * 10).collect();
        let dir = tempfile::tempdir().unwrap();
        let path = encoder(&dir)
            .encode_frames(frames(&delays), LoopCount::Infinite)
            .unwrap()
            .wait()
            .unwrap();

        let decoded = AnimationDecoder::new().decode(&AnimationSource::from(path));
        prop_assert_eq!(decoded.delays(), delays.clone());

        let uniform = decoded.normalize();
        let total: u64 = delays.iter().map(|&d| d as u64).sum();
        prop_assert_eq!(uniform.total_duration_ms(), total);
        prop_assert_eq!(total % uniform.interval_ms as u64, 0);
    }
}
