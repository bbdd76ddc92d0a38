//! Flipbook Media - animated-image codec
//!
//! This crate handles:
//! - GIF decoding into timed frames
//! - GCD-based frame timing normalization
//! - GIF encoding from frame lists or sampled video, off the caller's thread
//! - Resolution tiers and orientation for video samples
//! - Playback ordering (loop, rebound, reverse), trimming and speed

pub mod decoder;
pub mod encoder;
pub mod playback;
pub mod resolution;
pub mod timing;
pub mod video;

pub use decoder::{AnimationDecoder, AnimationSource};
pub use encoder::{sample_times, AnimationEncoder, EncodeCancel, EncodeTask, EncoderConfig, LoopCount};
pub use playback::{frame_at_time, frames_for_playback, timestamp_at, PlaybackMode, PlaybackSettings};
pub use resolution::{prepare_video_frame, ResolutionTier};
pub use timing::{gcd_all, normalize, TimedFrame, TimedFrameSequence, UniformFrameSequence};
pub use video::{FfmpegVideoSource, VideoSource};
