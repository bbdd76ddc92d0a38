//! Animated GIF encoding.
//!
//! Each encode runs on its own worker thread and reports through a
//! completion channel. Frames are written strictly in input order, and the
//! loop count is written once, before the first frame.

use crate::resolution::{prepare_video_frame, ResolutionTier};
use crate::timing::TimedFrame;
use crate::video::VideoSource;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use flipbook_core::{FlipbookError, FrameRate, RationalTime, Result, Size};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(0);

/// How many times an animation plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopCount {
    #[default]
    Infinite,
    Finite(u16),
}

impl LoopCount {
    /// Interpret a container loop count where 0 means forever.
    pub fn from_count(count: u32) -> Self {
        match count {
            0 => Self::Infinite,
            n => Self::Finite(n.min(u16::MAX as u32) as u16),
        }
    }
}

impl From<LoopCount> for gif::Repeat {
    fn from(count: LoopCount) -> Self {
        match count {
            LoopCount::Infinite => gif::Repeat::Infinite,
            LoopCount::Finite(n) => gif::Repeat::Finite(n),
        }
    }
}

impl From<gif::Repeat> for LoopCount {
    fn from(repeat: gif::Repeat) -> Self {
        match repeat {
            gif::Repeat::Infinite => Self::Infinite,
            gif::Repeat::Finite(n) => Self::Finite(n),
        }
    }
}

/// Encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Directory that receives the generated files.
    pub temp_dir: PathBuf,
    /// File name prefix for generated files.
    pub file_prefix: String,
    /// NeuQuant sampling speed, 1 (best) to 30 (fastest).
    pub quantizer_speed: i32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            file_prefix: "flipbook-gif".into(),
            quantizer_speed: 10,
        }
    }
}

impl EncoderConfig {
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn with_quantizer_speed(mut self, speed: i32) -> Self {
        self.quantizer_speed = speed;
        self
    }

    fn next_output_path(&self) -> PathBuf {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let id = NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed);
        self.temp_dir
            .join(format!("{}-{}-{}.gif", self.file_prefix, millis, id))
    }
}

/// Handle for cancelling an in-flight encode.
#[derive(Debug, Clone)]
pub struct EncodeCancel(Arc<AtomicBool>);

impl EncodeCancel {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(FlipbookError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for EncodeCancel {
    fn default() -> Self {
        Self::new()
    }
}

/// A running encode.
///
/// The worker delivers exactly one message on [`completion`](Self::completion):
/// the output path, or the error that stopped it. Dropping the task cancels
/// the worker. A partially written file is left in place; its path is
/// available from [`output_path`](Self::output_path).
#[derive(Debug)]
pub struct EncodeTask {
    completion: Receiver<Result<PathBuf>>,
    cancel: EncodeCancel,
    output_path: PathBuf,
}

impl EncodeTask {
    pub fn completion(&self) -> &Receiver<Result<PathBuf>> {
        &self.completion
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Block until the worker finishes.
    pub fn wait(self) -> Result<PathBuf> {
        self.completion
            .recv()
            .unwrap_or_else(|_| Err(worker_vanished()))
    }

    /// Block for at most `timeout`. `None` means still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<PathBuf>> {
        match self.completion.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(worker_vanished())),
        }
    }

    /// Non-blocking poll.
    pub fn try_result(&self) -> Option<Result<PathBuf>> {
        match self.completion.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_vanished())),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> EncodeCancel {
        self.cancel.clone()
    }
}

impl Drop for EncodeTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn worker_vanished() -> FlipbookError {
    FlipbookError::Encoder("encode worker exited without reporting".into())
}

/// Writes animated GIFs from frame lists or sampled video.
#[derive(Debug, Clone, Default)]
pub struct AnimationEncoder {
    config: EncoderConfig,
}

impl AnimationEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode an explicit frame list.
    ///
    /// An empty list is rejected here, before any file is created. A frame
    /// that cannot be rasterized fails the whole encode.
    pub fn encode_frames(&self, frames: Vec<TimedFrame>, loop_count: LoopCount) -> Result<EncodeTask> {
        if frames.is_empty() {
            return Err(FlipbookError::InvalidParameter(
                "cannot encode an empty frame list".into(),
            ));
        }

        let speed = self.config.quantizer_speed;
        self.spawn("flipbook-gif-frames", move |path, cancel| {
            let canvas = frames.iter().fold(Size::ZERO, |acc, f| {
                Size::new(acc.width.max(f.image.width), acc.height.max(f.image.height))
            });
            if let Some(index) = frames.iter().position(|f| !f.image.is_rasterizable()) {
                return Err(FlipbookError::Encoder(format!(
                    "frame {} has no rasterizable image",
                    index
                )));
            }
            let mut writer = GifWriter::create(path, canvas, loop_count, speed)?;

            for frame in &frames {
                cancel.check()?;
                let rgba = frame.image.to_rgba8();
                let size = rgba.size();
                writer.write(rgba.data, size, delay_centiseconds(frame.delay_ms))?;
            }
            writer.finish()
        })
    }

    /// Sample a video at `fps` and encode the samples.
    ///
    /// The resolution tier is chosen from the first sampled frame and used
    /// for every frame of this call.
    pub fn encode_video<S>(&self, source: S, loop_count: LoopCount, fps: u32) -> Result<EncodeTask>
    where
        S: VideoSource + Send + 'static,
    {
        if fps == 0 {
            return Err(FlipbookError::InvalidParameter(
                "frames per second must be positive".into(),
            ));
        }
        let times = sample_times(source.duration(), fps);
        if times.is_empty() {
            return Err(FlipbookError::InvalidParameter(format!(
                "video of {} yields no frames at {} fps",
                source.duration(),
                fps
            )));
        }

        let speed = self.config.quantizer_speed;
        let delay = video_delay_centiseconds(fps);
        self.spawn("flipbook-gif-video", move |path, cancel| {
            let orientation = source.orientation();
            let row_order = source.row_order();
            let mut selected_tier = None;
            let mut writer: Option<GifWriter> = None;

            for (index, &time) in times.iter().enumerate() {
                cancel.check()?;
                let frame = source.frame_at(time).map_err(|e| {
                    FlipbookError::Decoder(format!("sample {} at {}: {}", index, time, e))
                })?;
                let tier = *selected_tier.get_or_insert_with(|| {
                    let tier = ResolutionTier::from_size(orientation.display_size(frame.size()));
                    tracing::debug!(?tier, samples = times.len(), "Resolution tier selected");
                    tier
                });

                let image = prepare_video_frame(&frame, row_order, orientation, tier)?;
                let size = Size::new(image.width(), image.height());
                if writer.is_none() {
                    writer = Some(GifWriter::create(path, size, loop_count, speed)?);
                }
                if let Some(writer) = writer.as_mut() {
                    writer.write(image.into_raw(), size, delay)?;
                }
            }

            match writer {
                Some(writer) => writer.finish(),
                None => Err(FlipbookError::Encoder("no frames sampled".into())),
            }
        })
    }

    fn spawn<F>(&self, name: &str, job: F) -> Result<EncodeTask>
    where
        F: FnOnce(&Path, &EncodeCancel) -> Result<u64> + Send + 'static,
    {
        let output_path = self.config.next_output_path();
        let cancel = EncodeCancel::new();
        let (tx, rx) = crossbeam_channel::bounded(1);

        let worker_path = output_path.clone();
        let worker_cancel = cancel.clone();
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                tracing::info!(path = %worker_path.display(), "GIF encode started");
                let result = match job(&worker_path, &worker_cancel) {
                    Ok(frames) => {
                        tracing::info!(path = %worker_path.display(), frames, "GIF encode finished");
                        Ok(worker_path)
                    }
                    Err(e) => {
                        tracing::warn!(path = %worker_path.display(), error = %e, "GIF encode failed");
                        discard_partial(&worker_path);
                        Err(e)
                    }
                };
                let _ = tx.send(result);
            })?;

        Ok(EncodeTask {
            completion: rx,
            cancel,
            output_path,
        })
    }
}

fn discard_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial GIF"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not remove partial GIF"),
    }
}

/// Evenly spaced sample timestamps for `fps` frames per second.
///
/// `count = floor(duration * fps)`, and sample `i` sits at
/// `i * duration / count`.
pub fn sample_times(duration: RationalTime, fps: u32) -> Vec<RationalTime> {
    if fps == 0 || !duration.is_positive() {
        return Vec::new();
    }
    let count = duration.to_frames(FrameRate::fps(fps));
    if count <= 0 {
        return Vec::new();
    }
    let increment = duration / count;
    (0..count).map(|i| increment * i).collect()
}

/// Milliseconds to GIF centiseconds, rounded, at least 1.
pub fn delay_centiseconds(delay_ms: u32) -> u16 {
    (delay_ms.saturating_add(5) / 10).clamp(1, u16::MAX as u32) as u16
}

fn video_delay_centiseconds(fps: u32) -> u16 {
    ((100 + fps / 2) / fps).clamp(1, u16::MAX as u32) as u16
}

/// Streams frames into a GIF file.
struct GifWriter {
    encoder: gif::Encoder<BufWriter<File>>,
    canvas: Size,
    speed: i32,
    frames: u64,
}

impl GifWriter {
    fn create(path: &Path, canvas: Size, loop_count: LoopCount, speed: i32) -> Result<Self> {
        if canvas.is_zero() || canvas.width > u16::MAX as u32 || canvas.height > u16::MAX as u32 {
            return Err(FlipbookError::InvalidParameter(format!(
                "unsupported GIF canvas {}",
                canvas
            )));
        }
        let file = BufWriter::new(File::create(path)?);
        let mut encoder = gif::Encoder::new(file, canvas.width as u16, canvas.height as u16, &[])
            .map_err(encoding_error)?;
        encoder
            .set_repeat(loop_count.into())
            .map_err(encoding_error)?;
        Ok(Self {
            encoder,
            canvas,
            speed: speed.clamp(1, 30),
            frames: 0,
        })
    }

    fn write(&mut self, mut rgba: Vec<u8>, size: Size, delay_cs: u16) -> Result<()> {
        if size.is_zero() || size.width > self.canvas.width || size.height > self.canvas.height {
            return Err(FlipbookError::Encoder(format!(
                "frame {} does not fit canvas {}",
                size, self.canvas
            )));
        }
        let mut frame =
            gif::Frame::from_rgba_speed(size.width as u16, size.height as u16, &mut rgba, self.speed);
        frame.delay = delay_cs;
        self.encoder.write_frame(&frame).map_err(encoding_error)?;
        self.frames += 1;
        Ok(())
    }

    fn finish(self) -> Result<u64> {
        let mut file = self.encoder.into_inner()?;
        file.flush()?;
        Ok(self.frames)
    }
}

fn encoding_error(e: gif::EncodingError) -> FlipbookError {
    FlipbookError::Encoder(e.to_string())
}
