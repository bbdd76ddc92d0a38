//! Animated GIF decoding.
//!
//! Decoding is best-effort: anything unreadable, and any source with fewer
//! than two frames, comes back as an empty sequence or a zero size rather
//! than an error. Callers treat that as "not an animation" and fall back to
//! still-image handling.

use crate::encoder::LoopCount;
use crate::timing::{TimedFrame, TimedFrameSequence, UniformFrameSequence};
use flipbook_core::{FlipbookError, FrameBuffer, PixelFormat, Result, Size, DEFAULT_FRAME_DELAY_MS};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Delays at or below this many milliseconds are read as the default delay
/// by the clamped timing rule, matching how browsers play such files.
pub const CLAMPED_DELAY_THRESHOLD_MS: u32 = 10;

/// Largest RGBA canvas a decode will allocate, 8192x8192.
pub const MAX_CANVAS_BYTES: u64 = 256 * 1024 * 1024;

/// Where an animation is read from.
#[derive(Debug, Clone)]
pub enum AnimationSource {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl AnimationSource {
    fn open(&self) -> Result<Box<dyn Read + '_>> {
        match self {
            Self::File(path) => {
                let file = File::open(path).map_err(|e| {
                    FlipbookError::NotFound(format!("{}: {}", path.display(), e))
                })?;
                Ok(Box::new(BufReader::new(file)))
            }
            Self::Memory(bytes) => Ok(Box::new(Cursor::new(&bytes[..]))),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Memory(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

impl From<PathBuf> for AnimationSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for AnimationSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<Vec<u8>> for AnimationSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Memory(bytes.into())
    }
}

/// Pick a frame delay from the container's timing fields.
///
/// The unclamped value wins when present and non-zero, then the clamped
/// value, then [`DEFAULT_FRAME_DELAY_MS`].
pub fn resolve_delay_ms(unclamped_ms: Option<u32>, clamped_ms: Option<u32>) -> u32 {
    unclamped_ms
        .filter(|&ms| ms > 0)
        .or(clamped_ms.filter(|&ms| ms > 0))
        .unwrap_or(DEFAULT_FRAME_DELAY_MS)
}

/// Browser-style clamp of a raw delay.
pub fn clamp_delay_ms(raw_ms: u32) -> u32 {
    if raw_ms <= CLAMPED_DELAY_THRESHOLD_MS {
        DEFAULT_FRAME_DELAY_MS
    } else {
        raw_ms
    }
}

fn frame_delay_ms(frame: &gif::Frame<'_>) -> u32 {
    let raw_ms = frame.delay as u32 * 10;
    resolve_delay_ms(Some(raw_ms), Some(clamp_delay_ms(raw_ms)))
}

/// Reads animated GIFs into timed frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnimationDecoder;

impl AnimationDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode every frame with its delay.
    ///
    /// Returns an empty sequence when the source cannot be read or holds
    /// fewer than two frames.
    pub fn decode(&self, source: &AnimationSource) -> TimedFrameSequence {
        match self.try_decode(source) {
            Ok(sequence) if sequence.len() >= 2 => {
                tracing::debug!(
                    source = %source.describe(),
                    frames = sequence.len(),
                    "Decoded animation"
                );
                sequence
            }
            Ok(sequence) => {
                tracing::debug!(
                    source = %source.describe(),
                    frames = sequence.len(),
                    "Not an animation"
                );
                TimedFrameSequence::empty()
            }
            Err(e) => {
                tracing::warn!(source = %source.describe(), error = %e, "Animation decode failed");
                TimedFrameSequence::empty()
            }
        }
    }

    /// Decode and normalize to a single frame interval.
    pub fn decode_uniform(&self, source: &AnimationSource) -> UniformFrameSequence {
        self.decode(source).normalize()
    }

    /// Decode every frame, surfacing errors and keeping short sequences.
    ///
    /// Partial frames are composited onto a logical-screen canvas, honouring
    /// each frame's disposal method.
    pub fn try_decode(&self, source: &AnimationSource) -> Result<TimedFrameSequence> {
        let mut decoder = read_info(source)?;
        let width = decoder.width() as u32;
        let height = decoder.height() as u32;
        let canvas_bytes = width as u64 * height as u64 * 4;
        if canvas_bytes > MAX_CANVAS_BYTES {
            return Err(FlipbookError::Decoder(format!(
                "{}: logical screen {}x{} exceeds the canvas limit",
                source.describe(),
                width,
                height
            )));
        }

        let mut canvas = FrameBuffer::new(width, height, PixelFormat::Rgba8);
        let mut frames = Vec::new();

        while let Some(frame) = decoder
            .read_next_frame()
            .map_err(|e| FlipbookError::Decoder(format!("frame {}: {}", frames.len(), e)))?
        {
            let saved = (frame.dispose == gif::DisposalMethod::Previous).then(|| canvas.clone());

            composite(&mut canvas, frame);
            frames.push(TimedFrame::new(Arc::new(canvas.clone()), frame_delay_ms(frame)));

            match frame.dispose {
                gif::DisposalMethod::Background => clear_rect(&mut canvas, frame),
                gif::DisposalMethod::Previous => {
                    if let Some(saved) = saved {
                        canvas = saved;
                    }
                }
                _ => {}
            }
        }

        Ok(TimedFrameSequence::new(frames))
    }

    /// Number of frames in the container, 0 if it cannot be read.
    ///
    /// Unlike [`decode`](Self::decode), single-frame files report 1.
    pub fn frame_count(&self, source: &AnimationSource) -> usize {
        let count = || -> Result<usize> {
            let mut decoder = read_info(source)?;
            let mut count = 0;
            while decoder
                .next_frame_info()
                .map_err(|e| FlipbookError::Decoder(e.to_string()))?
                .is_some()
            {
                count += 1;
            }
            Ok(count)
        };
        count().unwrap_or_else(|e| {
            tracing::warn!(source = %source.describe(), error = %e, "Frame count unavailable");
            0
        })
    }

    /// Logical screen size, or [`Size::ZERO`] if the header is unreadable.
    pub fn native_size(&self, source: &AnimationSource) -> Size {
        match read_info(source) {
            Ok(decoder) => Size::new(decoder.width() as u32, decoder.height() as u32),
            Err(e) => {
                tracing::warn!(source = %source.describe(), error = %e, "Native size unavailable");
                Size::ZERO
            }
        }
    }

    /// Loop count declared by the container, if readable.
    pub fn loop_count(&self, source: &AnimationSource) -> Option<LoopCount> {
        let mut decoder = read_info(source).ok()?;
        // The loop extension sits between the header and the first frame.
        decoder.next_frame_info().ok()?;
        Some(decoder.repeat().into())
    }
}

fn read_info(source: &AnimationSource) -> Result<gif::Decoder<Box<dyn Read + '_>>> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    options
        .read_info(source.open()?)
        .map_err(|e| FlipbookError::Decoder(format!("{}: {}", source.describe(), e)))
}

/// Part of `frame` inside the canvas as `(left, top, width, height)`.
///
/// Frames are not checked against the logical screen when read, so an
/// offset may lie anywhere.
fn visible_rect(canvas: &FrameBuffer, frame: &gif::Frame<'_>) -> Option<(u32, u32, u32, u32)> {
    let (left, top) = (frame.left as u32, frame.top as u32);
    if left >= canvas.width || top >= canvas.height {
        return None;
    }
    let width = (frame.width as u32).min(canvas.width - left);
    let height = (frame.height as u32).min(canvas.height - top);
    (width > 0 && height > 0).then_some((left, top, width, height))
}

/// Draw the opaque pixels of `frame` onto the canvas.
fn composite(canvas: &mut FrameBuffer, frame: &gif::Frame<'_>) {
    let Some((left, top, width, height)) = visible_rect(canvas, frame) else {
        return;
    };
    let src_stride = frame.width as usize * 4;
    let (x0, x1) = (left as usize * 4, (left + width) as usize * 4);

    for fy in 0..height {
        let src_start = fy as usize * src_stride;
        let Some(src) = frame.buffer.get(src_start..src_start + width as usize * 4) else {
            break;
        };
        let Some(dst) = canvas.row_mut(top + fy).get_mut(x0..x1) else {
            break;
        };
        for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
            if s[3] > 0 {
                d.copy_from_slice(s);
            }
        }
    }
}

fn clear_rect(canvas: &mut FrameBuffer, frame: &gif::Frame<'_>) {
    let Some((left, top, width, height)) = visible_rect(canvas, frame) else {
        return;
    };
    let (x0, x1) = (left as usize * 4, (left + width) as usize * 4);
    for y in top..top + height {
        if let Some(row) = canvas.row_mut(y).get_mut(x0..x1) {
            row.fill(0);
        }
    }
}
