//! Video sources sampled by the GIF encoder.

use flipbook_core::{FlipbookError, FrameBuffer, Orientation, PixelFormat, RationalTime, Result, RowOrder, Size};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A video the encoder can sample.
///
/// Sampling happens in increasing timestamp order on a single thread.
pub trait VideoSource {
    /// Total duration.
    fn duration(&self) -> RationalTime;

    /// Size of the stored raster before orientation is applied.
    fn natural_size(&self) -> Size;

    /// How the stored raster must be rotated for display.
    fn orientation(&self) -> Orientation;

    /// Row order of rasters returned by [`frame_at`](Self::frame_at).
    fn row_order(&self) -> RowOrder {
        RowOrder::TopDown
    }

    /// Extract the frame shown at exactly `time`.
    fn frame_at(&self, time: RationalTime) -> Result<FrameBuffer>;

    /// Size as displayed.
    fn display_size(&self) -> Size {
        self.orientation().display_size(self.natural_size())
    }
}

/// Video file read through the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegVideoSource {
    path: PathBuf,
    duration: RationalTime,
    natural_size: Size,
    orientation: Orientation,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: ProbeTags,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl FfmpegVideoSource {
    /// Probe a video file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FlipbookError::NotFound(format!(
                "File not found: {}",
                path.display()
            )));
        }

        let output = Command::new(ffmpeg_sidecar::ffprobe::ffprobe_path())
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,duration:stream_tags=rotate:stream_side_data=rotation:format=duration",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| FlipbookError::Decoder(format!("Failed to spawn ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(FlipbookError::Decoder(format!(
                "ffprobe failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let source = Self::from_probe_json(path, &output.stdout)?;
        tracing::info!(
            path = %path.display(),
            size = %source.natural_size,
            orientation = ?source.orientation,
            duration = %source.duration,
            "Opened video source"
        );
        Ok(source)
    }

    fn from_probe_json(path: &Path, json: &[u8]) -> Result<Self> {
        let probe: ProbeOutput = serde_json::from_slice(json)
            .map_err(|e| FlipbookError::Decoder(format!("Unreadable ffprobe output: {e}")))?;
        let stream = probe.streams.into_iter().next().ok_or_else(|| {
            FlipbookError::UnsupportedFormat(format!("{} has no video stream", path.display()))
        })?;

        let natural_size = Size::new(stream.width.unwrap_or(0), stream.height.unwrap_or(0));
        if natural_size.is_zero() {
            return Err(FlipbookError::UnsupportedFormat(format!(
                "{} reports no frame size",
                path.display()
            )));
        }

        let seconds = stream
            .duration
            .as_deref()
            .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| {
                FlipbookError::UnsupportedFormat(format!("{} has no duration", path.display()))
            })?;

        // The display matrix stores counter-clockwise rotation; the legacy
        // tag stores clockwise.
        let degrees = stream
            .side_data_list
            .iter()
            .find_map(|sd| sd.rotation)
            .map(|r| -(r.round() as i32))
            .or_else(|| stream.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
            .unwrap_or(0);

        Ok(Self {
            path: path.to_path_buf(),
            duration: RationalTime::from_seconds_f64(seconds),
            natural_size,
            orientation: Orientation::from_rotation_degrees(degrees),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn frame_args(&self, time: RationalTime) -> Vec<String> {
        vec![
            "-v".into(),
            "error".into(),
            "-noautorotate".into(),
            "-accurate_seek".into(),
            "-ss".into(),
            format!("{:.6}", time.to_seconds_f64()),
            "-i".into(),
            self.path.to_string_lossy().into_owned(),
            "-frames:v".into(),
            "1".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgba".into(),
            "pipe:1".into(),
        ]
    }
}

impl VideoSource for FfmpegVideoSource {
    fn duration(&self) -> RationalTime {
        self.duration
    }

    fn natural_size(&self) -> Size {
        self.natural_size
    }

    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn frame_at(&self, time: RationalTime) -> Result<FrameBuffer> {
        let output = Command::new(ffmpeg_sidecar::paths::ffmpeg_path())
            .args(self.frame_args(time))
            .output()
            .map_err(|e| FlipbookError::Decoder(format!("Failed to spawn ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(FlipbookError::Decoder(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tracing::debug!(time = %time, bytes = output.stdout.len(), "Extracted video frame");
        FrameBuffer::from_raw(
            self.natural_size.width,
            self.natural_size.height,
            PixelFormat::Rgba8,
            output.stdout,
        )
        .map_err(|e| FlipbookError::Decoder(format!("no frame at {}: {}", time, e)))
    }
}
