use serde::{Deserialize, Serialize};
use std::path::Path;
use trimline_core::types::TimeUs;

use crate::error::{RenderError, Result};
use crate::layout::Size;

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    tags: Option<FfprobeTags>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// MediaInfo
// ---------------------------------------------------------------------------

/// What the editor needs to know about a source video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaInfo {
    pub duration: TimeUs,
    /// Stored (coded) frame size, before rotation.
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    /// Clockwise display rotation in degrees, normalized to 0, 90, 180 or 270.
    pub rotation: u32,
    pub has_audio: bool,
}

impl MediaInfo {
    /// Frame size as it appears on screen, with rotation applied.
    pub fn display_size(&self) -> Size {
        let (w, h) = if self.rotation == 90 || self.rotation == 270 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        };
        Size::new(w as f64, h as f64)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run ffprobe on a video file and parse the result into a `MediaInfo`.
pub fn probe_media(path: impl AsRef<Path>) -> Result<MediaInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RenderError::FileNotFound(path.to_path_buf()));
    }

    let output = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| RenderError::FfprobeExec(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RenderError::FfprobeFailed(stderr.into_owned()));
    }

    let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
    let info = parse_probe_output(&probe)
        .ok_or_else(|| RenderError::NoVideoStream(path.to_path_buf()))?;
    tracing::debug!(
        "Probed {}: {} {}x{} rot={}",
        path.display(),
        info.duration,
        info.width,
        info.height,
        info.rotation
    );
    Ok(info)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn parse_probe_output(probe: &FfprobeOutput) -> Option<MediaInfo> {
    let video = probe.streams.iter().find(|s| s.codec_type == "video")?;
    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .map(TimeUs::from_seconds)
        .unwrap_or(TimeUs::ZERO);

    let fps = video
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or(0.0);

    Some(MediaInfo {
        duration,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        fps,
        codec: video.codec_name.clone().unwrap_or_default(),
        rotation: stream_rotation(video),
        has_audio,
    })
}

/// Rotation from the legacy `rotate` tag, else from the display matrix.
/// Display-matrix rotation is counter-clockwise, so it is negated.
fn stream_rotation(stream: &FfprobeStream) -> u32 {
    let degrees = stream
        .tags
        .as_ref()
        .and_then(|t| t.rotate.as_deref())
        .and_then(|r| r.trim().parse::<f64>().ok())
        .or_else(|| {
            stream
                .side_data_list
                .iter()
                .find_map(|sd| sd.rotation)
                .map(|r| -r)
        })
        .unwrap_or(0.0);
    normalize_rotation(degrees)
}

fn normalize_rotation(degrees: f64) -> u32 {
    let quarter_turns = (degrees / 90.0).round() as i64;
    (quarter_turns.rem_euclid(4) * 90) as u32
}

/// Parse ffprobe frame rate string like "30000/1001" or "30/1" into f64.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    if let Some((num, den)) = rate.split_once('/') {
        let n: f64 = num.parse().ok()?;
        let d: f64 = den.parse().ok()?;
        if d == 0.0 {
            return None;
        }
        Some(n / d)
    } else {
        rate.parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
