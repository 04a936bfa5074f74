use crate::config::ExportSettings;
use crate::error::{RenderError, Result};
use crate::layout::export_overlay_rect;
use crate::probe::MediaInfo;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use trimline_core::types::{TimeUs, TrimRange};
use uuid::Uuid;

/// Everything needed to export one edited video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub source: PathBuf,
    pub media: MediaInfo,
    pub range: TrimRange,
    pub sticker: Option<PathBuf>,
    /// Defaults to a random name in the temp directory.
    pub output_path: Option<PathBuf>,
}

/// A compiled export ready for ffmpeg execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderPlan {
    pub inputs: Vec<RenderInput>,
    pub filter_graph: Option<String>,
    pub output_args: Vec<String>,
    pub output_path: PathBuf,
    /// Length of the output, for progress reporting.
    pub duration: TimeUs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderInput {
    pub path: PathBuf,
    pub index: usize,
    /// Options placed before this input's `-i`.
    pub options: Vec<String>,
}

/// Progress update during rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderProgress {
    pub percent: f64,
    pub frame: u64,
    pub fps: f64,
    pub speed: String,
    pub eta_seconds: Option<f64>,
}

/// Compile an export request into an ffmpeg render plan.
///
/// The source is cut to the selected range (input seeking, skipped when the
/// range is the whole media) and the sticker, looped for the whole output, is
/// laid over the bottom-right corner.
pub fn compile(request: &ExportRequest, settings: &ExportSettings) -> Result<RenderPlan> {
    let range = request.range;
    let media = &request.media;

    if range.start < TimeUs::ZERO || range.end > media.duration || range.end <= range.start {
        return Err(RenderError::InvalidRange(range));
    }

    let full_range = range.start == TimeUs::ZERO && range.end == media.duration;
    let source_options = if full_range {
        Vec::new()
    } else {
        vec![
            "-ss".to_string(),
            format_seconds(range.start),
            "-t".to_string(),
            format_seconds(range.duration()),
        ]
    };

    let mut inputs = vec![RenderInput {
        path: request.source.clone(),
        index: 0,
        options: source_options,
    }];

    let filter_graph = match &request.sticker {
        Some(sticker) => {
            let rect = export_overlay_rect(media.display_size(), settings)
                .ok_or_else(|| RenderError::NoVideoStream(request.source.clone()))?;
            inputs.push(RenderInput {
                path: sticker.clone(),
                index: 1,
                options: vec!["-ignore_loop".to_string(), "0".to_string()],
            });

            let side = rect.width.round() as i64;
            let x = rect.x.round() as i64;
            let y = rect.y.round() as i64;
            Some(format!(
                "[1:v]format=rgba,scale={side}:{side}:force_original_aspect_ratio=decrease,\
                 pad={side}:{side}:(ow-iw)/2:(oh-ih)/2:color=0x00000000[sticker];\
                 [0:v][sticker]overlay=x={x}:y={y}:shortest=1[outv]"
            ))
        }
        None => None,
    };

    let video_map = if filter_graph.is_some() {
        "[outv]".to_string()
    } else {
        "0:v:0".to_string()
    };

    let mut output_args = vec!["-map".to_string(), video_map];
    if media.has_audio {
        output_args.extend(["-map".to_string(), "0:a:0".to_string()]);
    }
    output_args.extend([
        "-c:v".to_string(),
        "libx264".to_string(),
        "-crf".to_string(),
        settings.video_crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-r".to_string(),
        format!("{}", settings.frame_rate),
    ]);
    if media.has_audio {
        output_args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            settings.audio_bitrate.clone(),
        ]);
    } else {
        output_args.push("-an".to_string());
    }
    output_args.extend(["-movflags".to_string(), "+faststart".to_string()]);

    let output_path = request
        .output_path
        .clone()
        .unwrap_or_else(|| default_output_path(settings));

    tracing::info!(
        "Compiled export {} ~ {} -> {}",
        range.start,
        range.end,
        output_path.display()
    );

    Ok(RenderPlan {
        inputs,
        filter_graph,
        output_args,
        output_path,
        duration: range.duration(),
    })
}

/// A fresh file in the temp directory with the configured container extension.
pub fn default_output_path(settings: &ExportSettings) -> PathBuf {
    std::env::temp_dir().join(format!("{}.{}", Uuid::new_v4(), settings.container))
}

/// Build ffmpeg args from a render plan.
pub fn build_ffmpeg_args(plan: &RenderPlan) -> Vec<String> {
    let mut args = vec!["-y".to_string()];

    for input in &plan.inputs {
        args.extend(input.options.iter().cloned());
        args.push("-i".to_string());
        args.push(input.path.to_string_lossy().to_string());
    }

    if let Some(graph) = &plan.filter_graph {
        args.push("-filter_complex".to_string());
        args.push(graph.clone());
    }

    args.extend(plan.output_args.iter().cloned());

    args.push(plan.output_path.to_string_lossy().to_string());

    args
}

/// Execute a render plan by spawning ffmpeg.
/// Sends progress updates via the channel; the last update on success is 100%.
pub async fn execute(
    plan: &RenderPlan,
    progress_tx: tokio::sync::watch::Sender<RenderProgress>,
) -> Result<()> {
    use std::process::Stdio;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::process::Command;

    let args = build_ffmpeg_args(plan);
    tracing::debug!("ffmpeg {}", args.join(" "));

    let mut child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RenderError::FfmpegNotFound
            } else {
                RenderError::Io(e)
            }
        })?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| RenderError::FfmpegFailed("stderr was not captured".into()))?;
    // ffmpeg rewrites its stats line with '\r', so split on that as well as newlines.
    let mut segments = BufReader::new(stderr).split(b'\r');

    let total_secs = plan.duration.as_seconds();
    let mut tail = String::new();

    while let Some(segment) = segments.next_segment().await? {
        let text = String::from_utf8_lossy(&segment);
        for line in text.lines() {
            if let Some(progress) = parse_progress(line, total_secs) {
                let _ = progress_tx.send(progress);
            } else if !line.trim().is_empty() {
                tail = line.to_string();
            }
        }
    }

    let status = child.wait().await.map_err(RenderError::Io)?;
    if !status.success() {
        return Err(RenderError::FfmpegFailed(format!(
            "ffmpeg exited with {status}: {tail}"
        )));
    }

    let last = progress_tx.borrow().clone();
    let _ = progress_tx.send(RenderProgress {
        percent: 100.0,
        eta_seconds: Some(0.0),
        ..last
    });
    tracing::info!("Export finished: {}", plan.output_path.display());
    Ok(())
}

/// Parse an ffmpeg stderr progress line.
///
/// Example line: `frame=  123 fps= 60 ... time=00:01:02.05 speed=1.50x`
pub fn parse_progress(line: &str, total_secs: f64) -> Option<RenderProgress> {
    if !line.contains("time=") {
        return None;
    }

    let frame = extract_value(line, "frame=")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = extract_value(line, "fps=")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0);

    let speed = extract_value(line, "speed=").unwrap_or_default();

    let time_secs = extract_value(line, "time=")
        .and_then(|v| parse_time_str(&v))
        .unwrap_or(0.0);

    let percent = if total_secs > 0.0 {
        (time_secs / total_secs * 100.0).min(100.0)
    } else {
        0.0
    };

    let speed_factor = speed.trim_end_matches('x').parse::<f64>().unwrap_or(0.0);

    let eta_seconds = if speed_factor > 0.0 && total_secs > time_secs {
        Some((total_secs - time_secs) / speed_factor)
    } else {
        None
    };

    Some(RenderProgress {
        percent,
        frame,
        fps,
        speed,
        eta_seconds,
    })
}

fn format_seconds(t: TimeUs) -> String {
    format!("{:.6}", t.as_seconds())
}

/// Extract a value from an ffmpeg key=value progress line.
fn extract_value(line: &str, key: &str) -> Option<String> {
    let start = line.find(key)? + key.len();
    let trimmed = line[start..].trim_start();
    let end = trimmed
        .find(|c: char| c.is_whitespace())
        .unwrap_or(trimmed.len());
    let val = &trimmed[..end];
    (!val.is_empty()).then(|| val.to_string())
}

/// Parse an ffmpeg time string like "00:01:02.05" into seconds.
fn parse_time_str(s: &str) -> Option<f64> {
    let mut parts = s.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let mins: f64 = parts.next()?.parse().ok()?;
    let secs: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + mins * 60.0 + secs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn media(duration_secs: f64, width: u32, height: u32, has_audio: bool) -> MediaInfo {
        MediaInfo {
            duration: TimeUs::from_seconds(duration_secs),
            width,
            height,
            fps: 30.0,
            codec: "h264".to_string(),
            rotation: 0,
            has_audio,
        }
    }

    fn request(range: TrimRange, sticker: Option<&str>) -> ExportRequest {
        ExportRequest {
            source: PathBuf::from("/tmp/in.mov"),
            media: media(20.0, 1920, 1080, true),
            range,
            sticker: sticker.map(PathBuf::from),
            output_path: Some(PathBuf::from("/tmp/out.mov")),
        }
    }

    fn secs(s: f64) -> TimeUs {
        TimeUs::from_seconds(s)
    }

    #[test]
    fn full_range_is_not_trimmed() {
        let plan = compile(
            &request(TrimRange::new(TimeUs::ZERO, secs(20.0)), None),
            &ExportSettings::default(),
        )
        .unwrap();

        assert_eq!(plan.inputs.len(), 1);
        assert!(plan.inputs[0].options.is_empty());
        assert!(plan.filter_graph.is_none());
        assert_eq!(plan.duration, secs(20.0));

        let args = build_ffmpeg_args(&plan);
        assert!(!args.contains(&"-ss".to_string()));
        assert!(args.contains(&"0:v:0".to_string()));
        assert!(args.contains(&"0:a:0".to_string()));
    }

    #[test]
    fn trimmed_range_seeks_input() {
        let plan = compile(
            &request(TrimRange::new(secs(2.5), secs(8.0)), None),
            &ExportSettings::default(),
        )
        .unwrap();

        assert_eq!(
            plan.inputs[0].options,
            vec!["-ss", "2.500000", "-t", "5.500000"]
        );
        assert_eq!(plan.duration, secs(5.5));

        let args = build_ffmpeg_args(&plan);
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input);
    }

    #[test]
    fn sticker_overlays_bottom_right() {
        let plan = compile(
            &request(TrimRange::new(TimeUs::ZERO, secs(20.0)), Some("/stickers/wow.GIF")),
            &ExportSettings::default(),
        )
        .unwrap();

        assert_eq!(plan.inputs.len(), 2);
        assert_eq!(plan.inputs[1].options, vec!["-ignore_loop", "0"]);
        let graph = plan.filter_graph.as_deref().unwrap();
        assert!(graph.contains("scale=360:360"));
        assert!(graph.contains("overlay=x=1533:y=693:shortest=1[outv]"));

        let args = build_ffmpeg_args(&plan);
        assert!(args.contains(&"-filter_complex".to_string()));
        assert!(args.contains(&"[outv]".to_string()));
    }

    #[test]
    fn portrait_rotation_moves_sticker() {
        let mut req = request(TrimRange::new(TimeUs::ZERO, secs(20.0)), Some("/s/hi.gif"));
        req.media.rotation = 90;
        let plan = compile(&req, &ExportSettings::default()).unwrap();

        // Display size 1080x1920: side 360, padding 27.
        let graph = plan.filter_graph.unwrap();
        assert!(graph.contains("overlay=x=693:y=1533"));
    }

    #[test]
    fn silent_video_drops_audio() {
        let mut req = request(TrimRange::new(TimeUs::ZERO, secs(20.0)), None);
        req.media.has_audio = false;
        let plan = compile(&req, &ExportSettings::default()).unwrap();

        assert!(plan.output_args.contains(&"-an".to_string()));
        assert!(!plan.output_args.contains(&"0:a:0".to_string()));
        assert!(!plan.output_args.contains(&"aac".to_string()));
    }

    #[test]
    fn out_of_media_range_fails() {
        let settings = ExportSettings::default();
        for range in [
            TrimRange::new(secs(5.0), secs(25.0)),
            TrimRange::new(secs(-1.0), secs(5.0)),
            TrimRange::new(secs(5.0), secs(5.0)),
        ] {
            let result = compile(&request(range, None), &settings);
            assert!(matches!(result.unwrap_err(), RenderError::InvalidRange(_)));
        }
    }

    #[test]
    fn default_output_uses_container_extension() {
        let settings = ExportSettings {
            container: "mp4".to_string(),
            ..ExportSettings::default()
        };
        let mut req = request(TrimRange::new(TimeUs::ZERO, secs(20.0)), None);
        req.output_path = None;

        let plan = compile(&req, &settings).unwrap();
        assert!(plan.output_path.starts_with(std::env::temp_dir()));
        assert_eq!(plan.output_path.extension().unwrap(), "mp4");
        assert_ne!(plan.output_path, default_output_path(&settings));
    }

    #[test]
    fn output_args_follow_settings() {
        let settings = ExportSettings {
            video_crf: 18,
            frame_rate: 24.0,
            ..ExportSettings::default()
        };
        let plan = compile(&request(TrimRange::new(TimeUs::ZERO, secs(20.0)), None), &settings).unwrap();
        let args = build_ffmpeg_args(&plan);

        let crf = args.iter().position(|a| a == "-crf").unwrap();
        assert_eq!(args[crf + 1], "18");
        let rate = args.iter().position(|a| a == "-r").unwrap();
        assert_eq!(args[rate + 1], "24");
        assert_eq!(args.last().unwrap(), "/tmp/out.mov");
    }

    #[test]
    fn parse_progress_extracts_time_and_calculates_percent() {
        let line =
            "frame=  150 fps= 30 q=28.0 size=    1024kB time=00:00:05.00 bitrate= 200.0kbits/s speed=1.50x";
        let progress = parse_progress(line, 10.0).unwrap();

        assert_eq!(progress.frame, 150);
        assert!((progress.fps - 30.0).abs() < 0.01);
        assert!((progress.percent - 50.0).abs() < 0.1);
        assert_eq!(progress.speed, "1.50x");
        assert!((progress.eta_seconds.unwrap() - 3.33).abs() < 0.1);
    }

    #[test]
    fn parse_progress_ignores_other_lines() {
        assert!(parse_progress("Input #0, mov,mp4...", 10.0).is_none());
        assert!(parse_progress("", 10.0).is_none());
    }

    #[test]
    fn parse_progress_handles_unknown_time() {
        let progress = parse_progress("frame=    0 fps=0.0 time=N/A speed=N/A", 10.0).unwrap();
        assert!((progress.percent - 0.0).abs() < 0.01);
        assert!(progress.eta_seconds.is_none());
    }

    #[test]
    fn parse_time_str_cases() {
        assert!((parse_time_str("00:01:02.05").unwrap() - 62.05).abs() < 0.001);
        assert!(parse_time_str("00:00").is_none());
        assert!(parse_time_str("00:00:01:02").is_none());
        assert!(parse_time_str("N/A").is_none());
    }
}
