use chatcut_core::export::{plan_export, ExportSegment};
use chatcut_core::types::{Project, TimeUs};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{RenderError, Result};

/// Output frame geometry. Every segment is conformed to it before concat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
        }
    }
}

/// A compiled export ready for ffmpeg execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderPlan {
    pub inputs: Vec<PathBuf>,
    pub filter_graph: String,
    pub output_args: Vec<String>,
    pub output_path: PathBuf,
    pub total_duration_us: TimeUs,
}

/// Progress update during an export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportProgress {
    pub percent: f64,
    pub frame: u64,
    pub fps: f64,
    pub speed: String,
    pub eta_seconds: Option<f64>,
}

/// Compile a project straight into a render plan.
pub fn compile_project(
    project: &Project,
    settings: ExportSettings,
    output_path: impl Into<PathBuf>,
) -> Result<RenderPlan> {
    let segments = plan_export(project)?;
    compile(&segments, settings, output_path)
}

/// Compile flattened segments into one `filter_complex` graph: a trimmed,
/// conformed stream per clip, a black `color` source per gap, and a final
/// video-only `concat`.
pub fn compile(
    segments: &[ExportSegment],
    settings: ExportSettings,
    output_path: impl Into<PathBuf>,
) -> Result<RenderPlan> {
    if !segments.iter().any(|s| matches!(s, ExportSegment::Clip { .. })) {
        return Err(RenderError::NoClips);
    }

    let ExportSettings { width, height, fps } = settings;
    let conform = format!(
        "scale={width}:{height}:force_original_aspect_ratio=decrease,pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p"
    );

    let mut path_to_index: HashMap<&Path, usize> = HashMap::new();
    let mut inputs: Vec<PathBuf> = Vec::new();
    let mut filters: Vec<String> = Vec::new();
    let mut total = TimeUs::ZERO;

    for (i, segment) in segments.iter().enumerate() {
        total = total + segment.duration();
        match segment {
            ExportSegment::Gap { duration_us } => {
                let d = duration_us.as_seconds();
                filters.push(format!(
                    "color=c=black:s={width}x{height}:r={fps}:d={d},setsar=1,format=yuv420p[v{i}]"
                ));
            }
            ExportSegment::Clip {
                source,
                source_offset_us,
                duration_us,
                ..
            } => {
                let input_idx = *path_to_index.entry(source.as_path()).or_insert_with(|| {
                    inputs.push(source.clone());
                    inputs.len() - 1
                });
                let start_s = source_offset_us.as_seconds();
                let end_s = (*source_offset_us + *duration_us).as_seconds();
                filters.push(format!(
                    "[{input_idx}:v]trim=start={start_s}:end={end_s},setpts=PTS-STARTPTS,{conform}[v{i}]"
                ));
            }
        }
    }

    let n = segments.len();
    let concat_inputs: String = (0..n).map(|i| format!("[v{i}]")).collect();
    filters.push(format!("{concat_inputs}concat=n={n}:v=1:a=0[outv]"));

    let output_args = vec![
        "-map".to_string(),
        "[outv]".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-crf".to_string(),
        "23".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-r".to_string(),
        format!("{fps}"),
        "-an".to_string(),
    ];

    Ok(RenderPlan {
        inputs,
        filter_graph: filters.join(";"),
        output_args,
        output_path: output_path.into(),
        total_duration_us: total,
    })
}

/// Build ffmpeg args from a render plan.
pub fn build_ffmpeg_args(plan: &RenderPlan) -> Vec<String> {
    let mut args = vec!["-y".to_string()];

    for input in &plan.inputs {
        args.push("-i".to_string());
        args.push(input.to_string_lossy().to_string());
    }

    args.push("-filter_complex".to_string());
    args.push(plan.filter_graph.clone());
    args.extend(plan.output_args.iter().cloned());
    args.push(plan.output_path.to_string_lossy().to_string());
    args
}

/// Execute a render plan by spawning ffmpeg.
/// Sends progress updates via the channel.
pub async fn execute(
    plan: &RenderPlan,
    progress_tx: tokio::sync::watch::Sender<ExportProgress>,
) -> Result<()> {
    use std::process::Stdio;
    use tokio::process::Command;

    let args = build_ffmpeg_args(plan);
    tracing::info!(output = %plan.output_path.display(), inputs = plan.inputs.len(), "Export started");

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
    let updates = forward_progress(stderr, plan.total_duration_us.as_seconds(), &progress_tx).await;
    tracing::debug!(updates, "Export progress stream closed");

    let status = child.wait().await?;
    if !status.success() {
        tracing::error!(%status, "Export failed");
        return Err(RenderError::FfmpegFailed(format!(
            "ffmpeg exited with {status}"
        )));
    }

    tracing::info!(output = %plan.output_path.display(), "Export finished");
    Ok(())
}

/// Pump ffmpeg's stderr into `progress_tx`. Status updates are separated by
/// `\r` while log lines end in `\n`, so both count as record breaks.
/// Returns the number of progress records seen.
async fn forward_progress<R>(
    stderr: R,
    total_secs: f64,
    progress_tx: &tokio::sync::watch::Sender<ExportProgress>,
) -> usize
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::{AsyncBufReadExt, BufReader};

    let mut records = BufReader::new(stderr).split(b'\r');
    let mut seen = 0;
    while let Ok(Some(chunk)) = records.next_segment().await {
        let chunk = String::from_utf8_lossy(&chunk);
        for line in chunk.lines() {
            if let Some(progress) = parse_progress(line, total_secs) {
                seen += 1;
                let _ = progress_tx.send(progress);
            }
        }
    }
    seen
}

/// Read one ffmpeg stderr status line, e.g.
/// `frame=  150 fps= 30 q=28.0 size= 1024kB time=00:00:05.00 bitrate=... speed=1.5x`.
/// Lines without a `time=` field are not progress and yield `None`.
pub fn parse_progress(line: &str, total_secs: f64) -> Option<ExportProgress> {
    let fields = status_fields(line);
    let elapsed = fields.get("time").and_then(|t| clock_seconds(t))?;

    let speed = fields.get("speed").map(|s| s.to_string()).unwrap_or_default();
    let factor: f64 = speed.trim_end_matches('x').parse().unwrap_or(0.0);
    let remaining = total_secs - elapsed;

    Some(ExportProgress {
        percent: if total_secs > 0.0 {
            (100.0 * elapsed / total_secs).clamp(0.0, 100.0)
        } else {
            0.0
        },
        frame: fields.get("frame").and_then(|f| f.parse().ok()).unwrap_or(0),
        fps: fields.get("fps").and_then(|f| f.parse().ok()).unwrap_or(0.0),
        speed,
        eta_seconds: (factor > 0.0 && remaining > 0.0).then(|| remaining / factor),
    })
}

/// Split a status line into `key -> value`. ffmpeg pads values after `=`
/// with spaces, so a token ending in `=` takes the next token as its value.
fn status_fields(line: &str) -> HashMap<&str, &str> {
    let mut fields = HashMap::new();
    let mut tokens = line.split_whitespace();
    while let Some(token) = tokens.next() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let value = if value.is_empty() {
            match tokens.next() {
                Some(v) => v,
                None => break,
            }
        } else {
            value
        };
        fields.insert(key, value);
    }
    fields
}

/// `HH:MM:SS.ff` to seconds.
fn clock_seconds(clock: &str) -> Option<f64> {
    let parts: Vec<f64> = clock
        .split(':')
        .map(|p| p.parse().ok())
        .collect::<Option<_>>()?;
    match parts.as_slice() {
        [h, m, s] => Some(h * 3600.0 + m * 60.0 + s),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
