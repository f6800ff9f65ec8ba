use async_trait::async_trait;
use chatcut_core::ops::Transform;
use chatcut_core::types::Media;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use uuid::Uuid;

use crate::error::{RenderError, Result};

/// Turns a source media and a transform into new media bytes.
///
/// Implementations must never write over `source`; the returned record is a
/// fresh hidden media describing the output.
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    async fn process(&self, source: &Media, transform: &Transform) -> Result<Media>;
}

/// `ffmpeg`-backed processor writing derived files into `output_dir`.
#[derive(Debug, Clone)]
pub struct FfmpegProcessor {
    output_dir: PathBuf,
}

impl FfmpegProcessor {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn process(&self, source: &Media, transform: &Transform) -> Result<Media> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self.output_dir.join(format!("{}.mp4", Uuid::new_v4()));
        let args = transform_args(&source.source, transform, &output);

        tracing::info!(media_id = %source.id, transform = transform.label(), output = %output.display(), "Running transform");
        let result = tokio::process::Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RenderError::FfmpegNotFound
                } else {
                    RenderError::Io(e)
                }
            })?;

        if !result.status.success() {
            remove_partial(&output).await;
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail = stderr.lines().last().unwrap_or_default();
            return Err(RenderError::FfmpegFailed(format!(
                "{} transform exited with {}: {tail}",
                transform.label(),
                result.status
            )));
        }

        Ok(transform.derive_media(source, output))
    }
}

/// Delete whatever a failed ffmpeg run left at `output`.
async fn remove_partial(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => tracing::debug!(output = %output.display(), "Removed partial transform output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(output = %output.display(), error = %e, "Could not remove partial transform output"),
    }
}

/// The video filter for a transform, if it is a filter at all.
pub fn transform_filter(transform: &Transform) -> Option<String> {
    match *transform {
        Transform::Brightness { brightness } => Some(format!("eq=brightness={brightness}")),
        Transform::ColorGrading {
            contrast,
            gamma,
            saturation,
        } => Some(format!(
            "eq=contrast={contrast}:gamma={gamma}:saturation={saturation}"
        )),
        Transform::Saturation { saturation } => Some(format!(
            "eq=contrast=1:gamma=1:saturation={saturation}"
        )),
        Transform::Blur { sigma } => Some(format!("gblur=sigma={sigma}")),
        Transform::Grayscale => Some("hue=s=0".to_string()),
        Transform::Trim { .. } => None,
    }
}

/// Full ffmpeg argument list for one transform.
pub fn transform_args(source: &Path, transform: &Transform, output: &Path) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        source.to_string_lossy().to_string(),
    ];
    if let Transform::Trim { start, end } = *transform {
        args.extend([
            "-ss".to_string(),
            format!("{}", start.as_seconds()),
            "-to".to_string(),
            format!("{}", end.as_seconds()),
        ]);
    }
    if let Some(filter) = transform_filter(transform) {
        args.push("-vf".to_string());
        args.push(filter);
    }
    args.extend(
        ["-c:v", "libx264", "-c:a", "aac", "-pix_fmt", "yuv420p"]
            .iter()
            .map(|s| s.to_string()),
    );
    args.push(output.to_string_lossy().to_string());
    args
}
