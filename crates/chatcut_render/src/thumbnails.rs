use chatcut_core::types::{Thumbnail, TimeUs};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{RenderError, Result};

/// Seconds at which to sample thumbnails: one every
/// `max(1, floor(duration / 10))` seconds, at most `min(max_count, floor(duration))` of them.
pub fn thumbnail_times(duration_us: TimeUs, max_count: usize) -> Vec<f64> {
    let whole_secs = (duration_us.0.max(0) / 1_000_000) as usize;
    let interval = (whole_secs / 10).max(1);
    let count = max_count.min(whole_secs);
    (0..count).map(|i| (i * interval) as f64).collect()
}

/// Extract a single thumbnail at a specific time from a video file.
pub fn extract_thumbnail(
    source_path: &Path,
    output_path: &Path,
    time_seconds: f64,
    width: u32,
) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let status = std::process::Command::new("ffmpeg")
        .args([
            "-y",
            "-ss",
            &format!("{time_seconds:.3}"),
            "-i",
            &source_path.to_string_lossy(),
            "-vframes",
            "1",
            "-vf",
            &format!("scale={width}:-1"),
            "-q:v",
            "5",
            &output_path.to_string_lossy(),
        ])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RenderError::FfmpegNotFound
            } else {
                RenderError::Io(e)
            }
        })?;

    if !status.success() {
        return Err(RenderError::FfmpegFailed(
            "Thumbnail extraction failed".into(),
        ));
    }
    Ok(())
}

/// Extract the thumbnail strip for one media into `<cache_dir>/<media_id>/`.
/// Frames already on disk are reused.
pub fn extract_thumbnails(
    source_path: &Path,
    cache_dir: &Path,
    media_id: Uuid,
    duration_us: TimeUs,
    max_count: usize,
    thumb_width: u32,
) -> Result<Vec<Thumbnail>> {
    let media_dir = thumbnail_dir(cache_dir, media_id);
    std::fs::create_dir_all(&media_dir)?;

    let mut results = Vec::new();
    for t in thumbnail_times(duration_us, max_count) {
        let thumb_path = media_dir.join(format!("{}.jpg", TimeUs::from_seconds(t).0));
        if !thumb_path.exists() {
            extract_thumbnail(source_path, &thumb_path, t, thumb_width)?;
        }
        results.push(Thumbnail {
            at_second: t,
            image: thumb_path,
        });
    }

    tracing::debug!(media_id = %media_id, count = results.len(), "Thumbnails extracted");
    Ok(results)
}

pub fn thumbnail_dir(cache_dir: &Path, media_id: Uuid) -> PathBuf {
    cache_dir.join(media_id.to_string())
}
