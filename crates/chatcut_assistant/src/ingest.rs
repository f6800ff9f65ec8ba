use chatcut_core::config::{app_data_dir, MediaConfig};
use chatcut_core::session::EditorSession;
use chatcut_core::types::Media;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::client::Preprocessor;
use crate::error::{AssistantError, Result};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub thumbnail_dir: PathBuf,
    pub max_thumbnails: usize,
    pub thumbnail_width: u32,
}

impl IngestOptions {
    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            thumbnail_dir: app_data_dir().join("thumbnails"),
            max_thumbnails: config.max_thumbnails,
            thumbnail_width: config.thumbnail_width,
        }
    }
}

/// Result of [`ingest`]. The media is registered even when preprocessing
/// failed; `warning` then carries the failure.
#[derive(Debug)]
pub struct Ingested {
    pub media_id: Uuid,
    pub warning: Option<AssistantError>,
}

/// Probe a file, extract its thumbnail strip, fetch per-second annotations
/// and register it as visible media.
pub async fn ingest(
    path: impl AsRef<Path>,
    session: &EditorSession,
    preprocessor: &dyn Preprocessor,
    options: &IngestOptions,
) -> Result<Ingested> {
    let path = path.as_ref().to_path_buf();
    let probe_path = path.clone();
    let mut media = tokio::task::spawn_blocking(move || chatcut_render::probe::import_media(probe_path))
        .await
        .map_err(|e| AssistantError::Io(std::io::Error::other(e)))??;

    media.thumbnails = thumbnails_for(&media, options).await;

    let warning = match preprocessor.preprocess(&media).await {
        Ok(response) => {
            media.annotations = response.into_annotations();
            None
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Preprocessing failed, registering media without annotations");
            Some(e)
        }
    };

    let media_id = session.update(|p| Ok(p.media.insert(media)))?;
    tracing::info!(media_id = %media_id, path = %path.display(), "Media ingested");
    Ok(Ingested { media_id, warning })
}

async fn thumbnails_for(media: &Media, options: &IngestOptions) -> Vec<chatcut_core::types::Thumbnail> {
    let source = media.source.clone();
    let cache = options.thumbnail_dir.clone();
    let (id, duration) = (media.id, media.duration_us);
    let (max, width) = (options.max_thumbnails, options.thumbnail_width);

    let extracted = tokio::task::spawn_blocking(move || {
        chatcut_render::thumbnails::extract_thumbnails(&source, &cache, id, duration, max, width)
    })
    .await;

    match extracted {
        Ok(Ok(thumbs)) => thumbs,
        Ok(Err(e)) => {
            tracing::warn!(media_id = %id, error = %e, "Thumbnail extraction failed");
            vec![]
        }
        Err(e) => {
            tracing::warn!(media_id = %id, error = %e, "Thumbnail task panicked");
            vec![]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PreprocessResponse;
    use async_trait::async_trait;
    use chatcut_core::types::{OverlapPolicy, Project, TimeUs};
    use chatcut_core::ErrorKind;
    use chatcut_render::RenderError;
    use std::process::Stdio;

    fn ffmpeg_available() -> bool {
        std::process::Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    struct FixedPreprocessor(Option<PreprocessResponse>);

    #[async_trait]
    impl Preprocessor for FixedPreprocessor {
        async fn preprocess(&self, _media: &Media) -> Result<PreprocessResponse> {
            match &self.0 {
                Some(r) => Ok(r.clone()),
                None => Err(AssistantError::Status {
                    endpoint: "preprocess".into(),
                    status: 503,
                    body: "down".into(),
                }),
            }
        }
    }

    fn make_session() -> EditorSession {
        EditorSession::new(Project::new(
            "t",
            TimeUs::from_seconds(300.0),
            OverlapPolicy::MultiTrack,
        ))
    }

    fn make_options(dir: &Path) -> IngestOptions {
        IngestOptions {
            thumbnail_dir: dir.join("thumbs"),
            max_thumbnails: 10,
            thumbnail_width: 160,
        }
    }

    fn make_video(dir: &Path) -> Option<PathBuf> {
        let path = dir.join("clip.mp4");
        let ok = std::process::Command::new("ffmpeg")
            .args([
                "-y",
                "-f",
                "lavfi",
                "-i",
                "color=c=blue:s=320x240:d=3",
                "-c:v",
                "libx264",
                "-t",
                "3",
                &path.to_string_lossy(),
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        ok.then_some(path)
    }

    #[tokio::test]
    async fn missing_file_registers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let session = make_session();
        let pre = FixedPreprocessor(Some(PreprocessResponse::default()));

        let err = ingest(dir.path().join("nope.mp4"), &session, &pre, &make_options(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::Render(RenderError::FileNotFound(_))));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(session.snapshot().media.is_empty());
    }

    #[tokio::test]
    async fn ingest_seeds_annotations_and_thumbnails() {
        if !ffmpeg_available() {
            eprintln!("Skipping ingest test: ffmpeg not available");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let Some(video) = make_video(dir.path()) else {
            eprintln!("Skipping ingest test: could not create test video");
            return;
        };
        let session = make_session();
        let pre = FixedPreprocessor(Some(PreprocessResponse {
            image_description: vec!["blue".into(); 3],
            transcription: vec![String::new(); 3],
            image_attributes: vec![],
        }));

        let out = ingest(&video, &session, &pre, &make_options(dir.path())).await.unwrap();
        assert!(out.warning.is_none());

        let project = session.snapshot();
        let media = project.media.get(out.media_id).unwrap();
        assert!(!media.hidden);
        assert_eq!(media.annotations.descriptions.len(), 3);
        assert_eq!(media.thumbnails.len(), 3);
        assert_eq!(media.content_type, "video/mp4");
    }

    #[tokio::test]
    async fn preprocess_failure_still_registers_media() {
        if !ffmpeg_available() {
            eprintln!("Skipping ingest test: ffmpeg not available");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let Some(video) = make_video(dir.path()) else {
            eprintln!("Skipping ingest test: could not create test video");
            return;
        };
        let session = make_session();

        let out = ingest(&video, &session, &FixedPreprocessor(None), &make_options(dir.path()))
            .await
            .unwrap();
        let warning = out.warning.unwrap();
        assert_eq!(warning.kind(), ErrorKind::ExternalServiceFailure);

        let project = session.snapshot();
        let media = project.media.get(out.media_id).unwrap();
        assert!(media.annotations.is_empty());
    }
}
