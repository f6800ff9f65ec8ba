use crate::config::TimelineConfig;
use crate::error::{CoreError, Result};
use crate::media::MediaLibrary;
use crate::types::*;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const PROJECT_EXTENSION: &str = "chatcut";

impl Project {
    /// Create an empty project with one empty track.
    pub fn new(
        name: impl Into<String>,
        project_duration_us: TimeUs,
        overlap_policy: OverlapPolicy,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            media: MediaLibrary::new(),
            timeline: Timeline::new(project_duration_us, overlap_policy),
        }
    }

    pub fn from_config(name: impl Into<String>, config: &TimelineConfig) -> Self {
        Self::new(name, config.project_duration(), config.overlap_policy)
    }

    /// Save project to a file as pretty-printed JSON.
    /// Appends the `.chatcut` extension if not present. Returns the path written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = ensure_extension(path.as_ref());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        tracing::info!(path = %path.display(), clips = self.timeline.clips().count(), "Project saved");
        Ok(path)
    }

    /// Load a project from a JSON file. Files whose tracks are out of order,
    /// overlap under the multi-track policy, or whose length is out of range
    /// are rejected.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let project: Project = serde_json::from_str(&data)?;
        let duration = project.timeline.project_duration_us;
        if duration < TimeUs::ZERO || duration > MAX_PROJECT_DURATION {
            return Err(CoreError::InvalidArgument(format!(
                "{} has a project duration of {duration}",
                path.as_ref().display()
            )));
        }
        if !project.timeline.is_consistent() {
            tracing::warn!(path = %path.as_ref().display(), "Rejected project with inconsistent tracks");
            return Err(CoreError::InvalidArgument(format!(
                "{} has overlapping or unsorted clips",
                path.as_ref().display()
            )));
        }
        tracing::info!(path = %path.as_ref().display(), name = %project.name, "Project loaded");
        Ok(project)
    }
}

fn ensure_extension(path: &Path) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some(PROJECT_EXTENSION) {
        path.to_path_buf()
    } else {
        let mut p = path.to_path_buf();
        let mut name = p.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(PROJECT_EXTENSION);
        p.set_file_name(name);
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_project() -> Project {
        Project::new("Test Project", TimeUs::from_seconds(30.0), OverlapPolicy::MultiTrack)
    }

    #[test]
    fn create_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test_project.chatcut");

        let project = make_project();
        assert_eq!(project.save_to_file(&path).unwrap(), path);

        let loaded = Project::load_from_file(&path).unwrap();
        assert_eq!(project, loaded);
    }

    #[test]
    fn save_load_with_media_and_edits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("populated.chatcut");

        let mut project = make_project();
        let mut media = Media::new("clip.mp4", "/media/clip.mp4", "video/mp4", TimeUs(10_000_000));
        media.annotations.descriptions = vec!["a dog".into(), "a ball".into()];
        let media_id = project.media.insert(media);
        let clip = project.add_clip(media_id, TimeUs(2_000_000)).unwrap();
        project.cut_clip(clip, TimeUs(1_000_000)).unwrap();

        project.save_to_file(&path).unwrap();
        let loaded = Project::load_from_file(&path).unwrap();
        assert_eq!(project, loaded);
        assert_eq!(loaded.media.len(), 2);
        assert!(loaded.timeline.is_consistent());
    }

    #[test]
    fn load_nonexistent_file_returns_error() {
        let dir = TempDir::new().unwrap();
        let result = Project::load_from_file(dir.path().join("missing.chatcut"));
        assert!(result.is_err());
    }

    #[test]
    fn overlapping_tracks_are_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tampered.chatcut");

        let mut project = make_project();
        let media_id = project
            .media
            .insert(Media::new("clip.mp4", "/media/clip.mp4", "video/mp4", TimeUs(5_000_000)));
        project.add_clip(media_id, TimeUs::ZERO).unwrap();
        project.add_clip(media_id, TimeUs(2_000_000)).unwrap();
        // Hand-edit the file so both clips share track 0.
        let stray = project.timeline.tracks.remove(1);
        project.timeline.tracks[0].clips.extend(stray.clips);
        project.save_to_file(&path).unwrap();

        let err = Project::load_from_file(&path).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn extension_appended_if_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no_ext");

        let project = make_project();
        let written = project.save_to_file(&path).unwrap();

        let expected_path = dir.path().join("no_ext.chatcut");
        assert_eq!(written, expected_path);
        assert!(expected_path.exists());
    }

    #[test]
    fn from_config_uses_timeline_settings() {
        let config = TimelineConfig {
            project_duration_seconds: 12.5,
            overlap_policy: OverlapPolicy::SingleTrack,
        };
        let project = Project::from_config("Cfg", &config);
        assert_eq!(project.timeline.project_duration_us, TimeUs(12_500_000));
        assert_eq!(project.timeline.overlap_policy, OverlapPolicy::SingleTrack);
        assert_eq!(project.timeline.tracks.len(), 1);
    }
}
