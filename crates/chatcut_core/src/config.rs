use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::playback::DEFAULT_RESYNC_THRESHOLD_SECONDS;
use crate::types::{OverlapPolicy, TimeUs, MAX_PROJECT_DURATION};

pub const CHAT_URL_ENV: &str = "CHATCUT_CHAT_URL";
pub const PREPROCESS_URL_ENV: &str = "CHATCUT_PREPROCESS_URL";

/// Per-user data directory for derived media and thumbnails.
pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    base.join("chatcut")
}

/// Location of the user config file, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chatcut").join("config.json"))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub timeline: TimelineConfig,
    pub playback: PlaybackConfig,
    pub assistant: AssistantConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub project_duration_seconds: f64,
    pub overlap_policy: OverlapPolicy,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            project_duration_seconds: 300.0,
            overlap_policy: OverlapPolicy::MultiTrack,
        }
    }
}

impl TimelineConfig {
    /// Pinned to `[0, MAX_PROJECT_DURATION]`; [`EditorConfig::load`] rejects
    /// files outside that range.
    pub fn project_duration(&self) -> TimeUs {
        TimeUs::from_seconds(self.project_duration_seconds)
            .clamp(TimeUs::ZERO, MAX_PROJECT_DURATION)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub tick_interval_ms: u64,
    pub resync_threshold_seconds: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16,
            resync_threshold_seconds: DEFAULT_RESYNC_THRESHOLD_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub chat_url: String,
    pub preprocess_url: String,
    pub request_timeout_secs: u64,
    /// Function calls allowed under one task before the loop gives up.
    pub max_steps: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            chat_url: "http://localhost:5050/api/chatv2".into(),
            preprocess_url: "http://localhost:5050/api/preprocess".into(),
            request_timeout_secs: 120,
            max_steps: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub derived_dir: PathBuf,
    pub thumbnail_width: u32,
    pub max_thumbnails: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            derived_dir: app_data_dir().join("derived"),
            thumbnail_width: 160,
            max_thumbnails: 10,
        }
    }
}

impl EditorConfig {
    /// Read a config file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: EditorConfig = serde_json::from_str(&data)?;
        config.validate()?;
        tracing::debug!(path = %path.as_ref().display(), "Config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let secs = self.timeline.project_duration_seconds;
        if !secs.is_finite() || secs < 0.0 || secs > MAX_PROJECT_DURATION.as_seconds() {
            return Err(CoreError::InvalidArgument(format!(
                "timeline.project_duration_seconds must lie in [0, {}], got {secs}",
                MAX_PROJECT_DURATION.as_seconds()
            )));
        }
        Ok(())
    }

    /// Resolve the effective config: `explicit` if given, else the user
    /// config file if it exists, else defaults. Environment overrides are
    /// applied last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::load(path)?,
                None => Self::default(),
            },
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(CHAT_URL_ENV) {
            self.assistant.chat_url = url;
        }
        if let Some(url) = lookup(PREPROCESS_URL_ENV) {
            self.assistant.preprocess_url = url;
        }
    }
}
