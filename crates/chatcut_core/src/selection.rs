use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::playback::PlaybackSynchronizer;
use crate::types::*;

// ---------------------------------------------------------------------------
// SelectionRange
// ---------------------------------------------------------------------------

/// The `[start, end]` cursor pair that scopes assistant context.
///
/// Both cursors stay inside `[0, project duration]` and `start <= end`
/// holds after every setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectionRange {
    pub start_us: TimeUs,
    pub end_us: TimeUs,
}

impl SelectionRange {
    /// A range spanning the whole project.
    pub fn full(project_duration_us: TimeUs) -> Self {
        Self {
            start_us: TimeUs::ZERO,
            end_us: project_duration_us.max(TimeUs::ZERO),
        }
    }

    /// Drag the start handle. It never passes the end handle.
    pub fn set_start(&mut self, t: TimeUs, project_duration_us: TimeUs) {
        self.clamp_to(project_duration_us);
        self.start_us = clamp_time(t, project_duration_us).min(self.end_us);
    }

    /// Drag the end handle. It never passes the start handle.
    pub fn set_end(&mut self, t: TimeUs, project_duration_us: TimeUs) {
        self.clamp_to(project_duration_us);
        self.end_us = clamp_time(t, project_duration_us).max(self.start_us);
    }

    /// Re-pin both cursors after the project duration changes.
    pub fn clamp_to(&mut self, project_duration_us: TimeUs) {
        self.end_us = clamp_time(self.end_us, project_duration_us);
        self.start_us = clamp_time(self.start_us, project_duration_us).min(self.end_us);
    }

    /// Closed-interval overlap: a clip touching either cursor counts.
    pub fn contains_clip(&self, clip: &Clip) -> bool {
        clip.track_start_us <= self.end_us && clip.end_us() >= self.start_us
    }

    /// Clips overlapping the range, in timeline scan order.
    ///
    /// Pure over the timeline, so callers recompute it on every range or
    /// timeline change instead of caching.
    pub fn clips_in_range<'a>(&self, timeline: &'a Timeline) -> Vec<&'a Clip> {
        timeline
            .clips()
            .filter(|c| self.contains_clip(c))
            .collect()
    }

    /// Serialised context for every clip in range, as handed to the assistant.
    pub fn clip_contexts(&self, project: &Project) -> Vec<ClipContext> {
        self.clips_in_range(&project.timeline)
            .into_iter()
            .map(|clip| ClipContext::new(clip, project))
            .collect()
    }
}

fn clamp_time(t: TimeUs, project_duration_us: TimeUs) -> TimeUs {
    t.clamp(TimeUs::ZERO, project_duration_us.max(TimeUs::ZERO))
}

// ---------------------------------------------------------------------------
// ClipContext
// ---------------------------------------------------------------------------

/// One clip as the assistant sees it: seconds on the wire, camelCase keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipContext {
    pub id: Uuid,
    pub media_id: Uuid,
    pub start: f64,
    pub duration: f64,
    pub offset: f64,
    pub image_descriptions: Vec<String>,
    pub image_attributes: Vec<FrameAttributes>,
    pub transcription: Vec<String>,
    pub media_name: String,
}

impl ClipContext {
    pub fn new(clip: &Clip, project: &Project) -> Self {
        Self {
            id: clip.id,
            media_id: clip.media_id,
            start: clip.track_start_us.as_seconds(),
            duration: clip.duration_us.as_seconds(),
            offset: clip.source_offset_us.as_seconds(),
            image_descriptions: clip.annotations.descriptions.clone(),
            image_attributes: clip.annotations.attributes.clone(),
            transcription: clip.annotations.transcript.clone(),
            media_name: project
                .media
                .get(clip.media_id)
                .map(|m| m.name.clone())
                .unwrap_or_else(|_| "Unknown".into()),
        }
    }

    /// The assistant expects each context as a JSON string, not an object.
    pub fn to_wire_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Drag state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragTarget {
    StartCursor,
    EndCursor,
    Playhead,
}

/// At most one handle is dragged at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragState {
    active: Option<DragTarget>,
}

impl DragState {
    /// Start dragging `target`. Returns the drag it cancelled, if any.
    pub fn begin(&mut self, target: DragTarget) -> Option<DragTarget> {
        let cancelled = self.active.replace(target).filter(|prev| *prev != target);
        if let Some(prev) = cancelled {
            tracing::debug!(?prev, ?target, "Drag cancelled by new drag");
        }
        cancelled
    }

    pub fn end(&mut self) -> Option<DragTarget> {
        self.active.take()
    }

    pub fn active(&self) -> Option<DragTarget> {
        self.active
    }

    /// [`begin`](Self::begin), keeping `sync` in step: a playhead drag puts
    /// it into `Seeking`, and cancelling one hands back its previous state.
    pub fn begin_with(&mut self, target: DragTarget, sync: &mut PlaybackSynchronizer) -> Option<DragTarget> {
        let cancelled = self.begin(target);
        if cancelled == Some(DragTarget::Playhead) {
            sync.end_seek();
        }
        if target == DragTarget::Playhead {
            sync.begin_seek();
        }
        cancelled
    }

    /// [`end`](Self::end), ending the seek if the playhead was held.
    pub fn end_with(&mut self, sync: &mut PlaybackSynchronizer) -> Option<DragTarget> {
        let ended = self.end();
        if ended == Some(DragTarget::Playhead) {
            sync.end_seek();
        }
        ended
    }
}
