use crate::error::{CoreError, Result};
use crate::types::*;
use uuid::Uuid;

/// Name suffix for the media copy backing the right half of a cut.
const SPLIT_COPY_SUFFIX: &str = "(second half)";

impl Timeline {
    /// An empty timeline with a single empty track.
    pub fn new(project_duration_us: TimeUs, overlap_policy: OverlapPolicy) -> Self {
        Self {
            tracks: vec![Track::new()],
            project_duration_us,
            overlap_policy,
            revision: 0,
        }
    }

    /// Every clip in resolution order: tracks first to last, each track by start.
    pub fn clips(&self) -> impl Iterator<Item = &Clip> {
        self.tracks.iter().flat_map(|t| t.clips.iter())
    }

    pub fn find_clip(&self, clip_id: Uuid) -> Option<&Clip> {
        self.clips().find(|c| c.id == clip_id)
    }

    pub fn clip(&self, clip_id: Uuid) -> Result<&Clip> {
        self.find_clip(clip_id).ok_or(CoreError::ClipNotFound(clip_id))
    }

    /// Index of the track holding `clip_id`.
    pub fn track_of(&self, clip_id: Uuid) -> Option<usize> {
        self.find_clip_location(clip_id).map(|(ti, _)| ti)
    }

    /// Change the user-configured project length. Content past the new end is kept.
    pub fn set_project_duration(&mut self, duration_us: TimeUs) -> Result<()> {
        if duration_us < TimeUs::ZERO || duration_us > MAX_PROJECT_DURATION {
            tracing::warn!(duration = %duration_us, "Project duration rejected");
            return Err(CoreError::InvalidArgument(format!(
                "project duration must lie in [0, {MAX_PROJECT_DURATION}], got {duration_us}"
            )));
        }
        self.project_duration_us = duration_us;
        self.revision += 1;
        Ok(())
    }

    /// True if every track is sorted by `(start, id)` and, under the
    /// multi-track policy, free of overlaps.
    pub fn is_consistent(&self) -> bool {
        self.tracks.iter().all(|track| {
            track.clips.windows(2).all(|w| {
                let ordered = (w[0].track_start_us, w[0].id) <= (w[1].track_start_us, w[1].id);
                let disjoint = self.overlap_policy == OverlapPolicy::SingleTrack || !w[0].overlaps(&w[1]);
                ordered && disjoint
            })
        })
    }

    /// Find the (track_index, clip_index) for a given clip id.
    fn find_clip_location(&self, clip_id: Uuid) -> Option<(usize, usize)> {
        for (ti, track) in self.tracks.iter().enumerate() {
            for (ci, clip) in track.clips.iter().enumerate() {
                if clip.id == clip_id {
                    return Some((ti, ci));
                }
            }
        }
        None
    }

    fn locate(&self, clip_id: Uuid) -> Result<(usize, usize)> {
        self.find_clip_location(clip_id)
            .ok_or(CoreError::ClipNotFound(clip_id))
    }

    /// Track that a new clip lands on, appending a track if every one conflicts.
    fn placement_track(&mut self, clip: &Clip) -> usize {
        if self.tracks.is_empty() {
            self.tracks.push(Track::new());
            return 0;
        }
        if self.overlap_policy == OverlapPolicy::SingleTrack {
            return 0;
        }
        match self.tracks.iter().position(|t| !t.conflicts_with(clip)) {
            Some(idx) => idx,
            None => {
                self.tracks.push(Track::new());
                self.tracks.len() - 1
            }
        }
    }

    /// Swap in a rebuilt clip list for one track. The track is never edited
    /// element by element.
    fn commit_track(&mut self, track_idx: usize, mut clips: Vec<Clip>) {
        sort_clips(&mut clips);
        self.tracks[track_idx].clips = clips;
        self.revision += 1;
    }
}

impl Project {
    /// Drop `media_id` onto the timeline at `drop_position_us`.
    ///
    /// The clip spans the whole media and starts at the drop position clamped
    /// to `[0, project duration]`. Returns the new clip's id.
    pub fn add_clip(&mut self, media_id: Uuid, drop_position_us: TimeUs) -> Result<Uuid> {
        let media = self.media.get(media_id)?;
        if media.duration_us <= TimeUs::ZERO {
            return Err(CoreError::InvalidArgument(format!(
                "media {media_id} has no duration"
            )));
        }

        let project_end = self.timeline.project_duration_us.max(TimeUs::ZERO);
        let start = drop_position_us.clamp(TimeUs::ZERO, project_end);
        let mut clip = Clip::new(media_id, start, media.duration_us);
        clip.annotations = media.annotations.clone();
        let clip_id = clip.id;

        let track_idx = self.timeline.placement_track(&clip);
        let mut clips = self.timeline.tracks[track_idx].clips.clone();
        clips.push(clip);
        self.timeline.commit_track(track_idx, clips);

        tracing::debug!(clip_id = %clip_id, media_id = %media_id, start = %start, track = track_idx, "Clip added");
        Ok(clip_id)
    }

    /// Move a clip so it starts at `new_start_us`, pinned to
    /// `[0, project duration - clip duration]`.
    pub fn move_clip(&mut self, clip_id: Uuid, new_start_us: TimeUs) -> Result<TimeUs> {
        let (track_idx, clip_idx) = self.timeline.locate(clip_id)?;
        let track = &self.timeline.tracks[track_idx];
        let clip = &track.clips[clip_idx];

        let latest_start = (self.timeline.project_duration_us - clip.duration_us).max(TimeUs::ZERO);
        let start = new_start_us.clamp(TimeUs::ZERO, latest_start);

        let mut moved = clip.clone();
        moved.track_start_us = start;

        if self.timeline.overlap_policy == OverlapPolicy::MultiTrack {
            if let Some(other) = track.clips.iter().find(|c| c.id != clip_id && c.overlaps(&moved)) {
                return Err(CoreError::InvalidArgument(format!(
                    "moving clip {clip_id} to {start} would overlap clip {}",
                    other.id
                )));
            }
        }

        let clips: Vec<Clip> = track
            .clips
            .iter()
            .map(|c| if c.id == clip_id { moved.clone() } else { c.clone() })
            .collect();
        self.timeline.commit_track(track_idx, clips);

        tracing::debug!(clip_id = %clip_id, start = %start, "Clip moved");
        Ok(start)
    }

    /// Split a clip `cut_point_us` into its duration.
    ///
    /// The left half keeps the original media; the right half references a
    /// fresh hidden copy so the halves can be transformed independently. Both
    /// halves get new ids. Returns `(left, right)`.
    pub fn cut_clip(&mut self, clip_id: Uuid, cut_point_us: TimeUs) -> Result<(Uuid, Uuid)> {
        let (track_idx, clip_idx) = self.timeline.locate(clip_id)?;
        let clip = self.timeline.tracks[track_idx].clips[clip_idx].clone();

        if cut_point_us <= TimeUs::ZERO || cut_point_us >= clip.duration_us {
            return Err(CoreError::InvalidArgument(format!(
                "cut point {cut_point_us} must lie strictly inside clip {clip_id} (duration {})",
                clip.duration_us
            )));
        }

        let copy_id = self.media.duplicate(clip.media_id, SPLIT_COPY_SUFFIX)?;
        let (left_ann, right_ann) = clip.annotations.split_at(cut_point_us.ceil_seconds());

        let left = Clip {
            id: Uuid::now_v7(),
            media_id: clip.media_id,
            track_start_us: clip.track_start_us,
            duration_us: cut_point_us,
            source_offset_us: clip.source_offset_us,
            annotations: left_ann,
        };
        let right = Clip {
            id: Uuid::now_v7(),
            media_id: copy_id,
            track_start_us: clip.track_start_us + cut_point_us,
            duration_us: clip.duration_us - cut_point_us,
            source_offset_us: clip.source_offset_us + cut_point_us,
            annotations: right_ann,
        };
        let ids = (left.id, right.id);

        let mut clips = self.timeline.tracks[track_idx].clips.clone();
        clips.splice(clip_idx..=clip_idx, [left, right]);
        self.timeline.commit_track(track_idx, clips);

        tracing::debug!(clip_id = %clip_id, left = %ids.0, right = %ids.1, media_copy = %copy_id, "Clip cut");
        Ok(ids)
    }

    /// Remove a clip from its track. Returns the removed clip.
    pub fn delete_clip(&mut self, clip_id: Uuid) -> Result<Clip> {
        let (track_idx, clip_idx) = self.timeline.locate(clip_id)?;
        let mut clips = self.timeline.tracks[track_idx].clips.clone();
        let removed = clips.remove(clip_idx);
        self.timeline.commit_track(track_idx, clips);

        tracing::debug!(clip_id = %clip_id, "Clip deleted");
        Ok(removed)
    }

    /// Point a clip at a different media record, keeping all timing fields.
    pub fn replace_clip_media(&mut self, clip_id: Uuid, new_media_id: Uuid) -> Result<()> {
        let (track_idx, _) = self.timeline.locate(clip_id)?;
        if !self.media.contains(new_media_id) {
            return Err(CoreError::MediaNotFound(new_media_id));
        }

        let clips: Vec<Clip> = self.timeline.tracks[track_idx]
            .clips
            .iter()
            .map(|c| {
                if c.id == clip_id {
                    Clip {
                        media_id: new_media_id,
                        ..c.clone()
                    }
                } else {
                    c.clone()
                }
            })
            .collect();
        self.timeline.commit_track(track_idx, clips);

        tracing::debug!(clip_id = %clip_id, media_id = %new_media_id, "Clip media replaced");
        Ok(())
    }
}

/// Ascending by start; equal starts fall back to creation order.
fn sort_clips(clips: &mut [Clip]) {
    clips.sort_by(|a, b| {
        a.track_start_us
            .cmp(&b.track_start_us)
            .then_with(|| a.id.cmp(&b.id))
    });
}
