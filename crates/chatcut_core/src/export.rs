use std::path::PathBuf;
use uuid::Uuid;

use crate::error::Result;
use crate::types::*;

/// One contiguous piece of the exported video.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportSegment {
    /// Black frames where nothing plays.
    Gap { duration_us: TimeUs },
    Clip {
        clip_id: Uuid,
        source: PathBuf,
        source_offset_us: TimeUs,
        duration_us: TimeUs,
    },
}

impl ExportSegment {
    pub fn duration(&self) -> TimeUs {
        match self {
            ExportSegment::Gap { duration_us } | ExportSegment::Clip { duration_us, .. } => *duration_us,
        }
    }
}

/// Flatten the timeline into back-to-back segments covering
/// `[0, project duration]`.
///
/// Clips from every track are laid out by start time. Where two clips
/// overlap, the later one is trimmed at its head so it begins where the
/// earlier one ends. Content past the project end is cut off.
pub fn plan_export(project: &Project) -> Result<Vec<ExportSegment>> {
    let end = project.timeline.project_duration_us.max(TimeUs::ZERO);
    let mut clips: Vec<&Clip> = project.timeline.clips().collect();
    clips.sort_by(|a, b| {
        a.track_start_us
            .cmp(&b.track_start_us)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut segments = Vec::new();
    let mut cursor = TimeUs::ZERO;

    for clip in clips {
        let start = clip.track_start_us.max(cursor);
        let stop = clip.end_us().min(end);
        if start >= stop {
            continue;
        }
        let media = project.media.get(clip.media_id)?;

        if start > cursor {
            segments.push(ExportSegment::Gap {
                duration_us: start - cursor,
            });
        }
        segments.push(ExportSegment::Clip {
            clip_id: clip.id,
            source: media.source.clone(),
            source_offset_us: clip.source_offset_us + (start - clip.track_start_us),
            duration_us: stop - start,
        });
        cursor = stop;
    }

    if cursor < end {
        segments.push(ExportSegment::Gap {
            duration_us: end - cursor,
        });
    }

    tracing::debug!(segments = segments.len(), duration = %end, "Export planned");
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::media::MediaLibrary;

    fn secs(s: f64) -> TimeUs {
        TimeUs::from_seconds(s)
    }

    fn make_project(duration_s: f64) -> (Project, Uuid) {
        let mut p = Project {
            id: Uuid::new_v4(),
            name: "Test".into(),
            media: MediaLibrary::new(),
            timeline: Timeline::new(secs(duration_s), OverlapPolicy::MultiTrack),
        };
        let m = p.media.insert(Media::new("a.mp4", "/media/a.mp4", "video/mp4", secs(4.0)));
        (p, m)
    }

    fn total(segments: &[ExportSegment]) -> TimeUs {
        segments.iter().fold(TimeUs::ZERO, |acc, s| acc + s.duration())
    }

    #[test]
    fn empty_timeline_is_one_gap() {
        let (p, _) = make_project(10.0);
        let plan = plan_export(&p).unwrap();
        assert_eq!(plan, vec![ExportSegment::Gap { duration_us: secs(10.0) }]);
    }

    #[test]
    fn gaps_fill_around_clips() {
        let (mut p, m) = make_project(20.0);
        let a = p.add_clip(m, secs(2.0)).unwrap();
        let b = p.add_clip(m, secs(10.0)).unwrap();

        let plan = plan_export(&p).unwrap();
        assert_eq!(plan.len(), 5);
        assert_eq!(plan[0], ExportSegment::Gap { duration_us: secs(2.0) });
        assert!(matches!(plan[1], ExportSegment::Clip { clip_id, .. } if clip_id == a));
        assert_eq!(plan[2], ExportSegment::Gap { duration_us: secs(4.0) });
        assert!(matches!(plan[3], ExportSegment::Clip { clip_id, .. } if clip_id == b));
        assert_eq!(plan[4], ExportSegment::Gap { duration_us: secs(6.0) });
        assert_eq!(total(&plan), secs(20.0));
    }

    #[test]
    fn overlapping_tracks_trim_later_clip_head() {
        let (mut p, m) = make_project(10.0);
        p.add_clip(m, secs(0.0)).unwrap();
        let lower = p.add_clip(m, secs(3.0)).unwrap();
        assert_eq!(p.timeline.tracks.len(), 2);

        let plan = plan_export(&p).unwrap();
        let ExportSegment::Clip { clip_id, source_offset_us, duration_us, .. } = &plan[1] else {
            panic!("expected clip segment, got {:?}", plan[1]);
        };
        assert_eq!(*clip_id, lower);
        assert_eq!(*source_offset_us, secs(1.0));
        assert_eq!(*duration_us, secs(3.0));
        assert_eq!(total(&plan), secs(10.0));
    }

    #[test]
    fn content_past_project_end_is_cut() {
        let (mut p, m) = make_project(6.0);
        p.add_clip(m, secs(4.0)).unwrap();
        let plan = plan_export(&p).unwrap();
        assert_eq!(plan.last().map(ExportSegment::duration), Some(secs(2.0)));
        assert_eq!(total(&plan), secs(6.0));
    }

    #[test]
    fn cut_halves_keep_source_offsets() {
        let (mut p, m) = make_project(10.0);
        let id = p.add_clip(m, secs(0.0)).unwrap();
        p.cut_clip(id, secs(1.5)).unwrap();

        let plan = plan_export(&p).unwrap();
        let offsets: Vec<TimeUs> = plan
            .iter()
            .filter_map(|s| match s {
                ExportSegment::Clip { source_offset_us, .. } => Some(*source_offset_us),
                ExportSegment::Gap { .. } => None,
            })
            .collect();
        assert_eq!(offsets, vec![TimeUs::ZERO, secs(1.5)]);
    }

    #[test]
    fn dangling_media_reference_fails() {
        let (mut p, m) = make_project(10.0);
        p.add_clip(m, secs(0.0)).unwrap();
        p.timeline.tracks[0].clips[0].media_id = Uuid::new_v4();
        assert!(matches!(plan_export(&p), Err(CoreError::MediaNotFound(_))));
    }
}
