use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;
use crate::types::*;

/// Surface/timeline drift tolerated before the surface is re-seeked.
pub const DEFAULT_RESYNC_THRESHOLD_SECONDS: f64 = 0.1;

/// The thing that actually decodes and shows media: a player process, a
/// video element, or a test double.
pub trait PlaybackSurface {
    /// Media currently loaded into the surface, if any.
    fn bound_media(&self) -> Option<Uuid>;
    fn bind(&mut self, media: &Media) -> Result<()>;
    fn detach(&mut self) -> Result<()>;
    /// Playback position inside the bound media, in seconds.
    fn position_seconds(&mut self) -> Result<f64>;
    fn seek(&mut self, seconds: f64) -> Result<()>;
    fn is_paused(&mut self) -> Result<bool>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    /// Manual scrub; `resume` records whether playback was running before.
    Seeking { resume: bool },
}

/// The clip covering the playhead and where inside its media to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveClip {
    pub clip_id: Uuid,
    pub media_id: Uuid,
    pub local_time_us: TimeUs,
}

/// Resolve the clip under `t`.
///
/// Clips are scanned track by track in start order and the first half-open
/// `[start, end)` match wins. If nothing matches, a clip ending exactly at
/// `t` is accepted so the final frame of the last clip still resolves.
pub fn resolve_active_clip(timeline: &Timeline, t: TimeUs) -> Option<ActiveClip> {
    let hit = timeline
        .clips()
        .find(|c| c.track_start_us <= t && t < c.end_us())
        .or_else(|| timeline.clips().find(|c| c.end_us() == t))?;
    Some(ActiveClip {
        clip_id: hit.id,
        media_id: hit.media_id,
        local_time_us: t - hit.track_start_us + hit.source_offset_us,
    })
}

// ---------------------------------------------------------------------------
// PlaybackSynchronizer
// ---------------------------------------------------------------------------

/// Owns the playhead and drives a [`PlaybackSurface`] from the timeline.
///
/// The active clip is never stored; every [`sync`](Self::sync) resolves it
/// again against whatever project snapshot it is handed.
#[derive(Debug, Clone)]
pub struct PlaybackSynchronizer {
    state: PlaybackState,
    current_time_us: TimeUs,
    resync_threshold_s: f64,
}

impl Default for PlaybackSynchronizer {
    fn default() -> Self {
        Self::new(DEFAULT_RESYNC_THRESHOLD_SECONDS)
    }
}

impl PlaybackSynchronizer {
    pub fn new(resync_threshold_s: f64) -> Self {
        Self {
            state: PlaybackState::Stopped,
            current_time_us: TimeUs::ZERO,
            resync_threshold_s,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_time(&self) -> TimeUs {
        self.current_time_us
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Start playback. Refused for an empty project; a no-op while seeking.
    pub fn play(&mut self, project_duration_us: TimeUs) -> bool {
        if project_duration_us <= TimeUs::ZERO {
            tracing::debug!("Play ignored: project has no duration");
            return false;
        }
        match self.state {
            PlaybackState::Stopped => {
                if self.current_time_us >= project_duration_us {
                    self.current_time_us = TimeUs::ZERO;
                }
                self.state = PlaybackState::Playing;
                tracing::debug!(time = %self.current_time_us, "Playback started");
                true
            }
            PlaybackState::Playing => true,
            PlaybackState::Seeking { .. } => false,
        }
    }

    /// Stop advancing, keeping the playhead where it is.
    pub fn pause(&mut self) {
        match self.state {
            PlaybackState::Playing => {
                self.state = PlaybackState::Stopped;
                tracing::debug!(time = %self.current_time_us, "Playback paused");
            }
            PlaybackState::Seeking { .. } => {
                self.state = PlaybackState::Seeking { resume: false };
            }
            PlaybackState::Stopped => {}
        }
    }

    pub fn begin_seek(&mut self) {
        if let PlaybackState::Seeking { .. } = self.state {
            return;
        }
        let resume = self.state == PlaybackState::Playing;
        self.state = PlaybackState::Seeking { resume };
        tracing::debug!(resume, "Seek started");
    }

    /// Move the playhead, clamped to the project. Works in any state.
    pub fn seek_to(&mut self, t: TimeUs, project_duration_us: TimeUs) {
        self.current_time_us = t.clamp(TimeUs::ZERO, project_duration_us.max(TimeUs::ZERO));
    }

    /// Leave `Seeking` for whichever state preceded it.
    pub fn end_seek(&mut self) {
        if let PlaybackState::Seeking { resume } = self.state {
            self.state = if resume {
                PlaybackState::Playing
            } else {
                PlaybackState::Stopped
            };
            tracing::debug!(time = %self.current_time_us, resume, "Seek ended");
        }
    }

    /// Advance the playhead by one tick's wall-clock delta.
    ///
    /// Reaching the project end stops playback and rewinds to zero.
    /// Returns true when that happened.
    pub fn advance(&mut self, elapsed: Duration, project_duration_us: TimeUs) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        let delta = TimeUs(i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX));
        self.current_time_us = TimeUs(self.current_time_us.0.saturating_add(delta.0));
        if self.current_time_us >= project_duration_us {
            self.current_time_us = TimeUs::ZERO;
            self.state = PlaybackState::Stopped;
            tracing::debug!("Playback reached project end, rewound to start");
            return true;
        }
        false
    }

    /// Bring `surface` in line with the playhead over `project`.
    ///
    /// The source is rebound only when the resolved media differs from the
    /// bound one, and the surface is re-seeked only when it drifted past the
    /// resync threshold. While seeking the surface is left alone; it catches
    /// up on the first sync after [`end_seek`](Self::end_seek).
    pub fn sync<S: PlaybackSurface + ?Sized>(
        &self,
        project: &Project,
        surface: &mut S,
    ) -> Result<Option<ActiveClip>> {
        if let PlaybackState::Seeking { .. } = self.state {
            return Ok(resolve_active_clip(&project.timeline, self.current_time_us));
        }

        let resolved = resolve_active_clip(&project.timeline, self.current_time_us).and_then(|active| {
            match project.media.get(active.media_id) {
                Ok(media) => Some((active, media)),
                Err(_) => {
                    tracing::warn!(clip_id = %active.clip_id, media_id = %active.media_id, "Active clip references missing media");
                    None
                }
            }
        });

        let Some((active, media)) = resolved else {
            if !surface.is_paused()? {
                surface.pause()?;
            }
            if surface.bound_media().is_some() {
                surface.detach()?;
            }
            return Ok(None);
        };

        if surface.bound_media() != Some(media.id) {
            tracing::debug!(clip_id = %active.clip_id, media_id = %media.id, "Binding surface source");
            surface.bind(media)?;
        }

        let local = active.local_time_us.as_seconds();
        let drift = (surface.position_seconds()? - local).abs();
        if drift > self.resync_threshold_s {
            surface.seek(local)?;
        }

        let paused = surface.is_paused()?;
        if self.is_playing() && paused {
            surface.play()?;
        } else if !self.is_playing() && !paused {
            surface.pause()?;
        }

        Ok(Some(active))
    }

    /// One scheduled tick: advance, then sync.
    pub fn tick<S: PlaybackSurface + ?Sized>(
        &mut self,
        elapsed: Duration,
        project: &Project,
        surface: &mut S,
    ) -> Result<Option<ActiveClip>> {
        self.advance(elapsed, project.timeline.project_duration_us);
        self.sync(project, surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaLibrary;

    fn secs(s: f64) -> TimeUs {
        TimeUs::from_seconds(s)
    }

    #[derive(Debug, Default)]
    struct FakeSurface {
        bound: Option<Uuid>,
        position: f64,
        paused: bool,
        binds: usize,
        seeks: Vec<f64>,
        detaches: usize,
    }

    impl FakeSurface {
        fn new() -> Self {
            Self {
                paused: true,
                ..Default::default()
            }
        }
    }

    impl PlaybackSurface for FakeSurface {
        fn bound_media(&self) -> Option<Uuid> {
            self.bound
        }
        fn bind(&mut self, media: &Media) -> Result<()> {
            self.bound = Some(media.id);
            self.position = 0.0;
            self.binds += 1;
            Ok(())
        }
        fn detach(&mut self) -> Result<()> {
            self.bound = None;
            self.detaches += 1;
            Ok(())
        }
        fn position_seconds(&mut self) -> Result<f64> {
            Ok(self.position)
        }
        fn seek(&mut self, seconds: f64) -> Result<()> {
            self.position = seconds;
            self.seeks.push(seconds);
            Ok(())
        }
        fn is_paused(&mut self) -> Result<bool> {
            Ok(self.paused)
        }
        fn play(&mut self) -> Result<()> {
            self.paused = false;
            Ok(())
        }
        fn pause(&mut self) -> Result<()> {
            self.paused = true;
            Ok(())
        }
    }

    /// Project of 20s with `a` on [2, 6) (offset 1s into its media) and `b`
    /// on [6, 10).
    fn make_project() -> (Project, Uuid, Uuid) {
        let mut p = Project {
            id: Uuid::new_v4(),
            name: "Test".into(),
            media: MediaLibrary::new(),
            timeline: Timeline::new(secs(20.0), OverlapPolicy::MultiTrack),
        };
        let ma = p.media.insert(Media::new("a.mp4", "/a.mp4", "video/mp4", secs(5.0)));
        let mb = p.media.insert(Media::new("b.mp4", "/b.mp4", "video/mp4", secs(4.0)));
        let a = p.add_clip(ma, secs(1.0)).unwrap();
        let (left, a) = p.cut_clip(a, secs(1.0)).unwrap();
        p.delete_clip(left).unwrap();
        let b = p.add_clip(mb, secs(6.0)).unwrap();
        (p, a, b)
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    #[test]
    fn resolves_local_time_inside_clip() {
        let (p, a, _) = make_project();
        let active = resolve_active_clip(&p.timeline, secs(3.5)).unwrap();
        assert_eq!(active.clip_id, a);
        // 3.5 - 2 + 1
        assert!((active.local_time_us.as_seconds() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn adjacent_boundary_resolves_to_later_clip() {
        let (p, _, b) = make_project();
        let active = resolve_active_clip(&p.timeline, secs(6.0)).unwrap();
        assert_eq!(active.clip_id, b);
        assert_eq!(active.local_time_us, TimeUs::ZERO);
    }

    #[test]
    fn final_frame_of_last_clip_still_resolves() {
        let (p, _, b) = make_project();
        let active = resolve_active_clip(&p.timeline, secs(10.0)).unwrap();
        assert_eq!(active.clip_id, b);
    }

    #[test]
    fn gaps_resolve_to_nothing() {
        let (p, _, _) = make_project();
        assert!(resolve_active_clip(&p.timeline, secs(1.0)).is_none());
        assert!(resolve_active_clip(&p.timeline, secs(15.0)).is_none());
    }

    #[test]
    fn first_track_wins_on_overlap() {
        let mut p = Project {
            id: Uuid::new_v4(),
            name: "Test".into(),
            media: MediaLibrary::new(),
            timeline: Timeline::new(secs(20.0), OverlapPolicy::MultiTrack),
        };
        let m = p.media.insert(Media::new("a.mp4", "/a.mp4", "video/mp4", secs(5.0)));
        let top = p.add_clip(m, secs(0.0)).unwrap();
        p.add_clip(m, secs(2.0)).unwrap();
        assert_eq!(resolve_active_clip(&p.timeline, secs(3.0)).unwrap().clip_id, top);
    }

    // -----------------------------------------------------------------------
    // State machine
    // -----------------------------------------------------------------------

    #[test]
    fn play_refused_for_empty_project() {
        let mut sync = PlaybackSynchronizer::default();
        assert!(!sync.play(TimeUs::ZERO));
        assert_eq!(sync.state(), PlaybackState::Stopped);
    }

    #[test]
    fn reaching_end_rewinds_and_stops() {
        let mut sync = PlaybackSynchronizer::default();
        assert!(sync.play(secs(1.0)));
        assert!(!sync.advance(Duration::from_millis(600), secs(1.0)));
        assert_eq!(sync.current_time(), secs(0.6));
        assert!(sync.advance(Duration::from_millis(600), secs(1.0)));
        assert_eq!(sync.current_time(), TimeUs::ZERO);
        assert_eq!(sync.state(), PlaybackState::Stopped);
    }

    #[test]
    fn advance_ignored_unless_playing() {
        let mut sync = PlaybackSynchronizer::default();
        sync.seek_to(secs(2.0), secs(10.0));
        sync.advance(Duration::from_secs(1), secs(10.0));
        assert_eq!(sync.current_time(), secs(2.0));
    }

    #[test]
    fn seeking_returns_to_previous_state() {
        let pd = secs(10.0);
        let mut sync = PlaybackSynchronizer::default();
        sync.play(pd);
        sync.begin_seek();
        assert_eq!(sync.state(), PlaybackState::Seeking { resume: true });
        sync.seek_to(secs(4.0), pd);
        sync.advance(Duration::from_secs(1), pd);
        assert_eq!(sync.current_time(), secs(4.0));
        sync.end_seek();
        assert_eq!(sync.state(), PlaybackState::Playing);

        sync.pause();
        sync.begin_seek();
        sync.end_seek();
        assert_eq!(sync.state(), PlaybackState::Stopped);
    }

    #[test]
    fn seek_clamps_to_project() {
        let mut sync = PlaybackSynchronizer::default();
        sync.seek_to(secs(-3.0), secs(10.0));
        assert_eq!(sync.current_time(), TimeUs::ZERO);
        sync.seek_to(secs(30.0), secs(10.0));
        assert_eq!(sync.current_time(), secs(10.0));
    }

    // -----------------------------------------------------------------------
    // Surface synchronisation
    // -----------------------------------------------------------------------

    #[test]
    fn sync_binds_seeks_and_plays() {
        let (p, a, _) = make_project();
        let mut surface = FakeSurface::new();
        let mut sync = PlaybackSynchronizer::default();
        sync.seek_to(secs(3.0), p.timeline.project_duration_us);
        sync.play(p.timeline.project_duration_us);

        let active = sync.sync(&p, &mut surface).unwrap().unwrap();
        assert_eq!(active.clip_id, a);
        assert_eq!(surface.binds, 1);
        assert_eq!(surface.seeks, vec![2.0]);
        assert!(!surface.paused);
    }

    #[test]
    fn same_media_is_not_rebound() {
        let (p, _, _) = make_project();
        let mut surface = FakeSurface::new();
        let mut sync = PlaybackSynchronizer::default();
        sync.seek_to(secs(2.5), p.timeline.project_duration_us);
        sync.play(p.timeline.project_duration_us);

        for _ in 0..5 {
            sync.tick(Duration::from_millis(16), &p, &mut surface).unwrap();
        }
        assert_eq!(surface.binds, 1);
    }

    #[test]
    fn small_drift_is_tolerated() {
        let (p, _, _) = make_project();
        let mut surface = FakeSurface::new();
        let mut sync = PlaybackSynchronizer::default();
        sync.seek_to(secs(3.0), p.timeline.project_duration_us);
        sync.sync(&p, &mut surface).unwrap();
        assert_eq!(surface.seeks.len(), 1);

        surface.position = 2.0 + 0.09;
        sync.sync(&p, &mut surface).unwrap();
        assert_eq!(surface.seeks.len(), 1);

        surface.position = 2.0 + 0.2;
        sync.sync(&p, &mut surface).unwrap();
        assert_eq!(surface.seeks, vec![2.0, 2.0]);
    }

    #[test]
    fn gap_pauses_and_detaches() {
        let (p, _, _) = make_project();
        let mut surface = FakeSurface::new();
        let mut sync = PlaybackSynchronizer::default();
        sync.seek_to(secs(3.0), p.timeline.project_duration_us);
        sync.play(p.timeline.project_duration_us);
        sync.sync(&p, &mut surface).unwrap();
        assert!(surface.bound.is_some());

        sync.seek_to(secs(12.0), p.timeline.project_duration_us);
        assert!(sync.sync(&p, &mut surface).unwrap().is_none());
        assert!(surface.paused);
        assert!(surface.bound.is_none());
        assert_eq!(surface.detaches, 1);
    }

    #[test]
    fn surface_is_left_alone_while_seeking() {
        let (p, _, b) = make_project();
        let pd = p.timeline.project_duration_us;
        let mut surface = FakeSurface::new();
        let mut sync = PlaybackSynchronizer::default();
        sync.seek_to(secs(3.0), pd);
        sync.play(pd);
        sync.sync(&p, &mut surface).unwrap();
        assert_eq!((surface.binds, surface.seeks.len()), (1, 1));

        sync.begin_seek();
        for t in [7.0, 8.0, 12.0, 7.5] {
            sync.seek_to(secs(t), pd);
            sync.tick(Duration::from_millis(16), &p, &mut surface).unwrap();
        }
        assert_eq!(surface.binds, 1);
        assert_eq!(surface.seeks, vec![2.0]);
        assert_eq!(surface.detaches, 0);
        assert_eq!(sync.current_time(), secs(7.5));

        sync.end_seek();
        let active = sync.sync(&p, &mut surface).unwrap().unwrap();
        assert_eq!(active.clip_id, b);
        assert_eq!(surface.binds, 2);
        assert_eq!(surface.seeks, vec![2.0, 1.5]);
        assert!(!surface.paused);
    }

    #[test]
    fn crossing_into_next_clip_swaps_source() {
        let (p, _, b) = make_project();
        let mut surface = FakeSurface::new();
        let mut sync = PlaybackSynchronizer::default();
        sync.seek_to(secs(5.9), p.timeline.project_duration_us);
        sync.play(p.timeline.project_duration_us);
        sync.sync(&p, &mut surface).unwrap();

        let active = sync
            .tick(Duration::from_millis(200), &p, &mut surface)
            .unwrap()
            .unwrap();
        assert_eq!(active.clip_id, b);
        assert_eq!(surface.binds, 2);
        assert_eq!(surface.bound, Some(active.media_id));
    }
}
