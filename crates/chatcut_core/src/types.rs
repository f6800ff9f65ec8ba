use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::media::MediaLibrary;

// ---------------------------------------------------------------------------
// TimeUs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeUs(pub i64);

/// Longest project the timeline accepts (1000 hours). Any clip start inside
/// it plus any media duration stays far from `i64` overflow.
pub const MAX_PROJECT_DURATION: TimeUs = TimeUs(1_000 * 3_600 * 1_000_000);

impl TimeUs {
    pub const ZERO: Self = Self(0);

    pub fn from_seconds(s: f64) -> Self {
        Self((s * 1_000_000.0).round() as i64)
    }

    /// Like `from_seconds`, but rejects NaN and infinities coming off the wire.
    pub fn try_from_seconds(s: f64, what: &str) -> Result<Self> {
        if !s.is_finite() {
            return Err(CoreError::InvalidArgument(format!(
                "{what} must be a finite number of seconds, got {s}"
            )));
        }
        Ok(Self::from_seconds(s))
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Index of the per-second annotation slot that begins at or after this time.
    pub fn ceil_seconds(&self) -> usize {
        if self.0 <= 0 {
            0
        } else {
            ((self.0 + 999_999) / 1_000_000) as usize
        }
    }
}

impl Add for TimeUs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for TimeUs {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for TimeUs {
    /// `HH:MM:SS.mmm`, with a leading `-` for negative offsets.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let millis = self.0.unsigned_abs() / 1_000;
        let (secs, ms) = (millis / 1_000, millis % 1_000);
        let (h, m, s) = (secs / 3_600, secs / 60 % 60, secs % 60);
        write!(f, "{sign}{h:02}:{m:02}:{s:02}.{ms:03}")
    }
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// Per-frame visual measurements sampled once per second of source media.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrameAttributes {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub blur: f64,
    pub grayscale: bool,
}

/// Per-second metadata arrays. Slot `i` describes second `[i, i+1)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Annotations {
    pub descriptions: Vec<String>,
    pub attributes: Vec<FrameAttributes>,
    pub transcript: Vec<String>,
}

impl Annotations {
    /// Partition every array at `index`. Arrays shorter than `index` yield an
    /// empty right half.
    pub fn split_at(&self, index: usize) -> (Annotations, Annotations) {
        fn split<T: Clone>(v: &[T], at: usize) -> (Vec<T>, Vec<T>) {
            let at = at.min(v.len());
            (v[..at].to_vec(), v[at..].to_vec())
        }
        let (d0, d1) = split(&self.descriptions, index);
        let (a0, a1) = split(&self.attributes, index);
        let (t0, t1) = split(&self.transcript, index);
        (
            Annotations {
                descriptions: d0,
                attributes: a0,
                transcript: t0,
            },
            Annotations {
                descriptions: d1,
                attributes: a1,
                transcript: t1,
            },
        )
    }

    /// Slots `[start, end)`, clamped to what is present.
    pub fn slice(&self, start: usize, end: usize) -> Annotations {
        fn take<T: Clone>(v: &[T], start: usize, end: usize) -> Vec<T> {
            let end = end.min(v.len());
            let start = start.min(end);
            v[start..end].to_vec()
        }
        Annotations {
            descriptions: take(&self.descriptions, start, end),
            attributes: take(&self.attributes, start, end),
            transcript: take(&self.transcript, start, end),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty() && self.attributes.is_empty() && self.transcript.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thumbnail {
    pub at_second: f64,
    pub image: PathBuf,
}

/// An immutable source asset. Edits never touch a `Media` in place; they
/// register a new one (see [`Media::derive`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Media {
    pub id: Uuid,
    pub name: String,
    pub source: PathBuf,
    pub content_type: String,
    pub duration_us: TimeUs,
    pub thumbnails: Vec<Thumbnail>,
    /// Assistant-derived variants are kept out of the primary media list.
    pub hidden: bool,
    pub annotations: Annotations,
    pub derived_from: Option<Uuid>,
}

impl Media {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        content_type: impl Into<String>,
        duration_us: TimeUs,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source: source.into(),
            content_type: content_type.into(),
            duration_us,
            thumbnails: vec![],
            hidden: false,
            annotations: Annotations::default(),
            derived_from: None,
        }
    }

    /// Copy-on-write: a hidden sibling with a fresh id that shares this
    /// media's metadata. `source` may point at new bytes or at the same
    /// immutable file.
    pub fn derive(&self, name: impl Into<String>, source: impl Into<PathBuf>) -> Media {
        Media {
            id: Uuid::new_v4(),
            name: name.into(),
            source: source.into(),
            content_type: self.content_type.clone(),
            duration_us: self.duration_us,
            thumbnails: self.thumbnails.clone(),
            hidden: true,
            annotations: self.annotations.clone(),
            derived_from: Some(self.id),
        }
    }
}

// ---------------------------------------------------------------------------
// Clip
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clip {
    /// UUIDv7, so ids sort in creation order.
    pub id: Uuid,
    pub media_id: Uuid,
    pub track_start_us: TimeUs,
    pub duration_us: TimeUs,
    pub source_offset_us: TimeUs,
    pub annotations: Annotations,
}

impl Clip {
    pub fn new(media_id: Uuid, track_start_us: TimeUs, duration_us: TimeUs) -> Self {
        Self {
            id: Uuid::now_v7(),
            media_id,
            track_start_us,
            duration_us,
            source_offset_us: TimeUs::ZERO,
            annotations: Annotations::default(),
        }
    }

    pub fn end_us(&self) -> TimeUs {
        self.track_start_us + self.duration_us
    }

    /// Half-open overlap on the timeline; touching clips do not overlap.
    pub fn overlaps(&self, other: &Clip) -> bool {
        self.track_start_us < other.end_us() && other.track_start_us < self.end_us()
    }
}

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: Uuid,
    /// Sorted by `(track_start_us, id)`.
    pub clips: Vec<Clip>,
}

impl Track {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            clips: vec![],
        }
    }

    pub fn conflicts_with(&self, clip: &Clip) -> bool {
        self.clips
            .iter()
            .any(|c| c.id != clip.id && c.overlaps(clip))
    }
}

impl Default for Track {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// New clips go to the first track they fit on; tracks never overlap.
    #[default]
    MultiTrack,
    /// Everything lives on one track and clips may overlap.
    SingleTrack,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    pub tracks: Vec<Track>,
    pub project_duration_us: TimeUs,
    pub overlap_policy: OverlapPolicy,
    /// Bumped on every successful structural edit.
    pub revision: u64,
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub media: MediaLibrary,
    pub timeline: Timeline,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_arithmetic() {
        let clip_end = TimeUs(7_250_000) + TimeUs(750_000);
        assert_eq!(clip_end, TimeUs(8_000_000));
        assert_eq!(clip_end - TimeUs(10_000_000), TimeUs(-2_000_000));
    }

    #[test]
    fn time_arithmetic_saturates() {
        assert_eq!(TimeUs(i64::MAX) + TimeUs(1_000_000), TimeUs(i64::MAX));
        assert_eq!(TimeUs(i64::MIN) - TimeUs(1), TimeUs(i64::MIN));
        assert_eq!(TimeUs::from_seconds(1e13), TimeUs(i64::MAX));
    }

    #[test]
    fn time_us_from_seconds_rounds() {
        assert_eq!(TimeUs::from_seconds(2.5), TimeUs(2_500_000));
        assert_eq!(TimeUs::from_seconds(2.3), TimeUs(2_300_000));
        assert!((TimeUs(2_500_000).as_seconds() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn try_from_seconds_rejects_non_finite() {
        assert!(TimeUs::try_from_seconds(f64::NAN, "cutPoint").is_err());
        assert!(TimeUs::try_from_seconds(f64::INFINITY, "start").is_err());
        assert_eq!(
            TimeUs::try_from_seconds(-1.0, "start").unwrap(),
            TimeUs(-1_000_000)
        );
    }

    #[test]
    fn ceil_seconds_matches_slot_index() {
        assert_eq!(TimeUs::ZERO.ceil_seconds(), 0);
        assert_eq!(TimeUs(1).ceil_seconds(), 1);
        assert_eq!(TimeUs(3_000_000).ceil_seconds(), 3);
        assert_eq!(TimeUs(3_000_001).ceil_seconds(), 4);
        assert_eq!(TimeUs(-5).ceil_seconds(), 0);
    }

    #[test]
    fn time_us_display() {
        assert_eq!(TimeUs::ZERO.to_string(), "00:00:00.000");
        assert_eq!(TimeUs(59_999_000).to_string(), "00:00:59.999");
        assert_eq!(TimeUs::from_seconds(7322.25).to_string(), "02:02:02.250");
        assert_eq!(TimeUs(-1_500_000).to_string(), "-00:00:01.500");
    }

    #[test]
    fn annotations_split_partitions_every_array() {
        let ann = Annotations {
            descriptions: vec!["a".into(), "b".into(), "c".into()],
            attributes: vec![FrameAttributes::default(); 3],
            transcript: vec!["x".into()],
        };
        let (left, right) = ann.split_at(2);
        assert_eq!(left.descriptions, vec!["a", "b"]);
        assert_eq!(right.descriptions, vec!["c"]);
        assert_eq!(left.attributes.len(), 2);
        assert_eq!(right.attributes.len(), 1);
        assert_eq!(left.transcript, vec!["x"]);
        assert!(right.transcript.is_empty());
    }

    #[test]
    fn annotations_slice_clamps() {
        let ann = Annotations {
            descriptions: (0..5).map(|i| i.to_string()).collect(),
            ..Default::default()
        };
        assert_eq!(ann.slice(1, 3).descriptions, vec!["1", "2"]);
        assert_eq!(ann.slice(4, 10).descriptions, vec!["4"]);
        assert!(ann.slice(7, 9).is_empty());
    }

    #[test]
    fn derive_media_is_hidden_copy_with_new_id() {
        let mut original = Media::new("beach.mp4", "/media/beach.mp4", "video/mp4", TimeUs(8_000_000));
        original.annotations.descriptions = vec!["sand".into()];
        let copy = original.derive("beach.mp4 (second half)", original.source.clone());

        assert_ne!(copy.id, original.id);
        assert!(copy.hidden);
        assert!(!original.hidden);
        assert_eq!(copy.derived_from, Some(original.id));
        assert_eq!(copy.duration_us, original.duration_us);
        assert_eq!(copy.annotations, original.annotations);
    }

    #[test]
    fn clip_ids_sort_in_creation_order() {
        let media_id = Uuid::new_v4();
        let a = Clip::new(media_id, TimeUs::ZERO, TimeUs(1_000_000));
        let b = Clip::new(media_id, TimeUs::ZERO, TimeUs(1_000_000));
        assert!(a.id < b.id);
    }

    #[test]
    fn clip_overlap_is_half_open() {
        let media_id = Uuid::new_v4();
        let a = Clip::new(media_id, TimeUs(0), TimeUs(5_000_000));
        let b = Clip::new(media_id, TimeUs(5_000_000), TimeUs(5_000_000));
        let c = Clip::new(media_id, TimeUs(4_999_999), TimeUs(5_000_000));
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&a));
    }

    #[test]
    fn serde_roundtrip_clip() {
        let clip = Clip::new(Uuid::new_v4(), TimeUs(1_000_000), TimeUs(3_000_000));
        let json = serde_json::to_string(&clip).unwrap();
        let back: Clip = serde_json::from_str(&json).unwrap();
        assert_eq!(clip, back);
    }

    #[test]
    fn overlap_policy_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&OverlapPolicy::SingleTrack).unwrap(),
            "\"single_track\""
        );
        let p: OverlapPolicy = serde_json::from_str("\"multi_track\"").unwrap();
        assert_eq!(p, OverlapPolicy::MultiTrack);
    }
}
