use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::types::*;

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// A pixel- or time-level rewrite of a clip's media. Applying one never
/// touches the source media; it yields a new derived record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    Brightness { brightness: f64 },
    ColorGrading { contrast: f64, gamma: f64, saturation: f64 },
    Saturation { saturation: f64 },
    Blur { sigma: f64 },
    Grayscale,
    Trim { start: TimeUs, end: TimeUs },
}

impl Transform {
    /// Short human label, used in derived media names.
    pub fn label(&self) -> &'static str {
        match self {
            Transform::Brightness { .. } => "brightness",
            Transform::ColorGrading { .. } => "color grading",
            Transform::Saturation { .. } => "saturation",
            Transform::Blur { .. } => "blur",
            Transform::Grayscale => "grayscale",
            Transform::Trim { .. } => "trim",
        }
    }

    /// Reject parameters the processor cannot honour for `source`.
    pub fn validate(&self, source: &Media) -> Result<()> {
        let finite = |name: &str, v: f64| {
            if v.is_finite() {
                Ok(())
            } else {
                Err(CoreError::invalid(format!("{name} must be finite, got {v}")))
            }
        };
        match *self {
            Transform::Brightness { brightness } => {
                finite("brightness", brightness)?;
                if !(-1.0..=1.0).contains(&brightness) {
                    return Err(CoreError::invalid(format!(
                        "brightness must lie in [-1, 1], got {brightness}"
                    )));
                }
            }
            Transform::ColorGrading { contrast, gamma, saturation } => {
                finite("contrast", contrast)?;
                finite("gamma", gamma)?;
                finite("saturation", saturation)?;
                if gamma <= 0.0 {
                    return Err(CoreError::invalid(format!("gamma must be positive, got {gamma}")));
                }
                if saturation < 0.0 {
                    return Err(CoreError::invalid(format!(
                        "saturation must not be negative, got {saturation}"
                    )));
                }
            }
            Transform::Saturation { saturation } => {
                finite("saturation", saturation)?;
                if saturation < 0.0 {
                    return Err(CoreError::invalid(format!(
                        "saturation must not be negative, got {saturation}"
                    )));
                }
            }
            Transform::Blur { sigma } => {
                finite("blurStrength", sigma)?;
                if sigma < 0.0 {
                    return Err(CoreError::invalid(format!(
                        "blur strength must not be negative, got {sigma}"
                    )));
                }
            }
            Transform::Grayscale => {}
            Transform::Trim { start, end } => {
                if start < TimeUs::ZERO || start >= end || end > source.duration_us {
                    return Err(CoreError::invalid(format!(
                        "trim range {start}..{end} must lie inside media {} (duration {})",
                        source.id, source.duration_us
                    )));
                }
            }
        }
        Ok(())
    }

    /// The hidden record describing what this transform produces from
    /// `source`, with its bytes at `output`.
    pub fn derive_media(&self, source: &Media, output: impl Into<PathBuf>) -> Media {
        let mut derived = source.derive(format!("{} ({})", source.name, self.label()), output);
        if let Transform::Trim { start, end } = *self {
            derived.duration_us = end - start;
            derived.annotations = source
                .annotations
                .slice(start.0.max(0) as usize / 1_000_000, end.ceil_seconds());
            let (from, to) = (start.as_seconds(), end.as_seconds());
            derived.thumbnails = source
                .thumbnails
                .iter()
                .filter(|t| t.at_second >= from && t.at_second <= to)
                .map(|t| Thumbnail {
                    at_second: t.at_second - from,
                    image: t.image.clone(),
                })
                .collect();
        }
        derived
    }
}

// ---------------------------------------------------------------------------
// EditOp
// ---------------------------------------------------------------------------

/// One assistant-issued edit, decoded from its wire name and arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    Cut { clip_id: Uuid, cut_point: TimeUs },
    Move { clip_id: Uuid, start: TimeUs },
    Delete { clip_id: Uuid },
    Transform { clip_id: Uuid, transform: Transform },
}

/// What a successfully applied op changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Cut { left: Uuid, right: Uuid },
    Moved { clip_id: Uuid, start: TimeUs },
    Deleted { clip_id: Uuid },
    Transformed { clip_id: Uuid, media_id: Uuid },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClipArgs {
    clip_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CutArgs {
    clip_id: String,
    cut_point: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveArgs {
    clip_id: String,
    start: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrightnessArgs {
    clip_id: String,
    brightness: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GradingArgs {
    clip_id: String,
    contrast: f64,
    gamma: f64,
    saturation: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaturationArgs {
    clip_id: String,
    saturation: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlurArgs {
    clip_id: String,
    blur_strength: f64,
}

#[derive(Deserialize)]
struct TrimArgs {
    #[serde(rename = "clipId")]
    clip_id: String,
    #[serde(alias = "startTime")]
    start_time: f64,
    #[serde(alias = "endTime")]
    end_time: f64,
}

fn decode<T: DeserializeOwned>(name: &str, args: &serde_json::Value) -> Result<T> {
    T::deserialize(args)
        .map_err(|e| CoreError::invalid(format!("bad arguments for {name}: {e}")))
}

fn clip_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| CoreError::invalid(format!("clipId {raw:?} is not a clip id")))
}

impl EditOp {
    /// Decode a function call. Unknown names and malformed arguments are
    /// rejected here, before anything touches the project.
    pub fn parse(name: &str, args: &serde_json::Value) -> Result<EditOp> {
        let op = match name {
            "cutClip" => {
                let a: CutArgs = decode(name, args)?;
                EditOp::Cut {
                    clip_id: clip_id(&a.clip_id)?,
                    cut_point: TimeUs::try_from_seconds(a.cut_point, "cutPoint")?,
                }
            }
            "moveClip" => {
                let a: MoveArgs = decode(name, args)?;
                EditOp::Move {
                    clip_id: clip_id(&a.clip_id)?,
                    start: TimeUs::try_from_seconds(a.start, "start")?,
                }
            }
            "deleteClip" => {
                let a: ClipArgs = decode(name, args)?;
                EditOp::Delete {
                    clip_id: clip_id(&a.clip_id)?,
                }
            }
            "adjustBrightness" => {
                let a: BrightnessArgs = decode(name, args)?;
                EditOp::Transform {
                    clip_id: clip_id(&a.clip_id)?,
                    transform: Transform::Brightness {
                        brightness: a.brightness,
                    },
                }
            }
            "applyColorGrading" => {
                let a: GradingArgs = decode(name, args)?;
                EditOp::Transform {
                    clip_id: clip_id(&a.clip_id)?,
                    transform: Transform::ColorGrading {
                        contrast: a.contrast,
                        gamma: a.gamma,
                        saturation: a.saturation,
                    },
                }
            }
            "adjustSaturation" => {
                let a: SaturationArgs = decode(name, args)?;
                EditOp::Transform {
                    clip_id: clip_id(&a.clip_id)?,
                    transform: Transform::Saturation {
                        saturation: a.saturation,
                    },
                }
            }
            "addBlurEffect" => {
                let a: BlurArgs = decode(name, args)?;
                EditOp::Transform {
                    clip_id: clip_id(&a.clip_id)?,
                    transform: Transform::Blur {
                        sigma: a.blur_strength,
                    },
                }
            }
            "convertToGrayscale" => {
                let a: ClipArgs = decode(name, args)?;
                EditOp::Transform {
                    clip_id: clip_id(&a.clip_id)?,
                    transform: Transform::Grayscale,
                }
            }
            "trimVideo" | "trim_video" => {
                let a: TrimArgs = decode(name, args)?;
                EditOp::Transform {
                    clip_id: clip_id(&a.clip_id)?,
                    transform: Transform::Trim {
                        start: TimeUs::try_from_seconds(a.start_time, "start_time")?,
                        end: TimeUs::try_from_seconds(a.end_time, "end_time")?,
                    },
                }
            }
            other => return Err(CoreError::UnknownOperation(other.to_string())),
        };
        Ok(op)
    }

    /// Like [`parse`](Self::parse), for arguments still encoded as a JSON string.
    pub fn parse_json(name: &str, args_json: &str) -> Result<EditOp> {
        let args: serde_json::Value = serde_json::from_str(args_json)?;
        Self::parse(name, &args)
    }

    pub fn clip_id(&self) -> Uuid {
        match self {
            EditOp::Cut { clip_id, .. }
            | EditOp::Move { clip_id, .. }
            | EditOp::Delete { clip_id }
            | EditOp::Transform { clip_id, .. } => *clip_id,
        }
    }

    /// Canonical wire name.
    pub fn name(&self) -> &'static str {
        match self {
            EditOp::Cut { .. } => "cutClip",
            EditOp::Move { .. } => "moveClip",
            EditOp::Delete { .. } => "deleteClip",
            EditOp::Transform { transform, .. } => match transform {
                Transform::Brightness { .. } => "adjustBrightness",
                Transform::ColorGrading { .. } => "applyColorGrading",
                Transform::Saturation { .. } => "adjustSaturation",
                Transform::Blur { .. } => "addBlurEffect",
                Transform::Grayscale => "convertToGrayscale",
                Transform::Trim { .. } => "trimVideo",
            },
        }
    }

    pub fn transform(&self) -> Option<&Transform> {
        match self {
            EditOp::Transform { transform, .. } => Some(transform),
            _ => None,
        }
    }
}

impl fmt::Display for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditOp::Cut { clip_id, cut_point } => write!(f, "Cut clip {clip_id} at {cut_point}"),
            EditOp::Move { clip_id, start } => write!(f, "Move clip {clip_id} to {start}"),
            EditOp::Delete { clip_id } => write!(f, "Delete clip {clip_id}"),
            EditOp::Transform { clip_id, transform } => {
                write!(f, "Apply {} to clip {clip_id}", transform.label())
            }
        }
    }
}

impl Project {
    /// Apply a structural op (cut, move, delete) directly.
    ///
    /// Transforms need a media processor and go through
    /// [`Project::commit_transform`] instead.
    pub fn apply_structural(&mut self, op: &EditOp) -> Result<EditOutcome> {
        match *op {
            EditOp::Cut { clip_id, cut_point } => {
                let (left, right) = self.cut_clip(clip_id, cut_point)?;
                Ok(EditOutcome::Cut { left, right })
            }
            EditOp::Move { clip_id, start } => {
                let start = self.move_clip(clip_id, start)?;
                Ok(EditOutcome::Moved { clip_id, start })
            }
            EditOp::Delete { clip_id } => {
                self.delete_clip(clip_id)?;
                Ok(EditOutcome::Deleted { clip_id })
            }
            EditOp::Transform { .. } => Err(CoreError::invalid(format!(
                "{} needs a media processor",
                op.name()
            ))),
        }
    }

    /// The media a transform on `clip_id` would read from, validated against
    /// the transform's parameters.
    pub fn transform_source(&self, clip_id: Uuid, transform: &Transform) -> Result<&Media> {
        let clip = self.timeline.clip(clip_id)?;
        let media = self.media.get(clip.media_id)?;
        transform.validate(media)?;
        Ok(media)
    }

    /// Register a processed derived media and point `clip_id` at it.
    pub fn commit_transform(&mut self, clip_id: Uuid, derived: Media) -> Result<EditOutcome> {
        self.timeline.clip(clip_id)?;
        let media_id = self.media.insert(derived);
        self.replace_clip_media(clip_id, media_id)?;
        Ok(EditOutcome::Transformed { clip_id, media_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::media::MediaLibrary;
    use serde_json::json;

    fn secs(s: f64) -> TimeUs {
        TimeUs::from_seconds(s)
    }

    fn make_project() -> (Project, Uuid) {
        let mut p = Project {
            id: Uuid::new_v4(),
            name: "Test".into(),
            media: MediaLibrary::new(),
            timeline: Timeline::new(secs(20.0), OverlapPolicy::MultiTrack),
        };
        let mut media = Media::new("beach.mp4", "/media/beach.mp4", "video/mp4", secs(6.0));
        media.annotations.descriptions = (0..6).map(|i| format!("d{i}")).collect();
        media.thumbnails = (0..6)
            .map(|i| Thumbnail {
                at_second: i as f64,
                image: PathBuf::from(format!("/thumbs/{i}.jpg")),
            })
            .collect();
        let m = p.media.insert(media);
        let clip = p.add_clip(m, secs(0.0)).unwrap();
        (p, clip)
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parse_structural_ops() {
        let id = Uuid::now_v7();
        let cut = EditOp::parse("cutClip", &json!({"clipId": id.to_string(), "cutPoint": 2.5})).unwrap();
        assert_eq!(cut, EditOp::Cut { clip_id: id, cut_point: secs(2.5) });

        let mv = EditOp::parse("moveClip", &json!({"clipId": id.to_string(), "start": 4})).unwrap();
        assert_eq!(mv, EditOp::Move { clip_id: id, start: secs(4.0) });

        let del = EditOp::parse_json("deleteClip", &format!(r#"{{"clipId":"{id}"}}"#)).unwrap();
        assert_eq!(del, EditOp::Delete { clip_id: id });
    }

    #[test]
    fn parse_transform_ops() {
        let id = Uuid::now_v7();
        let s = id.to_string();
        let cases = [
            ("adjustBrightness", json!({"clipId": s, "brightness": 0.2}), Transform::Brightness { brightness: 0.2 }),
            (
                "applyColorGrading",
                json!({"clipId": s, "contrast": 1.2, "gamma": 0.9, "saturation": 1.1}),
                Transform::ColorGrading { contrast: 1.2, gamma: 0.9, saturation: 1.1 },
            ),
            ("adjustSaturation", json!({"clipId": s, "saturation": 0.0}), Transform::Saturation { saturation: 0.0 }),
            ("addBlurEffect", json!({"clipId": s, "blurStrength": 3}), Transform::Blur { sigma: 3.0 }),
            ("convertToGrayscale", json!({"clipId": s}), Transform::Grayscale),
            (
                "trim_video",
                json!({"clipId": s, "start_time": 1, "end_time": 3}),
                Transform::Trim { start: secs(1.0), end: secs(3.0) },
            ),
        ];
        for (name, args, expected) in cases {
            let op = EditOp::parse(name, &args).unwrap();
            assert_eq!(op.transform(), Some(&expected), "{name}");
            assert_eq!(op.clip_id(), id);
        }
        let aliased = EditOp::parse("trimVideo", &json!({"clipId": s, "startTime": 1, "endTime": 3})).unwrap();
        assert_eq!(aliased.name(), "trimVideo");
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let err = EditOp::parse("explodeClip", &json!({})).unwrap_err();
        assert!(matches!(err, CoreError::UnknownOperation(ref n) if n == "explodeClip"));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn malformed_arguments_are_invalid() {
        let bad = [
            ("cutClip", json!({"clipId": "not-a-uuid", "cutPoint": 1})),
            ("cutClip", json!({"clipId": Uuid::now_v7().to_string()})),
            ("moveClip", json!({"clipId": Uuid::now_v7().to_string(), "start": "soon"})),
        ];
        for (name, args) in bad {
            let err = EditOp::parse(name, &args).unwrap_err();
            assert!(matches!(err, CoreError::InvalidArgument(_)), "{name}: {err}");
        }
        assert_eq!(EditOp::parse_json("cutClip", "{not json").unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    // -----------------------------------------------------------------------
    // Validation and derivation
    // -----------------------------------------------------------------------

    #[test]
    fn validate_rejects_out_of_range_parameters() {
        let media = Media::new("a.mp4", "/a.mp4", "video/mp4", secs(6.0));
        for t in [
            Transform::Brightness { brightness: 3.0 },
            Transform::ColorGrading { contrast: 1.0, gamma: 0.0, saturation: 1.0 },
            Transform::Saturation { saturation: -1.0 },
            Transform::Blur { sigma: f64::NAN },
            Transform::Trim { start: secs(4.0), end: secs(2.0) },
            Transform::Trim { start: secs(1.0), end: secs(7.0) },
        ] {
            assert!(t.validate(&media).is_err(), "{t:?}");
        }
        assert!(Transform::Grayscale.validate(&media).is_ok());
        assert!(Transform::Trim { start: secs(0.0), end: secs(6.0) }.validate(&media).is_ok());
    }

    #[test]
    fn derived_media_is_named_after_transform() {
        let (p, clip) = make_project();
        let source = p.transform_source(clip, &Transform::Grayscale).unwrap();
        let derived = Transform::Grayscale.derive_media(source, "/out/gray.mp4");
        assert_eq!(derived.name, "beach.mp4 (grayscale)");
        assert!(derived.hidden);
        assert_eq!(derived.duration_us, source.duration_us);
        assert_eq!(derived.annotations, source.annotations);
    }

    #[test]
    fn trim_derivation_slices_metadata() {
        let (p, clip) = make_project();
        let trim = Transform::Trim { start: secs(1.5), end: secs(4.0) };
        let source = p.transform_source(clip, &trim).unwrap();
        let derived = trim.derive_media(source, "/out/trim.mp4");

        assert_eq!(derived.duration_us, secs(2.5));
        assert_eq!(derived.annotations.descriptions, vec!["d1", "d2", "d3"]);
        let at: Vec<f64> = derived.thumbnails.iter().map(|t| t.at_second).collect();
        assert_eq!(at, vec![0.5, 1.5, 2.5]);
    }

    // -----------------------------------------------------------------------
    // Application
    // -----------------------------------------------------------------------

    #[test]
    fn apply_structural_delegates_to_engine() {
        let (mut p, clip) = make_project();
        let outcome = p
            .apply_structural(&EditOp::Cut { clip_id: clip, cut_point: secs(2.0) })
            .unwrap();
        let EditOutcome::Cut { left, right } = outcome else {
            panic!("expected a cut outcome, got {outcome:?}");
        };
        assert!(p.timeline.find_clip(left).is_some());

        p.apply_structural(&EditOp::Delete { clip_id: right }).unwrap();
        assert!(p.timeline.find_clip(right).is_none());
    }

    #[test]
    fn apply_structural_refuses_transforms() {
        let (mut p, clip) = make_project();
        let op = EditOp::Transform { clip_id: clip, transform: Transform::Grayscale };
        assert!(p.apply_structural(&op).is_err());
    }

    #[test]
    fn commit_transform_swaps_only_the_invoking_clip() {
        let (mut p, clip) = make_project();
        let original = p.timeline.clip(clip).unwrap().media_id;
        let other = p.add_clip(original, secs(10.0)).unwrap();

        let derived = {
            let source = p.transform_source(clip, &Transform::Grayscale).unwrap();
            Transform::Grayscale.derive_media(source, "/out/gray.mp4")
        };
        let EditOutcome::Transformed { media_id, .. } = p.commit_transform(clip, derived).unwrap() else {
            panic!("expected a transform outcome");
        };

        assert_eq!(p.timeline.clip(clip).unwrap().media_id, media_id);
        assert_eq!(p.timeline.clip(other).unwrap().media_id, original);
        assert!(!p.media.get(original).unwrap().hidden);
    }

    #[test]
    fn commit_transform_on_missing_clip_registers_nothing() {
        let (mut p, clip) = make_project();
        let source = p.media.get(p.timeline.clip(clip).unwrap().media_id).unwrap().clone();
        let before = p.media.len();
        let err = p
            .commit_transform(Uuid::now_v7(), Transform::Grayscale.derive_media(&source, "/x.mp4"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(p.media.len(), before);
    }
}
