use anyhow::{anyhow, bail, Context, Result};
use chatcut_core::types::{Project, TimeUs};
use std::path::PathBuf;
use uuid::Uuid;

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Media,
    Timeline,
    Add { media: String, at: TimeUs },
    Cut { clip: String, at: TimeUs },
    Move { clip: String, to: TimeUs },
    Delete { clip: String },
    Range { start: TimeUs, end: TimeUs },
    Duration(TimeUs),
    Play,
    Pause,
    Seek(TimeUs),
    Export(PathBuf),
    Save(PathBuf),
    Load(PathBuf),
    Prune,
    Quit,
    Chat(String),
}

pub const HELP: &str = "\
Commands:
  /media                     list imported media
  /timeline                  list clips (numbered)
  /add <media> <secs>        drop media #n (or id) at a time
  /cut <clip> <secs>         split clip #n at a timeline time
  /move <clip> <secs>        move clip #n to start at a time
  /delete <clip>             remove clip #n
  /range <start> <end>       set the assistant's selection range
  /duration <secs>           set the project length
  /play  /pause  /seek <secs>
  /export <file.mp4>         render the timeline
  /save <file>  /load <file>
  /prune                     drop derived media no clip uses
  /quit
Anything else is sent to the assistant.";

fn time_arg(raw: Option<&str>, what: &str) -> Result<TimeUs> {
    let raw = raw.ok_or_else(|| anyhow!("missing {what}"))?;
    let secs: f64 = raw
        .parse()
        .with_context(|| format!("{what} must be a number of seconds, got {raw:?}"))?;
    Ok(TimeUs::try_from_seconds(secs, what)?)
}

fn word_arg(raw: Option<&str>, what: &str) -> Result<String> {
    raw.map(str::to_string)
        .ok_or_else(|| anyhow!("missing {what}"))
}

fn path_arg(rest: &str, what: &str) -> Result<PathBuf> {
    let rest = rest.trim();
    if rest.is_empty() {
        bail!("missing {what}");
    }
    Ok(PathBuf::from(rest))
}

impl Command {
    pub fn parse(line: &str) -> Result<Command> {
        let line = line.trim();
        let Some(body) = line.strip_prefix('/') else {
            return Ok(Command::Chat(line.to_string()));
        };

        let (name, rest) = body.split_once(' ').unwrap_or((body, ""));
        let mut words = rest.split_whitespace();
        let cmd = match name {
            "help" | "h" => Command::Help,
            "media" => Command::Media,
            "timeline" | "tl" => Command::Timeline,
            "add" => Command::Add {
                media: word_arg(words.next(), "media")?,
                at: time_arg(words.next(), "time")?,
            },
            "cut" => Command::Cut {
                clip: word_arg(words.next(), "clip")?,
                at: time_arg(words.next(), "cut point")?,
            },
            "move" => Command::Move {
                clip: word_arg(words.next(), "clip")?,
                to: time_arg(words.next(), "start")?,
            },
            "delete" | "rm" => Command::Delete {
                clip: word_arg(words.next(), "clip")?,
            },
            "range" => Command::Range {
                start: time_arg(words.next(), "start")?,
                end: time_arg(words.next(), "end")?,
            },
            "duration" => Command::Duration(time_arg(words.next(), "duration")?),
            "play" => Command::Play,
            "pause" => Command::Pause,
            "seek" => Command::Seek(time_arg(words.next(), "time")?),
            "export" => Command::Export(path_arg(rest, "output path")?),
            "save" => Command::Save(path_arg(rest, "path")?),
            "load" => Command::Load(path_arg(rest, "path")?),
            "prune" => Command::Prune,
            "quit" | "q" | "exit" => Command::Quit,
            other => bail!("unknown command /{other} (try /help)"),
        };
        Ok(cmd)
    }
}

/// A clip by its 1-based position in timeline order, or by id.
pub fn resolve_clip(project: &Project, reference: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(reference) {
        return Ok(id);
    }
    let n: usize = reference
        .trim_start_matches('#')
        .parse()
        .with_context(|| format!("{reference:?} is neither a clip number nor an id"))?;
    ordered_clips(project)
        .get(n.wrapping_sub(1))
        .copied()
        .ok_or_else(|| anyhow!("no clip #{n}"))
}

/// Visible media by 1-based position, or any media by id.
pub fn resolve_media(project: &Project, reference: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(reference) {
        return Ok(id);
    }
    let n: usize = reference
        .trim_start_matches('#')
        .parse()
        .with_context(|| format!("{reference:?} is neither a media number nor an id"))?;
    project
        .media
        .visible()
        .nth(n.wrapping_sub(1))
        .map(|m| m.id)
        .ok_or_else(|| anyhow!("no media #{n}"))
}

/// Convert a timeline time into the clip-relative cut point the engine takes.
pub fn cut_point_at(project: &Project, clip_id: Uuid, at: TimeUs) -> Result<TimeUs> {
    let clip = project.timeline.clip(clip_id)?;
    if at <= clip.track_start_us || at >= clip.end_us() {
        bail!(
            "{at} is outside clip {clip_id} ({} - {})",
            clip.track_start_us,
            clip.end_us()
        );
    }
    Ok(at - clip.track_start_us)
}

/// Clip ids sorted by start time across all tracks, the numbering `/timeline` prints.
pub fn ordered_clips(project: &Project) -> Vec<Uuid> {
    let mut clips: Vec<_> = project.timeline.clips().collect();
    clips.sort_by_key(|c| (c.track_start_us, c.id));
    clips.into_iter().map(|c| c.id).collect()
}
