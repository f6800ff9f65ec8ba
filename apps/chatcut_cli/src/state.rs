use anyhow::{Context, Result};
use chatcut_assistant::ingest::{ingest, IngestOptions};
use chatcut_assistant::{ChatEntry, ChatLog, CommandLoop, Preprocessor};
use chatcut_core::config::EditorConfig;
use chatcut_core::ops::EditOp;
use chatcut_core::playback::PlaybackSynchronizer;
use chatcut_core::selection::{DragState, DragTarget, SelectionRange};
use chatcut_core::session::EditorSession;
use chatcut_core::types::{Project, TimeUs};
use chatcut_preview::{start_playback, MpvSurface, PlaybackTicker};
use chatcut_render::export::{compile_project, execute, ExportProgress, ExportSettings};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::commands::{cut_point_at, ordered_clips, resolve_clip, resolve_media, Command, HELP};

/// Everything one interactive session owns.
pub struct App {
    session: Arc<EditorSession>,
    range: SelectionRange,
    drag: DragState,
    log: ChatLog,
    commands: CommandLoop,
    preprocessor: Arc<dyn Preprocessor>,
    ingest_options: IngestOptions,
    synchronizer: Arc<Mutex<PlaybackSynchronizer>>,
    surface: Option<Arc<Mutex<MpvSurface>>>,
    ticker: PlaybackTicker,
    preview: bool,
}

pub enum Flow {
    Continue,
    Quit,
}

impl App {
    pub fn new(
        config: &EditorConfig,
        project: Project,
        commands: impl FnOnce(Arc<EditorSession>) -> CommandLoop,
        preprocessor: Arc<dyn Preprocessor>,
        preview: bool,
    ) -> Self {
        let range = SelectionRange::full(project.timeline.project_duration_us);
        let session = Arc::new(EditorSession::new(project));
        Self {
            commands: commands(Arc::clone(&session)),
            session,
            range,
            drag: DragState::default(),
            log: ChatLog::new(),
            preprocessor,
            ingest_options: IngestOptions::from_config(&config.media),
            synchronizer: Arc::new(Mutex::new(PlaybackSynchronizer::new(
                config.playback.resync_threshold_seconds,
            ))),
            surface: None,
            ticker: PlaybackTicker::new(Duration::from_millis(config.playback.tick_interval_ms)),
            preview,
        }
    }

    /// Ingest a file and drop it after the last clip.
    pub async fn import(&mut self, path: &Path) -> Result<()> {
        let ingested = ingest(path, &self.session, self.preprocessor.as_ref(), &self.ingest_options)
            .await
            .with_context(|| format!("importing {}", path.display()))?;
        if let Some(warning) = &ingested.warning {
            println!("  (no scene annotations for {}: {warning})", path.display());
        }

        let clip_id = self.session.update(|p| {
            let end = p.timeline.clips().map(|c| c.end_us()).max().unwrap_or(TimeUs::ZERO);
            p.add_clip(ingested.media_id, end)
        })?;
        println!("Imported {} as clip {clip_id}", path.display());
        Ok(())
    }

    pub async fn handle(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Help => println!("{HELP}"),
            Command::Media => self.print_media(),
            Command::Timeline => self.print_timeline(),
            Command::Add { media, at } => {
                let media_id = resolve_media(&self.session.snapshot(), &media)?;
                let clip_id = self.session.update(|p| p.add_clip(media_id, at))?;
                println!("Added clip {clip_id}");
            }
            Command::Cut { clip, at } => {
                let project = self.session.snapshot();
                let clip_id = resolve_clip(&project, &clip)?;
                let cut_point = cut_point_at(&project, clip_id, at)?;
                self.session.apply(&EditOp::Cut {
                    clip_id,
                    cut_point,
                })?;
                self.print_timeline();
            }
            Command::Move { clip, to } => {
                let clip_id = resolve_clip(&self.session.snapshot(), &clip)?;
                self.session.apply(&EditOp::Move { clip_id, start: to })?;
                self.print_timeline();
            }
            Command::Delete { clip } => {
                let clip_id = resolve_clip(&self.session.snapshot(), &clip)?;
                self.session.apply(&EditOp::Delete { clip_id })?;
                self.print_timeline();
            }
            Command::Range { start, end } => {
                let pd = self.session.snapshot().timeline.project_duration_us;
                // Cursors cannot cross, so move the one that makes room first.
                let order = if start > self.range.end_us {
                    [(DragTarget::EndCursor, end), (DragTarget::StartCursor, start)]
                } else {
                    [(DragTarget::StartCursor, start), (DragTarget::EndCursor, end)]
                };
                for (cursor, t) in order {
                    self.drag.begin_with(cursor, &mut self.synchronizer.lock());
                    match cursor {
                        DragTarget::StartCursor => self.range.set_start(t, pd),
                        _ => self.range.set_end(t, pd),
                    }
                }
                self.drag.end_with(&mut self.synchronizer.lock());
                self.print_range();
            }
            Command::Duration(d) => {
                self.session.update(|p| p.timeline.set_project_duration(d))?;
                self.range.clamp_to(d);
                self.print_range();
            }
            Command::Play => self.play()?,
            Command::Pause => self.pause()?,
            Command::Seek(t) => self.seek(t)?,
            Command::Export(path) => self.export(&path).await?,
            Command::Save(path) => {
                let written = self.session.snapshot().save_to_file(&path)?;
                println!("Saved {}", written.display());
            }
            Command::Load(path) => {
                self.stop_playback();
                let project = Project::load_from_file(&path)?;
                self.range = SelectionRange::full(project.timeline.project_duration_us);
                self.session.replace(project);
                self.print_timeline();
            }
            Command::Prune => {
                let removed = self.session.update(|p| {
                    let timeline = p.timeline.clone();
                    Ok(p.media.prune_unreferenced(&timeline))
                })?;
                println!("Removed {removed} unused derived media");
            }
            Command::Quit => {
                self.stop_playback();
                return Ok(Flow::Quit);
            }
            Command::Chat(text) if text.is_empty() => {}
            Command::Chat(text) => self.chat(&text).await,
        }
        Ok(Flow::Continue)
    }

    async fn chat(&mut self, text: &str) {
        let before = self.log.len();
        let result = self.commands.submit(&mut self.log, &self.range, text).await;
        for entry in &self.log.entries()[before..] {
            match entry {
                ChatEntry::Text { content, .. } => println!("assistant> {content}"),
                ChatEntry::Card {
                    operation,
                    arguments,
                } => println!("  [{operation}] {arguments}"),
                ChatEntry::Error { message } => println!("assistant> {message}"),
            }
        }
        if let Err(e) = result {
            tracing::debug!(error = %e, "Chat request failed");
        } else {
            self.print_timeline();
        }
    }

    // -----------------------------------------------------------------------
    // Playback
    // -----------------------------------------------------------------------

    fn surface(&mut self) -> Result<Option<Arc<Mutex<MpvSurface>>>> {
        if !self.preview {
            return Ok(None);
        }
        if self.surface.is_none() {
            let mut mpv = MpvSurface::new();
            mpv.start().context("starting mpv preview")?;
            self.surface = Some(Arc::new(Mutex::new(mpv)));
        }
        Ok(self.surface.clone())
    }

    fn play(&mut self) -> Result<()> {
        let pd = self.session.snapshot().timeline.project_duration_us;
        if !self.synchronizer.lock().play(pd) {
            println!("Nothing to play");
            return Ok(());
        }
        self.drive()
    }

    fn pause(&mut self) -> Result<()> {
        self.synchronizer.lock().pause();
        self.ticker.stop();
        self.sync_once()?;
        println!("Paused at {}", self.synchronizer.lock().current_time());
        Ok(())
    }

    fn seek(&mut self, t: TimeUs) -> Result<()> {
        let pd = self.session.snapshot().timeline.project_duration_us;
        {
            let mut sync = self.synchronizer.lock();
            self.drag.begin_with(DragTarget::Playhead, &mut sync);
            sync.seek_to(t, pd);
            self.drag.end_with(&mut sync);
        }
        self.sync_once()?;
        if self.synchronizer.lock().is_playing() && !self.ticker.is_running() {
            self.drive()?;
        }
        println!("Playhead at {}", self.synchronizer.lock().current_time());
        Ok(())
    }

    fn drive(&mut self) -> Result<()> {
        match self.surface()? {
            Some(surface) => start_playback(
                &mut self.ticker,
                Arc::clone(&self.session),
                Arc::clone(&self.synchronizer),
                surface,
            ),
            None => {
                let synchronizer = Arc::clone(&self.synchronizer);
                let session = Arc::clone(&self.session);
                self.ticker.start(move |elapsed| {
                    let pd = session.snapshot().timeline.project_duration_us;
                    let mut sync = synchronizer.lock();
                    sync.advance(elapsed, pd);
                    if sync.is_playing() {
                        chatcut_preview::TickControl::Continue
                    } else {
                        chatcut_preview::TickControl::Stop
                    }
                });
            }
        }
        Ok(())
    }

    fn sync_once(&mut self) -> Result<()> {
        if let Some(surface) = self.surface()? {
            let project = self.session.snapshot();
            let active = self
                .synchronizer
                .lock()
                .sync(&project, &mut *surface.lock())?;
            if let Some(active) = active {
                println!("  showing clip {} at {}", active.clip_id, active.local_time_us);
            }
        }
        Ok(())
    }

    fn stop_playback(&mut self) {
        self.ticker.stop();
        self.synchronizer.lock().pause();
    }

    // -----------------------------------------------------------------------
    // Export
    // -----------------------------------------------------------------------

    async fn export(&mut self, path: &Path) -> Result<()> {
        let project = self.session.snapshot();
        let plan = compile_project(&project, ExportSettings::default(), path)?;
        let (progress_tx, mut progress_rx) = tokio::sync::watch::channel(ExportProgress::default());

        let reporter = tokio::spawn(async move {
            while progress_rx.changed().await.is_ok() {
                let percent = progress_rx.borrow().percent;
                eprint!("\rExporting... {percent:5.1}%");
            }
            eprintln!();
        });

        let result = execute(&plan, progress_tx).await;
        let _ = reporter.await;
        result?;
        println!("Exported {}", plan.output_path.display());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Printing
    // -----------------------------------------------------------------------

    fn print_media(&self) {
        let project = self.session.snapshot();
        if project.media.visible().next().is_none() {
            println!("No media imported");
        }
        for (i, media) in project.media.visible().enumerate() {
            println!("{:>3}. {} ({})", i + 1, media.name, media.duration_us);
        }
    }

    fn print_timeline(&self) {
        let project = self.session.snapshot();
        let in_range: Vec<_> = self
            .range
            .clips_in_range(&project.timeline)
            .iter()
            .map(|c| c.id)
            .collect();
        println!(
            "Timeline ({} long, {} clips)",
            project.timeline.project_duration_us,
            project.timeline.clips().count()
        );
        for (i, clip_id) in ordered_clips(&project).into_iter().enumerate() {
            let Some(clip) = project.timeline.find_clip(clip_id) else {
                continue;
            };
            let name = project
                .media
                .get(clip.media_id)
                .map(|m| m.name.as_str())
                .unwrap_or("Unknown");
            let track = project.timeline.track_of(clip_id).unwrap_or(0);
            let marker = if in_range.contains(&clip_id) { '*' } else { ' ' };
            println!(
                "{marker}{:>3}. [{} - {}] track {track} {name}",
                i + 1,
                clip.track_start_us,
                clip.end_us()
            );
        }
    }

    fn print_range(&self) {
        println!(
            "Selection {} - {}",
            self.range.start_us, self.range.end_us
        );
    }
}
