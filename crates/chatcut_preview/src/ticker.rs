use chatcut_core::playback::{PlaybackSurface, PlaybackSynchronizer};
use chatcut_core::session::EditorSession;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// What the tick callback wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Owns at most one periodic tick loop. Starting again replaces the running
/// loop, so two loops never drive the same playhead.
pub struct PlaybackTicker {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl PlaybackTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            handle: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawn the loop. `on_tick` receives the wall-clock time since the
    /// previous tick. Must be called inside a tokio runtime.
    pub fn start<F>(&mut self, on_tick: F)
    where
        F: FnMut(Duration) -> TickControl + Send + 'static,
    {
        self.spawn_loop(on_tick, false);
    }

    /// Like [`start`](Self::start), but every callback runs on tokio's
    /// blocking pool. For callbacks doing synchronous I/O, such as mpv IPC.
    pub fn start_blocking<F>(&mut self, on_tick: F)
    where
        F: FnMut(Duration) -> TickControl + Send + 'static,
    {
        self.spawn_loop(on_tick, true);
    }

    fn spawn_loop<F>(&mut self, mut on_tick: F, blocking: bool)
    where
        F: FnMut(Duration) -> TickControl + Send + 'static,
    {
        self.stop();
        let period = self.period;
        self.handle = Some(tokio::spawn(async move {
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticks.tick().await;
            let mut last = Instant::now();

            loop {
                ticks.tick().await;
                let now = Instant::now();
                let elapsed = now.duration_since(last);
                last = now;

                let control = if blocking {
                    let joined = tokio::task::spawn_blocking(move || {
                        let control = on_tick(elapsed);
                        (on_tick, control)
                    })
                    .await;
                    match joined {
                        Ok((callback, control)) => {
                            on_tick = callback;
                            control
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Tick callback panicked");
                            break;
                        }
                    }
                } else {
                    on_tick(elapsed)
                };
                if control == TickControl::Stop {
                    break;
                }
            }
            tracing::debug!("Tick loop finished");
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PlaybackTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drive `surface` from `synchronizer` over the session's current project
/// until playback stops. Each tick reads a fresh snapshot, so edits made
/// while playing are picked up on the next frame. Surface calls may block,
/// so ticks run on the blocking pool.
pub fn start_playback<S>(
    ticker: &mut PlaybackTicker,
    session: Arc<EditorSession>,
    synchronizer: Arc<Mutex<PlaybackSynchronizer>>,
    surface: Arc<Mutex<S>>,
) where
    S: PlaybackSurface + Send + 'static,
{
    ticker.start_blocking(move |elapsed| {
        let project = session.snapshot();
        let mut sync = synchronizer.lock();
        let mut surface = surface.lock();
        if let Err(e) = sync.tick(elapsed, &project, &mut *surface) {
            tracing::warn!(error = %e, "Playback surface sync failed");
        }
        if sync.is_playing() {
            TickControl::Continue
        } else {
            TickControl::Stop
        }
    });
}
