use chatcut_core::playback::PlaybackSurface;
use chatcut_core::types::Media;
use chatcut_core::{CoreError, Result};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use uuid::Uuid;

/// An `mpv` process driven over its JSON IPC socket.
pub struct MpvSurface {
    process: Option<Child>,
    socket_path: PathBuf,
    bound: Option<Uuid>,
}

impl MpvSurface {
    pub fn new() -> Self {
        let socket_path =
            std::env::temp_dir().join(format!("chatcut-mpv-{}", std::process::id()));
        Self {
            process: None,
            socket_path,
            bound: None,
        }
    }

    /// Start an idle mpv window and wait for its IPC socket.
    pub fn start(&mut self) -> Result<()> {
        self.stop();

        let log_path =
            std::env::temp_dir().join(format!("chatcut-mpv-{}.log", std::process::id()));
        let log_file = std::fs::File::create(&log_path).ok();
        tracing::info!(log = %log_path.display(), "Starting mpv");

        let child = Command::new("mpv")
            .args([
                "--idle=yes",
                "--force-window=yes",
                "--keep-open=yes",
                "--pause=yes",
                "--osc=no",
                "--osd-level=0",
                "--title=chatcut-preview",
                &format!("--input-ipc-server={}", self.socket_path.display()),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(log_file.map(Stdio::from).unwrap_or(Stdio::null()))
            .spawn()
            .map_err(|e| surface_err(format!("Failed to start mpv: {e}")))?;

        self.process = Some(child);

        for _ in 0..50 {
            if self.socket_path.exists() {
                return Ok(());
            }
            std::thread::sleep(std::time::Duration::from_millis(100));
        }
        Err(surface_err("mpv socket did not appear"))
    }

    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(mut child) = self.process.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.bound = None;
        let _ = std::fs::remove_file(&self.socket_path);
    }

    fn send_command(&self, command: Value) -> Result<Value> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .map_err(|e| surface_err(format!("Failed to connect to mpv: {e}")))?;
        stream
            .set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .ok();

        let msg = format!("{command}\n");
        stream
            .write_all(msg.as_bytes())
            .map_err(|e| surface_err(format!("Write failed: {e}")))?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| surface_err(format!("Read failed: {e}")))?;
            if read == 0 {
                return Err(surface_err("mpv closed the IPC connection"));
            }
            if let Some(reply) = parse_reply(&line) {
                return reply.map_err(surface_err);
            }
        }
    }

    fn get_property(&self, name: &str) -> Result<Option<Value>> {
        match self.send_command(json!({ "command": ["get_property", name] })) {
            Ok(data) => Ok(Some(data)),
            Err(CoreError::Surface(msg)) if msg == "property unavailable" => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_pause(&self, paused: bool) -> Result<()> {
        self.send_command(json!({ "command": ["set_property", "pause", paused] }))?;
        Ok(())
    }
}

impl Default for MpvSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MpvSurface {
    fn drop(&mut self) {
        self.stop();
    }
}

impl PlaybackSurface for MpvSurface {
    fn bound_media(&self) -> Option<Uuid> {
        self.bound
    }

    fn bind(&mut self, media: &Media) -> Result<()> {
        let path = media.source.to_string_lossy();
        self.send_command(json!({ "command": ["loadfile", path, "replace"] }))?;
        self.bound = Some(media.id);
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        self.send_command(json!({ "command": ["stop"] }))?;
        self.bound = None;
        Ok(())
    }

    fn position_seconds(&mut self) -> Result<f64> {
        Ok(self
            .get_property("time-pos")?
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0))
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        self.send_command(json!({ "command": ["seek", seconds, "absolute"] }))?;
        Ok(())
    }

    fn is_paused(&mut self) -> Result<bool> {
        Ok(self
            .get_property("pause")?
            .and_then(|v| v.as_bool())
            .unwrap_or(true))
    }

    fn play(&mut self) -> Result<()> {
        self.set_pause(false)
    }

    fn pause(&mut self) -> Result<()> {
        self.set_pause(true)
    }
}

fn surface_err(msg: impl Into<String>) -> CoreError {
    CoreError::Surface(msg.into())
}

/// Interpret one line from the IPC socket. Event notifications yield `None`;
/// command replies yield their `data` or the mpv error string.
fn parse_reply(line: &str) -> Option<std::result::Result<Value, String>> {
    let value: Value = match serde_json::from_str(line.trim()) {
        Ok(v) => v,
        Err(e) => return Some(Err(format!("Parse failed: {e}"))),
    };
    if value.get("event").is_some() {
        return None;
    }
    match value.get("error").and_then(Value::as_str) {
        Some("success") => Some(Ok(value.get("data").cloned().unwrap_or(Value::Null))),
        Some(err) => Some(Err(err.to_string())),
        None => Some(Err(format!("Unexpected mpv reply: {line}"))),
    }
}
