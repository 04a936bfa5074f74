use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use trimline_core::types::TimeUs;

use crate::error::{PreviewError, Result};
use crate::player::PlayerControl;

/// Where the preview window goes on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// mpv running as a child process, driven over its JSON IPC socket.
pub struct MpvPlayer {
    process: Option<Child>,
    socket_path: PathBuf,
    next_request_id: u64,
}

impl MpvPlayer {
    pub fn new() -> Self {
        let socket_path =
            std::env::temp_dir().join(format!("trimline-mpv-{}", std::process::id()));
        Self {
            process: None,
            socket_path,
            next_request_id: 1,
        }
    }

    /// Start an idle mpv window. Any previous instance is stopped first.
    pub fn start(&mut self, geometry: Option<WindowGeometry>) -> Result<()> {
        self.stop();

        let child = Command::new("mpv")
            .args(mpv_args(&self.socket_path, geometry))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(PreviewError::Spawn)?;
        self.process = Some(child);
        tracing::info!("mpv started, ipc at {}", self.socket_path.display());

        for _ in 0..50 {
            if self.socket_path.exists() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        Err(PreviewError::SocketTimeout)
    }

    pub fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    pub fn stop(&mut self) {
        if let Some(mut child) = self.process.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }

    fn send_command(&mut self, args: Value) -> Result<Value> {
        if self.process.is_none() {
            return Err(PreviewError::NotRunning);
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let mut stream = UnixStream::connect(&self.socket_path)?;
        stream.set_read_timeout(Some(Duration::from_secs(2)))?;
        stream.write_all(command_payload(args, request_id).as_bytes())?;

        // Event notifications can arrive before the reply; skip anything that isn't ours.
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(PreviewError::Rejected("connection closed".into()));
            }
            let reply: Value = serde_json::from_str(&line)?;
            if reply.get("request_id").and_then(Value::as_u64) == Some(request_id) {
                return check_reply(reply);
            }
        }
    }

    fn get_property(&mut self, name: &str) -> Result<Option<Value>> {
        match self.send_command(json!(["get_property", name])) {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(PreviewError::Rejected(reason)) if reason == "property unavailable" => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Default for MpvPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerControl for MpvPlayer {
    fn load(&mut self, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        self.send_command(json!(["loadfile", path, "replace"]))?;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.send_command(json!(["set_property", "pause", false]))?;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.send_command(json!(["set_property", "pause", true]))?;
        Ok(())
    }

    fn seek(&mut self, time: TimeUs) -> Result<()> {
        self.send_command(json!(["seek", time.as_seconds(), "absolute+exact"]))?;
        Ok(())
    }

    fn set_forward_end(&mut self, time: TimeUs) -> Result<()> {
        self.send_command(json!(["set_property", "end", format!("{}", time.as_seconds())]))?;
        Ok(())
    }

    fn position(&mut self) -> Result<Option<TimeUs>> {
        Ok(self
            .get_property("time-pos")?
            .and_then(|v| v.as_f64())
            .map(TimeUs::from_seconds))
    }

    fn reached_end(&mut self) -> Result<bool> {
        Ok(self
            .get_property("eof-reached")?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Command-line for an idle, borderless mpv that keeps the last frame at the end.
pub fn mpv_args(socket_path: &Path, geometry: Option<WindowGeometry>) -> Vec<String> {
    let mut args = vec![
        "--idle=yes".to_string(),
        "--keep-open=yes".to_string(),
        "--pause".to_string(),
        "--osc=no".to_string(),
        "--osd-level=0".to_string(),
        "--title=trimline-preview".to_string(),
        format!("--input-ipc-server={}", socket_path.display()),
    ];
    if let Some(g) = geometry {
        args.push("--no-border".to_string());
        args.push(format!("--geometry={}x{}+{}+{}", g.width, g.height, g.x, g.y));
    }
    args
}

/// One newline-terminated IPC request.
fn command_payload(args: Value, request_id: u64) -> String {
    format!("{}\n", json!({ "command": args, "request_id": request_id }))
}

/// Unwrap an IPC reply into its `data`, or the error mpv reported.
fn check_reply(reply: Value) -> Result<Value> {
    match reply.get("error").and_then(Value::as_str) {
        Some("success") | None => Ok(reply.get("data").cloned().unwrap_or(Value::Null)),
        Some(err) => Err(PreviewError::Rejected(err.to_string())),
    }
}
