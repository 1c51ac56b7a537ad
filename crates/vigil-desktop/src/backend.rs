//! Input synthesis and window management via `xdotool` and `wmctrl`.
//!
//! # Requirements
//!
//! `xdotool` and `wmctrl` must be installed and on PATH, and an X display
//! must be reachable (set `desktop.display` or inherit `DISPLAY`).

use async_trait::async_trait;
use std::time::Duration;

use vigil_config::DesktopConfig;
use vigil_core::{Result, VigilError, WindowInfo};

/// The input/window side of the desktop environment. One implementation
/// talks to the real display server; the mock records calls for tests.
#[async_trait]
pub trait DesktopBackend: Send + Sync {
    /// Move the pointer to absolute screen coordinates.
    async fn move_pointer(&self, x: i32, y: i32) -> Result<()>;

    /// Click a pointer button, optionally moving to `at` first.
    async fn click(&self, button: u8, at: Option<(i32, i32)>) -> Result<()>;

    /// Inject text via keyboard synthesis.
    async fn type_text(&self, text: &str) -> Result<()>;

    /// Press a key chord, e.g. "Return" or "ctrl+shift+t".
    async fn key_chord(&self, chord: &str) -> Result<()>;

    /// Enumerate top-level windows, in stacking order.
    async fn list_windows(&self) -> Result<Vec<WindowInfo>>;

    /// Raise and focus a window by id.
    async fn activate_window(&self, id: &str) -> Result<()>;
}

/// Run a desktop-environment command with a bounded timeout and return
/// stdout. Errors are plain strings; callers map them into their taxonomy.
pub(crate) async fn run_desktop_command(
    program: &str,
    args: &[&str],
    display: Option<&str>,
    timeout: Duration,
) -> std::result::Result<String, String> {
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args);
    if let Some(display) = display {
        cmd.env("DISPLAY", display);
    }

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| format!("{program} timed out after {}s", timeout.as_secs()))?
        .map_err(|e| format!("{program} not found or failed to spawn: {e}"))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("{program} exited with {}: {}", output.status, stderr.trim()))
    }
}

/// Parse `wmctrl -lx` output into window infos.
///
/// Columns: window id, desktop, WM_CLASS, hostname, title (rest of line).
/// Lines with fewer than four columns are skipped.
pub fn parse_window_list(raw: &str) -> Vec<WindowInfo> {
    raw.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return None;
            }
            Some(WindowInfo {
                id: parts[0].to_string(),
                desktop: parts[1].to_string(),
                class: parts[2].to_string(),
                title: parts[4..].join(" "),
            })
        })
        .collect()
}

/// Real desktop backend over `xdotool` / `wmctrl`.
pub struct XdoBackend {
    display: Option<String>,
    type_delay_ms: u64,
    timeout: Duration,
}

impl XdoBackend {
    pub fn new(config: &DesktopConfig) -> Self {
        Self {
            display: config.display.clone(),
            type_delay_ms: config.type_delay_ms,
            timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }

    async fn xdotool(&self, args: &[&str]) -> Result<String> {
        run_desktop_command("xdotool", args, self.display.as_deref(), self.timeout)
            .await
            .map_err(VigilError::Device)
    }

    async fn wmctrl(&self, args: &[&str]) -> Result<String> {
        run_desktop_command("wmctrl", args, self.display.as_deref(), self.timeout)
            .await
            .map_err(VigilError::Device)
    }
}

#[async_trait]
impl DesktopBackend for XdoBackend {
    async fn move_pointer(&self, x: i32, y: i32) -> Result<()> {
        self.xdotool(&["mousemove", &x.to_string(), &y.to_string()])
            .await?;
        Ok(())
    }

    async fn click(&self, button: u8, at: Option<(i32, i32)>) -> Result<()> {
        let button = button.to_string();
        match at {
            // xdotool chains commands in one invocation, so move-then-click
            // cannot be split by another process's pointer movement.
            Some((x, y)) => {
                self.xdotool(&[
                    "mousemove",
                    &x.to_string(),
                    &y.to_string(),
                    "click",
                    &button,
                ])
                .await?;
            }
            None => {
                self.xdotool(&["click", &button]).await?;
            }
        }
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        let delay = self.type_delay_ms.to_string();
        // "--" stops option parsing; text is passed as a single argv entry,
        // so no shell quoting applies.
        self.xdotool(&["type", "--delay", &delay, "--clearmodifiers", "--", text])
            .await?;
        Ok(())
    }

    async fn key_chord(&self, chord: &str) -> Result<()> {
        self.xdotool(&["key", "--clearmodifiers", chord]).await?;
        Ok(())
    }

    async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let raw = self.wmctrl(&["-lx"]).await?;
        Ok(parse_window_list(&raw))
    }

    async fn activate_window(&self, id: &str) -> Result<()> {
        self.wmctrl(&["-ia", id]).await?;
        Ok(())
    }
}
