//! Screen capture via `scrot`.

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use vigil_config::DesktopConfig;
use vigil_core::{Result, VigilError};

use crate::backend::run_desktop_command;

/// An opaque screen image: PNG bytes plus capture metadata.
#[derive(Debug, Clone)]
pub struct Frame {
    pub png: Vec<u8>,
    pub captured_at: DateTime<Utc>,
    /// Name of the persisted copy under the screenshots directory, if any.
    pub file_name: Option<String>,
}

impl Frame {
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.png)
    }

    pub fn len(&self) -> usize {
        self.png.len()
    }

    pub fn is_empty(&self) -> bool {
        self.png.is_empty()
    }
}

/// Produces an image of the current screen state. Read-only; safe to run
/// concurrently with an in-flight device action.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    async fn capture(&self) -> Result<Frame>;
}

/// Captures the framebuffer by shelling out to `scrot`.
pub struct ScrotCapture {
    display: Option<String>,
    quality: u8,
    save_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ScrotCapture {
    pub fn new(config: &DesktopConfig) -> Self {
        Self {
            display: config.display.clone(),
            quality: config.screenshot_quality,
            save_dir: config.screenshot_dir.clone(),
            timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }

    /// Persist a timestamped copy of the capture. Best-effort: a full disk
    /// must not take down the perception loop.
    fn persist(&self, png: &[u8], captured_at: DateTime<Utc>) -> Option<String> {
        let dir = self.save_dir.as_ref()?;
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!(error = %e, dir = %dir.display(), "cannot create screenshots dir");
            return None;
        }
        let name = format!("screen_{}.png", captured_at.format("%Y%m%d_%H%M%S_%3f"));
        match std::fs::write(dir.join(&name), png) {
            Ok(()) => Some(name),
            Err(e) => {
                warn!(error = %e, "failed to persist screenshot");
                None
            }
        }
    }
}

#[async_trait]
impl ScreenCapture for ScrotCapture {
    async fn capture(&self) -> Result<Frame> {
        let tmp = tempfile::tempdir().map_err(|e| VigilError::Capture(e.to_string()))?;
        let path = tmp.path().join("screen.png");
        let path_str = path.to_string_lossy().to_string();
        let quality = self.quality.to_string();

        run_desktop_command(
            "scrot",
            &["-o", "-q", &quality, &path_str],
            self.display.as_deref(),
            self.timeout,
        )
        .await
        .map_err(VigilError::Capture)?;

        let png = std::fs::read(&path).map_err(|e| VigilError::Capture(e.to_string()))?;
        let captured_at = Utc::now();
        let file_name = self.persist(&png, captured_at);
        debug!(bytes = png.len(), "screen captured");

        Ok(Frame {
            png,
            captured_at,
            file_name,
        })
    }
}
