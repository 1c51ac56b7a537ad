use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration — maps to `vigil.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub agent: AgentConfig,
    pub safety: SafetyConfig,
    pub desktop: DesktopConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

// ── Agent ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Vision model identifier sent to the provider, e.g. "gpt-4o".
    pub model: String,
    /// API key for the vision provider. Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Provider base URL (OpenAI-compatible chat completions).
    pub base_url: String,
    /// Maximum tokens per decision response.
    pub max_tokens: u32,
    /// Temperature (0.0 - 2.0). The original controller ran cold.
    pub temperature: f32,
    /// Seconds to wait for a decision before the tick degrades to a no-op.
    pub decision_timeout_secs: u64,
    /// How many recent activity records the model sees each tick.
    pub history_window: usize,
    /// Seconds between autonomy-loop iterations.
    pub tick_interval_secs: f64,
    /// Step budget used when `start-autonomy` does not supply one.
    pub default_step_budget: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".into(),
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            max_tokens: 1000,
            temperature: 0.1,
            decision_timeout_secs: 30,
            history_window: 10,
            tick_interval_secs: 2.0,
            default_step_budget: 25,
        }
    }
}

// ── Safety ─────────────────────────────────────────────────────

/// An axis-aligned screen rectangle in which pointer actions are always
/// vetoed. Edges are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictedZone {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl RestrictedZone {
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x
            && px <= self.x + self.width as i32
            && py >= self.y
            && py <= self.y + self.height as i32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Maximum admitted actions per rolling window.
    pub max_actions: u32,
    /// Length of the rolling rate window, in seconds.
    pub window_secs: u64,
    /// Screen rectangles forbidden for pointer/click actions.
    pub restricted_zones: Vec<RestrictedZone>,
    /// Case-insensitive substrings of window titles/classes that must never
    /// be activated.
    pub forbidden_titles: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_actions: 30,
            window_secs: 60,
            restricted_zones: vec![],
            forbidden_titles: vec![],
        }
    }
}

// ── Desktop ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    /// X display to target. `None` inherits the process environment.
    pub display: Option<String>,
    /// Per-subprocess timeout for xdotool/wmctrl/scrot, in seconds.
    pub command_timeout_secs: u64,
    /// Keystroke delay for text injection, in milliseconds.
    pub type_delay_ms: u64,
    /// PNG quality passed to scrot (1-100).
    pub screenshot_quality: u8,
    /// Directory where captures are persisted. `None` disables persistence.
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            display: None,
            command_timeout_secs: 10,
            type_delay_ms: 1,
            screenshot_quality: 75,
            screenshot_dir: Some(PathBuf::from("screenshots")),
        }
    }
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. "127.0.0.1:8765".
    pub listen: String,
    /// Bearer token required on API routes. `None` disables auth.
    pub api_key: Option<String>,
    /// Enable permissive CORS.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8765".into(),
            api_key: None,
            cors: false,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty" or "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

impl VigilConfig {
    /// Validate the configuration. Returns warnings for suspicious-but-legal
    /// settings; errors for settings that cannot be run with.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.safety.max_actions == 0 {
            return Err("safety.max_actions must be at least 1".into());
        }
        if self.safety.window_secs == 0 {
            return Err("safety.window_secs must be at least 1".into());
        }
        for (i, zone) in self.safety.restricted_zones.iter().enumerate() {
            if zone.width == 0 || zone.height == 0 {
                return Err(format!(
                    "safety.restricted_zones[{i}] has zero width or height"
                ));
            }
        }
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            return Err(format!(
                "agent.temperature {} out of range 0.0-2.0",
                self.agent.temperature
            ));
        }
        if self.desktop.screenshot_quality == 0 || self.desktop.screenshot_quality > 100 {
            return Err(format!(
                "desktop.screenshot_quality {} out of range 1-100",
                self.desktop.screenshot_quality
            ));
        }
        if self.agent.tick_interval_secs < 0.0 {
            return Err("agent.tick_interval_secs must not be negative".into());
        }

        if self.agent.api_key.is_none() {
            warnings.push(
                "no agent.api_key configured — autonomy will not be able to decide \
                 (set it in vigil.toml or export OPENAI_API_KEY)"
                    .into(),
            );
        }
        if self.safety.restricted_zones.is_empty() && self.safety.forbidden_titles.is_empty() {
            warnings.push("safety policy has no restricted zones or forbidden titles".into());
        }
        if self.server.api_key.is_none() && !self.server.listen.starts_with("127.0.0.1") {
            warnings.push(format!(
                "server listens on {} without an api_key — anyone who can reach it \
                 controls the desktop",
                self.server.listen
            ));
        }

        Ok(warnings)
    }
}
