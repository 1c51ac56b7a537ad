use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::VigilConfig;

/// Loads the Vigil configuration. One-shot: the config is read at startup
/// and owned by the caller for the process lifetime.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the config path: explicit path > VIGIL_CONFIG env > ~/.vigil/vigil.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("VIGIL_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vigil")
            .join("vigil.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> vigil_core::Result<VigilConfig> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str::<VigilConfig>(&raw).map_err(|e| {
                vigil_core::VigilError::Config(format!(
                    "failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            VigilConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        // Validate config — log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(vigil_core::VigilError::Config(e));
            }
        }

        Ok(config)
    }

    /// Apply env var overrides (VIGIL_MODEL, VIGIL_SERVER_LISTEN, etc.)
    fn apply_env_overrides(mut config: VigilConfig) -> VigilConfig {
        if let Ok(v) = std::env::var("VIGIL_MODEL") {
            config.agent.model = v;
        }
        if let Ok(v) = std::env::var("VIGIL_SERVER_LISTEN") {
            config.server.listen = v;
        }
        if let Ok(v) = std::env::var("VIGIL_LOG_LEVEL") {
            config.logging.level = v;
        }
        // API key: env var fills in when the config file doesn't set one.
        // Config file takes priority, env is the fallback.
        if config.agent.api_key.is_none() {
            if let Ok(v) = std::env::var("OPENAI_API_KEY") {
                config.agent.api_key = Some(v);
            }
        }
        // Same for the display: an explicit setting wins over the session's.
        if config.desktop.display.is_none() {
            if let Ok(v) = std::env::var("DISPLAY") {
                config.desktop.display = Some(v);
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = ConfigLoader::load(Some(Path::new("/nonexistent/vigil.toml"))).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:8765");
    }

    #[test]
    fn test_load_parses_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"
[safety]
max_actions = 5
window_secs = 10

[[safety.restricted_zones]]
x = 0
y = 0
width = 50
height = 50

[server]
listen = "127.0.0.1:9999"
"#
        )
        .unwrap();

        let config = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(config.safety.max_actions, 5);
        assert_eq!(config.safety.window_secs, 10);
        assert_eq!(config.safety.restricted_zones.len(), 1);
        assert_eq!(config.server.listen, "127.0.0.1:9999");
        // Untouched sections keep their defaults
        assert_eq!(config.agent.model, "gpt-4o");
    }

    #[test]
    fn test_load_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.toml");
        std::fs::write(&path, "[safety]\nmax_actions = 0\n").unwrap();
        assert!(ConfigLoader::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.toml");
        std::fs::write(&path, "not toml at all [[[").unwrap();
        assert!(ConfigLoader::load(Some(&path)).is_err());
    }
}
