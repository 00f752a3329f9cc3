//! TOML-based configuration for the GitTracker orchestration layer.
//!
//! Covers the backend process (executable override, endpoint, timeouts) and
//! the analysis schedule. Everything has a serde default so a minimal or
//! empty config file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend process and endpoint settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Analysis scheduling settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Daemon settings.
    #[serde(default)]
    pub daemon: DaemonConfig,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Backend analysis-service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Explicit path to the Python executable. When unset, `python3` is
    /// probed first, falling back to `python`.
    #[serde(default)]
    pub python_path: Option<PathBuf>,

    /// Base URL of the analysis service.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Python module spawned with `-m` to run the service.
    #[serde(default = "default_server_module")]
    pub server_module: String,

    /// Working directory (and `PYTHONPATH`) for the spawned service.
    #[serde(default)]
    pub backend_dir: Option<PathBuf>,

    /// Milliseconds to wait after spawning before the first readiness probe.
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_server_url() -> String {
    "http://127.0.0.1:5000".into()
}
fn default_server_module() -> String {
    "gittracker.server".into()
}
fn default_startup_grace_ms() -> u64 {
    2000
}
fn default_request_timeout_secs() -> u64 {
    5
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            python_path: None,
            server_url: default_server_url(),
            server_module: default_server_module(),
            backend_dir: None,
            startup_grace_ms: default_startup_grace_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Analysis scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Seconds between periodic re-analyses (default 300). The timer is
    /// re-armed after each completed run, not on a wall-clock grid.
    #[serde(default = "default_frequency_secs")]
    pub frequency_secs: u64,
}

fn default_frequency_secs() -> u64 {
    300
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frequency_secs: default_frequency_secs(),
        }
    }
}

impl AnalysisConfig {
    pub fn frequency(&self) -> Duration {
        Duration::from_secs(self.frequency_secs)
    }
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.server_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "backend.server_url".into(),
                detail: "server URL must not be empty".into(),
            });
        }
        if !self.backend.server_url.starts_with("http://")
            && !self.backend.server_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "backend.server_url".into(),
                detail: "server URL must start with http:// or https://".into(),
            });
        }
        if self.backend.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "backend.request_timeout_secs".into(),
                detail: "request timeout must be > 0".into(),
            });
        }
        if self.analysis.frequency_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analysis.frequency_secs".into(),
                detail: "analysis frequency must be > 0".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[backend]
python_path = "/usr/local/bin/python3"
server_url = "http://127.0.0.1:5099"
server_module = "gittracker.server"
backend_dir = "/opt/gittracker/backend"
startup_grace_ms = 500
request_timeout_secs = 3

[analysis]
frequency_secs = 120

[daemon]
log_level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(
            config.backend.python_path.as_deref(),
            Some(Path::new("/usr/local/bin/python3"))
        );
        assert_eq!(config.backend.server_url, "http://127.0.0.1:5099");
        assert_eq!(config.backend.startup_grace_ms, 500);
        assert_eq!(config.analysis.frequency_secs, 120);
        assert_eq!(config.daemon.log_level, "debug");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.backend.request_timeout_secs, 3);
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.backend.python_path.is_none());
        assert_eq!(config.backend.server_url, "http://127.0.0.1:5000");
        assert_eq!(config.backend.server_module, "gittracker.server");
        assert_eq!(config.backend.startup_grace_ms, 2000);
        assert_eq!(config.backend.request_timeout_secs, 5);
        assert_eq!(config.analysis.frequency_secs, 300);
        assert_eq!(config.daemon.log_level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_frequency() {
        let mut config = AppConfig::default();
        config.analysis.frequency_secs = 0;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "analysis.frequency_secs"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = AppConfig::default();
        config.backend.server_url = "localhost:5000".into();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "backend.server_url"
        ));
    }
}
