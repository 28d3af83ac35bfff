//! Configuration management
//!
//! Reads the helper configuration from `~/.postern/config.json`. Every field
//! has a default, so a missing file is not an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::{paths, AppError, AppResult};

pub const SOCKET_ENV: &str = "POSTERN_SOCKET";
pub const SETTINGS_ENV: &str = "POSTERN_SETTINGS";

const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperConfig {
    /// Socket path; `~/.postern/postern.sock` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    /// Settings document; `~/.postern/settings.json` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<PathBuf>,

    /// Applied to runShell requests that carry no timeout of their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_seconds: Option<f64>,

    /// How long a screenshot waits for its first frame
    #[serde(default = "default_capture_timeout")]
    pub capture_timeout_seconds: u64,
}

fn default_capture_timeout() -> u64 {
    DEFAULT_CAPTURE_TIMEOUT_SECS
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            settings_path: None,
            default_timeout_seconds: None,
            capture_timeout_seconds: DEFAULT_CAPTURE_TIMEOUT_SECS,
        }
    }
}

impl HelperConfig {
    /// Load from `path` (or the default location), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => paths::config_path()?,
        };

        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| AppError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(socket) = lookup(SOCKET_ENV).filter(|v| !v.is_empty()) {
            self.socket_path = Some(PathBuf::from(socket));
        }
        if let Some(settings) = lookup(SETTINGS_ENV).filter(|v| !v.is_empty()) {
            self.settings_path = Some(PathBuf::from(settings));
        }
    }

    pub fn socket_path(&self) -> AppResult<PathBuf> {
        match &self.socket_path {
            Some(p) => Ok(p.clone()),
            None => paths::socket_path(),
        }
    }

    pub fn settings_path(&self) -> AppResult<PathBuf> {
        match &self.settings_path {
            Some(p) => Ok(p.clone()),
            None => paths::settings_path(),
        }
    }

    /// Fallback runShell timeout; non-positive or non-finite values mean none.
    pub fn default_timeout(&self) -> Option<Duration> {
        crate::exec::timeout_from_secs(self.default_timeout_seconds)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_seconds.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HelperConfig::from_file(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, HelperConfig::default());
        assert_eq!(config.default_timeout(), None);
        assert_eq!(config.capture_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_reads_camel_case_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"socketPath":"/tmp/p.sock","defaultTimeoutSeconds":2.5,"captureTimeoutSeconds":3}"#,
        )
        .unwrap();

        let config = HelperConfig::from_file(&path).unwrap();
        assert_eq!(config.socket_path().unwrap(), PathBuf::from("/tmp/p.sock"));
        assert_eq!(config.default_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.capture_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            HelperConfig::from_file(&path),
            Err(AppError::ConfigLoad { .. })
        ));
    }

    #[test]
    fn test_env_overrides_paths() {
        let mut config = HelperConfig::default();
        config.apply_overrides(|key| match key {
            SOCKET_ENV => Some("/run/postern.sock".to_string()),
            SETTINGS_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.socket_path, Some(PathBuf::from("/run/postern.sock")));
        assert_eq!(config.settings_path, None);
    }

    #[test]
    fn test_non_positive_default_timeout_is_ignored() {
        let config = HelperConfig {
            default_timeout_seconds: Some(0.0),
            ..HelperConfig::default()
        };
        assert_eq!(config.default_timeout(), None);
    }
}
