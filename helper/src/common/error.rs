//! Common Error Types
//!
//! Errors from setup, configuration and the settings store. None of these
//! cross the dispatcher boundary.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("could not determine home directory")]
    HomeDirUnavailable,

    #[error("failed to read config {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("failed to read settings {path}: {reason}")]
    SettingsLoad { path: PathBuf, reason: String },

    #[error("failed to write settings {path}: {reason}")]
    SettingsWrite { path: PathBuf, reason: String },

    #[error("failed to watch settings: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
