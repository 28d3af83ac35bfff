//! Path Utilities
//!
//! Common path resolution for Postern directories and files.

use std::path::PathBuf;

use super::error::AppError;

/// Get the Postern base directory (`~/.postern/`)
pub fn postern_dir() -> Result<PathBuf, AppError> {
    let home = dirs::home_dir().ok_or(AppError::HomeDirUnavailable)?;
    Ok(home.join(postern_protocol::POSTERN_DIR))
}

/// Get a path within the Postern directory
pub fn postern_path(relative_path: &str) -> Result<PathBuf, AppError> {
    Ok(postern_dir()?.join(relative_path))
}

/// Get the helper socket path
pub fn socket_path() -> Result<PathBuf, AppError> {
    postern_path(postern_protocol::SOCKET_FILE)
}

/// Get the persisted settings document (pause switch, default sound)
pub fn settings_path() -> Result<PathBuf, AppError> {
    postern_path("settings.json")
}

/// Get the helper configuration file
pub fn config_path() -> Result<PathBuf, AppError> {
    postern_path("config.json")
}
