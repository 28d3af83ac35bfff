//! Desktop notification delivery.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub sound: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notifications are not supported on this platform")]
    Unsupported,

    #[error("{0}")]
    Failed(String),
}

/// OS notification subsystem.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// The per-call sound wins over the configured default. An empty name on
/// either side means no sound.
pub fn resolve_sound(requested: Option<&str>, default: Option<String>) -> Option<String> {
    match requested {
        Some(name) => Some(name.to_string()),
        None => default,
    }
    .filter(|name| !name.trim().is_empty())
}
