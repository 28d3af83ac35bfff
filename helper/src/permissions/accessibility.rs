//! Accessibility Permission
//!
//! A binary trust flag (AXIsProcessTrusted). Prompting opens the trust request
//! surface; the user grants it in System Settings, which the OS does not report
//! back synchronously.

use super::AuthorizationBackend;

pub async fn status(backend: &dyn AuthorizationBackend) -> bool {
    backend.accessibility_trusted().await
}

/// Returns the trust flag as read before any prompt.
pub async fn ensure(backend: &dyn AuthorizationBackend, interactive: bool) -> bool {
    let trusted = backend.accessibility_trusted().await;
    if !trusted && interactive {
        tracing::info!("Raising accessibility trust request");
        backend.prompt_accessibility().await;
    }
    trusted
}
