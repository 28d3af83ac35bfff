//! Notifications Permission
//!
//! Tri-state: not determined, denied, authorized. Only "not determined" can be
//! prompted; a denial must be reversed by the user in System Settings.

use super::{AuthorizationBackend, PermissionStatus};

pub async fn status(backend: &dyn AuthorizationBackend) -> bool {
    backend.notification_status().await == PermissionStatus::Granted
}

pub async fn ensure(backend: &dyn AuthorizationBackend, interactive: bool) -> bool {
    match backend.notification_status().await {
        PermissionStatus::Granted => true,
        PermissionStatus::NotDetermined if interactive => {
            tracing::info!("Requesting notification authorization");
            backend.request_notifications().await;
            status(backend).await
        }
        PermissionStatus::NotDetermined | PermissionStatus::Denied => false,
    }
}
