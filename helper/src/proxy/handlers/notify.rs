//! Notify Handler

use postern_protocol::{NotifyParams, Response};
use tracing::warn;

use crate::notifier::{resolve_sound, Notification, Notifier};
use crate::settings::SettingsStore;

pub async fn handle(
    params: NotifyParams,
    notifier: &dyn Notifier,
    settings: &dyn SettingsStore,
) -> Response {
    let notification = Notification {
        sound: resolve_sound(params.sound.as_deref(), settings.default_sound()),
        title: params.title,
        body: params.body,
    };

    match notifier.send(&notification).await {
        Ok(()) => Response::success(),
        Err(e) => {
            warn!("Notification failed: {}", e);
            Response::failure(format!("notification failed: {}", e))
        }
    }
}
