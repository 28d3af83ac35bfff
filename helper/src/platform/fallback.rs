use async_trait::async_trait;

use crate::capture::{
    CaptureError, CaptureStream, ContentFilter, FrameSink, ScreenSource, ShareableContent,
    StreamConfig,
};
use crate::notifier::{Notification, Notifier, NotifyError};
use crate::permissions::{AuthorizationBackend, PermissionStatus};

/// Backend for platforms without the capability frameworks. Nothing is ever
/// granted and prompts are no-ops.
pub struct Unsupported;

#[async_trait]
impl AuthorizationBackend for Unsupported {
    async fn notification_status(&self) -> PermissionStatus {
        PermissionStatus::Denied
    }

    async fn request_notifications(&self) {}

    async fn accessibility_trusted(&self) -> bool {
        false
    }

    async fn prompt_accessibility(&self) {}

    async fn screen_capture_preflight(&self) -> bool {
        false
    }

    async fn request_screen_capture(&self) {}
}

#[async_trait]
impl Notifier for Unsupported {
    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Unsupported)
    }
}

#[async_trait]
impl ScreenSource for Unsupported {
    async fn shareable_content(&self) -> Result<ShareableContent, CaptureError> {
        Err(CaptureError::Unsupported)
    }

    async fn start_stream(
        &self,
        _filter: &ContentFilter,
        _config: &StreamConfig,
        _sink: FrameSink,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        Err(CaptureError::Unsupported)
    }
}
