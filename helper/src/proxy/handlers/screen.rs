//! Screen Handler

use postern_protocol::{CapabilityKind, Response, ScreenshotParams};

use crate::capture::CapturePipeline;
use crate::permissions::Capabilities;

pub const PERMISSION_MISSING: &str = "screen recording permission missing";

/// Gate on screen recording before anything touches the capture subsystem.
pub async fn require_screen_capture(capabilities: &Capabilities) -> Result<(), Response> {
    if capabilities.is_granted(CapabilityKind::ScreenRecording).await {
        Ok(())
    } else {
        tracing::warn!("Screen recording not granted");
        Err(Response::failure(PERMISSION_MISSING))
    }
}

pub async fn handle(
    params: ScreenshotParams,
    capabilities: &Capabilities,
    capture: &CapturePipeline,
) -> Response {
    if let Err(denied) = require_screen_capture(capabilities).await {
        return denied;
    }

    match capture.capture(params.display_id, params.window_id).await {
        Some(png) => Response::success().with_payload(png),
        None => Response::failure("screenshot failed"),
    }
}
