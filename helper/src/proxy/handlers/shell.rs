//! Shell Handler

use postern_protocol::{Response, RunShellParams};

use super::screen::require_screen_capture;
use crate::exec::ProcessRunner;
use crate::permissions::Capabilities;

pub async fn handle(
    params: RunShellParams,
    capabilities: &Capabilities,
    runner: &ProcessRunner,
) -> Response {
    if params.requires_screen_capture_permission {
        if let Err(denied) = require_screen_capture(capabilities).await {
            return denied;
        }
    }
    runner.run(&params).await
}
