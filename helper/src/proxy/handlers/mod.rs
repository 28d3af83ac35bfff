//! Command Dispatcher
//!
//! Decodes one request line, checks the pause switch, and routes the request
//! to its handler. Every line yields exactly one reply.

pub mod notify;
pub mod permissions;
pub mod screen;
pub mod shell;

use std::sync::Arc;

use postern_protocol::{JsonRpcResponse, Request, Response};
use tracing::{debug, info, warn};

use super::protocol::{decode_line, rejection};
use crate::capture::CapturePipeline;
use crate::config::HelperConfig;
use crate::exec::ProcessRunner;
use crate::notifier::Notifier;
use crate::permissions::Capabilities;
use crate::platform::Platform;
use crate::settings::SettingsStore;

pub const PAUSED: &str = "paused";
pub const READY: &str = "ready";

pub struct Dispatcher {
    settings: Arc<dyn SettingsStore>,
    capabilities: Capabilities,
    notifier: Arc<dyn Notifier>,
    capture: CapturePipeline,
    runner: ProcessRunner,
}

impl Dispatcher {
    pub fn new(settings: Arc<dyn SettingsStore>, platform: Platform, config: &HelperConfig) -> Self {
        Self {
            settings,
            capabilities: Capabilities::new(platform.authorization),
            notifier: platform.notifier,
            capture: CapturePipeline::new(platform.screen, config.capture_timeout()),
            runner: ProcessRunner::new(config.default_timeout()),
        }
    }

    /// Handle one raw request line.
    pub async fn handle_line(&self, line: &str) -> JsonRpcResponse {
        match decode_line(line) {
            Ok((id, request)) => JsonRpcResponse::reply(id, self.dispatch(request).await),
            Err((id, err)) => {
                warn!("Rejecting request: {}", err);
                rejection(id, &err)
            }
        }
    }

    /// Route a decoded request. The pause switch is read before anything else.
    pub async fn dispatch(&self, request: Request) -> Response {
        let method = request.method();
        if self.settings.paused() {
            info!(method, "Refusing request while paused");
            return Response::failure(PAUSED);
        }
        debug!(method, "Dispatching");

        match request {
            Request::Notify(params) => {
                notify::handle(params, self.notifier.as_ref(), self.settings.as_ref()).await
            }
            Request::EnsurePermissions(params) => {
                permissions::handle(params, &self.capabilities).await
            }
            Request::Status => Response::success().with_message(READY),
            Request::Screenshot(params) => {
                screen::handle(params, &self.capabilities, &self.capture).await
            }
            Request::RunShell(params) => {
                shell::handle(params, &self.capabilities, &self.runner).await
            }
        }
    }
}
