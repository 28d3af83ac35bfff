//! OS backends
//!
//! Bundles the authorization, notification and screen capture seams the
//! dispatcher runs against. On macOS these reach the system frameworks; every
//! other platform gets backends that report nothing granted and fail
//! capability-bound work as unsupported.

mod fallback;
#[cfg(target_os = "macos")]
mod macos;

use std::sync::Arc;

use crate::capture::ScreenSource;
use crate::notifier::Notifier;
use crate::permissions::AuthorizationBackend;

pub use fallback::Unsupported;

#[derive(Clone)]
pub struct Platform {
    pub authorization: Arc<dyn AuthorizationBackend>,
    pub notifier: Arc<dyn Notifier>,
    pub screen: Arc<dyn ScreenSource>,
}

impl Platform {
    #[cfg(target_os = "macos")]
    pub fn native() -> Self {
        tracing::debug!("Using macOS platform backends");
        Self {
            authorization: Arc::new(macos::MacAuthorization),
            notifier: Arc::new(macos::MacNotifier),
            screen: Arc::new(macos::MacScreen::default()),
        }
    }

    #[cfg(not(target_os = "macos"))]
    pub fn native() -> Self {
        Self::unsupported()
    }

    pub fn unsupported() -> Self {
        tracing::debug!("Using fallback platform backends");
        let backend = Arc::new(Unsupported);
        Self {
            authorization: backend.clone(),
            notifier: backend.clone(),
            screen: backend,
        }
    }
}
