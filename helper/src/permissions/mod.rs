//! Capability Authorization
//!
//! Queries and, when asked to, triggers OS authorization for the three
//! capabilities Postern gates on. Nothing here holds state beyond what the OS
//! itself grants; a capability that cannot be confirmed is reported `false`.
//!
//! Each capability follows its own authorization flow:
//! - notifications: tri-state; an interactive ensure on "not determined"
//!   prompts and re-reads the answer before returning
//! - accessibility: a trust flag; an interactive ensure raises the trust
//!   request but returns the value read *before* the prompt, since the grant
//!   happens out of band in System Settings
//! - screen recording: a preflight flag; an interactive ensure requests
//!   access and re-reads the preflight

mod accessibility;
mod notifications;
mod screen_recording;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use postern_protocol::CapabilityKind;

/// Capability → granted
pub type CapabilityMap = BTreeMap<CapabilityKind, bool>;

/// Notification authorization status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    NotDetermined,
}

/// OS entry points for authorization queries and prompts.
#[async_trait]
pub trait AuthorizationBackend: Send + Sync {
    async fn notification_status(&self) -> PermissionStatus;

    /// Show the notification prompt and wait for the user's answer.
    async fn request_notifications(&self);

    async fn accessibility_trusted(&self) -> bool;

    /// Raise the trust request surface. Does not wait for a grant.
    async fn prompt_accessibility(&self);

    async fn screen_capture_preflight(&self) -> bool;

    async fn request_screen_capture(&self);
}

/// Per-capability status and ensure on top of an [`AuthorizationBackend`].
#[derive(Clone)]
pub struct Capabilities {
    backend: Arc<dyn AuthorizationBackend>,
}

impl Capabilities {
    pub fn new(backend: Arc<dyn AuthorizationBackend>) -> Self {
        Self { backend }
    }

    /// Current grant state. Never prompts.
    pub async fn status(&self, kinds: &BTreeSet<CapabilityKind>) -> CapabilityMap {
        let mut map = CapabilityMap::new();
        for &kind in kinds {
            map.insert(kind, self.is_granted(kind).await);
        }
        map
    }

    /// Grant state after prompting where `interactive` allows it.
    pub async fn ensure(&self, kinds: &BTreeSet<CapabilityKind>, interactive: bool) -> CapabilityMap {
        let backend = self.backend.as_ref();
        let mut map = CapabilityMap::new();
        for &kind in kinds {
            let granted = match kind {
                CapabilityKind::Notifications => notifications::ensure(backend, interactive).await,
                CapabilityKind::Accessibility => accessibility::ensure(backend, interactive).await,
                CapabilityKind::ScreenRecording => {
                    screen_recording::ensure(backend, interactive).await
                }
            };
            tracing::debug!(capability = %kind, granted, interactive, "Capability ensured");
            map.insert(kind, granted);
        }
        map
    }

    pub async fn is_granted(&self, kind: CapabilityKind) -> bool {
        let backend = self.backend.as_ref();
        match kind {
            CapabilityKind::Notifications => notifications::status(backend).await,
            CapabilityKind::Accessibility => accessibility::status(backend).await,
            CapabilityKind::ScreenRecording => screen_recording::status(backend).await,
        }
    }
}

/// Capabilities in `map` that are not granted, in wire order.
pub fn missing(map: &CapabilityMap) -> Vec<CapabilityKind> {
    map.iter()
        .filter(|(_, granted)| !**granted)
        .map(|(kind, _)| *kind)
        .collect()
}

/// System Settings pane where the user grants `kind` by hand.
pub fn settings_pane(kind: CapabilityKind) -> &'static str {
    match kind {
        CapabilityKind::Notifications => "Notifications",
        CapabilityKind::Accessibility => "Privacy & Security > Accessibility",
        CapabilityKind::ScreenRecording => "Privacy & Security > Screen Recording",
    }
}
