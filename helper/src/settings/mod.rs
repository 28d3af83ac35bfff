//! Persisted settings: the pause switch and the default notification sound.
//!
//! The presentation layer writes these; the dispatcher only reads them. The
//! store is injected so dispatch can be exercised without a real file.

mod file;

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::common::AppResult;

pub use file::FileSettingsStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Kill-switch: when set, every request is refused with "paused"
    #[serde(default)]
    pub paused: bool,

    /// Sound used by `notify` when the request names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sound: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Settings {
    fn touch(&mut self) {
        self.updated_at = Some(chrono::Utc::now().to_rfc3339());
    }
}

/// Get/set access to persisted settings. Last writer wins.
pub trait SettingsStore: Send + Sync {
    fn snapshot(&self) -> Settings;

    fn set_paused(&self, paused: bool) -> AppResult<()>;

    fn set_default_sound(&self, sound: Option<String>) -> AppResult<()>;

    fn paused(&self) -> bool {
        self.snapshot().paused
    }

    fn default_sound(&self) -> Option<String> {
        self.snapshot().default_sound
    }
}

/// In-process store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<Settings>,
}

impl SettingsStore for MemorySettingsStore {
    fn snapshot(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_paused(&self, paused: bool) -> AppResult<()> {
        let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        settings.paused = paused;
        settings.touch();
        Ok(())
    }

    fn set_default_sound(&self, sound: Option<String>) -> AppResult<()> {
        let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        settings.default_sound = sound;
        settings.touch();
        Ok(())
    }
}
