//! File-backed settings store
//!
//! Caches `settings.json` in memory and reloads it when another process (the
//! presentation layer) rewrites the file.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Settings, SettingsStore};
use crate::common::{AppError, AppResult};

pub struct FileSettingsStore {
    path: PathBuf,
    cache: RwLock<Settings>,
}

impl FileSettingsStore {
    /// Open the store, loading the current document. A missing or unreadable
    /// file means defaults until the next successful reload.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = read_settings(&path).unwrap_or_else(|e| {
            warn!("{}; using defaults", e);
            Settings::default()
        });
        Self {
            path,
            cache: RwLock::new(settings),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the document into the cache. On failure the cache is left alone.
    pub fn reload(&self) -> AppResult<()> {
        let settings = read_settings(&self.path)?;
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = settings;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut Settings)) -> AppResult<()> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // Read-modify-write against the file so a field written elsewhere survives.
        let mut settings = read_settings(&self.path).unwrap_or_else(|_| cache.clone());
        apply(&mut settings);
        settings.touch();
        write_settings(&self.path, &settings)?;
        *cache = settings;
        Ok(())
    }

    /// Start filesystem watcher for hot-reload
    pub fn start_watcher(self: Arc<Self>) -> AppResult<()> {
        use notify::{Event, RecursiveMode, Watcher};

        // Watch the directory: writers replace the file by rename.
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir)?;
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        info!("Starting settings watcher on {:?}", dir);

        let (tx, mut rx) = tokio::sync::mpsc::channel::<Event>(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tokio::spawn(async move {
            // Keep watcher alive
            let _watcher = watcher;

            while let Some(event) = rx.recv().await {
                let touches_settings = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if !touches_settings {
                    continue;
                }
                debug!("Settings filesystem event: {:?}", event.kind);

                // Debounce
                tokio::time::sleep(Duration::from_millis(200)).await;
                while rx.try_recv().is_ok() {}

                match self.reload() {
                    Ok(()) => info!(paused = self.paused(), "Settings reloaded"),
                    Err(e) => warn!("Failed to reload settings: {}", e),
                }
            }
        });

        Ok(())
    }
}

impl SettingsStore for FileSettingsStore {
    fn snapshot(&self) -> Settings {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_paused(&self, paused: bool) -> AppResult<()> {
        self.update(|s| s.paused = paused)
    }

    fn set_default_sound(&self, sound: Option<String>) -> AppResult<()> {
        self.update(|s| s.default_sound = sound)
    }
}

fn read_settings(path: &Path) -> AppResult<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| AppError::SettingsLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_json::from_str(&content).map_err(|e| AppError::SettingsLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn write_settings(path: &Path, settings: &Settings) -> AppResult<()> {
    let write_err = |e: std::io::Error| AppError::SettingsWrite {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let content = serde_json::to_string_pretty(settings)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content).map_err(write_err)?;
    std::fs::rename(&tmp, path).map_err(write_err)?;
    Ok(())
}
