//! Hot reload intake
//!
//! Two ways to learn that an asset changed on disk:
//! - [`apply_change_notifications`] consumes newline-separated asset names
//!   from any reader (a socket, a pipe, a log tail);
//! - [`ChangeWatcher`] polls modification times of watched files.
//!
//! Either way the result is a plain [`AssetManager::reload`] of the tracked id.

use ahash::AHashMap;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

use crate::error::Result;
use crate::id::AssetId;
use crate::manager::AssetManager;
use crate::provider::FileSystemProvider;

/// Time provider abstraction for hot-reload testing
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> SystemTime;
    fn file_modified(&self, path: &Path) -> io::Result<SystemTime>;
}

/// System time provider for production use
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn file_modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }
}

/// Reload every tracked asset named in `reader`, one name per line.
///
/// Names are hashed with [`AssetId::from_name`]. Blank lines are skipped;
/// untracked names are logged and skipped. Returns the number of reloads.
pub fn apply_change_notifications<R: BufRead>(manager: &AssetManager, reader: R) -> Result<usize> {
    let mut reloaded = 0;
    for line in reader.lines() {
        let line = line?;
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        let id = AssetId::from_name(name);
        if manager.state(id).is_none() {
            warn!(name, asset = %id, "change notification for an untracked asset");
            continue;
        }
        info!(name, asset = %id, "hot reloading asset");
        manager.reload(id, false);
        reloaded += 1;
    }
    Ok(reloaded)
}

struct WatchedFile {
    path: PathBuf,
    modified: Option<SystemTime>,
}

/// Polling watcher that reloads assets whose files changed
pub struct ChangeWatcher {
    files: AHashMap<AssetId, WatchedFile>,
    last_check: Option<SystemTime>,
    check_interval: Duration,
    enabled: bool,
    time_provider: Box<dyn TimeProvider>,
}

impl ChangeWatcher {
    pub fn new() -> Self {
        Self::new_with_provider(Box::new(SystemTimeProvider))
    }

    /// Create a watcher with a custom time provider
    pub fn new_with_provider(provider: Box<dyn TimeProvider>) -> Self {
        Self {
            files: AHashMap::new(),
            last_check: None,
            check_interval: Duration::from_millis(500),
            enabled: true,
            time_provider: provider,
        }
    }

    pub fn set_check_interval(&mut self, interval: Duration) {
        self.check_interval = interval;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Watch `path` as the source of `id`, from its current modification time
    pub fn watch<P: Into<PathBuf>>(&mut self, id: AssetId, path: P) {
        let path = path.into();
        let modified = self.time_provider.file_modified(&path).ok();
        self.files.insert(id, WatchedFile { path, modified });
    }

    /// Watch every file a filesystem provider has indexed
    pub fn watch_provider(&mut self, provider: &FileSystemProvider) {
        for (id, path) in provider.entries() {
            self.watch(id, path);
        }
    }

    pub fn unwatch(&mut self, id: AssetId) -> bool {
        self.files.remove(&id).is_some()
    }

    pub fn watched_count(&self) -> usize {
        self.files.len()
    }

    /// Once per check interval, reload tracked assets whose files changed.
    ///
    /// Returns the number of reloads issued.
    pub fn check_and_reload(&mut self, manager: &AssetManager) -> usize {
        if !self.enabled {
            return 0;
        }
        let now = self.time_provider.now();
        if let Some(last) = self.last_check {
            if now.duration_since(last).unwrap_or_default() < self.check_interval {
                return 0;
            }
        }
        self.last_check = Some(now);

        let mut reloaded = 0;
        for (id, file) in &mut self.files {
            let Ok(modified) = self.time_provider.file_modified(&file.path) else {
                continue;
            };
            if file.modified.is_some_and(|seen| modified <= seen) {
                continue;
            }
            file.modified = Some(modified);
            if manager.state(*id).is_some() {
                info!(asset = %id, path = %file.path.display(), "file changed, reloading");
                manager.reload(*id, false);
                reloaded += 1;
            }
        }
        reloaded
    }
}

impl Default for ChangeWatcher {
    fn default() -> Self {
        Self::new()
    }
}
