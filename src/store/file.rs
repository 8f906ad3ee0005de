//! Directory-backed store
//!
//! One JSON file per key. Any number of processes may open the same
//! directory; a filesystem watcher turns their writes into bus signals.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use super::{KeyValueStore, WatchGuard};
use crate::{bus::ChangeBus, error::StoreError};

const EXTENSION: &str = "json";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Contents this context last wrote, by file name.
type OwnWrites = Arc<Mutex<HashMap<String, String>>>;

#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    own_writes: OwnWrites,
}

impl FileStore {
    /// Open (creating if needed) a store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Write {
            key: dir.display().to_string(),
            source,
        })?;
        info!("Using store directory {}", dir.display());
        Ok(Self {
            dir,
            own_writes: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(key: &str) -> String {
        format!("{}.{}", key, EXTENSION)
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(Self::file_name(key))
    }

    fn tmp_path(&self, key: &str) -> PathBuf {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{}.{}.{}.tmp", key, std::process::id(), n))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let tmp = self.tmp_path(key);
        let write_err = |source| StoreError::Write {
            key: key.to_string(),
            source,
        };

        fs::write(&tmp, value).map_err(write_err)?;
        // Recorded before the rename so the watcher can recognise the event.
        self.own_writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(Self::file_name(key), value.to_string());

        if let Err(source) = fs::rename(&tmp, self.path(key)) {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(source));
        }
        Ok(())
    }

    fn watch(&self, bus: ChangeBus) -> Result<WatchGuard, StoreError> {
        let own_writes = Arc::clone(&self.own_writes);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        return;
                    }
                    if event.paths.iter().any(|p| is_foreign_change(p, &own_writes)) {
                        debug!("Store changed on disk: {:?}", event.paths);
                        bus.publish();
                    }
                }
                Err(e) => warn!("Store watch error: {}", e),
            },
            Config::default(),
        )?;
        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;
        info!("Watching {} for changes from other instances", self.dir.display());
        Ok(WatchGuard::new(watcher))
    }
}

/// Whether `path` is a store file whose content is not this context's own
/// last write.
fn is_foreign_change(path: &Path, own_writes: &OwnWrites) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
        return false;
    }
    match fs::read_to_string(path) {
        Ok(current) => {
            let own = own_writes.lock().unwrap_or_else(|e| e.into_inner());
            own.get(name) != Some(&current)
        }
        Err(_) => true,
    }
}
