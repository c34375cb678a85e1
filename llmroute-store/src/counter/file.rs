//! One JSON file per counter key.
//!
//! File names are the form-urlencoded key plus `.json`, so provider and
//! model names with `/` or `:` stay on a single path component. Writers to
//! different keys touch different files and never contend.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use url::form_urlencoded;

use super::{CounterStore, StoreKey, WindowRecord};
use crate::error::StoreError;
use crate::persistence::{ensure_dir, load_json, save_json};

const EXTENSION: &str = "json";

/// Counter store backed by a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FileCounterStore {
    dir: PathBuf,
}

impl FileCounterStore {
    /// Opens (and creates if needed) the counter directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        ensure_dir(&dir)?;
        debug!(dir = %dir.display(), "Opened JSON counter store");
        Ok(Self { dir })
    }

    /// Returns the counter directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &StoreKey) -> PathBuf {
        let encoded: String = form_urlencoded::byte_serialize(key.to_string().as_bytes()).collect();
        self.dir.join(format!("{encoded}.{EXTENSION}"))
    }

    fn key_for(path: &Path) -> Option<StoreKey> {
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let (decoded, _) = form_urlencoded::parse(stem.as_bytes()).next()?;
        decoded.parse().ok()
    }
}

impl CounterStore for FileCounterStore {
    fn backend(&self) -> &'static str {
        "json"
    }

    fn load_all(&self) -> Result<Vec<(StoreKey, WindowRecord)>, StoreError> {
        let mut records = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(key) = Self::key_for(&path) else {
                continue;
            };

            match load_json::<WindowRecord>(&path) {
                Ok(record) => records.push((key, record)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable counter file");
                }
            }
        }

        debug!(count = records.len(), "Loaded counters from JSON files");
        Ok(records)
    }

    fn put(&self, records: &[(StoreKey, WindowRecord)]) -> Result<(), StoreError> {
        for (key, record) in records {
            save_json(&self.path_for(key), record)?;
        }
        Ok(())
    }

    fn remove(&self, key: &StoreKey) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn flush(&self) -> Result<(), StoreError> {
        // Each put already syncs its file; sync the directory entry too.
        #[cfg(unix)]
        fs::File::open(&self.dir)?.sync_all()?;
        Ok(())
    }
}
