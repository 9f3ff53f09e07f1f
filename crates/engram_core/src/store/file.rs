//! File-backed key-value store.
//!
//! # Responsibility
//! - Persist one value per key as a file inside a store directory.
//!
//! # Invariants
//! - Writes go to a temp file and are renamed over the target, so a value
//!   is either the old or the new one.
//! - Keys are restricted to a filename-safe alphabet.

use super::{KeyValueStore, StoreError, StoreResult};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

static STORE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").expect("valid key regex"));

const VALUE_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Directory-backed store. One file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `dir`, creating the directory when missing.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|err| {
            warn!(
                "event=store_open module=store status=error dir={} error={}",
                dir.display(),
                err
            );
            StoreError::Unavailable(format!(
                "cannot create store directory `{}`: {err}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    fn value_path(&self, key: &str) -> StoreResult<PathBuf> {
        if !STORE_KEY_RE.is_match(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.{VALUE_EXTENSION}")))
    }

    fn ensure_dir(&self) -> StoreResult<()> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "store directory `{}` is missing",
                self.dir.display()
            )))
        }
    }
}

impl KeyValueStore for FileStore {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.value_path(key)?;
        self.ensure_dir()?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(map_io(err)),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.value_path(key)?;
        self.ensure_dir()?;
        let temp_path = path.with_extension(TEMP_EXTENSION);
        fs::write(&temp_path, value).map_err(map_io)?;
        if let Err(err) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(map_io(err));
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        let path = self.value_path(key)?;
        self.ensure_dir()?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(map_io(err)),
        }
    }
}

fn map_io(err: std::io::Error) -> StoreError {
    match err.kind() {
        ErrorKind::PermissionDenied => StoreError::Unavailable(err.to_string()),
        _ => StoreError::Io(err),
    }
}
