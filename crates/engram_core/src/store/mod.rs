//! Persistent key-value storage used by the local ledger.
//!
//! # Responsibility
//! - Define the string key-value contract local persistence is built on.
//! - Provide a file-backed store and an in-memory store.
//!
//! # Invariants
//! - `set_item` replaces the whole value in one call; readers never observe
//!   a partially written value.
//! - Store failures are returned as `StoreError`, never panics.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

const PROBE_KEY: &str = "__engram_store_probe__";

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value storage failure.
#[derive(Debug)]
pub enum StoreError {
    /// Storage is disabled or missing in this environment.
    Unavailable(String),
    /// Write would exceed the storage quota.
    QuotaExceeded { limit_bytes: usize, required_bytes: usize },
    /// Key contains characters the backend cannot address.
    InvalidKey(String),
    Io(std::io::Error),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "storage unavailable: {reason}"),
            Self::QuotaExceeded {
                limit_bytes,
                required_bytes,
            } => write!(
                f,
                "storage quota exceeded: {required_bytes} bytes required, limit is {limit_bytes}"
            ),
            Self::InvalidKey(key) => write!(f, "invalid storage key `{key}`"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// String key-value storage scoped to one device environment.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;
    fn remove_item(&self, key: &str) -> StoreResult<()>;

    /// Probes the store with a write/read/remove round trip.
    fn is_available(&self) -> bool {
        probe(self).is_ok()
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        (**self).remove_item(key)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

fn probe<S: KeyValueStore + ?Sized>(store: &S) -> StoreResult<()> {
    store.set_item(PROBE_KEY, PROBE_KEY)?;
    let read_back = store.get_item(PROBE_KEY)?;
    store.remove_item(PROBE_KEY)?;
    if read_back.as_deref() == Some(PROBE_KEY) {
        Ok(())
    } else {
        Err(StoreError::Unavailable(
            "probe value did not read back".to_string(),
        ))
    }
}
