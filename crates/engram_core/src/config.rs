//! Board runtime configuration.
//!
//! # Responsibility
//! - Describe backend selection, storage locations and logging settings.
//! - Provide defaults under the system temp directory for unset values.
//!
//! Front ends resolve flags and environment variables themselves and fill
//! the fields they received.

use crate::logging::default_log_level;
use std::path::PathBuf;

const DEFAULT_DB_FILE_NAME: &str = "engram_board.sqlite3";
const DEFAULT_STORE_DIR_NAME: &str = "engram_board_store";

/// Storage backend hosting the vote ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// Key-value store, one serialized collection.
    #[default]
    Local,
    /// Relational store with a separate votes table.
    Sqlite,
}

/// Resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub backend: BackendKind,
    /// SQLite database file for the relational backend.
    pub db_path: PathBuf,
    /// Key-value store directory. Also holds the device identifier.
    pub store_dir: PathBuf,
    pub log_level: String,
    /// Logging stays disabled when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        let temp_dir = std::env::temp_dir();
        Self {
            backend: BackendKind::default(),
            db_path: temp_dir.join(DEFAULT_DB_FILE_NAME),
            store_dir: temp_dir.join(DEFAULT_STORE_DIR_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}
