//! Engram repository contract and its two vote-ledger implementations.
//!
//! # Responsibility
//! - Define the CRUD + vote surface consumed by services and the CLI.
//! - Provide a key-value backed ledger and a relational (SQLite) ledger.
//!
//! # Invariants
//! - Both ledgers apply `vote_rule::apply_vote` and nothing else to counters.
//! - A device holds at most one vote per engram in either backend.
//! - Failures are typed `RepoError`s; not-found is distinguishable from
//!   storage and backend failures.

use crate::db::DbError;
use crate::model::engram::{Engram, EngramId, EngramPatch, EngramValidationError, NewEngram};
use crate::model::vote::VoteDirection;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod local_repo;
pub mod sqlite_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by both ledgers.
#[derive(Debug)]
pub enum RepoError {
    /// Caller input rejected before touching storage.
    Validation(EngramValidationError),
    /// Referenced engram does not exist.
    NotFound(EngramId),
    /// Local storage is missing, disabled or over quota.
    StorageUnavailable(StoreError),
    /// Local storage failed for another reason.
    Storage(StoreError),
    /// Relational store rejected a read or write.
    Db(DbError),
    /// Stored collection could not be encoded or decoded.
    Serialization(String),
    /// Stored row/record decoded but violates model invariants.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl RepoError {
    /// Stable code used in structured log lines.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Storage(_) => "storage_failed",
            Self::Db(_) => "backend_rejected",
            Self::Serialization(_) => "serialization_failed",
            Self::InvalidData(_) => "invalid_data",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "engram not found: {id}"),
            Self::StorageUnavailable(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(message) => write!(f, "engram serialization failed: {message}"),
            Self::InvalidData(message) => write!(f, "invalid stored engram data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "engram repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::StorageUnavailable(err) | Self::Storage(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EngramValidationError> for RepoError {
    fn from(value: EngramValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(_) | StoreError::QuotaExceeded { .. } => {
                Self::StorageUnavailable(value)
            }
            other => Self::Storage(other),
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

/// CRUD + vote contract over one storage backend.
///
/// Returned engrams carry `user_vote` resolved for the repository's device.
pub trait EngramRepository {
    /// Short backend label used in logs.
    fn backend(&self) -> &'static str;
    /// Lists engrams newest first. `None` or `all` lists every cluster.
    fn list_engrams(&self, cluster: Option<&str>) -> RepoResult<Vec<Engram>>;
    fn get_engram(&self, id: EngramId) -> RepoResult<Option<Engram>>;
    fn add_engram(&mut self, new_engram: &NewEngram) -> RepoResult<Engram>;
    fn update_engram(&mut self, id: EngramId, patch: &EngramPatch) -> RepoResult<Engram>;
    /// Deletes the engram and every vote recorded for it.
    fn delete_engram(&mut self, id: EngramId) -> RepoResult<()>;
    /// Applies one vote request from the repository's device.
    fn vote_engram(&mut self, id: EngramId, direction: VoteDirection) -> RepoResult<Engram>;
}

pub(crate) fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
