//! Core domain logic for the engram board.
//! Owns vote reconciliation for both the key-value and relational ledgers.

pub mod config;
pub mod db;
pub mod device;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;
pub mod vote_rule;

pub use config::{BackendKind, BoardConfig};
pub use device::{DeviceIdSource, FixedDeviceId, StoredDeviceId};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::engram::{
    Engram, EngramId, EngramPatch, EngramValidationError, NewEngram, DEFAULT_CLUSTER,
};
pub use model::vote::{Vote, VoteCounts, VoteDirection};
pub use repo::local_repo::LocalEngramRepository;
pub use repo::sqlite_repo::SqliteEngramRepository;
pub use repo::{EngramRepository, RepoError, RepoResult};
pub use service::board_service::BoardService;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use vote_rule::{apply_vote, VoteOutcome, VoteTransition};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
