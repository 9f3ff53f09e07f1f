//! Board use-case service.
//!
//! # Responsibility
//! - Expose the engram operation surface over one selected repository.
//! - Log every failure once at this boundary with a stable `error_code`.
//!
//! # Invariants
//! - Errors are returned unchanged; the caller can tell not-found apart
//!   from storage and backend failures.
//! - Log lines carry ids, clusters and directions only, never titles or
//!   content.

use crate::model::engram::{Engram, EngramId, EngramPatch, NewEngram};
use crate::model::vote::VoteDirection;
use crate::repo::{EngramRepository, RepoError, RepoResult};
use log::{error, info, warn};
use std::time::Instant;

/// Board facade over one repository implementation.
pub struct BoardService<R: EngramRepository> {
    repo: R,
}

impl<R: EngramRepository> BoardService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Returns the wrapped repository.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Lists engrams newest first. `None` or `all` lists every cluster.
    pub fn get_engrams(&self, cluster: Option<&str>) -> RepoResult<Vec<Engram>> {
        let started_at = Instant::now();
        let result = self.repo.list_engrams(cluster);
        self.log_outcome(
            "engram_list",
            format!("cluster={}", cluster.unwrap_or("all")),
            started_at,
            &result,
        );
        result
    }

    pub fn get_engram(&self, id: EngramId) -> RepoResult<Option<Engram>> {
        let started_at = Instant::now();
        let result = self.repo.get_engram(id);
        self.log_outcome("engram_get", format!("id={id}"), started_at, &result);
        result
    }

    pub fn add_engram(&mut self, new_engram: &NewEngram) -> RepoResult<Engram> {
        let started_at = Instant::now();
        let result = self.repo.add_engram(new_engram);
        let detail = match &result {
            Ok(engram) => format!("id={} cluster={}", engram.id, engram.cluster),
            Err(_) => "id=none".to_string(),
        };
        self.log_outcome("engram_add", detail, started_at, &result);
        result
    }

    pub fn update_engram(&mut self, id: EngramId, patch: &EngramPatch) -> RepoResult<Engram> {
        let started_at = Instant::now();
        let result = self.repo.update_engram(id, patch);
        self.log_outcome("engram_update", format!("id={id}"), started_at, &result);
        result
    }

    pub fn delete_engram(&mut self, id: EngramId) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = self.repo.delete_engram(id);
        self.log_outcome("engram_delete", format!("id={id}"), started_at, &result);
        result
    }

    /// Applies one vote request from the repository's device.
    pub fn vote_engram(&mut self, id: EngramId, direction: VoteDirection) -> RepoResult<Engram> {
        let started_at = Instant::now();
        let result = self.repo.vote_engram(id, direction);
        let detail = match &result {
            Ok(engram) => format!(
                "id={id} requested={direction} resolved={} upvotes={} downvotes={}",
                engram.user_vote.map_or("none", VoteDirection::as_str),
                engram.upvotes,
                engram.downvotes
            ),
            Err(_) => format!("id={id} requested={direction}"),
        };
        self.log_outcome("engram_vote", detail, started_at, &result);
        result
    }

    fn log_outcome<T>(
        &self,
        event: &str,
        detail: String,
        started_at: Instant,
        result: &RepoResult<T>,
    ) {
        let backend = self.repo.backend();
        let duration_ms = started_at.elapsed().as_millis();
        match result {
            Ok(_) => info!(
                "event={event} module=service status=ok backend={backend} {detail} duration_ms={duration_ms}"
            ),
            Err(err @ (RepoError::NotFound(_) | RepoError::Validation(_))) => warn!(
                "event={event} module=service status=error backend={backend} {detail} duration_ms={duration_ms} error_code={} error={err}",
                err.error_code()
            ),
            Err(err) => error!(
                "event={event} module=service status=error backend={backend} {detail} duration_ms={duration_ms} error_code={} error={err}",
                err.error_code()
            ),
        }
    }
}
