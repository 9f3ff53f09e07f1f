//! Engram domain model.
//!
//! # Responsibility
//! - Define the canonical board post shared by local and relational storage.
//! - Own input normalization for create/edit requests.
//!
//! # Invariants
//! - `id` and `created_at` never change after creation.
//! - `cluster` is never empty and never the reserved `all` filter value.
//! - `title` and `content` are non-empty after trimming.

use crate::model::vote::VoteDirection;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable engram identifier.
pub type EngramId = i64;

/// Cluster assigned when the caller provides none.
pub const DEFAULT_CLUSTER: &str = "general";

/// List-filter wildcard. Not assignable to an engram.
pub const ALL_CLUSTERS: &str = "all";

/// One board post with its aggregate counters and the requesting device's
/// vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Engram {
    pub id: EngramId,
    pub title: String,
    pub content: String,
    /// Device that posted the engram, when known.
    pub device_id: Option<String>,
    pub cluster: String,
    pub upvotes: u32,
    pub downvotes: u32,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Vote of the device the engram was resolved for. Not a stored column.
    pub user_vote: Option<VoteDirection>,
}

impl Engram {
    /// Validates text fields and cluster label.
    pub fn validate(&self) -> Result<(), EngramValidationError> {
        validate_text("title", &self.title)?;
        validate_text("content", &self.content)?;
        if self.cluster.trim().is_empty() {
            return Err(EngramValidationError::EmptyCluster);
        }
        if self.cluster == ALL_CLUSTERS {
            return Err(EngramValidationError::ReservedCluster(self.cluster.clone()));
        }
        Ok(())
    }
}

/// Validation failure for engram input or persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngramValidationError {
    EmptyField(&'static str),
    EmptyCluster,
    ReservedCluster(String),
    EmptyPatch,
}

impl Display for EngramValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} must not be empty"),
            Self::EmptyCluster => write!(f, "cluster must not be empty"),
            Self::ReservedCluster(name) => {
                write!(f, "cluster name `{name}` is reserved for list filters")
            }
            Self::EmptyPatch => write!(f, "update must change at least one field"),
        }
    }
}

impl Error for EngramValidationError {}

/// Create request for one engram.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEngram {
    pub title: String,
    pub content: String,
    pub cluster: Option<String>,
}

impl NewEngram {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            cluster: None,
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    /// Returns trimmed `(title, content, cluster)` ready for persistence.
    pub fn normalized(&self) -> Result<(String, String, String), EngramValidationError> {
        let title = self.title.trim().to_string();
        let content = self.content.trim().to_string();
        validate_text("title", &title)?;
        validate_text("content", &content)?;
        let cluster = normalize_cluster(self.cluster.as_deref())?;
        Ok((title, content, cluster))
    }
}

/// Partial edit request. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngramPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub cluster: Option<String>,
}

impl EngramPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.cluster.is_none()
    }

    /// Returns a copy with every provided field normalized.
    ///
    /// An empty cluster string resets the engram to [`DEFAULT_CLUSTER`].
    pub fn normalized(&self) -> Result<EngramPatch, EngramValidationError> {
        if self.is_empty() {
            return Err(EngramValidationError::EmptyPatch);
        }

        let title = match self.title.as_deref() {
            Some(value) => {
                let trimmed = value.trim();
                validate_text("title", trimmed)?;
                Some(trimmed.to_string())
            }
            None => None,
        };
        let content = match self.content.as_deref() {
            Some(value) => {
                let trimmed = value.trim();
                validate_text("content", trimmed)?;
                Some(trimmed.to_string())
            }
            None => None,
        };
        let cluster = match self.cluster.as_deref() {
            Some(value) => Some(normalize_cluster(Some(value))?),
            None => None,
        };

        Ok(EngramPatch {
            title,
            content,
            cluster,
        })
    }

    /// Applies a normalized patch in place.
    pub fn apply_to(&self, engram: &mut Engram) {
        if let Some(title) = &self.title {
            engram.title = title.clone();
        }
        if let Some(content) = &self.content {
            engram.content = content.clone();
        }
        if let Some(cluster) = &self.cluster {
            engram.cluster = cluster.clone();
        }
    }
}

/// Normalizes a cluster label for storage.
///
/// Missing or blank labels become [`DEFAULT_CLUSTER`].
pub fn normalize_cluster(cluster: Option<&str>) -> Result<String, EngramValidationError> {
    let trimmed = cluster.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Ok(DEFAULT_CLUSTER.to_string());
    }
    if trimmed == ALL_CLUSTERS {
        return Err(EngramValidationError::ReservedCluster(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Converts a list filter into an exact cluster match.
///
/// `None`, blank and `all` mean "no filter".
pub fn cluster_filter(cluster: Option<&str>) -> Option<String> {
    let trimmed = cluster?.trim();
    if trimmed.is_empty() || trimmed == ALL_CLUSTERS {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn validate_text(field: &'static str, value: &str) -> Result<(), EngramValidationError> {
    if value.trim().is_empty() {
        return Err(EngramValidationError::EmptyField(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{cluster_filter, normalize_cluster, EngramPatch, EngramValidationError, NewEngram};

    #[test]
    fn new_engram_defaults_cluster_and_trims_text() {
        let (title, content, cluster) = NewEngram::new("  hello ", " world\n")
            .normalized()
            .unwrap();
        assert_eq!(title, "hello");
        assert_eq!(content, "world");
        assert_eq!(cluster, "general");
    }

    #[test]
    fn new_engram_rejects_blank_title() {
        let err = NewEngram::new("   ", "body").normalized().unwrap_err();
        assert_eq!(err, EngramValidationError::EmptyField("title"));
    }

    #[test]
    fn reserved_cluster_is_rejected() {
        let err = normalize_cluster(Some("all")).unwrap_err();
        assert!(matches!(err, EngramValidationError::ReservedCluster(_)));
    }

    #[test]
    fn cluster_filter_treats_all_as_wildcard() {
        assert_eq!(cluster_filter(None), None);
        assert_eq!(cluster_filter(Some("all")), None);
        assert_eq!(cluster_filter(Some(" ")), None);
        assert_eq!(cluster_filter(Some(" ideas ")), Some("ideas".to_string()));
    }

    #[test]
    fn empty_patch_is_rejected() {
        let err = EngramPatch::default().normalized().unwrap_err();
        assert_eq!(err, EngramValidationError::EmptyPatch);
    }

    #[test]
    fn patch_blank_cluster_resets_to_default() {
        let patch = EngramPatch {
            cluster: Some(String::new()),
            ..EngramPatch::default()
        };
        let normalized = patch.normalized().unwrap();
        assert_eq!(normalized.cluster.as_deref(), Some("general"));
    }
}
