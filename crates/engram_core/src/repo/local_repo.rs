//! Key-value backed engram repository (local vote ledger).
//!
//! # Responsibility
//! - Keep the whole engram collection as one JSON array under [`ENGRAMS_KEY`].
//! - Reconcile per-device votes embedded on each record with its counters.
//!
//! # Invariants
//! - Every mutation is read-modify-write of the full collection followed by
//!   a single `set_item` call.
//! - Failed lookups and failed reads never write.
//! - Each record holds at most one vote per device id.
//! - A record carrying only a single-device `userVote` is read as that vote
//!   belonging to the current device; the field is never written back.

use crate::device::DeviceIdSource;
use crate::model::engram::{
    cluster_filter, Engram, EngramId, EngramPatch, NewEngram, DEFAULT_CLUSTER,
};
use crate::model::vote::{VoteCounts, VoteDirection};
use crate::repo::{now_epoch_ms, EngramRepository, RepoError, RepoResult};
use crate::store::KeyValueStore;
use crate::vote_rule::apply_vote;
use chrono::DateTime;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Storage key holding the serialized engram collection.
pub const ENGRAMS_KEY: &str = "engrams";

/// Persisted record shape. Votes are keyed by device id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEngram {
    id: EngramId,
    title: String,
    content: String,
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    cluster: Option<String>,
    #[serde(default)]
    upvotes: u32,
    #[serde(default)]
    downvotes: u32,
    #[serde(deserialize_with = "deserialize_created_at")]
    created_at: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    votes: BTreeMap<String, VoteDirection>,
    /// Single-device vote written before votes were keyed by device.
    #[serde(default, rename = "userVote", skip_serializing)]
    legacy_user_vote: Option<VoteDirection>,
}

/// `createdAt` as epoch milliseconds or an RFC 3339 timestamp.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTimestamp {
    EpochMs(i64),
    Rfc3339(String),
}

fn deserialize_created_at<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match StoredTimestamp::deserialize(deserializer)? {
        StoredTimestamp::EpochMs(millis) => Ok(millis),
        StoredTimestamp::Rfc3339(text) => DateTime::parse_from_rfc3339(text.trim())
            .map(|parsed| parsed.timestamp_millis())
            .map_err(|err| D::Error::custom(format!("invalid createdAt `{text}`: {err}"))),
    }
}

impl StoredEngram {
    fn counts(&self) -> VoteCounts {
        VoteCounts::new(self.upvotes, self.downvotes)
    }

    fn to_engram(&self, device_id: &str) -> RepoResult<Engram> {
        let engram = Engram {
            id: self.id,
            title: self.title.clone(),
            content: self.content.clone(),
            device_id: self.device_id.clone(),
            cluster: self
                .cluster
                .clone()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CLUSTER.to_string()),
            upvotes: self.upvotes,
            downvotes: self.downvotes,
            created_at: self.created_at,
            user_vote: self.votes.get(device_id).copied(),
        };
        engram.validate().map_err(|err| {
            RepoError::InvalidData(format!("engram {} failed validation: {err}", self.id))
        })?;
        Ok(engram)
    }
}

/// Engram repository over a [`KeyValueStore`].
pub struct LocalEngramRepository<S: KeyValueStore, D: DeviceIdSource> {
    store: S,
    devices: D,
}

impl<S: KeyValueStore, D: DeviceIdSource> LocalEngramRepository<S, D> {
    pub fn new(store: S, devices: D) -> Self {
        Self { store, devices }
    }

    /// Probes the underlying store with a write/read/remove round trip.
    pub fn is_available(&self) -> bool {
        self.store.is_available()
    }

    /// Loads the collection with legacy `userVote` values assigned to
    /// `device_id`.
    fn load(&self, device_id: &str) -> RepoResult<Vec<StoredEngram>> {
        let mut records: Vec<StoredEngram> = match self.store.get_item(ENGRAMS_KEY)? {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)?,
            _ => Vec::new(),
        };
        for record in &mut records {
            if let Some(direction) = record.legacy_user_vote.take() {
                if record.votes.is_empty() {
                    record.votes.insert(device_id.to_string(), direction);
                }
            }
        }
        Ok(records)
    }

    fn save(&self, records: &[StoredEngram]) -> RepoResult<()> {
        let raw = serde_json::to_string(records)?;
        self.store.set_item(ENGRAMS_KEY, &raw)?;
        Ok(())
    }
}

impl<S: KeyValueStore, D: DeviceIdSource> EngramRepository for LocalEngramRepository<S, D> {
    fn backend(&self) -> &'static str {
        "local"
    }

    fn list_engrams(&self, cluster: Option<&str>) -> RepoResult<Vec<Engram>> {
        let device_id = self.devices.device_id();
        let filter = cluster_filter(cluster);
        let mut engrams = self
            .load(&device_id)?
            .iter()
            .map(|record| record.to_engram(&device_id))
            .collect::<RepoResult<Vec<_>>>()?;
        if let Some(cluster) = filter {
            engrams.retain(|engram| engram.cluster == cluster);
        }
        engrams.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(engrams)
    }

    fn get_engram(&self, id: EngramId) -> RepoResult<Option<Engram>> {
        let device_id = self.devices.device_id();
        self.load(&device_id)?
            .iter()
            .find(|record| record.id == id)
            .map(|record| record.to_engram(&device_id))
            .transpose()
    }

    fn add_engram(&mut self, new_engram: &NewEngram) -> RepoResult<Engram> {
        let (title, content, cluster) = new_engram.normalized()?;
        let device_id = self.devices.device_id();
        let mut records = self.load(&device_id)?;

        let now = now_epoch_ms();
        let next_after_existing = match records.iter().map(|record| record.id).max() {
            Some(max_id) => max_id.checked_add(1).ok_or_else(|| {
                RepoError::InvalidData(format!("engram id space exhausted after {max_id}"))
            })?,
            None => now,
        };
        let record = StoredEngram {
            id: now.max(next_after_existing),
            title,
            content,
            device_id: Some(device_id.clone()),
            cluster: Some(cluster),
            upvotes: 0,
            downvotes: 0,
            created_at: now,
            votes: BTreeMap::new(),
            legacy_user_vote: None,
        };
        let engram = record.to_engram(&device_id)?;

        records.push(record);
        self.save(&records)?;
        Ok(engram)
    }

    fn update_engram(&mut self, id: EngramId, patch: &EngramPatch) -> RepoResult<Engram> {
        let patch = patch.normalized()?;
        let device_id = self.devices.device_id();
        let mut records = self.load(&device_id)?;

        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(RepoError::NotFound(id))?;
        let mut engram = record.to_engram(&device_id)?;
        patch.apply_to(&mut engram);
        record.title = engram.title.clone();
        record.content = engram.content.clone();
        record.cluster = Some(engram.cluster.clone());

        self.save(&records)?;
        Ok(engram)
    }

    fn delete_engram(&mut self, id: EngramId) -> RepoResult<()> {
        let device_id = self.devices.device_id();
        let mut records = self.load(&device_id)?;
        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() == before {
            return Err(RepoError::NotFound(id));
        }
        self.save(&records)
    }

    fn vote_engram(&mut self, id: EngramId, direction: VoteDirection) -> RepoResult<Engram> {
        let device_id = self.devices.device_id();
        let mut records = self.load(&device_id)?;

        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or(RepoError::NotFound(id))?;
        let prior = record.votes.get(&device_id).copied();
        let outcome = apply_vote(record.counts(), prior, direction);

        record.upvotes = outcome.counts.upvotes;
        record.downvotes = outcome.counts.downvotes;
        match outcome.direction {
            Some(current) => {
                record.votes.insert(device_id.clone(), current);
            }
            None => {
                record.votes.remove(&device_id);
            }
        }
        let engram = record.to_engram(&device_id)?;

        self.save(&records)?;
        Ok(engram)
    }
}
