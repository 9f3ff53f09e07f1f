//! SQLite-backed engram repository (relational vote ledger).
//!
//! # Responsibility
//! - Provide CRUD over `engrams` with the device's vote joined from `votes`.
//! - Reconcile the `votes` row of one `(engram, device)` pair with the
//!   aggregate counters on `engrams`.
//!
//! # Invariants
//! - A vote runs in one `IMMEDIATE` transaction: row lookup, vote-row
//!   mutation and counter update commit together or not at all.
//! - At most one `votes` row exists per `(engram_id, device_id)`.
//! - `created_at` is written from the process clock in milliseconds; the
//!   column default only covers rows inserted outside this repository.
//! - Rows are decoded into validated `Engram` values; malformed rows are
//!   `RepoError::InvalidData`.

use crate::db::migrations::latest_version;
use crate::device::DeviceIdSource;
use crate::model::engram::{cluster_filter, Engram, EngramId, EngramPatch, NewEngram};
use crate::model::vote::{Vote, VoteCounts, VoteDirection};
use crate::repo::{now_epoch_ms, EngramRepository, RepoError, RepoResult};
use crate::vote_rule::{apply_vote, VoteTransition};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

const ENGRAM_SELECT_SQL: &str = "SELECT
    e.id,
    e.title,
    e.content,
    e.device_id,
    e.cluster,
    e.upvotes,
    e.downvotes,
    e.created_at,
    v.vote_type
FROM engrams e
LEFT JOIN votes v
    ON v.engram_id = e.id
   AND v.device_id = ?1";

/// Engram repository over a migrated SQLite connection.
pub struct SqliteEngramRepository<'conn, D: DeviceIdSource> {
    conn: &'conn mut Connection,
    devices: D,
}

impl<'conn, D: DeviceIdSource> SqliteEngramRepository<'conn, D> {
    /// Constructs a repository from a connection at the latest schema version.
    pub fn try_new(conn: &'conn mut Connection, devices: D) -> RepoResult<Self> {
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn, devices })
    }

    /// Lists every vote row recorded for one engram, oldest first.
    pub fn votes_for_engram(&self, id: EngramId) -> RepoResult<Vec<Vote>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, engram_id, device_id, vote_type, created_at
             FROM votes
             WHERE engram_id = ?1
             ORDER BY created_at ASC, id ASC;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut votes = Vec::new();
        while let Some(row) = rows.next()? {
            let vote_type: String = row.get("vote_type")?;
            votes.push(Vote {
                id: row.get("id")?,
                engram_id: row.get("engram_id")?,
                device_id: row.get("device_id")?,
                direction: parse_vote_type(&vote_type)?,
                created_at: row.get("created_at")?,
            });
        }
        Ok(votes)
    }
}

impl<D: DeviceIdSource> EngramRepository for SqliteEngramRepository<'_, D> {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn list_engrams(&self, cluster: Option<&str>) -> RepoResult<Vec<Engram>> {
        let device_id = self.devices.device_id();
        let filter = cluster_filter(cluster);
        let mut stmt = self.conn.prepare(&format!(
            "{ENGRAM_SELECT_SQL}
             WHERE (?2 IS NULL OR e.cluster = ?2)
             ORDER BY e.created_at DESC, e.id DESC;"
        ))?;

        let mut rows = stmt.query(params![device_id, filter])?;
        let mut engrams = Vec::new();
        while let Some(row) = rows.next()? {
            engrams.push(parse_engram_row(row)?);
        }
        Ok(engrams)
    }

    fn get_engram(&self, id: EngramId) -> RepoResult<Option<Engram>> {
        load_engram(self.conn, id, &self.devices.device_id())
    }

    fn add_engram(&mut self, new_engram: &NewEngram) -> RepoResult<Engram> {
        let (title, content, cluster) = new_engram.normalized()?;
        let device_id = self.devices.device_id();

        self.conn.execute(
            "INSERT INTO engrams (title, content, device_id, cluster, upvotes, downvotes, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, 0, ?5);",
            params![title, content, device_id, cluster, now_epoch_ms()],
        )?;
        let id = self.conn.last_insert_rowid();

        load_engram(self.conn, id, &device_id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("engram {id} missing after insert read-back"))
        })
    }

    fn update_engram(&mut self, id: EngramId, patch: &EngramPatch) -> RepoResult<Engram> {
        let patch = patch.normalized()?;
        let changed = self.conn.execute(
            "UPDATE engrams
             SET
                title = COALESCE(?2, title),
                content = COALESCE(?3, content),
                cluster = COALESCE(?4, cluster)
             WHERE id = ?1;",
            params![id, patch.title, patch.content, patch.cluster],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        load_engram(self.conn, id, &self.devices.device_id())?.ok_or(RepoError::NotFound(id))
    }

    fn delete_engram(&mut self, id: EngramId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM engrams WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn vote_engram(&mut self, id: EngramId, direction: VoteDirection) -> RepoResult<Engram> {
        let device_id = self.devices.device_id();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let counts = load_counts(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        let prior = load_vote_direction(&tx, id, &device_id)?;
        let outcome = apply_vote(counts, prior, direction);

        match outcome.transition {
            VoteTransition::Cast => {
                tx.execute(
                    "INSERT INTO votes (engram_id, device_id, vote_type, created_at)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![id, device_id, direction.as_str(), now_epoch_ms()],
                )?;
            }
            VoteTransition::Retract => {
                tx.execute(
                    "DELETE FROM votes WHERE engram_id = ?1 AND device_id = ?2;",
                    params![id, device_id],
                )?;
            }
            VoteTransition::Switch => {
                tx.execute(
                    "UPDATE votes SET vote_type = ?3 WHERE engram_id = ?1 AND device_id = ?2;",
                    params![id, device_id, direction.as_str()],
                )?;
            }
        }

        tx.execute(
            "UPDATE engrams SET upvotes = ?2, downvotes = ?3 WHERE id = ?1;",
            params![id, outcome.counts.upvotes, outcome.counts.downvotes],
        )?;

        let engram = load_engram(&tx, id, &device_id)?.ok_or(RepoError::NotFound(id))?;
        tx.commit()?;
        Ok(engram)
    }
}

fn load_engram(conn: &Connection, id: EngramId, device_id: &str) -> RepoResult<Option<Engram>> {
    let mut stmt = conn.prepare(&format!("{ENGRAM_SELECT_SQL} WHERE e.id = ?2;"))?;
    let mut rows = stmt.query(params![device_id, id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_engram_row(row)?));
    }
    Ok(None)
}

fn load_counts(conn: &Connection, id: EngramId) -> RepoResult<Option<VoteCounts>> {
    let raw = conn
        .query_row(
            "SELECT upvotes, downvotes FROM engrams WHERE id = ?1;",
            [id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    raw.map(|(upvotes, downvotes)| -> RepoResult<VoteCounts> {
        Ok(VoteCounts::new(
            parse_counter("upvotes", upvotes)?,
            parse_counter("downvotes", downvotes)?,
        ))
    })
    .transpose()
}

fn load_vote_direction(
    conn: &Connection,
    id: EngramId,
    device_id: &str,
) -> RepoResult<Option<VoteDirection>> {
    let vote_type = conn
        .query_row(
            "SELECT vote_type FROM votes WHERE engram_id = ?1 AND device_id = ?2;",
            params![id, device_id],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    vote_type.as_deref().map(parse_vote_type).transpose()
}

fn parse_engram_row(row: &Row<'_>) -> RepoResult<Engram> {
    let id: EngramId = row.get("id")?;
    let user_vote = match row.get::<_, Option<String>>("vote_type")? {
        Some(value) => Some(parse_vote_type(&value)?),
        None => None,
    };

    let engram = Engram {
        id,
        title: row.get("title")?,
        content: row.get("content")?,
        device_id: row.get("device_id")?,
        cluster: row.get("cluster")?,
        upvotes: parse_counter("upvotes", row.get("upvotes")?)?,
        downvotes: parse_counter("downvotes", row.get("downvotes")?)?,
        created_at: row.get("created_at")?,
        user_vote,
    };
    engram.validate().map_err(|err| {
        RepoError::InvalidData(format!("engram row {id} failed validation: {err}"))
    })?;
    Ok(engram)
}

fn parse_vote_type(value: &str) -> RepoResult<VoteDirection> {
    VoteDirection::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid vote type `{value}` in votes.vote_type"))
    })
}

fn parse_counter(column: &'static str, value: i64) -> RepoResult<u32> {
    u32::try_from(value).map_err(|_| {
        RepoError::InvalidData(format!("invalid counter `{value}` in engrams.{column}"))
    })
}
