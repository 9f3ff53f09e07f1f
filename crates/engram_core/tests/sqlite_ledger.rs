use engram_core::db::open_db_in_memory;
use engram_core::{
    Engram, EngramId, EngramPatch, EngramRepository, FixedDeviceId, NewEngram, RepoError,
    RepoResult, SqliteEngramRepository, VoteDirection,
};
use rusqlite::Connection;
use std::time::{SystemTime, UNIX_EPOCH};

fn add_as(conn: &mut Connection, device: &str, new_engram: NewEngram) -> Engram {
    let mut repo = SqliteEngramRepository::try_new(conn, FixedDeviceId::new(device)).unwrap();
    repo.add_engram(&new_engram).unwrap()
}

fn vote_as(
    conn: &mut Connection,
    device: &str,
    id: EngramId,
    direction: VoteDirection,
) -> RepoResult<Engram> {
    let mut repo = SqliteEngramRepository::try_new(conn, FixedDeviceId::new(device)).unwrap();
    repo.vote_engram(id, direction)
}

fn vote_row_count(conn: &Connection, id: EngramId, device: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM votes WHERE engram_id = ?1 AND device_id = ?2;",
        rusqlite::params![id, device],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn up_up_down_sequence_reconciles_vote_row_and_counters() {
    let mut conn = open_db_in_memory().unwrap();
    let engram = add_as(&mut conn, "author", NewEngram::new("hello", "world"));
    assert_eq!((engram.upvotes, engram.downvotes), (0, 0));

    let first = vote_as(&mut conn, "d1", engram.id, VoteDirection::Up).unwrap();
    assert_eq!((first.upvotes, first.downvotes), (1, 0));
    assert_eq!(first.user_vote, Some(VoteDirection::Up));
    assert_eq!(vote_row_count(&conn, engram.id, "d1"), 1);

    let second = vote_as(&mut conn, "d1", engram.id, VoteDirection::Up).unwrap();
    assert_eq!((second.upvotes, second.downvotes), (0, 0));
    assert_eq!(second.user_vote, None);
    assert_eq!(vote_row_count(&conn, engram.id, "d1"), 0);

    let third = vote_as(&mut conn, "d1", engram.id, VoteDirection::Down).unwrap();
    assert_eq!((third.upvotes, third.downvotes), (0, 1));
    assert_eq!(third.user_vote, Some(VoteDirection::Down));
    assert_eq!(vote_row_count(&conn, engram.id, "d1"), 1);
}

#[test]
fn switching_direction_updates_the_single_vote_row() {
    let mut conn = open_db_in_memory().unwrap();
    let engram = add_as(&mut conn, "author", NewEngram::new("switch", "me"));

    vote_as(&mut conn, "d1", engram.id, VoteDirection::Up).unwrap();
    let switched = vote_as(&mut conn, "d1", engram.id, VoteDirection::Down).unwrap();
    assert_eq!((switched.upvotes, switched.downvotes), (0, 1));

    let repo = SqliteEngramRepository::try_new(&mut conn, FixedDeviceId::new("d1")).unwrap();
    let votes = repo.votes_for_engram(engram.id).unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].device_id, "d1");
    assert_eq!(votes[0].direction, VoteDirection::Down);
}

#[test]
fn two_devices_vote_independently() {
    let mut conn = open_db_in_memory().unwrap();
    let engram = add_as(&mut conn, "author", NewEngram::new("popular", "post"));

    let after_first = vote_as(&mut conn, "d1", engram.id, VoteDirection::Up).unwrap();
    let after_second = vote_as(&mut conn, "d2", engram.id, VoteDirection::Up).unwrap();
    assert_eq!(after_first.upvotes, 1);
    assert_eq!(after_second.upvotes, 2);
    assert_eq!(after_second.user_vote, Some(VoteDirection::Up));

    let observer = SqliteEngramRepository::try_new(&mut conn, FixedDeviceId::new("d3")).unwrap();
    let seen = observer.get_engram(engram.id).unwrap().unwrap();
    assert_eq!(seen.upvotes, 2);
    assert_eq!(seen.user_vote, None);
}

#[test]
fn vote_on_missing_engram_is_not_found_and_writes_nothing() {
    let mut conn = open_db_in_memory().unwrap();
    let engram = add_as(&mut conn, "author", NewEngram::new("only", "one"));

    let err = vote_as(&mut conn, "d1", engram.id + 100, VoteDirection::Up).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == engram.id + 100));

    let votes: i64 = conn
        .query_row("SELECT COUNT(*) FROM votes;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(votes, 0);
}

#[test]
fn drifted_zero_counter_does_not_go_negative_on_retract() {
    let mut conn = open_db_in_memory().unwrap();
    let engram = add_as(&mut conn, "author", NewEngram::new("drift", "case"));
    vote_as(&mut conn, "d1", engram.id, VoteDirection::Up).unwrap();
    conn.execute(
        "UPDATE engrams SET upvotes = 0 WHERE id = ?1;",
        [engram.id],
    )
    .unwrap();

    let retracted = vote_as(&mut conn, "d1", engram.id, VoteDirection::Up).unwrap();
    assert_eq!((retracted.upvotes, retracted.downvotes), (0, 0));
    assert_eq!(retracted.user_vote, None);
}

#[test]
fn failed_counter_update_rolls_back_vote_row() {
    let mut conn = open_db_in_memory().unwrap();
    let engram = add_as(&mut conn, "author", NewEngram::new("atomic", "vote"));
    conn.execute_batch(
        "CREATE TRIGGER reject_counter_update
         BEFORE UPDATE OF upvotes ON engrams
         BEGIN
            SELECT RAISE(ABORT, 'counter updates disabled');
         END;",
    )
    .unwrap();

    let err = vote_as(&mut conn, "d1", engram.id, VoteDirection::Up).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
    assert_eq!(vote_row_count(&conn, engram.id, "d1"), 0);
}

#[test]
fn blank_title_row_is_invalid_data() {
    let mut conn = open_db_in_memory().unwrap();
    let engram = add_as(&mut conn, "author", NewEngram::new("bad", "row"));
    conn.execute(
        "UPDATE engrams SET title = '   ' WHERE id = ?1;",
        [engram.id],
    )
    .unwrap();

    let repo = SqliteEngramRepository::try_new(&mut conn, FixedDeviceId::new("d1")).unwrap();
    let err = repo.get_engram(engram.id).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn list_filters_by_cluster_and_orders_newest_first() {
    let mut conn = open_db_in_memory().unwrap();
    let first = add_as(&mut conn, "a", NewEngram::new("one", "1").with_cluster("ideas"));
    let second = add_as(&mut conn, "a", NewEngram::new("two", "2"));
    let third = add_as(&mut conn, "a", NewEngram::new("three", "3").with_cluster("ideas"));
    conn.execute("UPDATE engrams SET created_at = 1000 WHERE id = ?1;", [first.id])
        .unwrap();
    conn.execute("UPDATE engrams SET created_at = 2000 WHERE id = ?1;", [second.id])
        .unwrap();
    conn.execute("UPDATE engrams SET created_at = 3000 WHERE id = ?1;", [third.id])
        .unwrap();

    let repo = SqliteEngramRepository::try_new(&mut conn, FixedDeviceId::new("a")).unwrap();
    let all = repo.list_engrams(None).unwrap();
    assert_eq!(
        all.iter().map(|engram| engram.id).collect::<Vec<_>>(),
        vec![third.id, second.id, first.id]
    );
    assert_eq!(repo.list_engrams(Some("all")).unwrap().len(), 3);

    let ideas = repo.list_engrams(Some("ideas")).unwrap();
    assert_eq!(
        ideas.iter().map(|engram| engram.id).collect::<Vec<_>>(),
        vec![third.id, first.id]
    );
    assert!(repo.list_engrams(Some("missing")).unwrap().is_empty());
}

fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

#[test]
fn engram_and_vote_timestamps_have_millisecond_resolution() {
    let mut conn = open_db_in_memory().unwrap();
    let before = wall_clock_ms();
    let engram = add_as(&mut conn, "author", NewEngram::new("timed", "post"));
    vote_as(&mut conn, "d1", engram.id, VoteDirection::Up).unwrap();
    let after = wall_clock_ms();

    assert!((before..=after).contains(&engram.created_at));
    let repo = SqliteEngramRepository::try_new(&mut conn, FixedDeviceId::new("d1")).unwrap();
    let votes = repo.votes_for_engram(engram.id).unwrap();
    assert_eq!(votes.len(), 1);
    assert!((before..=after).contains(&votes[0].created_at));
}

#[test]
fn add_records_author_device_and_default_cluster() {
    let mut conn = open_db_in_memory().unwrap();
    let engram = add_as(&mut conn, "author-1", NewEngram::new(" title ", " body "));
    assert_eq!(engram.device_id.as_deref(), Some("author-1"));
    assert_eq!(engram.cluster, "general");
    assert_eq!(engram.title, "title");
    assert_eq!(engram.content, "body");
    assert_eq!(engram.user_vote, None);
}

#[test]
fn update_patches_fields_and_keeps_device_vote() {
    let mut conn = open_db_in_memory().unwrap();
    let engram = add_as(&mut conn, "d1", NewEngram::new("draft", "body"));
    vote_as(&mut conn, "d1", engram.id, VoteDirection::Down).unwrap();

    let mut repo = SqliteEngramRepository::try_new(&mut conn, FixedDeviceId::new("d1")).unwrap();
    let patch = EngramPatch {
        title: Some("final".to_string()),
        cluster: Some("news".to_string()),
        ..EngramPatch::default()
    };
    let updated = repo.update_engram(engram.id, &patch).unwrap();
    assert_eq!(updated.title, "final");
    assert_eq!(updated.content, "body");
    assert_eq!(updated.cluster, "news");
    assert_eq!(updated.downvotes, 1);
    assert_eq!(updated.user_vote, Some(VoteDirection::Down));
    assert_eq!(updated.created_at, engram.created_at);

    let missing = repo.update_engram(engram.id + 1, &patch).unwrap_err();
    assert!(missing.is_not_found());
    let empty = repo
        .update_engram(engram.id, &EngramPatch::default())
        .unwrap_err();
    assert!(matches!(empty, RepoError::Validation(_)));
}

#[test]
fn delete_cascades_to_vote_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let engram = add_as(&mut conn, "author", NewEngram::new("gone", "soon"));
    vote_as(&mut conn, "d1", engram.id, VoteDirection::Up).unwrap();
    vote_as(&mut conn, "d2", engram.id, VoteDirection::Down).unwrap();

    {
        let mut repo =
            SqliteEngramRepository::try_new(&mut conn, FixedDeviceId::new("author")).unwrap();
        repo.delete_engram(engram.id).unwrap();
        assert!(repo.get_engram(engram.id).unwrap().is_none());
        assert!(repo.delete_engram(engram.id).unwrap_err().is_not_found());
    }

    let votes: i64 = conn
        .query_row("SELECT COUNT(*) FROM votes;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(votes, 0);
}

#[test]
fn unmigrated_connection_is_rejected() {
    let mut conn = Connection::open_in_memory().unwrap();
    let err = SqliteEngramRepository::try_new(&mut conn, FixedDeviceId::new("d1"))
        .err()
        .unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}
