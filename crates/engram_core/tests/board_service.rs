use engram_core::db::open_db_in_memory;
use engram_core::{
    BoardService, EngramPatch, EngramRepository, FixedDeviceId, LocalEngramRepository,
    MemoryStore, NewEngram, RepoError, SqliteEngramRepository, VoteDirection,
};

fn exercise_board<R: EngramRepository>(mut service: BoardService<R>) {
    let engram = service
        .add_engram(&NewEngram::new("ship it", "friday deploy").with_cluster("ops"))
        .unwrap();
    assert_eq!(engram.cluster, "ops");
    assert_eq!(engram.user_vote, None);

    let voted = service.vote_engram(engram.id, VoteDirection::Up).unwrap();
    assert_eq!((voted.upvotes, voted.downvotes), (1, 0));
    let switched = service.vote_engram(engram.id, VoteDirection::Down).unwrap();
    assert_eq!((switched.upvotes, switched.downvotes), (0, 1));
    let retracted = service.vote_engram(engram.id, VoteDirection::Down).unwrap();
    assert_eq!((retracted.upvotes, retracted.downvotes), (0, 0));
    assert_eq!(retracted.user_vote, None);

    let renamed = service
        .update_engram(
            engram.id,
            &EngramPatch {
                title: Some("ship it monday".to_string()),
                ..EngramPatch::default()
            },
        )
        .unwrap();
    assert_eq!(renamed.title, "ship it monday");

    assert_eq!(service.get_engrams(Some("ops")).unwrap().len(), 1);
    assert!(service.get_engrams(Some("general")).unwrap().is_empty());

    service.delete_engram(engram.id).unwrap();
    assert!(service.get_engram(engram.id).unwrap().is_none());
}

fn assert_errors_pass_through<R: EngramRepository>(mut service: BoardService<R>) {
    let missing = service.vote_engram(404, VoteDirection::Up).unwrap_err();
    assert!(matches!(missing, RepoError::NotFound(404)));
    assert_eq!(missing.error_code(), "not_found");

    let invalid = service
        .add_engram(&NewEngram::new("title", "   "))
        .unwrap_err();
    assert!(matches!(invalid, RepoError::Validation(_)));
    assert_eq!(invalid.error_code(), "invalid_input");

    assert!(service.delete_engram(404).unwrap_err().is_not_found());
}

#[test]
fn local_backend_serves_full_board_surface() {
    let store = MemoryStore::new();
    let service = BoardService::new(LocalEngramRepository::new(
        &store,
        FixedDeviceId::new("device_local"),
    ));
    assert_eq!(service.repository().backend(), "local");
    exercise_board(service);
}

#[test]
fn sqlite_backend_serves_full_board_surface() {
    let mut conn = open_db_in_memory().unwrap();
    let repo =
        SqliteEngramRepository::try_new(&mut conn, FixedDeviceId::new("device_remote")).unwrap();
    let service = BoardService::new(repo);
    assert_eq!(service.repository().backend(), "sqlite");
    exercise_board(service);
}

#[test]
fn local_backend_errors_reach_caller_unchanged() {
    let store = MemoryStore::new();
    assert_errors_pass_through(BoardService::new(LocalEngramRepository::new(
        &store,
        FixedDeviceId::new("d1"),
    )));
}

#[test]
fn sqlite_backend_errors_reach_caller_unchanged() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEngramRepository::try_new(&mut conn, FixedDeviceId::new("d1")).unwrap();
    assert_errors_pass_through(BoardService::new(repo));
}

#[test]
fn unavailable_local_storage_is_reported_as_storage_failure() {
    let store = MemoryStore::new();
    store.set_enabled(false);
    let service = BoardService::new(LocalEngramRepository::new(&store, FixedDeviceId::new("d1")));

    let err = service.get_engrams(None).unwrap_err();
    assert!(matches!(err, RepoError::StorageUnavailable(_)));
    assert!(!err.is_not_found());
}
