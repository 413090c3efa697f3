use std::fs;

use migration::MigratorTrait;
use reading_sync::{
    domain::models::{Progress, ReadStatus},
    remote::{RemoteService, sqlite::SqliteBridge},
    storage::library::LibraryScan,
    sync::{MissingRecordPolicy, RecordSync, RemoteHandleCache, SyncEngine, SyncOptions, build_update},
};
use sea_orm::Database;

const AUTHORITY: &str = "reading_state";

async fn bridge(dir: &tempfile::TempDir) -> SqliteBridge {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("store.sqlite").display());
    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    SqliteBridge::new(db, AUTHORITY)
}

#[tokio::test]
async fn update_round_trips_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = bridge(&dir).await;
    let mut cache = RemoteHandleCache::new();
    let key = "/books/dune.epub";
    let t = 1_700_000_123_456;

    let mut sync = RecordSync::new(&bridge, &mut cache, AUTHORITY);
    let seed = build_update(None, None, ReadStatus::New);
    assert_eq!(sync.insert(key, &seed).await.unwrap().as_deref(), Some(key));

    let payload = build_update(Progress::new(42, 100), Some(t), ReadStatus::Reading);
    assert_eq!(sync.apply(key, &payload).await.unwrap(), 1);

    let record = sync.fetch(key).await.unwrap().unwrap();
    assert_eq!(record.progress.as_deref(), Some("42/100"));
    assert_eq!(record.status, Some(ReadStatus::Reading));
    assert_eq!(record.last_access, Some(t));
}

#[tokio::test]
async fn marking_new_clears_stale_progress() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = bridge(&dir).await;
    let mut cache = RemoteHandleCache::new();
    let key = "/books/emma.epub";

    let mut sync = RecordSync::new(&bridge, &mut cache, AUTHORITY);
    let reading = build_update(Progress::new(7, 10), Some(5), ReadStatus::Reading);
    sync.insert(key, &reading).await.unwrap();
    sync.apply(key, &build_update(None, None, ReadStatus::New))
        .await
        .unwrap();

    let record = sync.fetch(key).await.unwrap().unwrap();
    assert_eq!(record.status, Some(ReadStatus::New));
    assert_eq!(record.progress, None);
    assert_eq!(record.last_access, None);
}

#[tokio::test]
async fn quotes_in_keys_match_only_their_own_row() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = bridge(&dir).await;
    let mut cache = RemoteHandleCache::new();
    let quoted = "/books/O'Brien.epub";
    let other = "/books/other.epub";

    let mut sync = RecordSync::new(&bridge, &mut cache, AUTHORITY);
    let seed = build_update(None, None, ReadStatus::New);
    sync.insert(quoted, &seed).await.unwrap();
    sync.insert(other, &seed).await.unwrap();

    let finished = build_update(Some(Progress::COMPLETE), Some(9), ReadStatus::Finished);
    assert_eq!(sync.apply(quoted, &finished).await.unwrap(), 1);
    assert_eq!(sync.apply("x' OR '1'='1", &finished).await.unwrap(), 0);

    let untouched = sync.fetch(other).await.unwrap().unwrap();
    assert_eq!(untouched.status, Some(ReadStatus::New));
    let record = sync.fetch(quoted).await.unwrap().unwrap();
    assert_eq!(record.status, Some(ReadStatus::Finished));
}

#[tokio::test]
async fn unknown_authority_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = bridge(&dir).await;
    assert!(bridge.acquire_client("elsewhere").await.is_err());

    let mut cache = RemoteHandleCache::new();
    let payload = build_update(None, None, ReadStatus::New);
    let result = RecordSync::new(&bridge, &mut cache, "elsewhere")
        .apply("/books/a.epub", &payload)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn library_pass_inserts_every_document() {
    let dir = tempfile::tempdir().unwrap();
    let library = dir.path().join("library");
    fs::create_dir_all(library.join("a.sdr")).unwrap();
    fs::write(library.join("a.epub"), "").unwrap();
    fs::write(
        library.join("a.sdr/metadata.json"),
        r#"{"summary":{"status":"reading"},"percent_finished":0.25,"last_read":77}"#,
    )
    .unwrap();
    fs::write(library.join("b.pdf"), "").unwrap();

    let options = SyncOptions {
        missing_record: MissingRecordPolicy::Insert,
        ..SyncOptions::default()
    };
    let mut engine = SyncEngine::new(bridge(&dir).await, options);
    let candidates = LibraryScan::new(&library).candidates().unwrap();
    let keys: Vec<String> = candidates.iter().map(|c| c.key.clone()).collect();

    let report = engine.reconcile_all(candidates).await;
    assert_eq!((report.updated, report.skipped), (2, 0));

    let mut cache = RemoteHandleCache::new();
    let mut sync = RecordSync::new(engine.service(), &mut cache, AUTHORITY);
    let a = sync.fetch(&keys[0]).await.unwrap().unwrap();
    assert_eq!(a.progress.as_deref(), Some("25/100"));
    assert_eq!(a.status, Some(ReadStatus::Reading));
    assert_eq!(a.last_access, Some(77));
    let b = sync.fetch(&keys[1]).await.unwrap().unwrap();
    assert_eq!(b.status, Some(ReadStatus::New));
    assert_eq!(b.progress, None);

    // a second pass finds the rows and updates them in place
    let again = engine
        .reconcile_all(LibraryScan::new(&library).candidates().unwrap())
        .await;
    assert_eq!((again.updated, again.skipped), (2, 0));
}
