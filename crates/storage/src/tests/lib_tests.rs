use super::*;

#[tokio::test]
async fn stores_and_reads_back_values() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("session", b"{\"a\":1}").await.expect("set");
    let value = storage.get("session").await.expect("get");
    assert_eq!(value.as_deref(), Some(&b"{\"a\":1}"[..]));
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn set_overwrites_existing_key() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("settings", b"first").await.expect("first");
    storage.set("settings", b"second").await.expect("second");
    let value = storage.get("settings").await.expect("get");
    assert_eq!(value.as_deref(), Some(&b"second"[..]));
}

#[tokio::test]
async fn remove_deletes_key_and_tolerates_missing() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("contacts", b"[]").await.expect("set");
    storage.remove("contacts").await.expect("remove");
    storage.remove("contacts").await.expect("remove again");
    assert!(storage.get("contacts").await.expect("get").is_none());
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("client.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    storage.set("session", b"x").await.expect("set");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn json_helpers_round_trip_and_skip_corrupt_records() {
    let store = MemoryStore::new();
    save_json(&store, "numbers", &vec![1, 2, 3])
        .await
        .expect("save");
    let loaded: Option<Vec<i32>> = load_json(&store, "numbers").await.expect("load");
    assert_eq!(loaded, Some(vec![1, 2, 3]));

    store.set("numbers", b"not json").await.expect("corrupt");
    let loaded: Option<Vec<i32>> = load_json(&store, "numbers").await.expect("load corrupt");
    assert_eq!(loaded, None);

    let missing: Option<Vec<i32>> = load_json(&store, "absent").await.expect("load missing");
    assert_eq!(missing, None);
}

#[test]
fn memory_urls_have_no_parent_dir() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(sqlite_path("sqlite://file:client?mode=memory&cache=shared"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/client.db?mode=rwc"),
        Some(PathBuf::from("./data/client.db"))
    );
}
