use community_core::db::migrations::latest_version;
use community_core::db::{open_db, DbError};
use community_core::store::document::{decode_snapshot, encode_new_post, FIELD_CREATED_AT};
use community_core::store::{CollectionQuery, DocumentStore, StoreError};
use community_core::{FeedSynchronizer, FeedUpdate, NewPost, SqliteDocumentStore};
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;

fn newest_first() -> CollectionQuery {
    CollectionQuery::newest_first("posts", FIELD_CREATED_AT)
}

#[tokio::test]
async fn posts_survive_reopening_the_store_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("community.sqlite3");

    let store = SqliteDocumentStore::open(&path).unwrap();
    let post = NewPost::new("Hello", "<p>World</p>", "kim@example.com").unwrap();
    let id = store.insert("posts", encode_new_post(&post)).await.unwrap();
    drop(store);

    let reopened = SqliteDocumentStore::open(&path).unwrap();
    let mut subscription = reopened.subscribe(&newest_first()).await.unwrap();
    let snapshot = subscription.try_next().unwrap().unwrap();
    let decoded = decode_snapshot(&snapshot);

    assert_eq!(decoded.posts.len(), 1);
    assert_eq!(decoded.posts[0].id, id);
    assert_eq!(decoded.posts[0].author, "kim@example.com");
    assert!(decoded.posts[0].created_at.is_some());
}

#[tokio::test]
async fn collections_are_isolated() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    let mut posts = store.subscribe(&newest_first()).await.unwrap();
    posts.try_next().unwrap().unwrap();

    let post = NewPost::new("elsewhere", "<p>x</p>", "a").unwrap();
    store.insert("drafts", encode_new_post(&post)).await.unwrap();

    assert!(posts.try_next().is_none());
}

#[tokio::test]
async fn deleting_missing_document_is_silent() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    let mut posts = store.subscribe(&newest_first()).await.unwrap();
    posts.try_next().unwrap().unwrap();

    store.delete("posts", "does-not-exist").await.unwrap();
    assert!(posts.try_next().is_none());
}

#[tokio::test]
async fn nested_order_field_is_rejected() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    let query = CollectionQuery::newest_first("posts", "meta.createdAt");

    let err = store.subscribe(&query).await.err().unwrap();
    assert!(matches!(err, StoreError::InvalidRequest(_)));
}

#[test]
fn store_file_from_newer_binary_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match SqliteDocumentStore::open(&path) {
        Err(StoreError::Db(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        })) => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("newer schema was accepted"),
    }
}

#[test]
fn open_db_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("community.sqlite3");

    drop(open_db(&path).unwrap());
    let conn = open_db(&path).unwrap();
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, latest_version());
}

#[tokio::test]
async fn refresh_picks_up_commits_from_another_connection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.sqlite3");
    let reader = SqliteDocumentStore::open(&path).unwrap();
    let writer = SqliteDocumentStore::open(&path).unwrap();

    let mut live = reader.subscribe(&newest_first()).await.unwrap();
    assert!(live.try_next().unwrap().unwrap().documents.is_empty());
    assert!(!reader.refresh().unwrap());

    let post = NewPost::new("from b", "<p>hi</p>", "lee@example.com").unwrap();
    writer.insert("posts", encode_new_post(&post)).await.unwrap();

    assert!(reader.refresh().unwrap());
    let snapshot = live.try_next().unwrap().unwrap();
    assert_eq!(snapshot.documents.len(), 1);
    assert!(!reader.refresh().unwrap());
}

#[tokio::test]
async fn own_writes_do_not_count_as_external() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteDocumentStore::open(dir.path().join("solo.sqlite3")).unwrap();

    let post = NewPost::new("mine", "<p>x</p>", "kim@example.com").unwrap();
    store.insert("posts", encode_new_post(&post)).await.unwrap();

    assert!(!store.refresh().unwrap());
}

#[tokio::test(start_paused = true)]
async fn feed_sees_posts_written_by_another_client() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.sqlite3");
    let client_a = Arc::new(SqliteDocumentStore::open(&path).unwrap());
    let client_b = SqliteDocumentStore::open(&path).unwrap();
    let _watcher = client_a.watch_external_changes(Duration::from_millis(200));

    let mut feed = FeedSynchronizer::new(Arc::clone(&client_a), "posts");
    feed.activate().await.unwrap();
    assert!(feed.posts().is_empty());

    let post = NewPost::new("hello from b", "<p>hi</p>", "lee@example.com").unwrap();
    client_b.insert("posts", encode_new_post(&post)).await.unwrap();

    let update = tokio::time::timeout(Duration::from_secs(3), feed.next_update())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(update, FeedUpdate::Replaced { count: 1, .. }));
    assert_eq!(feed.posts()[0].title, "hello from b");
}
