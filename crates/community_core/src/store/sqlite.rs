//! SQLite-backed live document collection.
//!
//! # Responsibility
//! - Persist JSON documents per collection with a store-assigned sequence.
//! - Resolve server timestamps with the store clock at write time.
//! - Push a full snapshot to every open listener after each committed write.
//! - Pick up commits made by other connections to the same file.
//!
//! # Invariants
//! - New listeners receive their initial snapshot before `subscribe` returns.
//! - Closing a subscription removes its listener; closed senders are pruned.
//! - Descending queries break ties by newest insertion first.
//! - `data_version` only moves for commits from other connections.

use crate::db::{open_db, open_db_in_memory};
use crate::store::{
    CollectionQuery, Direction, DocumentStore, RawDocument, Snapshot, SnapshotSubscription,
    StoreError, StoreResult, WriteFields, WriteValue,
};
use crate::subscription::Subscription;
use async_trait::async_trait;
use log::{debug, info, warn};
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

type Clock = Box<dyn FnMut() -> i64 + Send>;

struct Listener {
    id: u64,
    query: CollectionQuery,
    sender: UnboundedSender<StoreResult<Snapshot>>,
}

struct StoreInner {
    conn: Connection,
    listeners: Vec<Listener>,
    next_listener_id: u64,
    clock: Clock,
    /// Last `PRAGMA data_version` seen by `refresh`.
    data_version: i64,
}

/// Local document store with live queries.
pub struct SqliteDocumentStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl SqliteDocumentStore {
    /// Opens (or creates) a store file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a throwaway store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps a migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        let data_version = read_data_version(&conn).unwrap_or_default();
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                conn,
                listeners: Vec::new(),
                next_listener_id: 1,
                clock: Box::new(|| chrono::Utc::now().timestamp_millis()),
                data_version,
            })),
        }
    }

    /// Replaces the server clock (epoch milliseconds).
    pub fn with_clock(self, clock: impl FnMut() -> i64 + Send + 'static) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.clock = Box::new(clock);
        }
        self
    }

    /// Number of open live queries.
    pub fn listener_count(&self) -> usize {
        self.lock().map_or(0, |inner| inner.listeners.len())
    }

    /// Re-queries every listener when another connection committed since
    /// the last call. Returns whether anything was pushed.
    pub fn refresh(&self) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        let version = read_data_version(&inner.conn)?;
        if version == inner.data_version {
            return Ok(false);
        }
        inner.data_version = version;
        debug!(
            "event=external_change module=store status=ok data_version={} open={}",
            version,
            inner.listeners.len()
        );
        notify_listeners(&mut inner, None);
        Ok(true)
    }

    /// Polls for external commits every `every` until the store is dropped.
    ///
    /// Must be called inside a tokio runtime.
    pub fn watch_external_changes(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                "event=external_watch module=store status=start interval_ms={}",
                every.as_millis()
            );
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                if let Err(err) = store.refresh() {
                    warn!("event=external_watch module=store status=error error={err}");
                }
            }
            debug!("event=external_watch module=store status=stopped");
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, StoreInner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn register(&self, query: &CollectionQuery) -> StoreResult<SnapshotSubscription> {
        let order_path = order_path(&query.order_by)?;
        let mut inner = self.lock()?;
        let initial = run_query(&inner.conn, query, &order_path)?;

        let listener_id = inner.next_listener_id;
        inner.next_listener_id += 1;

        let weak: Weak<Mutex<StoreInner>> = Arc::downgrade(&self.inner);
        let (sender, subscription) = Subscription::channel(move || {
            if let Some(inner) = weak.upgrade() {
                if let Ok(mut inner) = inner.lock() {
                    inner.listeners.retain(|listener| listener.id != listener_id);
                    debug!(
                        "event=listener_close module=store status=ok listener_id={} open={}",
                        listener_id,
                        inner.listeners.len()
                    );
                }
            }
        });

        // Receiver is alive here, so the initial send cannot fail.
        let _ = sender.send(Ok(initial));
        inner.listeners.push(Listener {
            id: listener_id,
            query: query.clone(),
            sender,
        });
        info!(
            "event=listener_open module=store status=ok listener_id={} collection={} open={}",
            listener_id,
            query.collection,
            inner.listeners.len()
        );
        Ok(subscription)
    }

    fn insert_now(&self, collection: &str, fields: WriteFields) -> StoreResult<String> {
        if collection.trim().is_empty() {
            return Err(StoreError::InvalidRequest(
                "collection name must not be empty".to_string(),
            ));
        }

        let mut inner = self.lock()?;
        let now = (inner.clock)();
        let mut body = Map::new();
        for (name, value) in fields {
            let resolved = match value {
                WriteValue::Text(text) => Value::String(text),
                WriteValue::ServerTimestamp => Value::from(now),
            };
            body.insert(name, resolved);
        }

        let doc_id = Uuid::new_v4().simple().to_string();
        inner.conn.execute(
            "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3);",
            params![collection, doc_id, serde_json::to_string(&body)?],
        )?;
        notify_listeners(&mut inner, Some(collection));
        Ok(doc_id)
    }

    fn delete_now(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let changed = inner.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND doc_id = ?2;",
            params![collection, id],
        )?;
        if changed > 0 {
            notify_listeners(&mut inner, Some(collection));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn subscribe(&self, query: &CollectionQuery) -> StoreResult<SnapshotSubscription> {
        self.register(query)
    }

    async fn insert(&self, collection: &str, fields: WriteFields) -> StoreResult<String> {
        self.insert_now(collection, fields)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.delete_now(collection, id)
    }
}

/// Re-queries listeners on `collection`, or all of them when `None`.
fn notify_listeners(inner: &mut StoreInner, collection: Option<&str>) {
    let StoreInner {
        conn, listeners, ..
    } = inner;

    listeners.retain(|listener| {
        if collection.is_some_and(|name| listener.query.collection != name) {
            return true;
        }
        let snapshot = order_path(&listener.query.order_by)
            .and_then(|path| run_query(conn, &listener.query, &path));
        if let Err(err) = &snapshot {
            warn!(
                "event=listener_notify module=store status=error listener_id={} error={}",
                listener.id, err
            );
        }
        listener.sender.send(snapshot).is_ok()
    });
}

fn read_data_version(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row("PRAGMA data_version;", [], |row| row.get(0))?)
}

/// JSON path for an order-by field; nested or quoted paths are rejected.
fn order_path(field: &str) -> StoreResult<String> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid {
        return Err(StoreError::InvalidRequest(format!(
            "unsupported order-by field `{field}`"
        )));
    }
    Ok(format!("$.{field}"))
}

fn run_query(conn: &Connection, query: &CollectionQuery, order_path: &str) -> StoreResult<Snapshot> {
    let sql = match query.direction {
        Direction::Descending => {
            "SELECT doc_id, body FROM documents
             WHERE collection = ?1
             ORDER BY (json_extract(body, ?2) IS NULL) DESC, json_extract(body, ?2) DESC, seq DESC;"
        }
        Direction::Ascending => {
            "SELECT doc_id, body FROM documents
             WHERE collection = ?1
             ORDER BY json_extract(body, ?2) ASC, seq ASC;"
        }
    };

    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params![query.collection, order_path])?;
    let mut documents = Vec::new();
    while let Some(row) = rows.next()? {
        let id: String = row.get("doc_id")?;
        let body: String = row.get("body")?;
        let data = match serde_json::from_str::<Value>(&body)? {
            Value::Object(map) => map,
            _ => {
                return Err(StoreError::Unavailable(format!(
                    "document {id} body is not a json object"
                )))
            }
        };
        documents.push(RawDocument { id, data });
    }
    Ok(Snapshot { documents })
}
