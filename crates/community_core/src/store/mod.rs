//! Document store boundary.
//!
//! # Responsibility
//! - Define the live-query / insert / delete contract the feed consumes.
//! - Carry untyped documents up to the validation step in `document`.
//!
//! # Invariants
//! - Every snapshot is the complete current result of its query.
//! - `WriteValue::ServerTimestamp` is resolved by the store at write time.
//! - Snapshots for one subscription arrive in the order the store emits them.

use crate::db::DbError;
use crate::subscription::Subscription;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod document;
pub mod sqlite;

pub use document::{decode_post, decode_snapshot, DecodedSnapshot, DocumentError};
pub use sqlite::SqliteDocumentStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Live subscription yielding full snapshots or listener failures.
pub type SnapshotSubscription = Subscription<StoreResult<Snapshot>>;

/// Document store failure.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Store backend cannot serve requests (lock poisoned, connection gone).
    Unavailable(String),
    /// Request rejected before reaching storage.
    InvalidRequest(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Unavailable(message) => write!(f, "document store unavailable: {message}"),
            Self::InvalidRequest(message) => write!(f, "invalid document request: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Db(DbError::Json(value))
    }
}

/// Sort direction for an ordered query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Ordered query over one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionQuery {
    pub collection: String,
    pub order_by: String,
    pub direction: Direction,
}

impl CollectionQuery {
    /// Newest-first query on `order_by`.
    pub fn newest_first(collection: impl Into<String>, order_by: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            order_by: order_by.into(),
            direction: Direction::Descending,
        }
    }
}

/// Field value accepted by `DocumentStore::insert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteValue {
    Text(String),
    /// Replaced with the store's clock when the write commits.
    ServerTimestamp,
}

pub type WriteFields = BTreeMap<String, WriteValue>;

/// Untyped document as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub data: Map<String, Value>,
}

/// Complete result of a live query at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub documents: Vec<RawDocument>,
}

/// Real-time document collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Opens a live query. The first snapshot is delivered right away and a
    /// fresh one after every committed change.
    async fn subscribe(&self, query: &CollectionQuery) -> StoreResult<SnapshotSubscription>;

    /// Inserts one document and returns its store-assigned id.
    async fn insert(&self, collection: &str, fields: WriteFields) -> StoreResult<String>;

    /// Deletes one document by id. Deleting a missing id is not an error.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;
}
