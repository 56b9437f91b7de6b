//! Feed synchronizer: live mirror of the post collection plus mutations.
//!
//! # Responsibility
//! - Hold at most one live query while the feed view is active.
//! - Replace the in-memory feed wholesale on every snapshot.
//! - Issue create/delete against the store without touching the mirror.
//!
//! # Invariants
//! - `posts` changes only through snapshots; mutations never patch it.
//! - `posts` is ordered by `created_at` DESC, pending first, store order on ties.
//! - Create never reaches the store with a blank title or content.

use crate::model::post::{NewPost, Post, PostId, PostValidationError};
use crate::store::document::{decode_snapshot, encode_new_post, FIELD_CREATED_AT};
use crate::store::{
    CollectionQuery, DocumentStore, Snapshot, SnapshotSubscription, StoreError, StoreResult,
};
use log::{error, info, warn};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Confirmation text shown before a delete.
pub const DELETE_CONFIRM_PROMPT: &str = "이 게시글을 삭제하시겠습니까?";

/// Feed operation failure.
#[derive(Debug)]
pub enum FeedError {
    Validation(PostValidationError),
    Store(StoreError),
    /// Store call did not complete within the mutation timeout.
    Timeout(Duration),
}

impl Display for FeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Timeout(after) => {
                write!(f, "document store did not answer within {}s", after.as_secs())
            }
        }
    }
}

impl Error for FeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Timeout(_) => None,
        }
    }
}

impl From<PostValidationError> for FeedError {
    fn from(value: PostValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for FeedError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Result of applying one live-query notification.
#[derive(Debug)]
pub enum FeedUpdate {
    /// Feed replaced with the snapshot; `rejected` documents failed validation.
    Replaced { count: usize, rejected: usize },
    /// Listener reported an error; the feed kept its previous contents.
    ListenerFailed(StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// User declined the confirmation; nothing was sent to the store.
    Cancelled,
}

pub struct FeedSynchronizer<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    query: CollectionQuery,
    subscription: Option<SnapshotSubscription>,
    posts: Vec<Post>,
    mutation_timeout: Option<Duration>,
}

impl<S: DocumentStore + ?Sized> FeedSynchronizer<S> {
    /// Feed over `collection`, newest first by `createdAt`.
    pub fn new(store: Arc<S>, collection: impl Into<String>) -> Self {
        Self {
            store,
            query: CollectionQuery::newest_first(collection, FIELD_CREATED_AT),
            subscription: None,
            posts: Vec::new(),
            mutation_timeout: None,
        }
    }

    /// Bounds every create/delete call; `None` waits indefinitely.
    pub fn with_mutation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.mutation_timeout = timeout;
        self
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Opens the live query. A second call while active is a no-op.
    pub async fn activate(&mut self) -> Result<(), FeedError> {
        if self.subscription.is_some() {
            return Ok(());
        }

        let mut subscription = self.store.subscribe(&self.query).await.map_err(|err| {
            error!(
                "event=feed_subscribe module=feed status=error collection={} error={}",
                self.query.collection, err
            );
            FeedError::Store(err)
        })?;
        info!(
            "event=feed_subscribe module=feed status=ok collection={}",
            self.query.collection
        );

        while let Some(event) = subscription.try_next() {
            self.apply_event(event);
        }
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Closes the live query and drops the mirrored feed.
    pub fn deactivate(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.close();
            info!(
                "event=feed_unsubscribe module=feed status=ok collection={}",
                self.query.collection
            );
        }
        self.posts.clear();
    }

    /// Waits for the next notification and applies it.
    ///
    /// Returns `None` when inactive or when the store ended the subscription.
    pub async fn next_update(&mut self) -> Option<FeedUpdate> {
        let subscription = self.subscription.as_mut()?;
        match subscription.next().await {
            Some(event) => Some(self.apply_event(event)),
            None => {
                warn!(
                    "event=feed_listener module=feed status=closed collection={}",
                    self.query.collection
                );
                self.subscription = None;
                None
            }
        }
    }

    /// Replaces the feed with `snapshot`, re-derived from scratch.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) -> FeedUpdate {
        let decoded = decode_snapshot(snapshot);
        let mut posts = decoded.posts;
        sort_newest_first(&mut posts);
        self.posts = posts;
        FeedUpdate::Replaced {
            count: self.posts.len(),
            rejected: decoded.rejected.len(),
        }
    }

    fn apply_event(&mut self, event: StoreResult<Snapshot>) -> FeedUpdate {
        match event {
            Ok(snapshot) => self.apply_snapshot(&snapshot),
            Err(err) => {
                error!(
                    "event=feed_listener module=feed status=error collection={} error={}",
                    self.query.collection, err
                );
                FeedUpdate::ListenerFailed(err)
            }
        }
    }

    /// Inserts one post with a server timestamp.
    ///
    /// The new post shows up through the next snapshot, not here.
    pub async fn create_post(
        &self,
        title: &str,
        content: &str,
        author: &str,
    ) -> Result<PostId, FeedError> {
        let new_post = NewPost::new(title, content, author).map_err(|err| {
            warn!("event=post_create module=feed status=rejected reason={err}");
            FeedError::Validation(err)
        })?;

        let started_at = Instant::now();
        let insert = self
            .store
            .insert(&self.query.collection, encode_new_post(&new_post));
        match bounded(self.mutation_timeout, insert).await {
            Ok(id) => {
                info!(
                    "event=post_create module=feed status=ok post_id={} duration_ms={}",
                    id,
                    started_at.elapsed().as_millis()
                );
                Ok(id)
            }
            Err(err) => {
                error!(
                    "event=post_create module=feed status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Deletes one post after `confirm` approves `DELETE_CONFIRM_PROMPT`.
    ///
    /// The post disappears through the next snapshot; on failure it stays.
    pub async fn delete_post(
        &self,
        id: &str,
        confirm: impl FnOnce(&str) -> bool,
    ) -> Result<DeleteOutcome, FeedError> {
        if !confirm(DELETE_CONFIRM_PROMPT) {
            info!("event=post_delete module=feed status=cancelled post_id={id}");
            return Ok(DeleteOutcome::Cancelled);
        }

        let started_at = Instant::now();
        let delete = self.store.delete(&self.query.collection, id);
        match bounded(self.mutation_timeout, delete).await {
            Ok(()) => {
                info!(
                    "event=post_delete module=feed status=ok post_id={} duration_ms={}",
                    id,
                    started_at.elapsed().as_millis()
                );
                Ok(DeleteOutcome::Deleted)
            }
            Err(err) => {
                error!(
                    "event=post_delete module=feed status=error post_id={} duration_ms={} error={}",
                    id,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }
}

impl<S: DocumentStore + ?Sized> Drop for FeedSynchronizer<S> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

async fn bounded<T>(
    limit: Option<Duration>,
    call: impl Future<Output = StoreResult<T>>,
) -> Result<T, FeedError> {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(FeedError::Store),
            Err(_) => Err(FeedError::Timeout(limit)),
        },
        None => call.await.map_err(FeedError::Store),
    }
}

/// Stable sort: pending timestamps first, then newest first.
fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|left, right| match (left.created_at, right.created_at) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => right.cmp(&left),
    });
}
