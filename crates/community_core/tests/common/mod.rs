#![allow(dead_code)]

use async_trait::async_trait;
use community_core::auth::{AuthResult, IdentityProvider, SessionSubscription};
use community_core::store::{
    CollectionQuery, DocumentStore, RawDocument, Snapshot, SnapshotSubscription, StoreError,
    StoreResult, WriteFields,
};
use community_core::subscription::Subscription;
use community_core::{GenerationError, GenerationRequest, GenerativeTextService, Session};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;

/// Store double: records writes, lets the test push snapshots by hand.
#[derive(Default)]
pub struct ManualStore {
    pub inserts: Mutex<Vec<(String, WriteFields)>>,
    pub deletes: Mutex<Vec<(String, String)>>,
    pub fail_writes: AtomicBool,
    pub hang_writes: AtomicBool,
    listeners: Arc<Mutex<Vec<UnboundedSender<StoreResult<Snapshot>>>>>,
    pub subscribe_calls: AtomicUsize,
}

impl ManualStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.lock().unwrap().len()
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.lock().unwrap().len()
    }

    pub fn open_listeners(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Sends `event` to every open listener.
    pub fn push(&self, event: StoreResult<Snapshot>) {
        let listeners = self.listeners.lock().unwrap();
        match event {
            Ok(snapshot) => {
                for listener in listeners.iter() {
                    let _ = listener.send(Ok(snapshot.clone()));
                }
            }
            Err(err) => {
                for listener in listeners.iter() {
                    let _ = listener.send(Err(StoreError::Unavailable(err.to_string())));
                }
            }
        }
    }

    async fn write_gate(&self) -> StoreResult<()> {
        if self.hang_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("permission denied".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for ManualStore {
    async fn subscribe(&self, _query: &CollectionQuery) -> StoreResult<SnapshotSubscription> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let registry = Arc::clone(&self.listeners);
        let (sender, subscription) = Subscription::channel(move || {
            registry.lock().unwrap().retain(|sender| !sender.is_closed());
        });
        self.listeners.lock().unwrap().push(sender);
        Ok(subscription)
    }

    async fn insert(&self, collection: &str, fields: WriteFields) -> StoreResult<String> {
        self.write_gate().await?;
        let mut inserts = self.inserts.lock().unwrap();
        inserts.push((collection.to_string(), fields));
        Ok(format!("doc-{}", inserts.len()))
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.write_gate().await?;
        self.deletes
            .lock()
            .unwrap()
            .push((collection.to_string(), id.to_string()));
        Ok(())
    }
}

pub fn post_doc(id: &str, title: &str, created_at: Option<i64>) -> RawDocument {
    let value = json!({
        "title": title,
        "content": format!("<p>{title}</p>"),
        "author": "kim@example.com",
        "createdAt": created_at,
    });
    RawDocument {
        id: id.to_string(),
        data: value.as_object().cloned().unwrap(),
    }
}

pub fn snapshot(documents: Vec<RawDocument>) -> Snapshot {
    Snapshot { documents }
}

/// Generator double answering from a queue; can hold calls on a gate.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub replies: Mutex<VecDeque<Result<Value, GenerationError>>>,
    pub gate: Option<Arc<Notify>>,
    pub hang: bool,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn replying(replies: Vec<Result<Value, GenerationError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeTextService for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Network("no scripted reply".to_string())))
    }
}

/// Identity double whose session events are emitted by the test.
#[derive(Default)]
pub struct ManualIdentity {
    listeners: Mutex<Vec<UnboundedSender<Option<Session>>>>,
    pub subscriptions: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
}

impl ManualIdentity {
    pub fn emit(&self, session: Option<Session>) {
        for listener in self.listeners.lock().unwrap().iter() {
            let _ = listener.send(session.clone());
        }
    }
}

#[async_trait]
impl IdentityProvider for ManualIdentity {
    async fn sign_in(&self, email: &str, _password: &str) -> AuthResult<Session> {
        let session = Session::new("uid-1", Some(email.to_string()));
        self.emit(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Session> {
        self.sign_in(email, password).await
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.emit(None);
        Ok(())
    }

    fn subscribe_sessions(&self) -> SessionSubscription {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let (sender, subscription) = Subscription::channel(|| {});
        self.listeners.lock().unwrap().push(sender);
        subscription
    }
}
