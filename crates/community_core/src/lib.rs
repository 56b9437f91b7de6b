//! Core logic for the community feed.
//! Front ends drive these services; persistence, identity and text
//! generation stay behind the `store`, `auth` and `assist` boundaries.

pub mod assist;
pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod richtext;
pub mod route;
pub mod service;
pub mod store;
pub mod subscription;

pub use assist::{
    GeminiClient, GenerationError, GenerationRequest, GenerativeTextService, PostSuggestion,
};
pub use auth::{
    AuthContext, AuthError, AuthState, FirebaseIdentityProvider, IdentityProvider, SessionHub,
};
pub use config::{AppConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::post::{NewPost, Post, PostId, PostValidationError, Timestamp};
pub use model::session::{author_label, Session};
pub use route::{GuardState, Route, RouteDecision};
pub use service::composer::{AssistOutcome, Composer, Draft, SubmitError};
pub use service::feed::{DeleteOutcome, FeedError, FeedSynchronizer, FeedUpdate};
pub use store::{DocumentStore, SqliteDocumentStore, StoreError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
