//! Domain model for the community feed.
//!
//! # Invariants
//! - `Post` values are immutable once created; there is no edit path.
//! - `created_at` is assigned by the document store, never by the client.

pub mod post;
pub mod session;
