//! Use-case services consumed by the front end.
//!
//! # Responsibility
//! - Orchestrate store and generator calls into view-level operations.
//! - Keep front ends decoupled from adapter details.

pub mod composer;
pub mod feed;
