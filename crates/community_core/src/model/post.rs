//! Post domain model.
//!
//! # Invariants
//! - `title` is non-empty after trim.
//! - `content` is non-empty after stripping markup and trimming.
//! - `created_at == None` only while the server timestamp is pending.

use crate::richtext;
use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned document id.
pub type PostId = String;

/// Display text for a post whose server timestamp has not resolved yet.
pub const PENDING_TIME_LABEL: &str = "방금 전";

/// Server-assigned creation time in Unix epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// Short local rendering, e.g. `3월 14일 09:05`.
    pub fn to_local_label(self) -> String {
        match Local.timestamp_millis_opt(self.0).single() {
            Some(local) => local.format("%-m월 %-d일 %H:%M").to_string(),
            None => PENDING_TIME_LABEL.to_string(),
        }
    }
}

/// Rejected post input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostValidationError {
    EmptyTitle,
    /// Content has no visible text once markup is removed.
    EmptyContent,
}

impl Display for PostValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "post title must not be empty"),
            Self::EmptyContent => write!(f, "post content must not be empty"),
        }
    }
}

impl Error for PostValidationError {}

/// Checks the emptiness rules shared by every create path.
pub fn validate_post_input(title: &str, content: &str) -> Result<(), PostValidationError> {
    if title.trim().is_empty() {
        return Err(PostValidationError::EmptyTitle);
    }
    if richtext::is_blank(content) {
        return Err(PostValidationError::EmptyContent);
    }
    Ok(())
}

/// Validated input for one insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    /// HTML rich text, stored as given.
    pub content: String,
    pub author: String,
}

impl NewPost {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Result<Self, PostValidationError> {
        let title = title.into();
        let content = content.into();
        validate_post_input(&title, &content)?;
        Ok(Self {
            title,
            content,
            author: author.into(),
        })
    }
}

/// One feed entry mirrored from the live query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub author: String,
    pub created_at: Option<Timestamp>,
}

impl Post {
    /// First character of the author, uppercased; `?` when there is none.
    pub fn avatar_initial(&self) -> String {
        match self.author.trim().chars().next() {
            Some(first) => first.to_uppercase().collect(),
            None => "?".to_string(),
        }
    }

    pub fn time_label(&self) -> String {
        self.created_at
            .map(Timestamp::to_local_label)
            .unwrap_or_else(|| PENDING_TIME_LABEL.to_string())
    }

    pub fn plain_content(&self) -> String {
        richtext::to_plain_text(&self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::{Post, Timestamp, PENDING_TIME_LABEL};

    fn post(author: &str, created_at: Option<Timestamp>) -> Post {
        Post {
            id: "p1".to_string(),
            title: "t".to_string(),
            content: "<p>c</p>".to_string(),
            author: author.to_string(),
            created_at,
        }
    }

    #[test]
    fn avatar_initial_uppercases_first_char() {
        assert_eq!(post("kim@example.com", None).avatar_initial(), "K");
        assert_eq!(post("", None).avatar_initial(), "?");
    }

    #[test]
    fn pending_timestamp_shows_just_now() {
        assert_eq!(post("a", None).time_label(), PENDING_TIME_LABEL);
        let label = post("a", Some(Timestamp::from_millis(1_700_000_000_000))).time_label();
        assert!(label.contains('월'));
    }
}
