//! Validation of untyped store documents into `Post` values.
//!
//! # Responsibility
//! - Check required fields and types at the store boundary.
//! - Coerce the several timestamp encodings into `Timestamp`.
//!
//! # Invariants
//! - Decoding never reorders documents.
//! - One bad document never hides the others in its snapshot.

use crate::model::post::{NewPost, Post, Timestamp};
use crate::model::session::ANONYMOUS_AUTHOR;
use crate::store::{RawDocument, Snapshot, WriteFields, WriteValue};
use chrono::DateTime;
use log::warn;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const FIELD_TITLE: &str = "title";
pub const FIELD_CONTENT: &str = "content";
pub const FIELD_AUTHOR: &str = "author";
pub const FIELD_CREATED_AT: &str = "createdAt";

/// Document that does not have the shape of a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    MissingField {
        id: String,
        field: &'static str,
    },
    WrongType {
        id: String,
        field: &'static str,
        expected: &'static str,
    },
    BadTimestamp {
        id: String,
        detail: String,
    },
}

impl Display for DocumentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { id, field } => {
                write!(f, "document {id} is missing field `{field}`")
            }
            Self::WrongType {
                id,
                field,
                expected,
            } => write!(f, "document {id} field `{field}` must be {expected}"),
            Self::BadTimestamp { id, detail } => {
                write!(f, "document {id} has an unreadable timestamp: {detail}")
            }
        }
    }
}

impl Error for DocumentError {}

/// Snapshot contents after boundary validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedSnapshot {
    /// Valid posts in snapshot order.
    pub posts: Vec<Post>,
    pub rejected: Vec<DocumentError>,
}

/// Builds the insert payload for `post`; `createdAt` is left to the store.
pub fn encode_new_post(post: &NewPost) -> WriteFields {
    let mut fields = WriteFields::new();
    fields.insert(FIELD_TITLE.to_string(), WriteValue::Text(post.title.clone()));
    fields.insert(
        FIELD_CONTENT.to_string(),
        WriteValue::Text(post.content.clone()),
    );
    fields.insert(FIELD_AUTHOR.to_string(), WriteValue::Text(post.author.clone()));
    fields.insert(FIELD_CREATED_AT.to_string(), WriteValue::ServerTimestamp);
    fields
}

/// Validates every document of `snapshot`, logging and skipping bad ones.
pub fn decode_snapshot(snapshot: &Snapshot) -> DecodedSnapshot {
    let mut decoded = DecodedSnapshot::default();
    for document in &snapshot.documents {
        match decode_post(document) {
            Ok(post) => decoded.posts.push(post),
            Err(err) => {
                warn!(
                    "event=document_rejected module=store status=skipped doc_id={} error={}",
                    document.id, err
                );
                decoded.rejected.push(err);
            }
        }
    }
    decoded
}

/// Validates one document as a post.
pub fn decode_post(document: &RawDocument) -> Result<Post, DocumentError> {
    let id = document.id.as_str();
    let title = required_string(id, &document.data, FIELD_TITLE)?;
    let content = required_string(id, &document.data, FIELD_CONTENT)?;
    let author = match document.data.get(FIELD_AUTHOR) {
        None | Some(Value::Null) => ANONYMOUS_AUTHOR.to_string(),
        Some(Value::String(value)) => value.clone(),
        Some(_) => {
            return Err(DocumentError::WrongType {
                id: id.to_string(),
                field: FIELD_AUTHOR,
                expected: "a string",
            })
        }
    };
    let created_at = coerce_timestamp(id, document.data.get(FIELD_CREATED_AT))?;

    Ok(Post {
        id: id.to_string(),
        title,
        content,
        author,
        created_at,
    })
}

fn required_string(
    id: &str,
    data: &Map<String, Value>,
    field: &'static str,
) -> Result<String, DocumentError> {
    match data.get(field) {
        None | Some(Value::Null) => Err(DocumentError::MissingField {
            id: id.to_string(),
            field,
        }),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(DocumentError::WrongType {
            id: id.to_string(),
            field,
            expected: "a string",
        }),
    }
}

/// `None` means the server timestamp has not been resolved yet.
fn coerce_timestamp(id: &str, value: Option<&Value>) -> Result<Option<Timestamp>, DocumentError> {
    let bad = |detail: String| DocumentError::BadTimestamp {
        id: id.to_string(),
        detail,
    };

    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => {
            if let Some(millis) = number.as_i64() {
                Ok(Some(Timestamp::from_millis(millis)))
            } else {
                match number.as_f64() {
                    Some(millis) if millis.is_finite() => {
                        Ok(Some(Timestamp::from_millis(millis.round() as i64)))
                    }
                    _ => Err(bad(format!("number `{number}` out of range"))),
                }
            }
        }
        Some(Value::Object(fields)) => {
            let seconds = fields
                .get("seconds")
                .or_else(|| fields.get("_seconds"))
                .and_then(Value::as_i64)
                .ok_or_else(|| bad("object without integer `seconds`".to_string()))?;
            let nanos = fields
                .get("nanoseconds")
                .or_else(|| fields.get("_nanoseconds"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            Ok(Some(Timestamp::from_millis(
                seconds.saturating_mul(1000).saturating_add(nanos / 1_000_000),
            )))
        }
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(text)
            .map(|parsed| Some(Timestamp::from_millis(parsed.timestamp_millis())))
            .map_err(|err| bad(format!("`{text}`: {err}"))),
        Some(other) => Err(bad(format!("unsupported value `{other}`"))),
    }
}
