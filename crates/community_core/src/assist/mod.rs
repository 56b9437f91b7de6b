//! Generative text boundary for AI-assisted drafts.
//!
//! # Responsibility
//! - Define the prompt + response-schema request sent to the text service.
//! - Validate the structured reply into a `PostSuggestion`.
//! - Own the fixed prompt and the fallback draft.
//!
//! # Invariants
//! - A `PostSuggestion` always has a non-empty title and visible content.

use crate::richtext;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub mod gemini;

pub use gemini::GeminiClient;

pub const SUGGESTION_PROMPT: &str = "사람들에게 영감을 주는 짧은 게시글의 제목과 본문을 작성해줘.
본문은 HTML 태그(<b>, <i>, <ul>, <li> 등)를 적절히 섞어서 시각적으로 보기 좋게 구성해줘.
한국어로 작성하고 따뜻한 어조를 사용해줘.";

pub const FALLBACK_TITLE: &str = "오늘의 특별한 조언";
pub const FALLBACK_CONTENT: &str =
    "<p>오늘 하루도 <b>정말 고생 많으셨어요.</b> 잠시 숨을 고르고 주변을 둘러보는 건 어떨까요?</p>";

/// Generative text service failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// No API key in any of the configured environment variables.
    MissingApiKey { env: String },
    Network(String),
    Http { status: u16, body: String },
    Timeout(Duration),
    /// Reply is not JSON or misses a required schema field.
    MalformedResponse(String),
}

impl Display for GenerationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey { env } => write!(f, "api key not set (expected ${env})"),
            Self::Network(message) => write!(f, "generation request failed: {message}"),
            Self::Http { status, body } => write!(f, "generation service returned {status}: {body}"),
            Self::Timeout(after) => write!(f, "generation timed out after {}s", after.as_secs()),
            Self::MalformedResponse(message) => {
                write!(f, "generation response is malformed: {message}")
            }
        }
    }
}

impl Error for GenerationError {}

/// One required string property of a structured reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: &'static str,
    pub description: &'static str,
}

/// Object schema whose properties are all required strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSchema {
    pub fields: Vec<SchemaField>,
}

impl ResponseSchema {
    /// Schema descriptor in the provider's `OBJECT`/`STRING` vocabulary.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            properties.insert(
                field.name.to_string(),
                json!({ "type": "STRING", "description": field.description }),
            );
        }
        let required: Vec<&str> = self.fields.iter().map(|field| field.name).collect();
        json!({
            "type": "OBJECT",
            "properties": properties,
            "required": required,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub schema: ResponseSchema,
}

/// Structured text generation.
#[async_trait]
pub trait GenerativeTextService: Send + Sync {
    /// Returns the JSON value the service produced for `request.schema`.
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError>;
}

/// Title/content pair that pre-fills the composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSuggestion {
    pub title: String,
    pub content: String,
}

impl PostSuggestion {
    pub fn fallback() -> Self {
        Self {
            title: FALLBACK_TITLE.to_string(),
            content: FALLBACK_CONTENT.to_string(),
        }
    }
}

pub fn post_suggestion_schema() -> ResponseSchema {
    ResponseSchema {
        fields: vec![
            SchemaField {
                name: "title",
                description: "게시글의 제목",
            },
            SchemaField {
                name: "content",
                description: "HTML 형식이 포함된 게시글 본문",
            },
        ],
    }
}

pub fn post_suggestion_request() -> GenerationRequest {
    GenerationRequest {
        prompt: SUGGESTION_PROMPT.to_string(),
        schema: post_suggestion_schema(),
    }
}

/// Validates a structured reply as a suggestion.
pub fn parse_suggestion(value: &Value) -> Result<PostSuggestion, GenerationError> {
    let object = value
        .as_object()
        .ok_or_else(|| GenerationError::MalformedResponse("reply is not an object".to_string()))?;

    let field = |name: &str| -> Result<String, GenerationError> {
        object
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                GenerationError::MalformedResponse(format!("missing string field `{name}`"))
            })
    };

    let title = field("title")?;
    let content = field("content")?;
    if richtext::is_blank(&content) {
        return Err(GenerationError::MalformedResponse(
            "`content` has no visible text".to_string(),
        ));
    }
    Ok(PostSuggestion { title, content })
}
