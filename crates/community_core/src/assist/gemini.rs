//! Gemini `generateContent` client with structured JSON output.

use crate::assist::{GenerationError, GenerationRequest, GenerativeTextService};
use crate::config::AssistConfig;
use async_trait::async_trait;
use log::{error, info};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};
use std::time::Instant;

/// Secondary variable consulted when the configured one is unset.
const FALLBACK_KEY_ENV: &str = "API_KEY";
const MAX_ERROR_BODY_CHARS: usize = 300;

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key_env: String,
}

impl GeminiClient {
    pub fn new(config: &AssistConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key_env: config.api_key_env.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl GenerativeTextService for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        let api_key = resolve_api_key(&self.api_key_env, |name| std::env::var(name).ok())?;
        let started_at = Instant::now();

        let response = self
            .http
            .post(self.endpoint())
            .headers(build_headers(&api_key, &self.api_key_env)?)
            .json(&build_request_body(request))
            .send()
            .await
            .map_err(|err| classify_reqwest_error(&err))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| classify_reqwest_error(&err))?;
        if !status.is_success() {
            error!(
                "event=assist_generate module=assist status=error model={} http_status={} duration_ms={}",
                self.model,
                status.as_u16(),
                started_at.elapsed().as_millis()
            );
            return Err(GenerationError::Http {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|err| GenerationError::MalformedResponse(format!("envelope: {err}")))?;
        let payload = extract_payload(&value)?;
        info!(
            "event=assist_generate module=assist status=ok model={} duration_ms={}",
            self.model,
            started_at.elapsed().as_millis()
        );
        Ok(payload)
    }
}

/// Reads the key from `primary`, then from `API_KEY`; blank values count as unset.
fn resolve_api_key(
    primary: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, GenerationError> {
    [primary, FALLBACK_KEY_ENV]
        .into_iter()
        .filter(|name| !name.trim().is_empty())
        .find_map(|name| lookup(name).filter(|value| !value.trim().is_empty()))
        .map(|value| value.trim().to_string())
        .ok_or_else(|| GenerationError::MissingApiKey {
            env: primary.to_string(),
        })
}

/// A key that cannot travel as a header value counts as unset.
fn build_headers(api_key: &str, key_env: &str) -> Result<HeaderMap, GenerationError> {
    let key = HeaderValue::from_str(api_key).map_err(|_| {
        error!(
            "event=assist_generate module=assist status=error error_code=invalid_api_key env={key_env}"
        );
        GenerationError::MissingApiKey {
            env: key_env.to_string(),
        }
    })?;

    let mut headers = HeaderMap::new();
    headers.insert("x-goog-api-key", key);
    headers.insert("accept", HeaderValue::from_static("application/json"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    Ok(headers)
}

fn build_request_body(request: &GenerationRequest) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": request.prompt }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.schema.to_json(),
        }
    })
}

/// Concatenates the first candidate's text parts and parses them as JSON.
fn extract_payload(response: &Value) -> Result<Value, GenerationError> {
    let parts = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .ok_or_else(|| GenerationError::MalformedResponse("no candidate content".to_string()))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        return Err(GenerationError::MalformedResponse(
            "candidate has no text".to_string(),
        ));
    }

    serde_json::from_str(text.trim())
        .map_err(|err| GenerationError::MalformedResponse(format!("candidate text: {err}")))
}

fn classify_reqwest_error(err: &reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Network(format!("request timed out: {err}"))
    } else if err.is_connect() {
        GenerationError::Network(format!("connection failed: {err}"))
    } else {
        GenerationError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{build_headers, build_request_body, extract_payload, resolve_api_key};
    use crate::assist::{post_suggestion_request, GenerationError};
    use serde_json::json;

    #[test]
    fn request_body_carries_prompt_and_schema() {
        let body = build_request_body(&post_suggestion_request());
        assert_eq!(body["contents"][0]["role"], "user");
        assert!(body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("HTML"));
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(
            body["generationConfig"]["responseSchema"]["required"],
            json!(["title", "content"])
        );
    }

    #[test]
    fn payload_is_parsed_from_candidate_text() {
        let response = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "{\"title\": \"안녕\"," },
                        { "text": " \"content\": \"<p>hi</p>\"}" }
                    ]
                }
            }]
        });
        let payload = extract_payload(&response).unwrap();
        assert_eq!(payload, json!({"title": "안녕", "content": "<p>hi</p>"}));
    }

    #[test]
    fn empty_or_non_json_candidates_are_malformed() {
        let empty = json!({ "candidates": [] });
        assert!(matches!(
            extract_payload(&empty),
            Err(GenerationError::MalformedResponse(_))
        ));

        let prose = json!({
            "candidates": [{ "content": { "parts": [{ "text": "sorry, no json" }] } }]
        });
        assert!(matches!(
            extract_payload(&prose),
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn key_with_control_bytes_is_refused() {
        let err = build_headers("abc\ndef", "GEMINI_API_KEY").unwrap_err();
        assert_eq!(
            err,
            GenerationError::MissingApiKey {
                env: "GEMINI_API_KEY".to_string()
            }
        );

        let headers = build_headers("abc-def", "GEMINI_API_KEY").unwrap();
        assert_eq!(headers["x-goog-api-key"], "abc-def");
    }

    #[test]
    fn api_key_falls_back_to_secondary_variable() {
        let key = resolve_api_key("GEMINI_API_KEY", |name| {
            (name == "API_KEY").then(|| "secondary".to_string())
        })
        .unwrap();
        assert_eq!(key, "secondary");

        let err = resolve_api_key("GEMINI_API_KEY", |_| Some("  ".to_string())).unwrap_err();
        assert_eq!(
            err,
            GenerationError::MissingApiKey {
                env: "GEMINI_API_KEY".to_string()
            }
        );
    }
}
