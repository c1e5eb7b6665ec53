//! A [`CompletionBackend`] for the Gemini `generateContent` API.

use std::fmt;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use crate::enrich::{Completion, CompletionBackend, CompletionRequest, FinishReason, ServiceError};

/// The environment variable holding the API key.
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Calls Gemini over HTTPS.
#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

impl fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiBackend {
    /// Create a backend using the given key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is blank or the HTTP client cannot be
    /// built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ServiceError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ServiceError::MissingCredential(API_KEY_VAR));
        }
        let client = Client::builder()
            .build()
            .map_err(|e| ServiceError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Create a backend using the key in `GEMINI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::MissingCredential`] if the variable is unset
    /// or blank.
    pub fn from_env() -> Result<Self, ServiceError> {
        let key = std::env::var(API_KEY_VAR).unwrap_or_default();
        Self::new(key)
    }

    /// Send requests to a different endpoint root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn finish_reason(raw: Option<&str>) -> FinishReason {
    match raw {
        None | Some("STOP") => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some(other) => FinishReason::Other(other.to_string()),
    }
}

fn into_completion(response: GenerateResponse) -> Result<Completion, ServiceError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::InvalidResponse("empty response from Gemini API".to_string()))?;

    let finish = finish_reason(candidate.finish_reason.as_deref());
    let text = candidate
        .content
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text);

    match text {
        Some(text) => Ok(Completion { text, finish }),
        // A length-limited candidate may carry no text at all.
        None if finish == FinishReason::Length => Ok(Completion {
            text: String::new(),
            finish,
        }),
        None => Err(ServiceError::InvalidResponse(
            "empty response from Gemini API".to_string(),
        )),
    }
}

impl CompletionBackend for GeminiBackend {
    #[tracing::instrument(level = "debug", skip_all, fields(model = request.model))]
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, ServiceError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": request.schema,
                "temperature": 0,
            },
        });

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout(request.timeout)
                } else {
                    ServiceError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout(request.timeout)
            } else {
                ServiceError::InvalidResponse(e.to_string())
            }
        })?;

        into_completion(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: serde_json::Value) -> Result<Completion, ServiceError> {
        into_completion(serde_json::from_value(body).unwrap())
    }

    #[test]
    fn reads_first_candidate_text() {
        let completion = parse(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "[]" }], "role": "model" },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        assert_eq!(completion.text, "[]");
        assert_eq!(completion.finish, FinishReason::Stop);
    }

    #[test]
    fn max_tokens_is_length_limited() {
        let completion = parse(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "[{\"segment_id\": \"seg" }] },
                "finishReason": "MAX_TOKENS"
            }]
        }))
        .unwrap();

        assert!(completion.is_length_limited());

        let empty = parse(json!({ "candidates": [{ "finishReason": "MAX_TOKENS" }] })).unwrap();
        assert_eq!(empty.text, "");
    }

    #[test]
    fn missing_candidates_is_invalid() {
        assert!(matches!(
            parse(json!({})),
            Err(ServiceError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse(json!({ "candidates": [{ "finishReason": "SAFETY" }] })),
            Err(ServiceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn blank_key_is_rejected() {
        assert!(matches!(
            GeminiBackend::new("  "),
            Err(ServiceError::MissingCredential(API_KEY_VAR))
        ));
    }
}
