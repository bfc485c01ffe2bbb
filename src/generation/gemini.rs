use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{GenerationError, GenerationResult, GenerationSettings};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const ERROR_BODY_LIMIT: usize = 512;
const PNG_MIME_TYPE: &str = "image/png";

/// Blocking client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
}

impl GeminiClient {
    pub fn new() -> GenerationResult<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> GenerationResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| GenerationError::BackendUnavailable {
                reason: format!("failed to build http client: {err}"),
            })?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn generate(&self, settings: &GenerationSettings, png: &[u8]) -> GenerationResult<String> {
        let api_key = settings
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(GenerationError::MissingCredential)?;

        let url = request_url(&self.endpoint, &settings.model);
        let body = GenerateContentRequest::new(&settings.prompt, png);
        tracing::debug!(model = %settings.model, bytes = png.len(), "sending gemini request");

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .map_err(|err| GenerationError::RequestFailed {
                message: err.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::RequestFailed {
                message: format!("HTTP {status}: {}", truncate(&body, ERROR_BODY_LIMIT)),
            });
        }

        let parsed: GenerateContentResponse =
            response.json().map_err(|err| GenerationError::RequestFailed {
                message: format!("malformed response: {}", err.without_url()),
            })?;
        parsed.into_text()
    }
}

fn request_url(endpoint: &str, model: &str) -> String {
    let model = model.trim().trim_start_matches("models/");
    format!("{endpoint}/v1beta/models/{model}:generateContent")
}

fn truncate(text: &str, limit: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(prompt: &'a str, png: &[u8]) -> Self {
        let data = base64::engine::general_purpose::STANDARD.encode(png);
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text { text: prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: PNG_MIME_TYPE,
                            data,
                        },
                    },
                ],
            }],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> GenerationResult<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(trimmed.to_string())
    }
}
