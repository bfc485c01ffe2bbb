//! Pluggable text generation: PNG bytes in, model text out.

pub mod gemini;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{load_app_config, AppConfig};

pub use gemini::GeminiClient;

pub type GenerationResult<T> = std::result::Result<T, GenerationError>;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PROMPT: &str = include_str!("prompts/image_to_latex.txt");
const GEMINI_BACKEND: &str = "gemini";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation backend unavailable: {reason}")]
    BackendUnavailable { reason: String },
    #[error("no API key configured (config api_key, GEMINI_API_KEY or GOOGLE_API_KEY)")]
    MissingCredential,
    #[error("model response contained no text")]
    EmptyResponse,
    #[error("generation request failed: {message}")]
    RequestFailed { message: String },
    #[error("generation worker exited without a result")]
    WorkerLost,
}

pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Blocks until the model answers. Never call from the UI thread.
    fn generate(&self, png: &[u8]) -> GenerationResult<String>;
}

/// Parameters for one request, resolved fresh from config and environment.
#[derive(Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub prompt: String,
}

impl GenerationSettings {
    pub fn resolve(config: &AppConfig) -> Self {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    pub fn resolve_with<F>(config: &AppConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |value: Option<String>| value.filter(|value| !value.trim().is_empty());

        let api_key = non_empty(config.api_key.clone())
            .or_else(|| non_empty(env("GEMINI_API_KEY")))
            .or_else(|| non_empty(env("GOOGLE_API_KEY")));
        let model = non_empty(config.model.clone())
            .or_else(|| non_empty(env("GEMINI_MODEL")))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Self {
            api_key,
            model,
            prompt: load_prompt(config.prompt_file.as_deref()),
        }
    }
}

impl fmt::Debug for GenerationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("prompt_len", &self.prompt.len())
            .finish()
    }
}

/// Prompt text from `path` when readable, else the built-in template.
pub fn load_prompt(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return DEFAULT_PROMPT.to_string();
    };
    match std::fs::read_to_string(path) {
        Ok(prompt) if !prompt.trim().is_empty() => prompt,
        Ok(_) => {
            tracing::warn!(?path, "prompt file is empty; using built-in prompt");
            DEFAULT_PROMPT.to_string()
        }
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read prompt file; using built-in prompt");
            DEFAULT_PROMPT.to_string()
        }
    }
}

type ConfigLoader = Box<dyn Fn() -> AppConfig + Send + Sync>;
type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Backend that re-reads the configuration for every request and routes it
/// to the provider named there.
pub struct ConfiguredBackend {
    gemini: GenerationResult<GeminiClient>,
    load_config: ConfigLoader,
    env: EnvLookup,
}

impl ConfiguredBackend {
    pub fn new() -> Self {
        Self::with_sources(
            GeminiClient::new(),
            Box::new(load_app_config),
            Box::new(|name: &str| std::env::var(name).ok()),
        )
    }

    pub(crate) fn with_sources(
        gemini: GenerationResult<GeminiClient>,
        load_config: ConfigLoader,
        env: EnvLookup,
    ) -> Self {
        if let Err(err) = &gemini {
            tracing::warn!(%err, "gemini client unavailable");
        }
        Self {
            gemini,
            load_config,
            env,
        }
    }

    pub fn shared() -> Arc<dyn GenerationBackend> {
        Arc::new(Self::new())
    }
}

impl Default for ConfiguredBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationBackend for ConfiguredBackend {
    fn name(&self) -> &str {
        "configured"
    }

    fn generate(&self, png: &[u8]) -> GenerationResult<String> {
        let config = (self.load_config)();
        let backend = config.backend_name();
        if backend != GEMINI_BACKEND {
            return Err(GenerationError::BackendUnavailable {
                reason: format!("unknown backend `{backend}`"),
            });
        }

        let settings = GenerationSettings::resolve_with(&config, |name| (self.env)(name));
        let client = self.gemini.as_ref().map_err(|err| err.clone())?;
        client.generate(&settings, png)
    }
}
