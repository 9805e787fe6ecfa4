//! Translation backends: one contract, two implementations.
//!
//! The executor only ever sees [`TranslationBackend`]: `prompt → raw text`.
//! [`Backend`] selects the implementation once, at construction, from
//! [`BackendKind`]:
//!
//! * [`ProviderBackend`] drives any edgequake-llm provider (OpenAI, Mistral,
//!   LM Studio, a local llama.cpp server, ...). The provider handle is created
//!   on first use and reused for every later call; failure to create it is
//!   fatal.
//! * [`OllamaBackend`] talks to the Ollama HTTP API. Reachability and the
//!   presence of the model are checked before the first chunk.
//!
//! ## Error contract
//!
//! `generate` returns [`BackendError::Transient`] for failures worth retrying
//! (connection refused, timeout, HTTP 5xx) and [`BackendError::Fatal`] for
//! the rest (HTTP 4xx, malformed body, provider load failure). Backends never
//! retry on their own; the executor owns the retry budget, so both
//! implementations retry identically.

use crate::config::{BackendKind, TranslationConfig};
use crate::error::{BackendError, TranslateError};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Timeout for the Ollama health probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Nucleus sampling used for every Ollama call.
const TOP_P: f32 = 0.9;

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
}

/// A text-in, text-out generation backend.
pub trait TranslationBackend: Send + Sync {
    /// Generate a completion for `prompt`.
    fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;

    /// Verify the backend can serve requests. Failure is fatal for the run.
    fn check_available(&self) -> impl Future<Output = Result<(), TranslateError>> + Send;

    /// Identifier of the model producing translations.
    fn model_id(&self) -> &str;
}

// ── Backend selection ────────────────────────────────────────────────────

/// The configured backend.
pub enum Backend {
    Provider(ProviderBackend),
    Ollama(OllamaBackend),
}

impl Backend {
    /// Build the backend named by `config.backend`. Nothing is contacted yet.
    pub fn from_config(config: &TranslationConfig) -> Result<Self, TranslateError> {
        let model = config.model_id().to_string();
        let backend = match config.backend {
            BackendKind::Provider => Backend::Provider(ProviderBackend::new(&config.provider_name, model)),
            BackendKind::Ollama => Backend::Ollama(OllamaBackend::new(
                &config.ollama_url,
                model,
                Duration::from_secs(config.request_timeout_secs),
            )?),
        };
        info!(
            "Backend: {} (model {})",
            config.backend,
            backend.model_id()
        );
        Ok(backend)
    }
}

impl TranslationBackend for Backend {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, BackendError> {
        match self {
            Backend::Provider(b) => b.generate(prompt, params).await,
            Backend::Ollama(b) => b.generate(prompt, params).await,
        }
    }

    async fn check_available(&self) -> Result<(), TranslateError> {
        match self {
            Backend::Provider(b) => b.check_available().await,
            Backend::Ollama(b) => b.check_available().await,
        }
    }

    fn model_id(&self) -> &str {
        match self {
            Backend::Provider(b) => b.model_id(),
            Backend::Ollama(b) => b.model_id(),
        }
    }
}

// ── Provider backend ─────────────────────────────────────────────────────

/// An edgequake-llm provider handle, created once and memoised.
pub struct ProviderBackend {
    provider_name: String,
    model: String,
    provider: OnceCell<Arc<dyn LLMProvider>>,
}

impl ProviderBackend {
    pub fn new(provider_name: &str, model: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            model: model.into(),
            provider: OnceCell::new(),
        }
    }

    /// Wrap an already constructed provider (custom middleware, tests).
    pub fn with_provider(provider_name: &str, provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            model: model.into(),
            provider: OnceCell::new_with(Some(provider)),
        }
    }

    async fn provider(&self) -> Result<&Arc<dyn LLMProvider>, TranslateError> {
        self.provider
            .get_or_try_init(|| async {
                let start = Instant::now();
                let provider = ProviderFactory::create_llm_provider(&self.provider_name, &self.model)
                    .map_err(|e| TranslateError::ProviderLoadFailed {
                        provider: self.provider_name.clone(),
                        hint: format!("{e}"),
                    })?;
                info!(
                    "Loaded provider '{}' for model {} in {:?}",
                    self.provider_name,
                    self.model,
                    start.elapsed()
                );
                Ok(provider)
            })
            .await
    }
}

impl TranslationBackend for ProviderBackend {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, BackendError> {
        let provider = self
            .provider()
            .await
            .map_err(|e| BackendError::Fatal(e.to_string()))?;

        let messages = vec![ChatMessage::user(prompt)];
        let options = CompletionOptions {
            temperature: Some(params.temperature),
            max_tokens: Some(params.max_tokens),
            ..Default::default()
        };

        // Provider errors are network or rate-limit failures for remote
        // providers and resource exhaustion for local ones; both may clear.
        let response = provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| BackendError::Transient(format!("{e}")))?;

        debug!(
            "{}: {} prompt tokens, {} completion tokens",
            self.provider_name, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }

    async fn check_available(&self) -> Result<(), TranslateError> {
        self.provider().await.map(|_| ())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── Ollama backend ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: usize,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Ollama HTTP API client.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self, TranslateError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranslateError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn unreachable(&self, detail: impl std::fmt::Display) -> TranslateError {
        TranslateError::BackendUnreachable {
            backend: "ollama".into(),
            url: self.base_url.clone(),
            hint: format!("{detail}\nStart the service with: ollama serve"),
        }
    }
}

impl TranslationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, BackendError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
                top_p: TOP_P,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &detail));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Fatal(format!("malformed Ollama response: {e}")))?;

        debug!(
            "ollama: {} prompt tokens, {} completion tokens",
            parsed.prompt_eval_count.unwrap_or(0),
            parsed.eval_count.unwrap_or(0)
        );
        Ok(parsed.response)
    }

    async fn check_available(&self) -> Result<(), TranslateError> {
        self.client
            .get(&self.base_url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        let tags: TagsResponse = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?
            .json()
            .await
            .map_err(|e| self.unreachable(format!("unexpected /api/tags response: {e}")))?;

        let names: Vec<&str> = tags.models.iter().map(|m| m.name.as_str()).collect();
        if !model_listed(&names, &self.model) {
            return Err(TranslateError::ModelMissing {
                model: self.model.clone(),
            });
        }
        info!("Ollama at {} serves {}", self.base_url, self.model);
        Ok(())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Whether `model` appears among installed model names. `aya-expanse`
/// matches `aya-expanse:latest`.
fn model_listed(installed: &[&str], model: &str) -> bool {
    installed.iter().any(|name| name.contains(model))
}

fn classify_transport_error(e: reqwest::Error) -> BackendError {
    if e.is_builder() {
        BackendError::Fatal(format!("invalid request: {e}"))
    } else {
        BackendError::Transient(format!("{e}"))
    }
}

fn classify_status(status: u16, body: &str) -> BackendError {
    let detail = format!("HTTP {status}: {}", body.trim());
    if status >= 500 || status == 429 || status == 408 {
        BackendError::Transient(detail)
    } else {
        BackendError::Fatal(detail)
    }
}
