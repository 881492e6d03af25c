/*!
 * Translation backends.
 *
 * The pipeline talks to every backend through `TranslationBackend`. Chat-style
 * LLM services implement the lower-level `Provider` client trait and are wrapped
 * in `ChatBackend`, which renders the system prompt, paces requests and cleans
 * the output:
 * - Ollama: Local LLM server
 * - OpenAI: OpenAI-compatible chat completions (also LM Studio)
 * - Anthropic: Anthropic messages API
 *
 * LibreTranslate is a plain MT service and implements `TranslationBackend` directly.
 */

use async_trait::async_trait;
use log::error;
use parking_lot::Mutex;
use reqwest::{Client, Response};
use std::fmt::Debug;
use std::time::{Duration, Instant};

use crate::errors::ProviderError;
use crate::language_utils;
use crate::translation::formatting::OutputCleaner;

pub mod anthropic;
pub mod libretranslate;
pub mod mock;
pub mod ollama;
pub mod openai;

/// A service that translates text between two languages
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    /// Translate `text` from `source_language` to `target_language` (ISO codes)
    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> Result<String, ProviderError>;

    /// Check that the service is reachable
    async fn test_connection(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Common trait for all LLM provider clients
///
/// This trait defines the interface that all chat provider clients follow,
/// allowing them to be wrapped in a `ChatBackend` interchangeably.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Build a translation request from a system prompt and the text to translate
    fn translation_request(&self, system_prompt: &str, text: &str) -> Self::Request;

    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<Self::Response, ProviderError>` - The response from the provider or an error
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;
}

/// Spaces requests to honor a requests-per-minute limit
#[derive(Debug)]
pub struct RequestPacer {
    interval: Option<Duration>,
    next_slot: Mutex<Instant>,
}

impl RequestPacer {
    /// Create a pacer; `None` or `Some(0)` disables pacing
    pub fn new(rate_limit: Option<u32>) -> Self {
        let interval = rate_limit
            .filter(|&limit| limit > 0)
            .map(|limit| Duration::from_millis(60_000 / limit as u64));
        Self {
            interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Pause between consecutive requests, if any
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Wait for the next free request slot
    pub async fn wait(&self) {
        let Some(interval) = self.interval else {
            return;
        };

        let delay = {
            let mut next_slot = self.next_slot.lock();
            let now = Instant::now();
            let slot = (*next_slot).max(now);
            *next_slot = slot + interval;
            slot - now
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Adapts a chat `Provider` client to `TranslationBackend`
#[derive(Debug)]
pub struct ChatBackend<P: Provider> {
    name: String,
    provider: P,
    system_prompt: String,
    pacer: RequestPacer,
}

impl<P: Provider> ChatBackend<P> {
    /// Wrap a provider client.
    ///
    /// `system_prompt` may contain `{source_language}` and `{target_language}`
    /// placeholders; they are replaced with English language names.
    pub fn new(name: impl Into<String>, provider: P, system_prompt: impl Into<String>, rate_limit: Option<u32>) -> Self {
        Self {
            name: name.into(),
            provider,
            system_prompt: system_prompt.into(),
            pacer: RequestPacer::new(rate_limit),
        }
    }

    /// System prompt for a language pair
    pub fn render_system_prompt(&self, source_language: &str, target_language: &str) -> String {
        self.system_prompt
            .replace("{source_language}", &display_language(source_language))
            .replace("{target_language}", &display_language(target_language))
    }
}

#[async_trait]
impl<P: Provider> TranslationBackend for ChatBackend<P> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> Result<String, ProviderError> {
        self.pacer.wait().await;

        let system_prompt = self.render_system_prompt(source_language, target_language);
        let request = self.provider.translation_request(&system_prompt, text);
        let response = self.provider.complete(request).await?;

        Ok(OutputCleaner::clean(&P::extract_text(&response)))
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.provider.test_connection().await
    }
}

/// English language name for a code, or the code itself when unknown
fn display_language(code: &str) -> String {
    language_utils::get_language_name(code).unwrap_or_else(|_| code.to_string())
}

/// HTTP client with a request timeout
pub(crate) fn build_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

/// Map an HTTP status to a provider error
pub fn status_error(status_code: u16, message: String) -> ProviderError {
    match status_code {
        401 | 403 => ProviderError::AuthenticationError(message),
        429 => ProviderError::RateLimitExceeded(message),
        _ => ProviderError::ApiError { status_code, message },
    }
}

/// Map a transport failure to a provider error
pub(crate) fn transport_error(provider: &str, error: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(Duration::from_secs(timeout_secs))
    } else if error.is_connect() {
        ProviderError::ConnectionError(format!("Failed to connect to {}: {}", provider, error))
    } else {
        ProviderError::RequestFailed(format!("Failed to send request to {}: {}", provider, error))
    }
}

/// Pass successful responses through; turn the rest into errors carrying the body
pub(crate) async fn check_status(provider: &str, response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    error!("{} API error ({}): {}", provider, status, error_text);
    Err(status_error(status.as_u16(), error_text))
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
