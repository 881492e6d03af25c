/*!
 * Ollama client (`/api/generate`).
 */

use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{build_client, check_status, join_url, transport_error, Provider};
use crate::errors::ProviderError;

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// Model used for translation requests
    model: String,
    /// Sampling temperature for translation requests
    temperature: f32,
    /// HTTP client for making requests
    client: Client,
    /// Request timeout in seconds
    timeout_secs: u64,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Generation options for the Ollama API
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Generated text
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
    /// Number of prompt tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

impl GenerationRequest {
    /// Create a new non-streaming generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            options: None,
            stream: Some(false),
        }
    }

    /// Set the system message
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).temperature = Some(temperature);
        self
    }
}

impl Ollama {
    /// Create a client for the server at `base_url`
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, temperature: f32, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            temperature,
            client: build_client(timeout_secs),
            timeout_secs,
        }
    }

    /// Run a generation request
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = join_url(&self.base_url, "api/generate");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("Ollama", e, self.timeout_secs))?;
        let response = check_status("Ollama", response).await?;

        let response_text = response
            .text()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to get response text from Ollama API: {}", e)))?;

        parse_generation_response(&response_text)
    }

    /// Get the Ollama API version
    pub async fn version(&self) -> Result<String, ProviderError> {
        let url = join_url(&self.base_url, "api/version");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error("Ollama", e, self.timeout_secs))?;
        let value: serde_json::Value = check_status("Ollama", response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse Ollama version response: {}", e)))?;

        value["version"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ParseError("Invalid version format in response".to_string()))
    }
}

/// Parse a generate response, accepting streamed JSONL output as well
fn parse_generation_response(response_text: &str) -> Result<GenerationResponse, ProviderError> {
    match serde_json::from_str::<GenerationResponse>(response_text) {
        Ok(response) => Ok(response),
        Err(e) => {
            // The server may have streamed despite `stream: false`; concatenate the pieces
            let mut text = String::new();
            let mut model = String::new();
            let mut parsed_any = false;
            for line in response_text.lines().filter(|l| !l.trim().is_empty()) {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
                    parsed_any = true;
                    if let Some(part) = value.get("response").and_then(|v| v.as_str()) {
                        text.push_str(part);
                    }
                    if let Some(name) = value.get("model").and_then(|v| v.as_str()) {
                        model = name.to_string();
                    }
                }
            }

            if parsed_any {
                return Ok(GenerationResponse {
                    model,
                    response: text,
                    done: true,
                    prompt_eval_count: None,
                    eval_count: None,
                });
            }

            let preview: String = response_text.chars().take(500).collect();
            error!("Failed to parse Ollama API response: {}. Raw response (first 500 chars): {}", e, preview);
            Err(ProviderError::ParseError(format!("Failed to parse Ollama API response: {}", e)))
        }
    }
}

#[async_trait]
impl Provider for Ollama {
    type Request = GenerationRequest;
    type Response = GenerationResponse;

    fn translation_request(&self, system_prompt: &str, text: &str) -> GenerationRequest {
        GenerationRequest::new(&self.model, text)
            .system(system_prompt)
            .temperature(self.temperature)
    }

    async fn complete(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        self.generate(request).await
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.version().await.map(|_| ())
    }

    fn extract_text(response: &GenerationResponse) -> String {
        response.response.clone()
    }
}
