/*!
 * LibreTranslate client (`POST /translate`).
 *
 * A plain machine-translation service: no prompt, so it implements
 * `TranslationBackend` directly instead of going through `ChatBackend`.
 */

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{build_client, check_status, join_url, transport_error, RequestPacer, TranslationBackend};
use crate::errors::ProviderError;
use crate::language_utils;
use crate::translation::formatting::OutputCleaner;

/// LibreTranslate client
#[derive(Debug)]
pub struct LibreTranslate {
    client: Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
    pacer: RequestPacer,
}

/// Translate request body
#[derive(Debug, Serialize)]
pub struct LibreTranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

/// Translate response body
#[derive(Debug, Deserialize)]
pub struct LibreTranslateResponse {
    #[serde(rename = "translatedText")]
    pub translated_text: String,
}

impl<'a> LibreTranslateRequest<'a> {
    /// Plain-text request; an empty key is left out
    pub fn new(text: &'a str, source: &'a str, target: &'a str, api_key: &'a str) -> Self {
        Self {
            q: text,
            source,
            target,
            format: "text",
            api_key: (!api_key.is_empty()).then_some(api_key),
        }
    }
}

impl LibreTranslate {
    /// Create a client for the server at `endpoint`
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64, rate_limit: Option<u32>) -> Self {
        Self {
            client: build_client(timeout_secs),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout_secs,
            pacer: RequestPacer::new(rate_limit),
        }
    }
}

/// LibreTranslate only knows 2-letter codes where they exist
fn service_code(code: &str) -> String {
    language_utils::normalize_to_part1_or_part2t(code).unwrap_or_else(|_| code.to_string())
}

#[async_trait]
impl TranslationBackend for LibreTranslate {
    fn name(&self) -> &str {
        "libretranslate"
    }

    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> Result<String, ProviderError> {
        self.pacer.wait().await;

        let source = service_code(source_language);
        let target = service_code(target_language);
        let request = LibreTranslateRequest::new(text, &source, &target, &self.api_key);
        let response = self
            .client
            .post(join_url(&self.endpoint, "translate"))
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("LibreTranslate", e, self.timeout_secs))?;

        let body = check_status("LibreTranslate", response)
            .await?
            .json::<LibreTranslateResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse LibreTranslate response: {}", e)))?;

        Ok(OutputCleaner::clean(&body.translated_text))
    }

    /// Check that the server answers `/languages`
    async fn test_connection(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(join_url(&self.endpoint, "languages"))
            .send()
            .await
            .map_err(|e| transport_error("LibreTranslate", e, self.timeout_secs))?;
        check_status("LibreTranslate", response).await.map(|_| ())
    }
}
