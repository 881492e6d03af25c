/*!
 * Backend construction.
 *
 * Turns provider configuration into the backends a run needs: the primary,
 * the optional fallback and the optional back-translation backend. Backends are
 * built per run and shared as `Arc<dyn TranslationBackend>`; when two roles name
 * the same provider they share one instance, and with it one request pacer.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use std::fmt;
use std::sync::Arc;

use crate::app_config::{Config, ProviderConfig, TranslationCommonConfig, TranslationProvider};
use crate::providers::anthropic::Anthropic;
use crate::providers::libretranslate::LibreTranslate;
use crate::providers::ollama::Ollama;
use crate::providers::openai::OpenAI;
use crate::providers::{ChatBackend, TranslationBackend};

/// Create a backend for one provider
pub fn create_backend(
    provider: TranslationProvider,
    config: &ProviderConfig,
    common: &TranslationCommonConfig,
) -> Arc<dyn TranslationBackend> {
    let name = provider.to_lowercase_string();
    let prompt = common.system_prompt.clone();
    let temperature = common.temperature;

    debug!(
        "Creating {} backend (model: {}, endpoint: {})",
        provider.display_name(),
        config.model,
        config.endpoint
    );

    match provider {
        TranslationProvider::Ollama => Arc::new(ChatBackend::new(
            name,
            Ollama::new(&config.endpoint, &config.model, temperature, config.timeout_secs),
            prompt,
            config.rate_limit,
        )),
        TranslationProvider::OpenAI | TranslationProvider::LMStudio => Arc::new(ChatBackend::new(
            name,
            OpenAI::new(&config.api_key, &config.endpoint, &config.model, temperature, config.timeout_secs),
            prompt,
            config.rate_limit,
        )),
        TranslationProvider::Anthropic => Arc::new(ChatBackend::new(
            name,
            Anthropic::new(&config.api_key, &config.endpoint, &config.model, temperature, config.timeout_secs),
            prompt,
            config.rate_limit,
        )),
        TranslationProvider::LibreTranslate => Arc::new(LibreTranslate::new(
            &config.endpoint,
            &config.api_key,
            config.timeout_secs,
            config.rate_limit,
        )),
    }
}

/// Backends for one run
#[derive(Clone)]
pub struct BackendSet {
    /// Translates every chunk first
    pub primary: Arc<dyn TranslationBackend>,
    /// Tried once per chunk after the primary exhausts its retries
    pub fallback: Option<Arc<dyn TranslationBackend>>,
    /// Translates outputs back for verification
    pub back_translator: Option<Arc<dyn TranslationBackend>>,
}

impl fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSet")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.as_ref().map(|b| b.name().to_string()))
            .field("back_translator", &self.back_translator.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

impl BackendSet {
    /// Build the backends named by the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let translation = &config.translation;
        let build = |provider: TranslationProvider| {
            create_backend(provider, &translation.provider_config(provider), &translation.common)
        };

        let primary = build(translation.provider);
        let share_or_build = |provider: TranslationProvider| {
            if provider == translation.provider {
                Arc::clone(&primary)
            } else {
                build(provider)
            }
        };

        let fallback = translation.fallback_provider.map(share_or_build);
        let back_translator = config
            .quality
            .use_back_translation
            .then(|| share_or_build(translation.back_translation_provider()));

        info!(
            "Using {} ({}){}{}",
            translation.provider.display_name(),
            translation.get_model(),
            fallback
                .as_ref()
                .map(|b| format!(", fallback {}", b.name()))
                .unwrap_or_default(),
            back_translator
                .as_ref()
                .map(|b| format!(", back-translation via {}", b.name()))
                .unwrap_or_default()
        );

        Ok(Self {
            primary,
            fallback,
            back_translator,
        })
    }

    /// Check that every backend answers
    pub async fn test_connections(&self) -> Result<()> {
        let mut checked: Vec<&str> = Vec::new();
        let backends = std::iter::once(&self.primary)
            .chain(self.fallback.iter())
            .chain(self.back_translator.iter());

        for backend in backends {
            if checked.contains(&backend.name()) {
                continue;
            }
            backend
                .test_connection()
                .await
                .with_context(|| format!("Cannot reach the {} backend", backend.name()))?;
            checked.push(backend.name());
        }
        Ok(())
    }
}
