use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::encoding::EncodingResolver;
use crate::language_utils;
use crate::translation::quality::{ExhaustedPolicy, QualityGateConfig};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Explicit encoding label for text inputs (e.g. "windows-1251")
    #[serde(default)]
    pub input_encoding: Option<String>,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Quality gate and segmentation settings
    #[serde(default)]
    pub quality: QualityConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: OpenAI
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
    // @provider: LibreTranslate (self-hosted machine translation)
    LibreTranslate,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
            Self::LibreTranslate => "LibreTranslate",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
            Self::LibreTranslate => "libretranslate".to_string(),
        }
    }

    // @returns: Whether the hosted API refuses requests without a key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }
}

// Implement Display trait for TranslationProvider
impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for TranslationProvider
impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "lmstudio" => Ok(Self::LMStudio),
            "libretranslate" => Ok(Self::LibreTranslate),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Max concurrent requests
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Rate limit (requests per minute)
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model: default_model(provider_type),
            api_key: String::new(),
            endpoint: default_endpoint(provider_type),
            concurrent_requests: default_concurrent_requests(),
            timeout_secs: match provider_type {
                TranslationProvider::Anthropic => default_anthropic_timeout_secs(),
                _ => default_timeout_secs(),
            },
            rate_limit: default_rate_limit(provider_type),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Provider tried once per chunk after the primary exhausts its retries
    #[serde(default)]
    pub fallback_provider: Option<TranslationProvider>,

    /// Provider used to translate outputs back; defaults to the primary
    #[serde(default)]
    pub back_translation_provider: Option<TranslationProvider>,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Temperature parameter for text generation (0.0 to 1.0)
    /// Lower values make output more deterministic, higher values more creative
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
        }
    }
}

/// Segmentation and quality gate settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QualityConfig {
    /// Chunk budget in UTF-8 bytes
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Back-translation similarity must exceed this to accept
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Unique-word ratio below this is reported
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Forward attempts per chunk before escalating
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Verify outputs by translating them back
    #[serde(default)]
    pub use_back_translation: bool,

    /// Report low unique-word ratios
    #[serde(default)]
    pub use_confidence_check: bool,

    /// Retry outputs that loop
    #[serde(default)]
    pub use_repetition_check: bool,

    /// Duplication ratio above this fails the repetition check
    #[serde(default = "default_repetition_threshold")]
    pub repetition_threshold: f32,

    /// What to do when a chunk exhausts every option
    #[serde(default)]
    pub on_exhausted: ExhaustedPolicy,

    /// Limit for each backend call
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Base delay between retries, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            similarity_threshold: default_similarity_threshold(),
            confidence_threshold: default_confidence_threshold(),
            max_retries: default_max_retries(),
            use_back_translation: false,
            use_confidence_check: false,
            use_repetition_check: false,
            repetition_threshold: default_repetition_threshold(),
            on_exhausted: ExhaustedPolicy::default(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl QualityConfig {
    /// Gate settings for a language pair
    pub fn gate_config(&self, source_language: &str, target_language: &str) -> QualityGateConfig {
        QualityGateConfig {
            max_retries: self.max_retries,
            similarity_threshold: self.similarity_threshold,
            confidence_threshold: self.confidence_threshold,
            use_confidence_check: self.use_confidence_check,
            use_repetition_check: self.use_repetition_check,
            repetition_threshold: self.repetition_threshold,
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
            retry_backoff_ms: self.retry_backoff_ms,
            on_exhausted: self.on_exhausted,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<&LogLevel> for log::LevelFilter {
    fn from(level: &LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "ru".to_string()
}

fn default_target_language() -> String {
    "en".to_string()
}

fn default_concurrent_requests() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_anthropic_timeout_secs() -> u64 {
    60
}

fn default_max_chunk_size() -> usize {
    1000
}

fn default_similarity_threshold() -> f32 {
    0.7
}

fn default_confidence_threshold() -> f32 {
    0.5
}

fn default_max_retries() -> u32 {
    3
}

fn default_repetition_threshold() -> f32 {
    0.5
}

fn default_attempt_timeout_secs() -> u64 {
    120
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_temperature() -> f32 {
    0.3
}

fn default_system_prompt() -> String {
    "You are a professional literary translator. Translate the user's text from {source_language} to {target_language}. Reply with the translation only, without notes or explanations, and keep the meaning, tone and sentence order of the original.".to_string()
}

fn default_endpoint(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::Ollama => "http://localhost:11434",
        TranslationProvider::OpenAI => "https://api.openai.com/v1",
        TranslationProvider::Anthropic => "https://api.anthropic.com",
        // LM Studio default server (OpenAI compatible) runs on port 1234 under /v1
        TranslationProvider::LMStudio => "http://localhost:1234/v1",
        TranslationProvider::LibreTranslate => "http://localhost:5000",
    }
    .to_string()
}

fn default_model(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::Ollama => "qwen2.5:7b",
        TranslationProvider::OpenAI => "gpt-4o-mini",
        TranslationProvider::Anthropic => "claude-3-5-haiku-latest",
        // Placeholder; users should set to the loaded model name in LM Studio
        TranslationProvider::LMStudio => "local-model",
        TranslationProvider::LibreTranslate => "",
    }
    .to_string()
}

fn default_rate_limit(provider: TranslationProvider) -> Option<u32> {
    match provider {
        TranslationProvider::OpenAI => Some(60),
        // Slightly below Anthropic's standard 50 requests per minute
        TranslationProvider::Anthropic => Some(45),
        TranslationProvider::Ollama | TranslationProvider::LMStudio | TranslationProvider::LibreTranslate => None,
    }
}

impl Config {
    /// Load the configuration file, writing the defaults first when it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Read a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open config file: {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write config to file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        language_utils::validate_language_code(&self.source_language).context("Invalid source language")?;
        language_utils::validate_language_code(&self.target_language).context("Invalid target language")?;
        if language_utils::language_codes_match(&self.source_language, &self.target_language) {
            warn!(
                "Source and target language are both '{}'; the output will be a paraphrase",
                self.target_language
            );
        }

        if let Some(label) = &self.input_encoding {
            if EncodingResolver::encoding_for_label(label).is_none() {
                return Err(anyhow!("Unknown input encoding: {}", label));
            }
        }

        for provider in self.translation.providers_in_use(self.quality.use_back_translation) {
            let provider_config = self.translation.provider_config(provider);

            if provider.requires_api_key() && provider_config.api_key.is_empty() {
                return Err(anyhow!(
                    "Translation API key is required for {} provider",
                    provider.display_name()
                ));
            }

            if !provider_config.endpoint.is_empty() {
                Url::parse(&provider_config.endpoint).with_context(|| {
                    format!("Invalid endpoint URL for {}: {}", provider.display_name(), provider_config.endpoint)
                })?;
            }

            if provider_config.timeout_secs == 0 {
                return Err(anyhow!("Timeout for {} must be positive", provider.display_name()));
            }
        }

        self.quality.validate()
    }
}

impl QualityConfig {
    fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(anyhow!("max_chunk_size must be positive"));
        }
        if self.max_retries == 0 {
            return Err(anyhow!("max_retries must be at least 1"));
        }
        if self.attempt_timeout_secs == 0 {
            return Err(anyhow!("attempt_timeout_secs must be positive"));
        }
        for (name, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("confidence_threshold", self.confidence_threshold),
            ("repetition_threshold", self.repetition_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be between 0 and 1, got {}", name, value));
            }
        }
        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            input_encoding: None,
            translation: TranslationConfig::default(),
            quality: QualityConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the configuration for a provider, or its defaults when it is not listed
    pub fn provider_config(&self, provider: TranslationProvider) -> ProviderConfig {
        let provider_str = provider.to_lowercase_string();
        let defaults = ProviderConfig::new(provider);

        match self.available_providers.iter().find(|p| p.provider_type == provider_str) {
            Some(configured) => {
                let mut config = configured.clone();
                if config.model.is_empty() {
                    config.model = defaults.model;
                }
                if config.endpoint.is_empty() {
                    config.endpoint = defaults.endpoint;
                }
                config
            }
            None => defaults,
        }
    }

    /// Get the active provider configuration
    pub fn get_active_provider_config(&self) -> ProviderConfig {
        self.provider_config(self.provider)
    }

    /// Get the mutable configuration entry for a provider, adding one when missing
    pub fn provider_config_mut(&mut self, provider: TranslationProvider) -> &mut ProviderConfig {
        let provider_str = provider.to_lowercase_string();
        let index = match self.available_providers.iter().position(|p| p.provider_type == provider_str) {
            Some(index) => index,
            None => {
                self.available_providers.push(ProviderConfig::new(provider));
                self.available_providers.len() - 1
            }
        };
        &mut self.available_providers[index]
    }

    /// Provider used for back-translation
    pub fn back_translation_provider(&self) -> TranslationProvider {
        self.back_translation_provider.unwrap_or(self.provider)
    }

    /// Providers the run will call
    pub fn providers_in_use(&self, use_back_translation: bool) -> Vec<TranslationProvider> {
        let mut providers = vec![self.provider];
        let extra = [
            self.fallback_provider,
            use_back_translation.then(|| self.back_translation_provider()),
        ];
        for provider in extra.into_iter().flatten() {
            if !providers.contains(&provider) {
                providers.push(provider);
            }
        }
        providers
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        self.get_active_provider_config().model
    }

    /// Chunks translated at the same time, bounded by the active provider
    pub fn optimal_concurrent_requests(&self) -> usize {
        self.get_active_provider_config().concurrent_requests.max(1)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            fallback_provider: None,
            back_translation_provider: None,
            available_providers: [
                TranslationProvider::Ollama,
                TranslationProvider::OpenAI,
                TranslationProvider::Anthropic,
                TranslationProvider::LMStudio,
                TranslationProvider::LibreTranslate,
            ]
            .into_iter()
            .map(ProviderConfig::new)
            .collect(),
            common: TranslationCommonConfig::default(),
        }
    }
}
