/*!
 * Per-chunk quality gate.
 *
 * Drives one chunk through the primary backend with bounded, sequential retries:
 *
 * ```text
 * Pending -> Attempting(n) -> Accepted
 *                          -> Retrying(n) -> Attempting(n + 1)
 *                          -> Exhausted -> Fallback | BestEffort
 * ```
 *
 * An attempt fails when the backend errors, times out, or answers with nothing.
 * When a back-translation backend is configured the output is translated back and
 * compared with the source; the repetition check is a second, independent retry
 * trigger. The confidence check only warns.
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use super::confidence::{confidence_score, is_repetitive, repetition_ratio};
use super::similarity::similarity;
use crate::errors::{ProviderError, TranslationError};
use crate::providers::TranslationBackend;
use crate::translation::observer::{ChunkRef, NoopObserver, TranslationObserver};

/// What to do when every attempt and the fallback failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedPolicy {
    /// Keep the last output (or the source text) and continue
    #[default]
    BestEffort,
    /// Stop the run with `ChunkExhausted`
    Fail,
}

/// Lifecycle of a chunk inside the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Not started
    Pending,
    /// Forward attempt `n` in flight
    Attempting(u32),
    /// Attempt `n` was rejected; waiting before the next one
    Retrying(u32),
    /// Retry budget spent
    Exhausted,
    /// An attempt passed every enabled check
    Accepted,
    /// The fallback backend produced the result
    Fallback,
    /// The best available text was kept despite failing the gate
    BestEffort,
}

/// Terminal state of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Passed the gate
    Accepted,
    /// Produced by the fallback backend
    Fallback,
    /// Kept without passing the gate
    BestEffort,
}

impl From<ChunkOutcome> for ChunkState {
    fn from(outcome: ChunkOutcome) -> Self {
        match outcome {
            ChunkOutcome::Accepted => ChunkState::Accepted,
            ChunkOutcome::Fallback => ChunkState::Fallback,
            ChunkOutcome::BestEffort => ChunkState::BestEffort,
        }
    }
}

/// Quality check findings
#[derive(Debug, Clone, PartialEq)]
pub enum QualityWarning {
    /// Back-translation too far from the source; triggers a retry
    LowSimilarity {
        /// Measured similarity
        score: f32,
        /// Required similarity (exclusive)
        threshold: f32,
    },
    /// Few distinct words; advisory
    LowConfidence {
        /// Unique-word ratio
        score: f32,
        /// Minimum ratio
        threshold: f32,
    },
    /// Opening words repeat; triggers a retry
    Repetitive {
        /// Duplication ratio of the first decile
        ratio: f32,
    },
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowSimilarity { score, threshold } => {
                write!(f, "low back-translation similarity {:.2} (needs > {:.2})", score, threshold)
            }
            Self::LowConfidence { score, threshold } => {
                write!(f, "low confidence {:.2} (below {:.2})", score, threshold)
            }
            Self::Repetitive { ratio } => write!(f, "repetitive output (duplication {:.2})", ratio),
        }
    }
}

/// One forward backend call and its checks
#[derive(Debug, Clone, Default)]
pub struct TranslationAttempt {
    /// Attempt number, starting at 1
    pub number: u32,
    /// Backend output, if the call succeeded
    pub output: Option<String>,
    /// Back-translation of the output
    pub back_translation: Option<String>,
    /// Similarity of the back-translation to the source
    pub similarity: Option<f32>,
    /// Unique-word ratio of the output
    pub confidence: Option<f32>,
    /// Whether the repetition check flagged the output
    pub repetitive: bool,
    /// Failure message when the call (or its verification call) failed
    pub error: Option<String>,
    /// Warnings raised for this attempt
    pub warnings: Vec<QualityWarning>,
}

/// Final outcome for one chunk
#[derive(Debug, Clone)]
pub struct TranslationResult {
    /// Text that goes into the document
    pub text: String,
    /// Terminal state
    pub outcome: ChunkOutcome,
    /// Forward attempts in order
    pub attempts: Vec<TranslationAttempt>,
    /// Why the fallback backend failed, when it was tried and failed
    pub fallback_error: Option<String>,
    /// Whether `text` is the untranslated source
    pub untranslated: bool,
}

impl TranslationResult {
    /// Warnings across all attempts
    pub fn warnings(&self) -> impl Iterator<Item = &QualityWarning> {
        self.attempts.iter().flat_map(|a| a.warnings.iter())
    }

    /// Whether the chunk needs a human look
    pub fn is_degraded(&self) -> bool {
        self.outcome != ChunkOutcome::Accepted || self.warnings().next().is_some()
    }
}

/// Gate settings
#[derive(Debug, Clone)]
pub struct QualityGateConfig {
    /// Forward attempts before escalating
    pub max_retries: u32,
    /// Back-translation similarity must exceed this
    pub similarity_threshold: f32,
    /// Unique-word ratio below this is reported
    pub confidence_threshold: f32,
    /// Run the confidence check
    pub use_confidence_check: bool,
    /// Run the repetition check
    pub use_repetition_check: bool,
    /// Duplication ratio above this fails the repetition check
    pub repetition_threshold: f32,
    /// Limit for each backend call
    pub attempt_timeout: Duration,
    /// Base delay between retries, doubled each time
    pub retry_backoff_ms: u64,
    /// Behavior after exhaustion without a usable fallback
    pub on_exhausted: ExhaustedPolicy,
    /// Source language code
    pub source_language: String,
    /// Target language code
    pub target_language: String,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            similarity_threshold: 0.7,
            confidence_threshold: 0.5,
            use_confidence_check: false,
            use_repetition_check: false,
            repetition_threshold: 0.5,
            attempt_timeout: Duration::from_secs(120),
            retry_backoff_ms: 1000,
            on_exhausted: ExhaustedPolicy::BestEffort,
            source_language: "ru".to_string(),
            target_language: "en".to_string(),
        }
    }
}

/// Retry, verification and escalation around a translation backend
pub struct QualityGate {
    config: QualityGateConfig,
    back_translator: Option<Arc<dyn TranslationBackend>>,
    observer: Arc<dyn TranslationObserver>,
}

impl fmt::Debug for QualityGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualityGate")
            .field("config", &self.config)
            .field("back_translator", &self.back_translator.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

impl QualityGate {
    /// Create a gate without back-translation
    pub fn new(config: QualityGateConfig) -> Self {
        Self {
            config,
            back_translator: None,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Verify outputs by translating them back with this backend
    pub fn with_back_translator(mut self, backend: Arc<dyn TranslationBackend>) -> Self {
        self.back_translator = Some(backend);
        self
    }

    /// Report events to this observer
    pub fn with_observer(mut self, observer: Arc<dyn TranslationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Gate settings
    pub fn config(&self) -> &QualityGateConfig {
        &self.config
    }

    /// Observer the gate reports to
    pub fn observer(&self) -> &Arc<dyn TranslationObserver> {
        &self.observer
    }

    /// Translate one chunk
    pub async fn translate_chunk(
        &self,
        chunk: ChunkRef,
        text: &str,
        primary: &dyn TranslationBackend,
        fallback: Option<&dyn TranslationBackend>,
    ) -> Result<TranslationResult, TranslationError> {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempts: Vec<TranslationAttempt> = Vec::new();
        let mut last_output: Option<String> = None;

        self.observer.on_state_change(chunk, ChunkState::Pending);

        for number in 1..=max_attempts {
            self.observer.on_state_change(chunk, ChunkState::Attempting(number));

            let attempt = self.run_attempt(chunk, number, text, primary).await;
            let accepted = attempt.error.is_none() && !attempt.repetitive && self.similarity_passes(&attempt);
            if let Some(output) = &attempt.output {
                last_output = Some(output.clone());
            }
            self.observer.on_attempt(chunk, &attempt);
            attempts.push(attempt);

            if accepted {
                debug!("{} accepted on attempt {}", chunk, number);
                return Ok(self.finish(chunk, last_output.unwrap_or_default(), ChunkOutcome::Accepted, attempts, None, false));
            }

            if number < max_attempts {
                self.observer.on_state_change(chunk, ChunkState::Retrying(number));
                let delay = self.config.retry_backoff_ms.saturating_mul(1u64 << (number - 1).min(16));
                if delay > 0 {
                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }

        self.observer.on_state_change(chunk, ChunkState::Exhausted);
        warn!("{} exhausted {} attempts", chunk, max_attempts);

        let mut fallback_error = None;
        if let Some(fallback) = fallback {
            match self.call(fallback, text, &self.config.source_language, &self.config.target_language).await {
                Ok(output) => {
                    return Ok(self.finish(chunk, output, ChunkOutcome::Fallback, attempts, None, false));
                }
                Err(e) => {
                    warn!("{}: fallback backend {} failed: {}", chunk, fallback.name(), e);
                    fallback_error = Some(e.to_string());
                }
            }
        }

        if self.config.on_exhausted == ExhaustedPolicy::Fail {
            return Err(TranslationError::ChunkExhausted {
                paragraph: chunk.paragraph,
                chunk: chunk.chunk,
                attempts: max_attempts,
            });
        }

        let (text, untranslated) = match last_output {
            Some(output) => (output, false),
            None => {
                warn!("{}: no attempt produced text, keeping the source", chunk);
                (text.to_string(), true)
            }
        };
        Ok(self.finish(chunk, text, ChunkOutcome::BestEffort, attempts, fallback_error, untranslated))
    }

    fn finish(
        &self,
        chunk: ChunkRef,
        text: String,
        outcome: ChunkOutcome,
        attempts: Vec<TranslationAttempt>,
        fallback_error: Option<String>,
        untranslated: bool,
    ) -> TranslationResult {
        self.observer.on_state_change(chunk, outcome.into());
        TranslationResult {
            text,
            outcome,
            attempts,
            fallback_error,
            untranslated,
        }
    }

    fn similarity_passes(&self, attempt: &TranslationAttempt) -> bool {
        match (&self.back_translator, attempt.similarity) {
            (None, _) => true,
            (Some(_), Some(score)) => score > self.config.similarity_threshold,
            (Some(_), None) => false,
        }
    }

    async fn run_attempt(
        &self,
        chunk: ChunkRef,
        number: u32,
        text: &str,
        primary: &dyn TranslationBackend,
    ) -> TranslationAttempt {
        let mut attempt = TranslationAttempt {
            number,
            ..Default::default()
        };

        let output = match self.call(primary, text, &self.config.source_language, &self.config.target_language).await {
            Ok(output) => output,
            Err(e) => {
                attempt.error = Some(e.to_string());
                return attempt;
            }
        };

        if self.config.use_confidence_check {
            let score = confidence_score(&output);
            attempt.confidence = Some(score);
            if score < self.config.confidence_threshold {
                self.warn(chunk, &mut attempt, QualityWarning::LowConfidence {
                    score,
                    threshold: self.config.confidence_threshold,
                });
            }
        }

        if self.config.use_repetition_check && is_repetitive(&output, self.config.repetition_threshold) {
            attempt.repetitive = true;
            let ratio = repetition_ratio(&output);
            self.warn(chunk, &mut attempt, QualityWarning::Repetitive { ratio });
        }

        if let Some(back_translator) = &self.back_translator {
            if !attempt.repetitive {
                let back = self
                    .call(back_translator.as_ref(), &output, &self.config.target_language, &self.config.source_language)
                    .await;
                match back {
                    Ok(back) => {
                        let score = similarity(text, &back);
                        attempt.similarity = Some(score);
                        attempt.back_translation = Some(back);
                        if score <= self.config.similarity_threshold {
                            self.warn(chunk, &mut attempt, QualityWarning::LowSimilarity {
                                score,
                                threshold: self.config.similarity_threshold,
                            });
                        }
                    }
                    Err(e) => attempt.error = Some(format!("back-translation failed: {}", e)),
                }
            }
        }

        attempt.output = Some(output);
        attempt
    }

    fn warn(&self, chunk: ChunkRef, attempt: &mut TranslationAttempt, warning: QualityWarning) {
        self.observer.on_quality_warning(chunk, &warning);
        attempt.warnings.push(warning);
    }

    /// One backend call under the attempt timeout; empty output is an error
    async fn call(
        &self,
        backend: &dyn TranslationBackend,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        let limit = self.config.attempt_timeout;
        let output = timeout(limit, backend.translate(text, source_language, target_language))
            .await
            .map_err(|_| ProviderError::Timeout(limit))??;

        if output.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(output)
    }
}
