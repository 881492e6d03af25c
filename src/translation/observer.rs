/*!
 * Pipeline observers.
 *
 * The quality gate and the orchestrator report every state transition, attempt,
 * warning and completed chunk to a `TranslationObserver`. Logging and terminal
 * progress are observers; the pipeline itself never prints.
 */

use log::{debug, info, warn};
use std::sync::Arc;

use super::quality::{ChunkOutcome, ChunkState, QualityWarning, TranslationAttempt};

/// Identifies a chunk within the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkRef {
    /// Paragraph index (zero-based)
    pub paragraph: usize,
    /// Chunk index within the paragraph (zero-based)
    pub chunk: usize,
    /// Position in the flat chunk sequence (zero-based)
    pub position: usize,
}

impl std::fmt::Display for ChunkRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "paragraph {}, chunk {}", self.paragraph + 1, self.chunk + 1)
    }
}

/// Progress snapshot sent when a chunk reaches a terminal state
#[derive(Debug, Clone)]
pub struct ChunkProgress<'a> {
    /// Chunk that finished
    pub chunk: ChunkRef,
    /// Chunks finished so far, this one included
    pub completed: usize,
    /// Chunks in the document
    pub total: usize,
    /// Paragraphs in the document
    pub paragraph_count: usize,
    /// Source text of the chunk
    pub source: &'a str,
    /// Final text of the chunk
    pub translation: &'a str,
    /// Terminal state
    pub outcome: ChunkOutcome,
}

impl ChunkProgress<'_> {
    /// Completion percentage
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }
}

/// Receives pipeline events. Every method has an empty default.
pub trait TranslationObserver: Send + Sync {
    /// A chunk moved to a new state
    fn on_state_change(&self, _chunk: ChunkRef, _state: ChunkState) {}

    /// A forward attempt finished (successfully or not)
    fn on_attempt(&self, _chunk: ChunkRef, _attempt: &TranslationAttempt) {}

    /// A quality check raised a warning
    fn on_quality_warning(&self, _chunk: ChunkRef, _warning: &QualityWarning) {}

    /// A chunk reached a terminal state
    fn on_chunk_complete(&self, _progress: &ChunkProgress<'_>) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TranslationObserver for NoopObserver {}

/// Observer that forwards events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl TranslationObserver for LogObserver {
    fn on_state_change(&self, chunk: ChunkRef, state: ChunkState) {
        debug!("{}: {:?}", chunk, state);
    }

    fn on_attempt(&self, chunk: ChunkRef, attempt: &TranslationAttempt) {
        match &attempt.error {
            Some(error) => warn!("{}: attempt {} failed: {}", chunk, attempt.number, error),
            None => debug!(
                "{}: attempt {} similarity={:?} confidence={:?}",
                chunk, attempt.number, attempt.similarity, attempt.confidence
            ),
        }
    }

    fn on_quality_warning(&self, chunk: ChunkRef, warning: &QualityWarning) {
        warn!("{}: {}", chunk, warning);
    }

    fn on_chunk_complete(&self, progress: &ChunkProgress<'_>) {
        info!(
            "Chunk {}/{} done ({:.1}%, {:?})",
            progress.completed,
            progress.total,
            progress.percent(),
            progress.outcome
        );
    }
}

/// Fans events out to several observers
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn TranslationObserver>>,
}

impl ObserverSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer
    pub fn with(mut self, observer: Arc<dyn TranslationObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl TranslationObserver for ObserverSet {
    fn on_state_change(&self, chunk: ChunkRef, state: ChunkState) {
        self.observers.iter().for_each(|o| o.on_state_change(chunk, state));
    }

    fn on_attempt(&self, chunk: ChunkRef, attempt: &TranslationAttempt) {
        self.observers.iter().for_each(|o| o.on_attempt(chunk, attempt));
    }

    fn on_quality_warning(&self, chunk: ChunkRef, warning: &QualityWarning) {
        self.observers.iter().for_each(|o| o.on_quality_warning(chunk, warning));
    }

    fn on_chunk_complete(&self, progress: &ChunkProgress<'_>) {
        self.observers.iter().for_each(|o| o.on_chunk_complete(progress));
    }
}
