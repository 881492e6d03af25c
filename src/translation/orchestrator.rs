/*!
 * Document-level translation.
 *
 * Segments the document, drives every chunk through the quality gate with a
 * bounded number of chunks in flight, and reassembles the results in source
 * order: chunks of one paragraph are joined with a space, paragraphs with a
 * blank line.
 */

use futures::stream::{self, StreamExt};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::observer::{ChunkProgress, ChunkRef};
use super::quality::{ChunkOutcome, QualityGate, TranslationResult};
use super::segmenter::{Chunk, Segmenter};
use crate::errors::TranslationError;
use crate::providers::TranslationBackend;

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Chunks translated at the same time
    pub max_concurrent_chunks: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_concurrent_chunks: 1 }
    }
}

/// Cancels a running translation. Chunks already in flight finish; no new chunk starts.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// Request cancellation
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One translated chunk with its source
#[derive(Debug, Clone)]
pub struct ChunkReport {
    /// Paragraph index
    pub paragraph_index: usize,
    /// Chunk index within the paragraph
    pub chunk_index: usize,
    /// Source text
    pub source: String,
    /// Gate result
    pub result: TranslationResult,
}

/// Counters for a finished run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationStats {
    pub paragraphs: usize,
    pub chunks: usize,
    pub accepted: usize,
    pub fallback: usize,
    pub best_effort: usize,
    /// Chunks whose text is the untranslated source
    pub untranslated: usize,
    /// Forward attempts across all chunks
    pub attempts: usize,
    pub warnings: usize,
    pub duration: Duration,
}

/// A translated document
#[derive(Debug, Clone)]
pub struct DocumentTranslation {
    /// Reassembled translation
    pub text: String,
    /// Per-chunk reports in source order
    pub chunks: Vec<ChunkReport>,
    /// Run counters
    pub stats: TranslationStats,
}

impl DocumentTranslation {
    /// Chunks that need a human look
    pub fn degraded_chunks(&self) -> impl Iterator<Item = &ChunkReport> {
        self.chunks.iter().filter(|c| c.result.is_degraded())
    }
}

/// Drives a whole document through the quality gate
pub struct Orchestrator {
    segmenter: Segmenter,
    gate: QualityGate,
    primary: Arc<dyn TranslationBackend>,
    fallback: Option<Arc<dyn TranslationBackend>>,
    config: OrchestratorConfig,
    abort: AbortHandle,
}

impl Orchestrator {
    /// Create an orchestrator translating one chunk at a time
    pub fn new(
        segmenter: Segmenter,
        gate: QualityGate,
        primary: Arc<dyn TranslationBackend>,
        fallback: Option<Arc<dyn TranslationBackend>>,
    ) -> Self {
        Self {
            segmenter,
            gate,
            primary,
            fallback,
            config: OrchestratorConfig::default(),
            abort: AbortHandle::default(),
        }
    }

    /// Replace the settings
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Cancel through an existing handle
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Handle that cancels this orchestrator's runs
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Translate a whole document
    pub async fn translate_document(&self, text: &str) -> Result<DocumentTranslation, TranslationError> {
        let start = Instant::now();
        let chunks: Vec<(usize, Chunk)> = self.segmenter.segment(text);
        let total = chunks.len();
        let paragraph_count = chunks.last().map(|(p, _)| p + 1).unwrap_or(0);
        let concurrency = self.config.max_concurrent_chunks.max(1);

        info!(
            "Translating {} paragraphs in {} chunks ({} at a time)",
            paragraph_count, total, concurrency
        );

        let completed = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let primary = self.primary.as_ref();
        let fallback = self.fallback.as_deref();

        let mut finished: Vec<(usize, Result<TranslationResult, TranslationError>)> = stream::iter(chunks.iter().enumerate())
            .map(|(position, (paragraph, chunk))| {
                let completed = &completed;
                let failed = &failed;
                async move {
                    if self.abort.is_aborted() || failed.load(Ordering::SeqCst) {
                        return None;
                    }

                    let chunk_ref = ChunkRef {
                        paragraph: *paragraph,
                        chunk: chunk.index,
                        position,
                    };
                    let result = self.gate.translate_chunk(chunk_ref, &chunk.text, primary, fallback).await;

                    match &result {
                        Ok(translation) => {
                            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                            self.gate.observer().on_chunk_complete(&ChunkProgress {
                                chunk: chunk_ref,
                                completed: done,
                                total,
                                paragraph_count,
                                source: &chunk.text,
                                translation: &translation.text,
                                outcome: translation.outcome,
                            });
                        }
                        Err(_) => failed.store(true, Ordering::SeqCst),
                    }

                    Some((position, result))
                }
            })
            .buffer_unordered(concurrency)
            .filter_map(|entry| async move { entry })
            .collect()
            .await;

        finished.sort_by_key(|(position, _)| *position);

        if let Some(index) = finished.iter().position(|(_, result)| result.is_err()) {
            let (_, error) = finished.swap_remove(index);
            if let Err(error) = error {
                return Err(error);
            }
        }

        if finished.len() < total {
            warn!("Translation aborted after {} of {} chunks", finished.len(), total);
            return Err(TranslationError::Aborted {
                completed: finished.len(),
                total,
            });
        }

        let mut reports = Vec::with_capacity(total);
        for ((_, result), (paragraph, chunk)) in finished.into_iter().zip(chunks) {
            // Errors returned above; every remaining entry is Ok
            let Ok(result) = result else { continue };
            reports.push(ChunkReport {
                paragraph_index: paragraph,
                chunk_index: chunk.index,
                source: chunk.text,
                result,
            });
        }

        let stats = collect_stats(&reports, paragraph_count, start.elapsed());
        info!(
            "Translated {} chunks: {} accepted, {} fallback, {} best effort in {:.1}s",
            stats.chunks,
            stats.accepted,
            stats.fallback,
            stats.best_effort,
            stats.duration.as_secs_f64()
        );

        Ok(DocumentTranslation {
            text: assemble(&reports),
            chunks: reports,
            stats,
        })
    }
}

/// Join chunk texts: spaces within a paragraph, blank lines between paragraphs
fn assemble(reports: &[ChunkReport]) -> String {
    let mut paragraphs: Vec<Vec<&str>> = Vec::new();
    let mut current_paragraph = None;

    for report in reports {
        if current_paragraph != Some(report.paragraph_index) {
            paragraphs.push(Vec::new());
            current_paragraph = Some(report.paragraph_index);
        }
        if let Some(parts) = paragraphs.last_mut() {
            parts.push(report.result.text.trim());
        }
    }

    paragraphs
        .iter()
        .map(|parts| parts.join(" "))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn collect_stats(reports: &[ChunkReport], paragraphs: usize, duration: Duration) -> TranslationStats {
    let mut stats = TranslationStats {
        paragraphs,
        chunks: reports.len(),
        duration,
        ..Default::default()
    };

    for report in reports {
        match report.result.outcome {
            ChunkOutcome::Accepted => stats.accepted += 1,
            ChunkOutcome::Fallback => stats.fallback += 1,
            ChunkOutcome::BestEffort => stats.best_effort += 1,
        }
        if report.result.untranslated {
            stats.untranslated += 1;
        }
        stats.attempts += report.result.attempts.len();
        stats.warnings += report.result.warnings().count();
    }

    stats
}
