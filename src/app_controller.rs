use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_config::Config;
use crate::encoding::EncodingResolver;
use crate::file_utils::FileManager;
use crate::reader::{self, Document};
use crate::translation::quality::{ChunkOutcome, QualityGate};
use crate::translation::{
    AbortHandle, BackendSet, ChunkProgress, DocumentTranslation, LogObserver, ObserverSet, Orchestrator,
    OrchestratorConfig, Segmenter, TranslationObserver, TranslationStats,
};

// @module: Application controller for document translation

/// Characters of source and translation shown per progress line
const PREVIEW_CHARS: usize = 60;

/// What a run did
#[derive(Debug)]
pub enum RunOutcome {
    /// The output existed and overwriting was not requested
    Skipped {
        /// Existing output file
        output: PathBuf,
    },
    /// The document was translated
    Translated {
        /// Written output file
        output: PathBuf,
        /// Issues log, when any chunk was degraded
        issues_log: Option<PathBuf>,
        /// Run counters
        stats: TranslationStats,
    },
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Injected backends; built from the configuration when absent
    backends: Option<BackendSet>,
    // @field: Cancels the run
    abort: AbortHandle,
    // @field: Draw the progress bar and preview lines
    show_progress: bool,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self {
            config,
            backends: None,
            abort: AbortHandle::default(),
            show_progress: true,
        })
    }

    /// Use these backends instead of building them from the configuration
    pub fn with_backends(mut self, backends: BackendSet) -> Self {
        self.backends = Some(backends);
        self
    }

    /// Hide the progress bar and preview lines
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Handle that cancels the run
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Run the main workflow: read, translate, write output and issues log
    pub async fn run(&self, input_file: PathBuf, output_file: Option<PathBuf>, force_overwrite: bool) -> Result<RunOutcome> {
        if !FileManager::file_exists(&input_file) {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        let output_file =
            output_file.unwrap_or_else(|| FileManager::generate_output_path(&input_file, &self.config.target_language));
        if output_file.exists() && !force_overwrite {
            warn!(
                "Skipping {}, translation already exists (use -f to force overwrite)",
                output_file.display()
            );
            return Ok(RunOutcome::Skipped { output: output_file });
        }

        let document = self.read_document(&input_file)?;
        if document.text.trim().is_empty() {
            warn!("{} contains no text", input_file.display());
        }

        let backends = match &self.backends {
            Some(backends) => backends.clone(),
            None => BackendSet::from_config(&self.config)?,
        };
        backends.test_connections().await?;

        let progress_bar = self.progress_bar();
        let observer = ObserverSet::new()
            .with(Arc::new(LogObserver))
            .with(Arc::new(ConsoleObserver::new(progress_bar.clone())));

        let orchestrator = self.build_orchestrator(&backends, Arc::new(observer));
        let result = orchestrator.translate_document(&document.text).await;
        progress_bar.finish_and_clear();
        let translation = result.context("Translation failed")?;

        let mut content = translation.text.clone();
        content.push('\n');
        FileManager::write_to_file(&output_file, &content)?;

        let issues_log = self.write_issues_log(&input_file, &output_file, &translation)?;
        log_summary(&translation.stats, &output_file);

        Ok(RunOutcome::Translated {
            output: output_file,
            issues_log,
            stats: translation.stats,
        })
    }

    fn read_document(&self, input_file: &Path) -> Result<Document> {
        let explicit = match &self.config.input_encoding {
            Some(label) => Some(
                EncodingResolver::encoding_for_label(label).ok_or_else(|| anyhow!("Unknown input encoding: {}", label))?,
            ),
            None => None,
        };
        let resolver = EncodingResolver::new().with_explicit(explicit);

        Ok(reader::read_document(input_file, &resolver)?)
    }

    fn build_orchestrator(&self, backends: &BackendSet, observer: Arc<dyn TranslationObserver>) -> Orchestrator {
        let quality = &self.config.quality;
        let gate_config = quality.gate_config(&self.config.source_language, &self.config.target_language);

        let mut gate = QualityGate::new(gate_config).with_observer(observer);
        if let Some(back_translator) = &backends.back_translator {
            gate = gate.with_back_translator(Arc::clone(back_translator));
        }

        Orchestrator::new(
            Segmenter::new(quality.max_chunk_size),
            gate,
            Arc::clone(&backends.primary),
            backends.fallback.clone(),
        )
        .with_config(OrchestratorConfig {
            max_concurrent_chunks: self.config.translation.optimal_concurrent_requests(),
        })
        .with_abort_handle(self.abort.clone())
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress_bar = ProgressBar::new(0);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar.set_message("Translating");
        progress_bar
    }

    /// Append degraded chunks to `<output>.issues.log`
    fn write_issues_log(&self, input_file: &Path, output_file: &Path, translation: &DocumentTranslation) -> Result<Option<PathBuf>> {
        let degraded: Vec<_> = translation.degraded_chunks().collect();
        if degraded.is_empty() {
            return Ok(None);
        }

        let log_path = FileManager::issues_log_path(output_file);
        FileManager::append_to_log_file(
            &log_path,
            &format!(
                "{} -> {}: {} of {} chunks need review",
                input_file.display(),
                output_file.display(),
                degraded.len(),
                translation.stats.chunks
            ),
        )?;

        for report in degraded {
            let result = &report.result;
            let mut entry = format!(
                "paragraph {}, chunk {}: {:?} after {} attempt(s)",
                report.paragraph_index + 1,
                report.chunk_index + 1,
                result.outcome,
                result.attempts.len()
            );
            if result.untranslated {
                entry.push_str(", left untranslated");
            }
            for warning in result.warnings() {
                let _ = write!(entry, "; {}", warning);
            }
            if let Some(error) = result.attempts.iter().rev().find_map(|a| a.error.as_deref()) {
                let _ = write!(entry, "; last error: {}", error);
            }
            if let Some(error) = &result.fallback_error {
                let _ = write!(entry, "; fallback error: {}", error);
            }
            let _ = write!(entry, "\n    source: {}\n    output: {}", report.source, result.text);

            FileManager::append_to_log_file(&log_path, &entry)?;
        }

        warn!("Some chunks need review, see {}", log_path.display());
        Ok(Some(log_path))
    }
}

fn log_summary(stats: &TranslationStats, output_file: &Path) {
    info!(
        "Done: {} paragraphs, {} chunks ({} accepted, {} fallback, {} best effort, {} untranslated), {} attempts, {} warnings in {:.1}s",
        stats.paragraphs,
        stats.chunks,
        stats.accepted,
        stats.fallback,
        stats.best_effort,
        stats.untranslated,
        stats.attempts,
        stats.warnings,
        stats.duration.as_secs_f64()
    );
    info!("Translation written to {}", output_file.display());
}

/// Shorten text to `max` characters for display
fn preview(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}…", head.trim_end())
    } else {
        head
    }
}

/// Drives the progress bar and prints one preview line per finished chunk
struct ConsoleObserver {
    progress_bar: ProgressBar,
}

impl ConsoleObserver {
    fn new(progress_bar: ProgressBar) -> Self {
        Self { progress_bar }
    }
}

impl TranslationObserver for ConsoleObserver {
    fn on_chunk_complete(&self, progress: &ChunkProgress<'_>) {
        self.progress_bar.set_length(progress.total as u64);
        self.progress_bar.set_position(progress.completed as u64);

        let marker = match progress.outcome {
            ChunkOutcome::Accepted => "✓",
            ChunkOutcome::Fallback => "↺",
            ChunkOutcome::BestEffort => "!",
        };
        self.progress_bar.println(format!(
            "{} [paragraph {}/{}, chunk {}] {:5.1}%  {}  →  {}",
            marker,
            progress.chunk.paragraph + 1,
            progress.paragraph_count,
            progress.chunk.chunk + 1,
            progress.percent(),
            preview(progress.source, PREVIEW_CHARS),
            preview(progress.translation, PREVIEW_CHARS)
        ));
    }
}
