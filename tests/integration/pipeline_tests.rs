/*!
 * Whole-document translation through the orchestrator
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::common;
use rusten::providers::mock::MockBackend;
use rusten::translation::quality::{ChunkOutcome, ExhaustedPolicy, QualityGate, QualityGateConfig};
use rusten::translation::{ChunkProgress, Orchestrator, OrchestratorConfig, Segmenter, TranslationObserver};
use rusten::TranslationError;

fn gate_config() -> QualityGateConfig {
    QualityGateConfig {
        retry_backoff_ms: 0,
        attempt_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn orchestrator(primary: MockBackend, concurrency: usize) -> Orchestrator {
    common::init_test_logging();
    Orchestrator::new(Segmenter::new(1000), QualityGate::new(gate_config()), Arc::new(primary), None)
        .with_config(OrchestratorConfig {
            max_concurrent_chunks: concurrency,
        })
}

/// Later sentences answer faster, so completion order is the reverse of source order
fn reverse_delay(text: &str) -> u64 {
    let digit = text.chars().find(|c| c.is_ascii_digit()).and_then(|c| c.to_digit(10)).unwrap_or(0);
    u64::from(10 - digit) * 15
}

/// Counts completion callbacks and remembers the order chunks finished in
#[derive(Default)]
struct CompletionRecorder {
    completed: AtomicUsize,
    order: parking_lot::Mutex<Vec<usize>>,
}

impl TranslationObserver for CompletionRecorder {
    fn on_chunk_complete(&self, progress: &ChunkProgress<'_>) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.order.lock().push(progress.chunk.position);
    }
}

#[tokio::test]
async fn test_translateDocument_samplePair_shouldKeepParagraphLayout() {
    let translation = orchestrator(MockBackend::identity(), 1)
        .translate_document(common::SAMPLE_TEXT)
        .await
        .unwrap();

    assert_eq!(translation.text, "Привет. Как дела?\n\nВсё хорошо.");
    assert_eq!(translation.chunks.len(), 2);
    assert_eq!(translation.degraded_chunks().count(), 0);
}

#[tokio::test]
async fn test_translateDocument_identityWithBackTranslation_shouldAcceptEveryChunk() {
    let back = MockBackend::identity();
    let gate = QualityGate::new(gate_config()).with_back_translator(Arc::new(back.clone()));
    let orchestrator = Orchestrator::new(Segmenter::new(1000), gate, Arc::new(MockBackend::identity()), None);

    let translation = orchestrator.translate_document(common::SAMPLE_TEXT).await.unwrap();

    assert_eq!(translation.stats.accepted, 2);
    assert_eq!(translation.stats.attempts, 2);
    assert_eq!(back.calls(), 2);
    assert!(translation.chunks.iter().all(|c| c.result.attempts[0].similarity == Some(1.0)));
}

#[tokio::test]
async fn test_translateDocument_longSentence_shouldBeSingleChunk() {
    let sentence = format!("{}конец.", "очень ".repeat(60));
    let primary = MockBackend::identity();
    let orchestrator = Orchestrator::new(Segmenter::new(50), QualityGate::new(gate_config()), Arc::new(primary.clone()), None);

    let translation = orchestrator.translate_document(&sentence).await.unwrap();

    assert_eq!(primary.calls(), 1);
    assert_eq!(translation.chunks.len(), 1);
    assert_eq!(translation.text, sentence.trim());
}

#[tokio::test]
async fn test_translateDocument_concurrentOutOfOrderCompletion_shouldReassembleInSourceOrder() {
    let text = "Фраза 1. Фраза 2. Фраза 3.\n\nФраза 4. Фраза 5.\n\nФраза 6.";
    let recorder = Arc::new(CompletionRecorder::default());
    let primary = MockBackend::prefixed("T:").with_delay_fn(reverse_delay);
    let gate = QualityGate::new(gate_config()).with_observer(recorder.clone());
    let orchestrator = Orchestrator::new(Segmenter::new(10), gate, Arc::new(primary), None)
        .with_config(OrchestratorConfig { max_concurrent_chunks: 6 });

    let translation = orchestrator.translate_document(text).await.unwrap();

    assert_eq!(
        translation.text,
        "T:Фраза 1. T:Фраза 2. T:Фраза 3.\n\nT:Фраза 4. T:Фраза 5.\n\nT:Фраза 6."
    );
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 6);
    assert_ne!(*recorder.order.lock(), vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_translateDocument_concurrencyLimit_shouldCapInFlightCalls() {
    #[derive(Debug)]
    struct Gauge {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl rusten::TranslationBackend for Gauge {
        fn name(&self) -> &str {
            "gauge"
        }

        async fn translate(&self, text: &str, _: &str, _: &str) -> Result<String, rusten::ProviderError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(text.to_string())
        }
    }

    let gauge = Arc::new(Gauge {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let text = (1..=8).map(|i| format!("Абзац {}.", i)).collect::<Vec<_>>().join("\n\n");
    let orchestrator = Orchestrator::new(Segmenter::new(1000), QualityGate::new(gate_config()), gauge.clone(), None)
        .with_config(OrchestratorConfig { max_concurrent_chunks: 3 });

    orchestrator.translate_document(&text).await.unwrap();

    assert!(gauge.peak.load(Ordering::SeqCst) <= 3);
    assert!(gauge.peak.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_translateDocument_failingPrimaryWithFallback_shouldUseFallbackEverywhere() {
    let primary = MockBackend::failing();
    let fallback = MockBackend::prefixed("FB:");
    let gate = QualityGate::new(QualityGateConfig {
        max_retries: 2,
        ..gate_config()
    });
    let orchestrator = Orchestrator::new(Segmenter::new(1000), gate, Arc::new(primary.clone()), Some(Arc::new(fallback.clone())));

    let translation = orchestrator.translate_document(common::SAMPLE_TEXT).await.unwrap();

    assert_eq!(translation.text, "FB:Привет. Как дела?\n\nFB:Всё хорошо.");
    assert_eq!(translation.stats.fallback, 2);
    assert_eq!(translation.stats.attempts, 4);
    assert_eq!(primary.calls(), 4);
    assert_eq!(fallback.calls(), 2);
    assert_eq!(translation.degraded_chunks().count(), 2);
}

#[tokio::test]
async fn test_translateDocument_everythingFails_shouldKeepSourceAndMarkUntranslated() {
    let gate = QualityGate::new(QualityGateConfig {
        max_retries: 1,
        ..gate_config()
    });
    let orchestrator = Orchestrator::new(Segmenter::new(1000), gate, Arc::new(MockBackend::failing()), None);

    let translation = orchestrator.translate_document(common::SAMPLE_TEXT).await.unwrap();

    assert_eq!(translation.text, "Привет. Как дела?\n\nВсё хорошо.");
    assert_eq!(translation.stats.best_effort, 2);
    assert_eq!(translation.stats.untranslated, 2);
    assert!(translation.chunks.iter().all(|c| c.result.outcome == ChunkOutcome::BestEffort));
}

#[tokio::test]
async fn test_translateDocument_failPolicy_shouldStopWithChunkExhausted() {
    let gate = QualityGate::new(QualityGateConfig {
        max_retries: 1,
        on_exhausted: ExhaustedPolicy::Fail,
        ..gate_config()
    });
    let primary = MockBackend::scripted(vec![Ok("First.".to_string()), Err("down".to_string())]);
    let orchestrator = Orchestrator::new(Segmenter::new(1000), gate, Arc::new(primary), None);

    let error = orchestrator.translate_document(common::SAMPLE_TEXT).await.unwrap_err();

    assert!(matches!(
        error,
        TranslationError::ChunkExhausted {
            paragraph: 1,
            chunk: 0,
            attempts: 1
        }
    ));
}

#[tokio::test]
async fn test_translateDocument_abortMidRun_shouldStopDispatching() {
    let primary = MockBackend::identity().with_delay(30);
    let orchestrator = orchestrator(primary.clone(), 1);
    let handle = orchestrator.abort_handle();
    let text = (1..=10).map(|i| format!("Абзац {}.", i)).collect::<Vec<_>>().join("\n\n");

    let aborter = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(75)).await;
        handle.abort();
    });
    let error = orchestrator.translate_document(&text).await.unwrap_err();
    aborter.await.unwrap();

    match error {
        TranslationError::Aborted { completed, total } => {
            assert_eq!(total, 10);
            assert!(completed >= 1 && completed < 10);
            assert_eq!(primary.calls(), completed);
        }
        other => panic!("expected an abort, got {:?}", other),
    }
}
