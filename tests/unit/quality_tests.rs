/*!
 * Tests for quality checks and the per-chunk gate
 */

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use rusten::providers::mock::MockBackend;
use rusten::translation::quality::{
    confidence_score, is_repetitive, similarity, ChunkOutcome, ChunkState, ExhaustedPolicy, QualityGate,
    QualityGateConfig, QualityWarning,
};
use rusten::translation::{ChunkRef, TranslationObserver};
use rusten::TranslationError;

/// Observer recording every state change
#[derive(Default)]
struct StateRecorder {
    states: Mutex<Vec<ChunkState>>,
    warnings: Mutex<Vec<QualityWarning>>,
}

impl TranslationObserver for StateRecorder {
    fn on_state_change(&self, _chunk: ChunkRef, state: ChunkState) {
        self.states.lock().push(state);
    }

    fn on_quality_warning(&self, _chunk: ChunkRef, warning: &QualityWarning) {
        self.warnings.lock().push(warning.clone());
    }
}

fn config() -> QualityGateConfig {
    QualityGateConfig {
        retry_backoff_ms: 0,
        attempt_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

#[test]
fn test_similarity_symmetricInputs_shouldScoreEqually() {
    let a = "Мороз и солнце; день чудесный!";
    let b = "Мороз и солнце, день прекрасный.";
    assert!((similarity(a, b) - similarity(b, a)).abs() < 0.05);
    assert!(similarity(a, b) > 0.6);
}

#[test]
fn test_similarity_emptyAgainstText_shouldBeZero() {
    assert_eq!(similarity("", ""), 1.0);
    assert_eq!(similarity("", "текст"), 0.0);
}

#[test]
fn test_confidenceScore_emptyText_shouldBeZero() {
    assert_eq!(confidence_score(""), 0.0);
    assert_eq!(confidence_score("one two three"), 1.0);
    assert!((confidence_score("la la la la") - 0.25).abs() < f32::EPSILON);
}

#[test]
fn test_isRepetitive_loopInLongOutput_shouldFlag() {
    let looping = "the end ".repeat(40);
    assert!(is_repetitive(&looping, 0.5));

    let varied: String = (0..100).map(|i| format!("word{} ", i)).collect();
    assert!(!is_repetitive(&varied, 0.5));
}

#[tokio::test]
async fn test_translateChunk_failsTwice_shouldWalkRetryStates() {
    let recorder = Arc::new(StateRecorder::default());
    let gate = QualityGate::new(config()).with_observer(recorder.clone());

    let result = gate
        .translate_chunk(ChunkRef::default(), "Привет.", &MockBackend::fail_times(2), None)
        .await
        .unwrap();

    assert_eq!(result.outcome, ChunkOutcome::Accepted);
    assert_eq!(
        *recorder.states.lock(),
        vec![
            ChunkState::Pending,
            ChunkState::Attempting(1),
            ChunkState::Retrying(1),
            ChunkState::Attempting(2),
            ChunkState::Retrying(2),
            ChunkState::Attempting(3),
            ChunkState::Accepted,
        ]
    );
}

#[tokio::test]
async fn test_translateChunk_exhaustedWithFallback_shouldEndInFallbackState() {
    let recorder = Arc::new(StateRecorder::default());
    let gate = QualityGate::new(QualityGateConfig {
        max_retries: 2,
        ..config()
    })
    .with_observer(recorder.clone());
    let fallback = MockBackend::prefixed("FB:");

    let result = gate
        .translate_chunk(ChunkRef::default(), "Текст.", &MockBackend::failing(), Some(&fallback))
        .await
        .unwrap();

    assert_eq!(result.outcome, ChunkOutcome::Fallback);
    assert_eq!(result.text, "FB:Текст.");
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(fallback.calls(), 1);
    let states = recorder.states.lock();
    assert_eq!(states[states.len() - 2], ChunkState::Exhausted);
    assert_eq!(states[states.len() - 1], ChunkState::Fallback);
}

#[tokio::test]
async fn test_translateChunk_emptyOutput_shouldCountAsFailure() {
    let backend = MockBackend::empty();
    let gate = QualityGate::new(QualityGateConfig {
        max_retries: 2,
        ..config()
    });

    let result = gate.translate_chunk(ChunkRef::default(), "Текст.", &backend, None).await.unwrap();

    assert_eq!(backend.calls(), 2);
    assert_eq!(result.outcome, ChunkOutcome::BestEffort);
    assert!(result.untranslated);
    assert_eq!(result.text, "Текст.");
    assert!(result.attempts.iter().all(|a| a.error.is_some()));
}

#[tokio::test]
async fn test_translateChunk_backTranslation_shouldSwapLanguages() {
    let primary = MockBackend::prefixed("");
    let back = MockBackend::identity();
    let gate = QualityGate::new(config()).with_back_translator(Arc::new(back.clone()));

    let result = gate.translate_chunk(ChunkRef::default(), "Привет.", &primary, None).await.unwrap();

    assert_eq!(result.outcome, ChunkOutcome::Accepted);
    assert_eq!(back.requests(), vec!["Привет.".to_string()]);
    let attempt = &result.attempts[0];
    assert_eq!(attempt.similarity, Some(1.0));
    assert_eq!(attempt.back_translation.as_deref(), Some("Привет."));
}

#[tokio::test]
async fn test_translateChunk_similarityEqualToThreshold_shouldReject() {
    // Identity back-translation gives exactly 1.0, which must be strictly exceeded
    let gate = QualityGate::new(QualityGateConfig {
        max_retries: 1,
        similarity_threshold: 1.0,
        ..config()
    })
    .with_back_translator(Arc::new(MockBackend::identity()));

    let result = gate
        .translate_chunk(ChunkRef::default(), "Привет.", &MockBackend::identity(), None)
        .await
        .unwrap();

    assert_eq!(result.outcome, ChunkOutcome::BestEffort);
    assert!(!result.untranslated);
    assert!(matches!(result.attempts[0].warnings[0], QualityWarning::LowSimilarity { .. }));
}

#[tokio::test]
async fn test_translateChunk_failPolicyAfterFailedFallback_shouldReturnChunkExhausted() {
    let gate = QualityGate::new(QualityGateConfig {
        max_retries: 2,
        on_exhausted: ExhaustedPolicy::Fail,
        ..config()
    });
    let chunk = ChunkRef {
        paragraph: 3,
        chunk: 1,
        position: 9,
    };

    let error = gate
        .translate_chunk(chunk, "Текст.", &MockBackend::failing(), Some(&MockBackend::failing()))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        TranslationError::ChunkExhausted {
            paragraph: 3,
            chunk: 1,
            attempts: 2
        }
    ));
}

#[tokio::test]
async fn test_translateChunk_lowConfidence_shouldNotifyObserver() {
    let recorder = Arc::new(StateRecorder::default());
    let gate = QualityGate::new(QualityGateConfig {
        use_confidence_check: true,
        ..config()
    })
    .with_observer(recorder.clone());
    let backend = MockBackend::scripted(vec![Ok("да да да да".to_string())]);

    let result = gate.translate_chunk(ChunkRef::default(), "Да.", &backend, None).await.unwrap();

    assert_eq!(result.outcome, ChunkOutcome::Accepted);
    assert!(result.is_degraded());
    assert_eq!(recorder.warnings.lock().len(), 1);
    assert!(matches!(recorder.warnings.lock()[0], QualityWarning::LowConfidence { .. }));
}

#[tokio::test]
async fn test_translateChunk_backoff_shouldDoubleBetweenRetries() {
    let gate = QualityGate::new(QualityGateConfig {
        max_retries: 3,
        retry_backoff_ms: 40,
        ..config()
    });
    let start = std::time::Instant::now();

    let result = gate
        .translate_chunk(ChunkRef::default(), "Текст.", &MockBackend::fail_times(2), None)
        .await
        .unwrap();

    assert_eq!(result.outcome, ChunkOutcome::Accepted);
    // 40ms after the first failure, 80ms after the second
    assert!(start.elapsed() >= Duration::from_millis(120));
}
