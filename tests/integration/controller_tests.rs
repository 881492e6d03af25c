/*!
 * End-to-end runs through the application controller with mock backends
 */

use encoding_rs::WINDOWS_1251;
use std::fs;
use std::sync::Arc;

use crate::common;
use rusten::providers::mock::MockBackend;
use rusten::translation::BackendSet;
use rusten::{AppError, Config, Controller, RunOutcome, TranslationError};

fn backends(primary: MockBackend) -> BackendSet {
    BackendSet {
        primary: Arc::new(primary),
        fallback: None,
        back_translator: None,
    }
}

fn controller(config: Config, backends: BackendSet) -> Controller {
    common::init_test_logging();
    Controller::with_config(config).unwrap().with_backends(backends).without_progress()
}

#[tokio::test]
async fn test_run_cp1251TextFile_shouldWriteTranslationNextToInput() {
    let dir = common::create_temp_dir().unwrap();
    let source = "Глава первая.\n\nЗа окном шёл снег, и на улице не было ни души. Где-то вдалеке лаяла собака.";
    let (bytes, _, _) = WINDOWS_1251.encode(source);
    let input = common::create_test_bytes(dir.path(), "book.txt", &bytes).unwrap();

    let outcome = controller(common::fast_config(), backends(MockBackend::prefixed("EN:")))
        .run(input, None, false)
        .await
        .unwrap();

    let RunOutcome::Translated { output, issues_log, stats } = outcome else {
        panic!("expected a translation");
    };
    assert_eq!(output, dir.path().join("book.en.txt"));
    assert!(issues_log.is_none());
    assert_eq!(stats.paragraphs, 2);
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "EN:Глава первая.\n\nEN:За окном шёл снег, и на улице не было ни души. Где-то вдалеке лаяла собака.\n"
    );
}

#[tokio::test]
async fn test_run_existingOutput_shouldSkipWithoutCallingBackend() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "book.txt", common::SAMPLE_TEXT).unwrap();
    let existing = common::create_test_file(dir.path(), "book.en.txt", "old translation").unwrap();
    let primary = MockBackend::identity();

    let outcome = controller(common::fast_config(), backends(primary.clone()))
        .run(input, None, false)
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Skipped { ref output } if *output == existing));
    assert_eq!(primary.calls(), 0);
    assert_eq!(fs::read_to_string(&existing).unwrap(), "old translation");
}

#[tokio::test]
async fn test_run_existingOutputWithForce_shouldOverwrite() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "book.txt", common::SAMPLE_TEXT).unwrap();
    let output = common::create_test_file(dir.path(), "custom.txt", "old translation").unwrap();

    controller(common::fast_config(), backends(MockBackend::identity()))
        .run(input, Some(output.clone()), true)
        .await
        .unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), format!("{}\n", common::SAMPLE_TEXT));
}

#[tokio::test]
async fn test_run_fb2Input_shouldTranslateBodyParagraphs() {
    let dir = common::create_temp_dir().unwrap();
    let xml = common::fb2_document(&["Первый абзац.", "Второй абзац."]);
    let input = common::create_test_file(dir.path(), "novel.fb2", &xml).unwrap();

    let outcome = controller(common::fast_config(), backends(MockBackend::prefixed("T:")))
        .run(input, None, false)
        .await
        .unwrap();

    let RunOutcome::Translated { output, .. } = outcome else {
        panic!("expected a translation");
    };
    assert_eq!(output, dir.path().join("novel.en.txt"));
    assert_eq!(fs::read_to_string(&output).unwrap(), "T:Первый абзац.\n\nT:Второй абзац.\n");
}

#[tokio::test]
async fn test_run_epubInput_shouldTranslateChaptersInOrder() {
    let dir = common::create_temp_dir().unwrap();
    let bytes = common::epub_bytes(&["<p>Начало.</p>", "<p>Середина.</p>", "<p>Конец.</p>"]).unwrap();
    let input = common::create_test_bytes(dir.path(), "novel.epub", &bytes).unwrap();

    let mut config = common::fast_config();
    config.target_language = "de".to_string();
    let outcome = controller(config, backends(MockBackend::identity())).run(input, None, false).await.unwrap();

    let RunOutcome::Translated { output, stats, .. } = outcome else {
        panic!("expected a translation");
    };
    assert_eq!(output, dir.path().join("novel.de.txt"));
    assert_eq!(stats.chunks, 3);
    assert_eq!(fs::read_to_string(&output).unwrap(), "Начало.\n\nСередина.\n\nКонец.\n");
}

#[tokio::test]
async fn test_run_degradedChunks_shouldWriteIssuesLog() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "book.txt", common::SAMPLE_TEXT).unwrap();
    let mut config = common::fast_config();
    config.quality.max_retries = 2;

    let outcome = controller(config, backends(MockBackend::failing())).run(input, None, false).await.unwrap();

    let RunOutcome::Translated { output, issues_log, stats } = outcome else {
        panic!("expected a translation");
    };
    assert_eq!(stats.untranslated, 2);
    assert_eq!(fs::read_to_string(&output).unwrap(), format!("{}\n", common::SAMPLE_TEXT));

    let log_path = issues_log.expect("issues log should be written");
    assert_eq!(log_path, dir.path().join("book.en.txt.issues.log"));
    let log = fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("2 of 2 chunks need review"));
    assert!(log.contains("paragraph 1, chunk 1"));
    assert!(log.contains("left untranslated"));
    assert!(log.contains("Simulated backend failure"));
}

#[tokio::test]
async fn test_run_failPolicy_shouldReturnTypedError() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "book.txt", common::SAMPLE_TEXT).unwrap();
    let mut config = common::fast_config();
    config.quality.max_retries = 1;
    config.quality.on_exhausted = rusten::translation::quality::ExhaustedPolicy::Fail;

    let error = controller(config, backends(MockBackend::failing()))
        .run(input, None, false)
        .await
        .unwrap_err();

    assert!(matches!(
        AppError::from(error),
        AppError::Translation(TranslationError::ChunkExhausted { paragraph: 0, .. })
    ));
    assert!(!dir.path().join("book.en.txt").exists());
}

#[tokio::test]
async fn test_run_missingInput_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let result = controller(common::fast_config(), backends(MockBackend::identity()))
        .run(dir.path().join("missing.txt"), None, false)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_run_abortedBeforeStart_shouldReportAbort() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "book.txt", common::SAMPLE_TEXT).unwrap();
    let controller = controller(common::fast_config(), backends(MockBackend::identity()));
    controller.abort_handle().abort();

    let error = controller.run(input, None, false).await.unwrap_err();

    let app_error = AppError::from(error);
    assert_eq!(app_error.exit_code(), 130);
}
