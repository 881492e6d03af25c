/*!
 * Tests for the chat provider adapter
 */

use crate::common::mock_providers::MockChatProvider;
use rusten::errors::ProviderError;
use rusten::providers::{ChatBackend, TranslationBackend};

const PROMPT: &str = "Translate from {source_language} to {target_language}.";

#[tokio::test]
async fn test_translate_placeholders_shouldRenderLanguageNames() {
    let provider = MockChatProvider::replying("Hello.");
    let requests = provider.requests();
    let backend = ChatBackend::new("mock-chat", provider, PROMPT, None);

    backend.translate("Привет.", "ru", "en").await.unwrap();

    let recorded = requests.lock();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].system_prompt, "Translate from Russian to English.");
    assert_eq!(recorded[0].text, "Привет.");
}

#[test]
fn test_renderSystemPrompt_unknownCode_shouldKeepCode() {
    let backend = ChatBackend::new("mock-chat", MockChatProvider::replying(""), PROMPT, None);
    assert_eq!(
        backend.render_system_prompt("xx", "fr"),
        "Translate from xx to French."
    );
}

#[tokio::test]
async fn test_translate_chattyReply_shouldBeCleaned() {
    let provider = MockChatProvider::replying("Here's the English translation:\n\n  hello there.   how are you?");
    let backend = ChatBackend::new("mock-chat", provider, PROMPT, None);

    let output = backend.translate("Привет. Как дела?", "ru", "en").await.unwrap();

    assert_eq!(output, "Hello there. How are you?");
}

#[tokio::test]
async fn test_translate_providerFailure_shouldPropagateTypedError() {
    let backend = ChatBackend::new("mock-chat", MockChatProvider::failing_with(401), PROMPT, None);

    let error = backend.translate("Привет.", "ru", "en").await.unwrap_err();

    assert!(matches!(error, ProviderError::AuthenticationError(_)));
}

#[tokio::test]
async fn test_testConnection_shouldDelegateToProvider() {
    let healthy = ChatBackend::new("up", MockChatProvider::replying("ok"), PROMPT, None);
    let broken = ChatBackend::new("down", MockChatProvider::failing_with(500), PROMPT, None);

    assert!(healthy.test_connection().await.is_ok());
    assert!(matches!(broken.test_connection().await, Err(ProviderError::ConnectionError(_))));
    assert_eq!(broken.name(), "down");
}

#[test]
fn test_translate_blockingCaller_shouldPaceAndTranslate() {
    let backend = ChatBackend::new("mock-chat", MockChatProvider::replying("good evening."), PROMPT, Some(6000));

    let output = tokio_test::block_on(async {
        backend.translate("Добрый вечер.", "ru", "en").await
    });

    assert_eq!(output.unwrap(), "Good evening.");
}
