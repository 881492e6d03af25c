/*!
 * HTTP clients against a local stub server
 *
 * Checks request shape, response parsing and status mapping for every
 * backend without reaching a real service.
 */

use crate::common::http_stub::HttpStub;
use rusten::errors::ProviderError;
use rusten::providers::anthropic::Anthropic;
use rusten::providers::libretranslate::LibreTranslate;
use rusten::providers::ollama::Ollama;
use rusten::providers::openai::OpenAI;
use rusten::providers::{ChatBackend, TranslationBackend};

const PROMPT: &str = "Translate from {source_language} to {target_language}.";

#[tokio::test]
async fn test_ollama_translate_shouldPostGenerateRequest() {
    let stub = HttpStub::start(200, r#"{"model":"qwen","response":"it is cold.","done":true}"#).await;
    let backend = ChatBackend::new("ollama", Ollama::new(&stub.url, "qwen", 0.3, 10), PROMPT, None);

    let output = backend.translate("Холодно.", "ru", "en").await.unwrap();

    assert_eq!(output, "It is cold.");
    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].request_line.starts_with("POST /api/generate"));
    let body = requests[0].json();
    assert_eq!(body["model"], "qwen");
    assert_eq!(body["prompt"], "Холодно.");
    assert_eq!(body["system"], "Translate from Russian to English.");
    assert_eq!(body["stream"], false);
}

#[tokio::test]
async fn test_ollama_streamedBody_shouldConcatenatePieces() {
    let body = "{\"model\":\"qwen\",\"response\":\"Good \",\"done\":false}\n{\"model\":\"qwen\",\"response\":\"night.\",\"done\":true}\n";
    let stub = HttpStub::start(200, body).await;
    let backend = ChatBackend::new("ollama", Ollama::new(&stub.url, "qwen", 0.3, 10), PROMPT, None);

    assert_eq!(backend.translate("Спокойной ночи.", "ru", "en").await.unwrap(), "Good night.");
}

#[tokio::test]
async fn test_ollama_testConnection_shouldQueryVersion() {
    let stub = HttpStub::start(200, r#"{"version":"0.5.1"}"#).await;
    let ollama = Ollama::new(&stub.url, "qwen", 0.3, 10);

    assert_eq!(ollama.version().await.unwrap(), "0.5.1");
    assert!(stub.requests()[0].request_line.starts_with("GET /api/version"));
}

#[tokio::test]
async fn test_openai_translate_shouldSendBearerAndMessages() {
    let stub = HttpStub::start(
        200,
        r#"{"choices":[{"message":{"role":"assistant","content":"Assistant: Good morning."}}],"usage":null}"#,
    )
    .await;
    let endpoint = format!("{}/v1", stub.url);
    let backend = ChatBackend::new("openai", OpenAI::new("sk-test", &endpoint, "gpt-4o-mini", 0.3, 10), PROMPT, None);

    let output = backend.translate("Доброе утро.", "ru", "en").await.unwrap();

    assert_eq!(output, "Good morning.");
    let request = &stub.requests()[0];
    assert!(request.request_line.starts_with("POST /v1/chat/completions"));
    assert!(request.headers.contains("authorization: bearer sk-test"));
    let body = request.json();
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "Доброе утро.");
}

#[tokio::test]
async fn test_openai_withoutKey_shouldOmitAuthorization() {
    let stub = HttpStub::start(200, r#"{"choices":[{"message":{"role":"assistant","content":"Hi."}}]}"#).await;
    let backend = ChatBackend::new("lmstudio", OpenAI::new("", &stub.url, "local-model", 0.3, 10), PROMPT, None);

    backend.translate("Привет.", "ru", "en").await.unwrap();

    assert!(!stub.requests()[0].headers.contains("authorization"));
}

#[tokio::test]
async fn test_openai_rateLimited_shouldMapTo429Error() {
    let stub = HttpStub::start(429, r#"{"error":{"message":"slow down"}}"#).await;
    let backend = ChatBackend::new("openai", OpenAI::new("sk-test", &stub.url, "gpt-4o-mini", 0.3, 10), PROMPT, None);

    let error = backend.translate("Привет.", "ru", "en").await.unwrap_err();

    match error {
        ProviderError::RateLimitExceeded(message) => assert!(message.contains("slow down")),
        other => panic!("expected a rate limit error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_anthropic_translate_shouldSendVersionHeaderAndSystem() {
    let stub = HttpStub::start(
        200,
        r#"{"content":[{"type":"text","text":"The sea was calm."}],"usage":{"input_tokens":12,"output_tokens":5}}"#,
    )
    .await;
    let backend = ChatBackend::new(
        "anthropic",
        Anthropic::new("key-123", &stub.url, "claude-3-5-haiku-latest", 0.3, 10),
        PROMPT,
        None,
    );

    let output = backend.translate("Море было спокойным.", "ru", "en").await.unwrap();

    assert_eq!(output, "The sea was calm.");
    let request = &stub.requests()[0];
    assert!(request.request_line.starts_with("POST /v1/messages"));
    assert!(request.headers.contains("x-api-key: key-123"));
    assert!(request.headers.contains("anthropic-version: 2023-06-01"));
    assert_eq!(request.json()["system"], "Translate from Russian to English.");
}

#[tokio::test]
async fn test_anthropic_badKey_shouldBeAuthenticationError() {
    let stub = HttpStub::start(401, r#"{"error":{"type":"authentication_error"}}"#).await;
    let backend = ChatBackend::new("anthropic", Anthropic::new("bad", &stub.url, "m", 0.3, 10), PROMPT, None);

    let error = backend.translate("Привет.", "ru", "en").await.unwrap_err();

    assert!(matches!(error, ProviderError::AuthenticationError(_)));
}

#[tokio::test]
async fn test_libreTranslate_threeLetterCodes_shouldSendTwoLetterCodes() {
    let stub = HttpStub::start(200, r#"{"translatedText":"the wind howled."}"#).await;
    let backend = LibreTranslate::new(&stub.url, "", 10, None);

    let output = backend.translate("Ветер выл.", "rus", "eng").await.unwrap();

    assert_eq!(output, "The wind howled.");
    let request = &stub.requests()[0];
    assert!(request.request_line.starts_with("POST /translate"));
    let body = request.json();
    assert_eq!(body["q"], "Ветер выл.");
    assert_eq!(body["source"], "ru");
    assert_eq!(body["target"], "en");
    assert_eq!(body["format"], "text");
}

#[tokio::test]
async fn test_libreTranslate_serverError_shouldCarryStatus() {
    let stub = HttpStub::start(500, r#"{"error":"model not loaded"}"#).await;
    let backend = LibreTranslate::new(&stub.url, "", 10, None);

    let error = backend.translate("Ветер выл.", "ru", "en").await.unwrap_err();

    assert!(matches!(error, ProviderError::ApiError { status_code: 500, .. }));
}

#[tokio::test]
async fn test_testConnection_unreachableServer_shouldBeConnectionError() {
    // Bind and drop a listener so the port is very likely closed
    let url = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let backend = LibreTranslate::new(&url, "", 5, None);

    let error = backend.test_connection().await.unwrap_err();

    assert!(matches!(error, ProviderError::ConnectionError(_)));
}
