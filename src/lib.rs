/*!
 * # rusten - book translation with LLM backends and quality checks
 *
 * A Rust library for translating long documents (plain text, FB2, EPUB) with
 * local or remote translation backends, compensating for their failure modes.
 *
 * ## Features
 *
 * - Encoding detection with a Cyrillic fallback chain (UTF-8, Windows-1251, KOI8-R, ...)
 * - Paragraph- and sentence-preserving segmentation into size-bounded chunks
 * - Translation backends:
 *   - Ollama (local LLM)
 *   - OpenAI-compatible APIs, LM Studio included
 *   - Anthropic API
 *   - LibreTranslate
 * - Per-chunk quality gate: retries with backoff, back-translation similarity,
 *   confidence and repetition checks, fallback backend, best-effort results
 * - Bounded concurrency with in-order reassembly and cancellation
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `encoding`: Input encoding detection and decoding
 * - `reader`: Document readers (text, FB2, EPUB)
 * - `translation`: The translation pipeline:
 *   - `translation::segmenter`: Paragraph and sentence segmentation
 *   - `translation::quality`: Similarity, confidence and the quality gate
 *   - `translation::orchestrator`: Document-level dispatch and reassembly
 *   - `translation::observer`: Progress and diagnostics hooks
 *   - `translation::formatting`: Output clean-up
 *   - `translation::core`: Backend construction
 * - `providers`: The backend trait and clients for each service
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod encoding;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod reader;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, RunOutcome};
pub use encoding::EncodingResolver;
pub use errors::{AppError, DocumentError, ProviderError, TranslationError};
pub use language_utils::{get_language_name, language_codes_match};
pub use providers::TranslationBackend;
pub use reader::{read_document, Document, DocumentFormat};
pub use translation::{Orchestrator, Segmenter};
