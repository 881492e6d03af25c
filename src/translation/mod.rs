/*!
 * Document translation pipeline.
 *
 * - `segmenter`: paragraph and sentence segmentation into bounded chunks
 * - `quality`: similarity, confidence and repetition checks plus the per-chunk gate
 * - `orchestrator`: concurrent dispatch and in-order reassembly
 * - `observer`: progress and diagnostics hooks
 * - `formatting`: clean-up of raw backend output
 * - `core`: backend construction from configuration
 */

// Re-export main types for easier usage
pub use self::core::{create_backend, BackendSet};
pub use self::observer::{ChunkProgress, ChunkRef, LogObserver, NoopObserver, ObserverSet, TranslationObserver};
pub use self::orchestrator::{
    AbortHandle, ChunkReport, DocumentTranslation, Orchestrator, OrchestratorConfig, TranslationStats,
};
pub use self::segmenter::{Chunk, Paragraph, PunctuationSentenceSplitter, Segmenter, SentenceSplitter};

// Submodules
pub mod core;
pub mod formatting;
pub mod observer;
pub mod orchestrator;
pub mod quality;
pub mod segmenter;
