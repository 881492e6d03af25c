/*!
 * Quality assurance for chunk translations.
 *
 * - **Similarity**: back-translation similarity scoring
 * - **Confidence**: unique-word ratio and repetition detection
 * - **Gate**: the retry / verification / fallback state machine
 */

pub mod confidence;
pub mod gate;
pub mod similarity;

// Re-export main types
pub use confidence::{confidence_score, is_repetitive, repetition_ratio};
pub use gate::{
    ChunkOutcome, ChunkState, ExhaustedPolicy, QualityGate, QualityGateConfig, QualityWarning, TranslationAttempt,
    TranslationResult,
};
pub use similarity::similarity;
