/*!
 * Error types for the rusten application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when calling a translation backend
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The backend did not answer within the allotted time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with no usable text
    #[error("Backend returned an empty translation")]
    EmptyResponse,
}

/// Errors raised while reading or decoding an input document
#[derive(Error, Debug)]
pub enum DocumentError {
    /// No candidate encoding could decode the input
    #[error("Unable to decode {path:?} with any of the attempted encodings: {}", tried.join(", "))]
    Decode {
        /// Input that failed to decode
        path: PathBuf,
        /// Encoding names tried, in order
        tried: Vec<String>,
    },

    /// The file extension is not handled by any reader
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The container or markup could not be parsed
    #[error("Malformed {format} document: {message}")]
    Malformed {
        /// Format being parsed
        format: &'static str,
        /// Parser message
        message: String,
    },

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A chunk failed its quality gate and the run is configured to stop
    #[error("Chunk {} of paragraph {} failed after {attempts} attempts", .chunk + 1, .paragraph + 1)]
    ChunkExhausted {
        /// Paragraph index (zero-based)
        paragraph: usize,
        /// Chunk index within the paragraph (zero-based)
        chunk: usize,
        /// Forward attempts performed
        attempts: u32,
    },

    /// The run was cancelled before every chunk was dispatched
    #[error("Translation aborted after {completed} of {total} chunks")]
    Aborted {
        /// Chunks that finished
        completed: usize,
        /// Chunks in the document
        total: usize,
    },

    /// Error with the input document
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from document reading
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AppError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Translation(TranslationError::Aborted { .. }) => 130,
            Self::Config(_) => 78,
            Self::Document(_) | Self::Translation(TranslationError::Document(_)) => 65,
            _ => 1,
        }
    }
}

// Recover the typed error behind an application-layer `anyhow` chain
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        let error = match error.downcast::<AppError>() {
            Ok(app_error) => return app_error,
            Err(error) => error,
        };
        let error = match error.downcast::<TranslationError>() {
            Ok(translation_error) => return Self::Translation(translation_error),
            Err(error) => error,
        };
        let error = match error.downcast::<DocumentError>() {
            Ok(document_error) => return Self::Document(document_error),
            Err(error) => error,
        };
        match error.downcast::<ProviderError>() {
            Ok(provider_error) => Self::Provider(provider_error),
            Err(error) => Self::Unknown(format!("{:#}", error)),
        }
    }
}
