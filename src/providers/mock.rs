/*!
 * Mock translation backend for testing.
 *
 * Simulates the behaviors the quality gate and orchestrator must cope with:
 * - `MockBackend::identity()` - Echoes the input
 * - `MockBackend::prefixed(p)` - Echoes the input behind a prefix
 * - `MockBackend::fail_times(n)` - Fails `n` times, then echoes
 * - `MockBackend::failing()` - Always fails with an error
 * - `MockBackend::empty()` - Always returns an empty string
 * - `MockBackend::scripted(..)` - Replays a fixed list of results
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::TranslationBackend;

/// Behavior mode for the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Return the input unchanged
    Identity,
    /// Return the input behind a prefix
    Prefixed(String),
    /// Fail the first `n` calls, then return the input
    FailTimes(usize),
    /// Always fail
    Failing,
    /// Always return an empty string
    Empty,
    /// Return the scripted results in order, repeating the last one
    Scripted(Vec<Result<String, String>>),
}

/// Mock backend with a shared call counter
#[derive(Debug, Clone)]
pub struct MockBackend {
    /// Behavior mode
    behavior: MockBehavior,
    /// Calls made so far, shared between clones
    call_count: Arc<AtomicUsize>,
    /// Every text received, in call order
    requests: Arc<Mutex<Vec<String>>>,
    /// Fixed delay before answering
    delay: Duration,
    /// Per-input delay in milliseconds, overrides `delay`
    delay_fn: Option<fn(&str) -> u64>,
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            call_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            delay_fn: None,
        }
    }

    /// Echo the input
    pub fn identity() -> Self {
        Self::new(MockBehavior::Identity)
    }

    /// Echo the input behind `prefix`
    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self::new(MockBehavior::Prefixed(prefix.into()))
    }

    /// Fail `n` times, then echo
    pub fn fail_times(n: usize) -> Self {
        Self::new(MockBehavior::FailTimes(n))
    }

    /// Always fail
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Always return an empty string
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Replay `results` in order; `Err` entries become request failures
    pub fn scripted(results: Vec<Result<String, String>>) -> Self {
        Self::new(MockBehavior::Scripted(results))
    }

    /// Sleep before every answer
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay = Duration::from_millis(delay_ms);
        self
    }

    /// Sleep for a duration computed from the input
    pub fn with_delay_fn(mut self, delay_fn: fn(&str) -> u64) -> Self {
        self.delay_fn = Some(delay_fn);
        self
    }

    /// Number of calls made so far
    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Texts received so far, in call order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn respond(&self, call: usize, text: &str) -> Result<String, ProviderError> {
        match &self.behavior {
            MockBehavior::Identity => Ok(text.to_string()),
            MockBehavior::Prefixed(prefix) => Ok(format!("{}{}", prefix, text)),
            MockBehavior::FailTimes(n) if call < *n => Err(ProviderError::RequestFailed(format!(
                "Simulated failure (request #{})",
                call + 1
            ))),
            MockBehavior::FailTimes(_) => Ok(text.to_string()),
            MockBehavior::Failing => Err(ProviderError::RequestFailed("Simulated backend failure".to_string())),
            MockBehavior::Empty => Ok(String::new()),
            MockBehavior::Scripted(results) => match results.get(call).or_else(|| results.last()) {
                Some(Ok(output)) => Ok(output.clone()),
                Some(Err(message)) => Err(ProviderError::RequestFailed(message.clone())),
                None => Ok(String::new()),
            },
        }
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn translate(&self, text: &str, _source_language: &str, _target_language: &str) -> Result<String, ProviderError> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(text.to_string());

        let delay = match self.delay_fn {
            Some(delay_fn) => Duration::from_millis(delay_fn(text)),
            None => self.delay,
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.respond(call, text)
    }
}
