//! Per-chunk conversion state machine.
//!
//! A task moves `Pending -> attempt -> {Succeeded | Pending (retry) | FailedFatal}`;
//! `Cancelled` ends it from any non-terminal point. The transition itself is
//! `ConversionTask::advance`, kept free of I/O so it can be tested directly.

use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;
use tts_client::{Disposition, SynthesisOutput, TtsError};

/// Lifecycle of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Succeeded,
    /// Retrying cannot help; carries the error message.
    FailedFatal(String),
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

/// What the scheduler does after an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Finished(TaskState),
    Retry(Duration),
}

/// Backoff parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// First retry delay; doubles on every transient failure.
    pub base: Duration,
    /// Upper bound for any computed delay.
    pub max_delay: Duration,
    /// Random extra delay added to spread retries.
    pub jitter: Duration,
    /// Wait after a rate limit that did not say how long to wait.
    pub rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(20),
            jitter: Duration::from_millis(500),
            rate_limit_wait: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn jitter(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }

    /// Delay before retry number `exponent` of a transient failure.
    pub fn backoff(&self, exponent: u32) -> Duration {
        let factor = 2u32.saturating_pow(exponent.min(16));
        let delay = self.base.saturating_mul(factor).saturating_add(self.jitter());
        delay.min(self.max_delay)
    }

    /// Delay after a rate limit without a server-mandated wait.
    pub fn rate_limit_fallback(&self) -> Duration {
        self.rate_limit_wait + self.jitter()
    }
}

/// One chunk to convert, owned by the scheduler.
#[derive(Debug, Clone)]
pub struct ConversionTask {
    pub index: usize,
    pub text: String,
    pub voice: String,
    pub output_path: PathBuf,
    /// Attempts made so far.
    pub attempts: u32,
    /// Exponent for the next transient-failure backoff.
    pub backoff_exponent: u32,
    pub state: TaskState,
}

impl ConversionTask {
    pub fn new(index: usize, text: String, voice: String, output_path: PathBuf) -> Self {
        Self {
            index,
            text,
            voice,
            output_path,
            attempts: 0,
            backoff_exponent: 0,
            state: TaskState::Pending,
        }
    }

    /// Apply the outcome of one attempt.
    pub fn advance(
        &mut self,
        outcome: &Result<SynthesisOutput, TtsError>,
        policy: &RetryPolicy,
    ) -> Step {
        self.attempts += 1;

        let err = match outcome {
            Ok(_) => return self.finish(TaskState::Succeeded),
            Err(e) => e,
        };

        match err.disposition() {
            Disposition::Fatal => self.finish(TaskState::FailedFatal(err.to_string())),
            Disposition::Cancelled => self.finish(TaskState::Cancelled),
            // A mandated wait is honoured exactly and is not a backoff step
            Disposition::RetryAfter(Some(delay)) => Step::Retry(delay),
            Disposition::RetryAfter(None) => Step::Retry(policy.rate_limit_fallback()),
            Disposition::Retryable => {
                let delay = policy.backoff(self.backoff_exponent);
                self.backoff_exponent = self.backoff_exponent.saturating_add(1);
                Step::Retry(delay)
            }
        }
    }

    /// Mark the task cancelled (used when cancellation is seen outside an attempt).
    pub fn cancel(&mut self) {
        if !self.state.is_terminal() {
            self.state = TaskState::Cancelled;
        }
    }

    fn finish(&mut self, state: TaskState) -> Step {
        self.state = state.clone();
        Step::Finished(state)
    }
}
