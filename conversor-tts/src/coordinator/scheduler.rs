//! Bounded-concurrency scheduler driving a TTS provider over every chunk.
//!
//! All chunk futures are polled from the caller's task through a
//! `FuturesUnordered`; nothing is spawned. A semaphore admits at most
//! `concurrency` chunks at a time over the whole task list.

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tts_client::{SynthesisRequest, TtsProvider};

use super::task::{ConversionTask, RetryPolicy, Step, TaskState};

/// Default number of chunks in flight.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Progress information for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerProgress {
    /// Total number of chunks.
    pub total: usize,
    /// Chunks converted, including ones found on disk.
    pub completed: usize,
    /// Chunks that failed permanently.
    pub failed: usize,
    /// Highest index such that every chunk up to it succeeded.
    pub last_contiguous: Option<usize>,
}

/// Final state and output path of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub state: TaskState,
    pub path: PathBuf,
    pub attempts: u32,
}

/// Outcome of a run, keyed by chunk index.
#[derive(Debug, Default)]
pub struct ConversionResult {
    pub outcomes: BTreeMap<usize, ChunkOutcome>,
}

impl ConversionResult {
    fn record(&mut self, task: ConversionTask) {
        self.outcomes.insert(
            task.index,
            ChunkOutcome {
                state: task.state,
                path: task.output_path,
                attempts: task.attempts,
            },
        );
    }

    fn count(&self, pred: impl Fn(&TaskState) -> bool) -> usize {
        self.outcomes.values().filter(|o| pred(&o.state)).count()
    }

    /// Paths of successful chunks in index order.
    pub fn succeeded_paths(&self) -> Vec<PathBuf> {
        self.outcomes
            .values()
            .filter(|o| o.state == TaskState::Succeeded)
            .map(|o| o.path.clone())
            .collect()
    }

    /// Indices of chunks that failed permanently.
    pub fn failed_indices(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o.state, TaskState::FailedFatal(_)))
            .map(|(i, _)| *i)
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| *s == TaskState::Succeeded)
    }

    pub fn cancelled(&self) -> usize {
        self.count(|s| *s == TaskState::Cancelled)
    }

    /// Highest index such that every chunk from 0 up to it succeeded.
    pub fn last_contiguous(&self) -> Option<usize> {
        let mut last = None;
        for (expected, (index, outcome)) in self.outcomes.iter().enumerate() {
            if *index != expected || outcome.state != TaskState::Succeeded {
                break;
            }
            last = Some(*index);
        }
        last
    }

    fn progress(&self, total: usize) -> SchedulerProgress {
        SchedulerProgress {
            total,
            completed: self.succeeded(),
            failed: self.failed_indices().len(),
            last_contiguous: self.last_contiguous(),
        }
    }
}

/// Scheduler that converts chunks through one provider.
pub struct ConversionScheduler<'a> {
    provider: &'a dyn TtsProvider,
    concurrency: usize,
    policy: RetryPolicy,
    min_bytes: u64,
    cancel: CancellationToken,
}

impl<'a> ConversionScheduler<'a> {
    /// Create a new scheduler.
    pub fn new(provider: &'a dyn TtsProvider, cancel: CancellationToken) -> Self {
        Self {
            provider,
            concurrency: DEFAULT_CONCURRENCY,
            policy: RetryPolicy::default(),
            min_bytes: tts_client::MIN_AUDIO_BYTES,
            cancel,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_min_bytes(mut self, min_bytes: u64) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    /// Run until every task is terminal or cancellation is observed.
    pub async fn run<F>(&self, tasks: Vec<ConversionTask>, mut on_progress: F) -> ConversionResult
    where
        F: FnMut(SchedulerProgress),
    {
        let total = tasks.len();
        let mut result = ConversionResult::default();
        let semaphore = Semaphore::new(self.concurrency);
        let mut in_flight = FuturesUnordered::new();

        for mut task in tasks {
            if is_complete(&task.output_path, self.min_bytes) {
                log::debug!("Chunk {} already on disk, skipping", task.index);
                task.state = TaskState::Succeeded;
                result.record(task);
                continue;
            }
            in_flight.push(self.drive(task, &semaphore));
        }

        if !result.outcomes.is_empty() {
            on_progress(result.progress(total));
        }

        while let Some(task) = in_flight.next().await {
            result.record(task);
            on_progress(result.progress(total));
        }

        result
    }

    /// Drive one task to a terminal state.
    async fn drive(&self, mut task: ConversionTask, semaphore: &Semaphore) -> ConversionTask {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                task.cancel();
                return task;
            }
            permit = semaphore.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    task.cancel();
                    return task;
                }
            },
        };

        loop {
            if self.cancel.is_cancelled() {
                task.cancel();
                return task;
            }

            let request = SynthesisRequest::new(&task.text, &task.voice, &task.output_path)
                .with_cancel(self.cancel.clone());
            let outcome = self.provider.synthesize(&request).await;

            match task.advance(&outcome, &self.policy) {
                Step::Finished(TaskState::FailedFatal(message)) => {
                    log::warn!("Chunk {} failed permanently: {}", task.index, message);
                    return task;
                }
                Step::Finished(_) => return task,
                Step::Retry(delay) => {
                    if let Err(e) = &outcome {
                        log::warn!(
                            "Chunk {} attempt {} failed, retrying in {:.1}s: {}",
                            task.index,
                            task.attempts,
                            delay.as_secs_f64(),
                            e
                        );
                    }
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            task.cancel();
                            return task;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

/// A chunk file that already holds audio.
pub fn is_complete(path: &Path, min_bytes: u64) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > min_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use tts_client::{MockProvider, TtsError};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            base: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: Duration::ZERO,
            rate_limit_wait: Duration::from_millis(1),
        }
    }

    fn tasks(dir: &TempDir, texts: &[&str]) -> Vec<ConversionTask> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                ConversionTask::new(
                    i,
                    text.to_string(),
                    "voz".into(),
                    dir.path().join(format!("livro_{i:04}.mp3")),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_order_preserved_when_later_chunk_finishes_first() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::always_succeeds()
            .delay_text("primeiro", Duration::from_millis(150))
            .delay_text("segundo", Duration::from_millis(50));
        let scheduler = ConversionScheduler::new(&provider, CancellationToken::new())
            .with_concurrency(3)
            .with_policy(fast_policy());

        let mut prefixes = Vec::new();
        let result = scheduler
            .run(tasks(&dir, &["primeiro", "segundo", "terceiro"]), |p| {
                prefixes.push(p.last_contiguous)
            })
            .await;

        assert_eq!(result.succeeded(), 3);
        // Chunk 0 finishes last, so no prefix exists until the end
        assert_eq!(prefixes, vec![None, None, Some(2)]);
        let expected: Vec<PathBuf> = (0..3)
            .map(|i| dir.path().join(format!("livro_{i:04}.mp3")))
            .collect();
        assert_eq!(result.succeeded_paths(), expected);
        assert_eq!(result.last_contiguous(), Some(2));
    }

    #[tokio::test]
    async fn test_resume_skips_existing_chunks() {
        let dir = TempDir::new().unwrap();
        let all = tasks(&dir, &["a", "b", "c"]);
        std::fs::write(&all[0].output_path, vec![0u8; 4096]).unwrap();
        std::fs::write(&all[1].output_path, vec![0u8; 4096]).unwrap();
        // Too small to count as audio
        std::fs::write(&all[2].output_path, vec![0u8; 10]).unwrap();

        let provider = MockProvider::always_succeeds();
        let scheduler = ConversionScheduler::new(&provider, CancellationToken::new())
            .with_policy(fast_policy());
        let result = scheduler.run(all, |_| {}).await;

        assert_eq!(result.succeeded(), 3);
        assert_eq!(provider.calls_for("a"), 0);
        assert_eq!(provider.calls_for("b"), 0);
        assert_eq!(provider.calls_for("c"), 1);
    }

    #[tokio::test]
    async fn test_fatal_chunk_is_contained() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::always_succeeds().fail_text(
            "ruim",
            TtsError::BadRequest {
                message: "rejeitado".into(),
            },
        );
        let scheduler = ConversionScheduler::new(&provider, CancellationToken::new())
            .with_policy(fast_policy());

        let mut last = None;
        let result = scheduler
            .run(tasks(&dir, &["um", "dois", "ruim", "quatro"]), |p| last = Some(p))
            .await;

        assert_eq!(result.failed_indices(), vec![2]);
        assert_eq!(provider.calls_for("ruim"), 1);
        let paths = result.succeeded_paths();
        assert_eq!(paths.len(), 3);
        assert!(paths[2].ends_with("livro_0003.mp3"));
        let last = last.unwrap();
        assert_eq!((last.completed, last.failed, last.total), (3, 1, 4));
        assert_eq!(last.last_contiguous, Some(1));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_until_success() {
        let dir = TempDir::new().unwrap();
        let provider =
            MockProvider::fails_then_succeeds(4, TtsError::EdgeTtsError("sem áudio".into()));
        let scheduler = ConversionScheduler::new(&provider, CancellationToken::new())
            .with_concurrency(1)
            .with_policy(fast_policy());

        let result = scheduler.run(tasks(&dir, &["só"]), |_| {}).await;
        assert_eq!(result.succeeded(), 1);
        assert_eq!(provider.call_count(), 5);
        assert_eq!(result.outcomes[&0].attempts, 5);
    }

    #[tokio::test]
    async fn test_concurrency_limit() {
        use async_trait::async_trait;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tts_client::{SynthesisOutput, provider::verify_output};

        struct Counting {
            current: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait]
        impl TtsProvider for Counting {
            async fn synthesize(
                &self,
                request: &SynthesisRequest,
            ) -> tts_client::Result<SynthesisOutput> {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                std::fs::write(&request.output_path, vec![0u8; 2048])?;
                self.current.fetch_sub(1, Ordering::SeqCst);
                verify_output(&request.output_path, tts_client::MIN_AUDIO_BYTES)
            }
            fn name(&self) -> &'static str {
                "counting"
            }
            fn default_voice(&self) -> &str {
                "voz"
            }
            fn is_available(&self) -> tts_client::Result<()> {
                Ok(())
            }
        }

        let dir = TempDir::new().unwrap();
        let provider = Counting {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let scheduler = ConversionScheduler::new(&provider, CancellationToken::new())
            .with_concurrency(2)
            .with_policy(fast_policy());
        let texts: Vec<String> = (0..8).map(|i| format!("t{i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

        let result = scheduler.run(tasks(&dir, &refs), |_| {}).await;
        assert_eq!(result.succeeded(), 8);
        assert_eq!(provider.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancellation_stops_run() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::always_succeeds()
            .delay_text("lento", Duration::from_secs(30))
            .delay_text("também lento", Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let scheduler = ConversionScheduler::new(&provider, cancel.clone())
            .with_concurrency(1)
            .with_policy(fast_policy());

        let trigger = cancel.clone();
        let run = scheduler.run(tasks(&dir, &["lento", "também lento"]), |_| {});
        let cancel_later = async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        };
        let (result, ()) = tokio::join!(run, cancel_later);

        assert_eq!(result.cancelled(), 2);
        assert_eq!(result.succeeded(), 0);
        // The second chunk never got a permit
        assert_eq!(provider.calls_for("também lento"), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::always_succeeds();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let scheduler = ConversionScheduler::new(&provider, cancel);

        let result = scheduler.run(tasks(&dir, &["a", "b"]), |_| {}).await;
        assert_eq!(result.cancelled(), 2);
        assert_eq!(provider.call_count(), 0);
    }
}
