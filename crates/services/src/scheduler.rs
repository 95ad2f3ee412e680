use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use beatwise_domain::{SampleBuffer, SchedulerConfig, TempoRequest, TempoResponse};
use beatwise_estimator::TempoEstimator;

use crate::channel::ComputeChannel;
use crate::source::SampleSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            retries: config.fetch_retry,
            backoff: Duration::from_millis(config.fetch_backoff_ms),
        }
    }

    /// Linear backoff: the n-th retry waits n times the base delay.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

pub async fn load_with_retry(
    source: &dyn SampleSource,
    path: &Path,
    policy: RetryPolicy,
) -> Result<SampleBuffer> {
    let mut attempt = 0;
    loop {
        match source.load(path).await {
            Ok(buffer) => return Ok(buffer),
            Err(err) if attempt < policy.retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(path = %path.display(), attempt, ?delay, error = %err, "load failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                return Err(err.context(format!(
                    "load {:?} failed after {} attempt(s)",
                    path,
                    attempt + 1
                )))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub response: TempoResponse,
}

/// Runs decode-and-estimate pipelines with a cap on how many are in flight.
///
/// Each pipeline gets its own [`ComputeChannel`]; the engine itself knows
/// nothing about the other pipelines.
#[derive(Clone)]
pub struct AnalysisScheduler {
    source: Arc<dyn SampleSource>,
    estimator: TempoEstimator,
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl AnalysisScheduler {
    pub fn new(
        source: Arc<dyn SampleSource>,
        estimator: TempoEstimator,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            source,
            estimator,
            permits: Arc::new(Semaphore::new(config.max_parallel_decode.max(1))),
            retry: RetryPolicy::from_config(config),
        }
    }

    /// One report per path, in input order.
    pub async fn analyze_all(&self, paths: Vec<PathBuf>) -> Vec<TrackReport> {
        info!(tracks = paths.len(), "starting batch analysis");
        let handles: Vec<_> = paths
            .into_iter()
            .map(|path| {
                let scheduler = self.clone();
                let task_path = path.clone();
                (path, tokio::spawn(async move { scheduler.analyze(task_path).await }))
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (path, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(err) => TrackReport {
                    path,
                    response: TempoResponse::internal(format!("analysis task failed: {err}")),
                },
            };
            reports.push(report);
        }
        reports
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn analyze(&self, path: PathBuf) -> TrackReport {
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return TrackReport {
                    path,
                    response: TempoResponse::internal("scheduler is shut down"),
                }
            }
        };

        let buffer = match load_with_retry(self.source.as_ref(), &path, self.retry).await {
            Ok(buffer) => buffer,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "giving up on track");
                return TrackReport {
                    path,
                    response: TempoResponse::decode_failure(format!("{err:#}")),
                };
            }
        };

        let response = match ComputeChannel::spawn(self.estimator.clone()) {
            Ok(channel) => channel.submit(TempoRequest::from(buffer)).await,
            Err(err) => TempoResponse::internal(format!("could not start tempo worker: {err}")),
        };
        info!(bpm = ?response.bpm(), "track finished");
        TrackReport { path, response }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use anyhow::anyhow;
    use async_trait::async_trait;
    use beatwise_domain::ErrorKind;

    fn impulse_buffer(period: usize) -> SampleBuffer {
        let mut samples = vec![0.0; 441_000];
        for index in (11_025..samples.len()).step_by(period) {
            samples[index] = 1.0;
        }
        SampleBuffer::new(samples, 44_100).unwrap()
    }

    fn fast_config(max_parallel_decode: usize) -> SchedulerConfig {
        SchedulerConfig {
            max_parallel_decode,
            fetch_retry: 2,
            fetch_backoff_ms: 1,
        }
    }

    struct FlakySource {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl SampleSource for FlakySource {
        async fn load(&self, _path: &Path) -> Result<SampleBuffer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(anyhow!("transient fetch error"));
            }
            Ok(impulse_buffer(22_050))
        }
    }

    struct CountingSource {
        in_flight: AtomicUsize,
        max_seen: AtomicUsize,
    }

    #[async_trait]
    impl SampleSource for CountingSource {
        async fn load(&self, path: &Path) -> Result<SampleBuffer> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if path.ends_with("silent.wav") {
                return Ok(SampleBuffer::new(vec![0.0; 44_100], 44_100)?);
            }
            Ok(impulse_buffer(26_460))
        }
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy::from_config(&SchedulerConfig::default());
        assert_eq!(policy.retries, 2);
        assert_eq!(policy.delay_for(1), Duration::from_millis(300));
        assert_eq!(policy.delay_for(2), Duration::from_millis(600));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let source = Arc::new(FlakySource {
            failures_left: AtomicU32::new(2),
            calls: AtomicU32::new(0),
        });
        let scheduler =
            AnalysisScheduler::new(source.clone(), TempoEstimator::default(), &fast_config(2));
        let report = scheduler.analyze(PathBuf::from("track.wav")).await;
        assert_eq!(report.response, TempoResponse::Success { bpm: 120 });
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let source = Arc::new(FlakySource {
            failures_left: AtomicU32::new(10),
            calls: AtomicU32::new(0),
        });
        let scheduler =
            AnalysisScheduler::new(source.clone(), TempoEstimator::default(), &fast_config(2));
        let report = scheduler.analyze(PathBuf::from("track.wav")).await;
        assert_eq!(report.response.error_kind(), Some(ErrorKind::Decode));
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn batch_respects_parallel_limit_and_order() {
        let source = Arc::new(CountingSource {
            in_flight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        });
        let scheduler =
            AnalysisScheduler::new(source.clone(), TempoEstimator::default(), &fast_config(2));
        let paths: Vec<PathBuf> = ["a.wav", "b.wav", "silent.wav", "c.wav", "d.wav", "e.wav"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let reports = scheduler.analyze_all(paths.clone()).await;

        assert!(source.max_seen.load(Ordering::SeqCst) <= 2);
        let returned: Vec<PathBuf> = reports.iter().map(|r| r.path.clone()).collect();
        assert_eq!(returned, paths);
        assert_eq!(reports[0].response.bpm(), Some(100));
        assert_eq!(
            reports[2].response.error_kind(),
            Some(ErrorKind::NoBeatsDetected)
        );
    }

    #[test]
    fn report_serializes_flat() {
        let report = TrackReport {
            path: PathBuf::from("a.wav"),
            response: TempoResponse::Success { bpm: 128 },
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"path":"a.wav","status":"success","bpm":128}"#);
    }
}
