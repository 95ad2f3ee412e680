use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use beatwise_domain::{ErrorKind, TempoRequest, TempoResponse, TempoResult};
use beatwise_estimator::TempoEstimator;

struct Job {
    request: TempoRequest,
    reply: oneshot::Sender<TempoResponse>,
}

/// Request/response boundary in front of a dedicated worker thread.
///
/// Requests sent to one channel run one after another on its worker. Every
/// submitted request gets exactly one [`TempoResponse`]; failures inside the
/// worker, including panics, come back as error responses.
pub struct ComputeChannel {
    sender: mpsc::Sender<Job>,
}

impl ComputeChannel {
    pub fn spawn(estimator: TempoEstimator) -> io::Result<Self> {
        let (sender, mut receiver) = mpsc::channel::<Job>(1);
        thread::Builder::new()
            .name("beatwise-worker".to_string())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    let response = run_request(&estimator, job.request);
                    if job.reply.send(response).is_err() {
                        debug!("caller went away before the response was ready");
                    }
                }
                debug!("tempo worker shutting down");
            })?;
        Ok(Self { sender })
    }

    pub async fn submit(&self, request: TempoRequest) -> TempoResponse {
        let (reply, response) = oneshot::channel();
        if self.sender.send(Job { request, reply }).await.is_err() {
            return TempoResponse::internal("tempo worker is not running");
        }
        response
            .await
            .unwrap_or_else(|_| TempoResponse::internal("tempo worker stopped before responding"))
    }

    /// Accepts a JSON encoded request; malformed payloads become `invalid_input` errors.
    pub async fn submit_json(&self, payload: &[u8]) -> TempoResponse {
        match TempoRequest::from_json(payload) {
            Ok(request) => self.submit(request).await,
            Err(err) => TempoResponse::Error {
                message: format!("Calculation failed: {err}"),
                kind: Some(ErrorKind::InvalidInput),
            },
        }
    }
}

fn run_request(estimator: &TempoEstimator, request: TempoRequest) -> TempoResponse {
    guarded(|| {
        let buffer = request.into_buffer()?;
        estimator.estimate(&buffer)
    })
}

/// Runs one estimation, turning a panic into an `internal` error response.
fn guarded<F: FnOnce() -> TempoResult>(work: F) -> TempoResponse {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(result) => TempoResponse::from(result),
        Err(_) => {
            error!("tempo estimation panicked");
            TempoResponse::internal("Calculation failed: estimation aborted unexpectedly")
        }
    }
}
