//! Job submission: one submit-then-poll attempt against the service.
//!
//! [`Submitter`] is the seam the worker pool depends on.
//! [`HttpSubmitter`] is the production implementation; every failure it
//! encounters is logged and folded into [`Outcome::Failure`], so nothing
//! escapes an attempt as an error.

use std::time::Duration;

use async_trait::async_trait;
use imago_client::{ImagoApi, ImagoApiError};
use imago_core::job::BatchTemplate;
use imago_core::types::{Outcome, WorkerId};

/// Server-side long-poll timeout passed on the status request.
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(300);

/// Extra client-side allowance on top of the server-side timeout.
pub const REQUEST_TIMEOUT_GRACE: Duration = Duration::from_secs(30);

/// Performs exactly one attempt per call. Retries are the caller's call.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn attempt(&self, worker_id: WorkerId) -> Outcome;
}

/// Why a single attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("submission failed: {0}")]
    Submit(#[source] ImagoApiError),

    #[error("status lookup for job {job_id} failed: {source}")]
    Status {
        job_id: String,
        #[source]
        source: ImagoApiError,
    },

    #[error("job {job_id} finished with status \"error\"")]
    JobFailed { job_id: String },
}

/// Drives the conversion service over HTTP.
pub struct HttpSubmitter {
    api: ImagoApi,
    template: BatchTemplate,
    status_timeout: Duration,
}

impl HttpSubmitter {
    pub fn new(api: ImagoApi, template: BatchTemplate) -> Self {
        Self {
            api,
            template,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
        }
    }

    /// Override the `timeout` parameter sent with the status request.
    pub fn with_status_timeout(mut self, status_timeout: Duration) -> Self {
        self.status_timeout = status_timeout;
        self
    }

    /// Submit a fresh batch and wait for it to resolve.
    pub async fn try_attempt(&self, worker_id: WorkerId) -> Result<String, AttemptError> {
        let batch = self.template.build(worker_id);

        let submitted = self
            .api
            .submit_batch(&batch)
            .await
            .map_err(AttemptError::Submit)?;
        let job_id = submitted.id;

        let status = self
            .api
            .job_status(&job_id, self.status_timeout)
            .await
            .map_err(|source| AttemptError::Status {
                job_id: job_id.clone(),
                source,
            })?;

        if status.is_error() {
            return Err(AttemptError::JobFailed { job_id });
        }
        Ok(job_id)
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn attempt(&self, worker_id: WorkerId) -> Outcome {
        match self.try_attempt(worker_id).await {
            Ok(job_id) => {
                tracing::debug!(worker_id, job_id = %job_id, "Job completed");
                Outcome::Success
            }
            Err(e) => {
                let http_status = match &e {
                    AttemptError::Submit(api) | AttemptError::Status { source: api, .. } => {
                        api.status()
                    }
                    AttemptError::JobFailed { .. } => None,
                };
                tracing::warn!(worker_id, http_status, error = %e, "Attempt failed");
                Outcome::Failure
            }
        }
    }
}
