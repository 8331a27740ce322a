//! REST API client for the conversion service endpoints.
//!
//! Wraps `POST /api/v1/work` (batch submission) and
//! `GET /api/v1/work/{id}` (status lookup) using [`reqwest`]. Response
//! bodies are decoded into typed schemas; a missing or ill-typed field
//! is an [`ImagoApiError::Decode`], never a panic.

use std::time::Duration;

use imago_core::job::JobBatch;
use serde::Deserialize;

/// Status value the service reports for a failed job.
const STATUS_ERROR: &str = "error";

/// HTTP client for a single conversion service.
#[derive(Debug, Clone)]
pub struct ImagoApi {
    client: reqwest::Client,
    base_url: String,
}

/// Response returned by `POST /api/v1/work` after the batch was accepted.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued batch.
    pub id: String,
    /// Number of jobs ahead of this one, when the service reports it.
    #[serde(default)]
    pub queue_length: Option<u64>,
}

/// Response returned by `GET /api/v1/work/{id}`.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    /// Whether the service resolved the job as failed.
    pub fn is_error(&self) -> bool {
        self.status == STATUS_ERROR
    }
}

/// Errors from the conversion service REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ImagoApiError {
    /// The HTTP request itself failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Conversion service error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The body was not valid JSON or lacked a required field.
    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The submission response carried an empty job id.
    #[error("Submission response contained an empty job id")]
    EmptyJobId,

    /// The configured base URL cannot have path segments appended.
    #[error("Invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl ImagoApiError {
    /// HTTP status code, when the service answered with a non-2xx status.
    pub fn status(&self) -> Option<u16> {
        match self {
            ImagoApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl ImagoApi {
    /// Create a client for the service at `base_url`.
    ///
    /// * `base_url` - e.g. `http://localhost:3000`; a trailing `/` is ignored.
    /// * `request_timeout` - upper bound on any single request, including
    ///   the server-side long-poll of [`job_status`](Self::job_status).
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ImagoApiError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a batch of conversion actions.
    ///
    /// Returns the server-assigned job id.
    pub async fn submit_batch(&self, batch: &JobBatch) -> Result<SubmitResponse, ImagoApiError> {
        let response = self
            .client
            .post(format!("{}/api/v1/work", self.base_url))
            .json(batch)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        if submitted.id.is_empty() {
            return Err(ImagoApiError::EmptyJobId);
        }

        tracing::debug!(
            job_id = %submitted.id,
            queue_length = submitted.queue_length,
            actions = batch.len(),
            "Batch accepted",
        );
        Ok(submitted)
    }

    /// Fetch the status of a submitted job.
    ///
    /// The service holds the request open until the job resolves or
    /// `server_timeout` elapses on its side.
    pub async fn job_status(
        &self,
        job_id: &str,
        server_timeout: Duration,
    ) -> Result<StatusResponse, ImagoApiError> {
        let response = self
            .client
            .get(self.status_url(job_id)?)
            .query(&[("timeout", server_timeout.as_secs())])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// `{base}/api/v1/work/{job_id}` with the id as one encoded segment.
    fn status_url(&self, job_id: &str) -> Result<reqwest::Url, ImagoApiError> {
        let invalid = |reason: String| ImagoApiError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason,
        };

        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["api", "v1", "work", job_id]);
        Ok(url)
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ImagoApiError::Status`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ImagoApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ImagoApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ImagoApiError> {
        let response = Self::ensure_success(response).await?;
        let body = response.bytes().await?;
        decode(&body)
    }
}

/// Decode a JSON body, mapping any syntax or schema mismatch to
/// [`ImagoApiError::Decode`].
fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ImagoApiError> {
    Ok(serde_json::from_slice(body)?)
}
