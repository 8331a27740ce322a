//! Integration tests for [`HttpSubmitter`] against an in-process mock of
//! the conversion service.
//!
//! The mock is a small axum router bound to an ephemeral port. Each test
//! picks how the submit and status endpoints respond and then inspects
//! what the submitter sent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use imago_client::{ImagoApi, ImagoApiError};
use imago_core::job::BatchTemplate;
use imago_core::types::Outcome;
use imago_loadgen::pool::{LoadTest, RunPlan};
use imago_loadgen::submitter::{AttemptError, HttpSubmitter, Submitter};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Mock conversion service
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum SubmitReply {
    Accept,
    AcceptAs(&'static str),
    ServerError,
    MissingId,
    NotJson,
}

#[derive(Clone, Copy)]
enum StatusReply {
    Status(&'static str),
    NotFound,
    NotJson,
}

/// A status request as the mock received it.
#[derive(Debug, Clone)]
struct StatusCall {
    job_id: String,
    timeout: Option<String>,
}

#[derive(Clone)]
struct MockService {
    submit: SubmitReply,
    status: StatusReply,
    submissions: Arc<Mutex<Vec<Value>>>,
    status_calls: Arc<Mutex<Vec<StatusCall>>>,
}

impl MockService {
    fn new(submit: SubmitReply, status: StatusReply) -> Self {
        Self {
            submit,
            status,
            submissions: Arc::default(),
            status_calls: Arc::default(),
        }
    }

    fn submissions(&self) -> Vec<Value> {
        self.submissions.lock().unwrap().clone()
    }

    fn status_calls(&self) -> Vec<StatusCall> {
        self.status_calls.lock().unwrap().clone()
    }
}

async fn handle_submit(State(mock): State<MockService>, Json(body): Json<Value>) -> Response {
    let n = {
        let mut submissions = mock.submissions.lock().unwrap();
        submissions.push(body);
        submissions.len()
    };

    match mock.submit {
        SubmitReply::Accept => {
            Json(json!({ "id": format!("job-{n}"), "queue_length": n })).into_response()
        }
        SubmitReply::AcceptAs(id) => Json(json!({ "id": id })).into_response(),
        SubmitReply::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, "queue unavailable").into_response()
        }
        SubmitReply::MissingId => Json(json!({ "queue_length": 0 })).into_response(),
        SubmitReply::NotJson => (StatusCode::OK, "accepted").into_response(),
    }
}

async fn handle_status(
    State(mock): State<MockService>,
    Path(job_id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    mock.status_calls.lock().unwrap().push(StatusCall {
        job_id,
        timeout: query.get("timeout").cloned(),
    });

    match mock.status {
        StatusReply::Status(status) => Json(json!({ "status": status })).into_response(),
        StatusReply::NotFound => (StatusCode::NOT_FOUND, "no such job").into_response(),
        StatusReply::NotJson => (StatusCode::OK, "{status:").into_response(),
    }
}

/// Serve the mock on an ephemeral local port and return its base URL.
async fn spawn_service(mock: MockService) -> String {
    let app = Router::new()
        .route("/api/v1/work", post(handle_submit))
        .route("/api/v1/work/{id}", get(handle_status))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn submitter_for(base_url: &str) -> HttpSubmitter {
    let api = ImagoApi::new(base_url, Duration::from_secs(10)).unwrap();
    HttpSubmitter::new(api, BatchTemplate::default())
}

// ---------------------------------------------------------------------------
// Test: successful attempt
// ---------------------------------------------------------------------------

/// A completed job is a success, and the mock sees the expected batch
/// and status request.
#[tokio::test]
async fn completed_job_is_success() {
    let mock = MockService::new(SubmitReply::Accept, StatusReply::Status("complete"));
    let url = spawn_service(mock.clone()).await;

    let outcome = submitter_for(&url).attempt(3).await;
    assert_eq!(outcome, Outcome::Success);

    let submissions = mock.submissions();
    assert_eq!(submissions.len(), 1);
    let actions = submissions[0]["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 4);
    for action in actions {
        assert!(action["outfile"].as_str().unwrap().ends_with("-3.jpg"));
        assert!(action["infile"].is_string());
        assert!(action["mimetype"].is_string());
        assert!(action["operations"].is_array());
    }
    assert_eq!(actions[2]["mimetype"], "image/jpg");
    assert_eq!(actions[2]["operations"], json!(["resize 600x600 -quality 100"]));

    let calls = mock.status_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].job_id, "job-1");
    assert_eq!(calls[0].timeout.as_deref(), Some("300"));
}

#[tokio::test]
async fn unknown_status_value_is_success() {
    let mock = MockService::new(SubmitReply::Accept, StatusReply::Status("timeout"));
    let url = spawn_service(mock).await;

    assert_eq!(submitter_for(&url).attempt(0).await, Outcome::Success);
}

#[tokio::test]
async fn status_timeout_override_is_sent() {
    let mock = MockService::new(SubmitReply::Accept, StatusReply::Status("complete"));
    let url = spawn_service(mock.clone()).await;

    let submitter = submitter_for(&url).with_status_timeout(Duration::from_secs(7));
    submitter.try_attempt(0).await.unwrap();

    assert_eq!(mock.status_calls()[0].timeout.as_deref(), Some("7"));
}

/// Job ids are opaque: reserved URL characters must reach the service
/// as part of the id, not split into path, query or fragment.
#[tokio::test]
async fn job_id_with_reserved_characters_round_trips() {
    for id in ["2024/abc", "job?x=1", "job#1", "50% done"] {
        let mock = MockService::new(SubmitReply::AcceptAs(id), StatusReply::Status("complete"));
        let url = spawn_service(mock.clone()).await;

        let job_id = submitter_for(&url).try_attempt(0).await.unwrap();
        assert_eq!(job_id, id);

        let calls = mock.status_calls();
        assert_eq!(calls.len(), 1, "id {id:?}");
        assert_eq!(calls[0].job_id, id);
        assert_eq!(calls[0].timeout.as_deref(), Some("300"), "id {id:?}");
    }
}

// ---------------------------------------------------------------------------
// Test: failed attempts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn error_status_is_failure() {
    let mock = MockService::new(SubmitReply::Accept, StatusReply::Status("error"));
    let url = spawn_service(mock).await;
    let submitter = submitter_for(&url);

    assert_eq!(submitter.attempt(0).await, Outcome::Failure);
    assert_matches!(
        submitter.try_attempt(0).await,
        Err(AttemptError::JobFailed { job_id }) if job_id == "job-2"
    );
}

#[tokio::test]
async fn submit_server_error_is_failure_without_polling() {
    let mock = MockService::new(SubmitReply::ServerError, StatusReply::Status("complete"));
    let url = spawn_service(mock.clone()).await;
    let submitter = submitter_for(&url);

    assert_eq!(submitter.attempt(0).await, Outcome::Failure);
    assert_matches!(
        submitter.try_attempt(0).await,
        Err(AttemptError::Submit(ImagoApiError::Status { status: 500, .. }))
    );
    assert!(mock.status_calls().is_empty());
}

#[tokio::test]
async fn status_not_found_is_failure() {
    let mock = MockService::new(SubmitReply::Accept, StatusReply::NotFound);
    let url = spawn_service(mock).await;

    assert_matches!(
        submitter_for(&url).try_attempt(0).await,
        Err(AttemptError::Status {
            source: ImagoApiError::Status { status: 404, .. },
            ..
        })
    );
}

/// A submission response without an `id` resolves to failure and never
/// issues a status request for a bogus job.
#[tokio::test]
async fn missing_job_id_is_failure_without_polling() {
    let mock = MockService::new(SubmitReply::MissingId, StatusReply::Status("complete"));
    let url = spawn_service(mock.clone()).await;
    let submitter = submitter_for(&url);

    let outcome = tokio::time::timeout(Duration::from_secs(5), submitter.attempt(0))
        .await
        .expect("malformed response must not hang");
    assert_eq!(outcome, Outcome::Failure);

    assert_matches!(
        submitter.try_attempt(0).await,
        Err(AttemptError::Submit(ImagoApiError::Decode(_)))
    );
    assert!(mock.status_calls().is_empty());
}

#[tokio::test]
async fn non_json_submit_body_is_failure() {
    let mock = MockService::new(SubmitReply::NotJson, StatusReply::Status("complete"));
    let url = spawn_service(mock).await;

    assert_matches!(
        submitter_for(&url).try_attempt(0).await,
        Err(AttemptError::Submit(ImagoApiError::Decode(_)))
    );
}

#[tokio::test]
async fn non_json_status_body_is_failure() {
    let mock = MockService::new(SubmitReply::Accept, StatusReply::NotJson);
    let url = spawn_service(mock).await;

    assert_matches!(
        submitter_for(&url).try_attempt(0).await,
        Err(AttemptError::Status {
            source: ImagoApiError::Decode(_),
            ..
        })
    );
}

#[tokio::test]
async fn connection_refused_is_failure() {
    // Reserve a port, then release it so nothing is listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let submitter = submitter_for(&format!("http://{addr}"));

    assert_eq!(submitter.attempt(0).await, Outcome::Failure);
    assert_matches!(
        submitter.try_attempt(0).await,
        Err(AttemptError::Submit(ImagoApiError::Request(_)))
    );
}

// ---------------------------------------------------------------------------
// Test: full run against the mock
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn load_test_against_mock_service() {
    let mock = MockService::new(SubmitReply::Accept, StatusReply::Status("complete"));
    let url = spawn_service(mock.clone()).await;

    let plan = RunPlan {
        concurrency: 3,
        count: 2,
    };
    let summary = LoadTest::new(Arc::new(submitter_for(&url)), plan)
        .run()
        .await;

    assert_eq!(summary.stats.total, 6);
    assert_eq!(summary.stats.errors, 0);
    assert_eq!(mock.submissions().len(), 6);
    assert_eq!(mock.status_calls().len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn load_test_counts_remote_errors() {
    let mock = MockService::new(SubmitReply::Accept, StatusReply::Status("error"));
    let url = spawn_service(mock).await;

    let plan = RunPlan {
        concurrency: 2,
        count: 3,
    };
    let summary = LoadTest::new(Arc::new(submitter_for(&url)), plan)
        .run()
        .await;

    assert_eq!(summary.stats.total, 6);
    assert_eq!(summary.stats.errors, 6);
}
