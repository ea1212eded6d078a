use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::post,
    Router,
};
use serde_json::json;

use super::domain::RequestMeta;
use super::orchestrator::{SubmissionDisposition, SubmissionOrchestrator};
use super::submission::{Submission, MAX_SUBMISSION_BYTES};

pub const SUBMIT_PATH: &str = "/api/forms/submit";
const SUBMIT_PATH_SLASH: &str = "/api/forms/submit/";

/// Router builder exposing the form relay endpoint, with and without a
/// trailing slash.
pub fn relay_router(orchestrator: Arc<SubmissionOrchestrator>) -> Router {
    let endpoint = || {
        post(submit_handler)
            .options(preflight_handler)
            .fallback(method_not_allowed)
    };

    Router::new()
        .route(SUBMIT_PATH, endpoint())
        .route(SUBMIT_PATH_SLASH, endpoint())
        .layer(DefaultBodyLimit::max(MAX_SUBMISSION_BYTES))
        .with_state(orchestrator)
}

pub(crate) async fn submit_handler(
    State(orchestrator): State<Arc<SubmissionOrchestrator>>,
    request: Request,
) -> Response {
    let meta = RequestMeta::from_headers(request.headers());

    let submission = match Submission::from_request(request).await {
        Ok(submission) => submission,
        Err(err) => {
            tracing::info!(error = %err, "rejected unreadable submission");
            let payload = json!({
                "error": err.to_string(),
            });
            return (err.status(), axum::Json(payload)).into_response();
        }
    };

    match orchestrator.process(submission, meta).await {
        SubmissionDisposition::Accepted { location, .. } => {
            Redirect::to(location.as_str()).into_response()
        }
        SubmissionDisposition::ChallengeFailed => {
            let payload = json!({
                "error": "challenge verification failed",
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        SubmissionDisposition::Failed(outcome) => {
            let payload = json!({
                "error": "submission could not be delivered",
                "fallback_ok": outcome.fallback_ok,
                "system_of_record_ok": outcome.system_of_record_ok,
            });
            (StatusCode::BAD_GATEWAY, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn preflight_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn method_not_allowed() -> Response {
    let payload = json!({
        "error": "method not allowed",
    });
    (StatusCode::METHOD_NOT_ALLOWED, axum::Json(payload)).into_response()
}
