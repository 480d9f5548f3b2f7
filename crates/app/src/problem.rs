use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use jobtrack_core::BoardError;
use serde::Serialize;

use crate::sync::SyncError;

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    detail: String,
}

pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    pub fn new<S: Into<String>>(status: StatusCode, problem_type: &'static str, detail: S) -> Self {
        Self {
            status,
            body: ProblemDetails {
                problem_type,
                title: status.canonical_reason().unwrap_or("error"),
                detail: detail.into(),
            },
        }
    }
}

impl From<SyncError> for ProblemResponse {
    fn from(err: SyncError) -> Self {
        let (status, problem_type) = match &err {
            SyncError::ChannelClosed => (StatusCode::SERVICE_UNAVAILABLE, "board_unavailable"),
            SyncError::Board(BoardError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "application_not_found")
            }
            SyncError::Board(BoardError::InvalidPermutation { .. }) => {
                (StatusCode::CONFLICT, "invalid_permutation")
            }
            SyncError::Board(BoardError::UnknownStage { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "unknown_stage")
            }
            SyncError::ConfirmFailed { .. } => (StatusCode::BAD_GATEWAY, "confirm_failed"),
        };
        Self::new(status, problem_type, err.to_string())
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
