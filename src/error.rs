// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::models::query::UnknownStyle;

/// Client-facing application error.
///
/// Every variant maps to a stable numeric code and a short fixed message.
/// Internal details are logged where the error is raised and never serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    // 400 Bad Request
    InvalidParams(String),

    // 500 Internal Server Error
    Internal,

    NoExistUsername,
    NoPermission,
    PostNotFound,
    GetPostsFailed,
    GetPostsUnknownStyle,
    GetPostFailed,
    GetStarsFailed,
    GetPostTagsFailed,
    GetCommentsFailed,
}

impl AppError {
    pub fn code(&self) -> i32 {
        match self {
            AppError::Internal => 10000,
            AppError::InvalidParams(_) => 10001,
            AppError::NoExistUsername => 20008,
            AppError::NoPermission => 30003,
            AppError::GetPostsFailed => 30005,
            AppError::GetPostsUnknownStyle => 30006,
            AppError::GetPostFailed => 30007,
            AppError::GetStarsFailed => 30008,
            AppError::GetPostTagsFailed => 30009,
            AppError::PostNotFound => 30010,
            AppError::GetCommentsFailed => 40001,
        }
    }

    pub fn msg(&self) -> String {
        match self {
            AppError::Internal => "internal server error".to_string(),
            AppError::InvalidParams(detail) => format!("invalid parameters: {}", detail),
            AppError::NoExistUsername => "user does not exist".to_string(),
            AppError::NoPermission => "no permission".to_string(),
            AppError::GetPostsFailed => "failed to get posts".to_string(),
            AppError::GetPostsUnknownStyle => "unknown style".to_string(),
            AppError::GetPostFailed => "failed to get post".to_string(),
            AppError::GetStarsFailed => "failed to get stars".to_string(),
            AppError::GetPostTagsFailed => "failed to get topics".to_string(),
            AppError::PostNotFound => "post not found".to_string(),
            AppError::GetCommentsFailed => "failed to get comments".to_string(),
        }
    }

    /// Business failures keep a 200 status; the envelope code carries the outcome.
    fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::OK,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.msg())
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a `{ code, msg }` JSON envelope.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "code": self.code(),
            "msg": self.msg(),
        }));

        (self.status(), body).into_response()
    }
}

impl From<UnknownStyle> for AppError {
    fn from(err: UnknownStyle) -> Self {
        tracing::debug!("Rejected request: {}", err);
        AppError::GetPostsUnknownStyle
    }
}

/// Serialization of an assembled page failed; nothing useful to tell the client.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("Failed to serialize response: {:?}", err);
        AppError::Internal
    }
}
