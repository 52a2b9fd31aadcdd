//! HTTP 请求处理

pub mod sessions;
pub mod stream;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use lemma_session::SessionError;

/// 统一的错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// 将领域错误映射为 HTTP 响应
///
/// 校验失败 400、未找到 404、生命周期冲突 409，其余归为存储错误 500。
pub fn error_response(err: SessionError) -> impl IntoResponse {
    let (status, code) = match &err {
        SessionError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        SessionError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        SessionError::Conflict { .. } | SessionError::AlreadyExists { .. } => {
            (StatusCode::CONFLICT, "CONFLICT")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: code.to_string(),
        }),
    )
}

/// 健康检查
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "lemma-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
