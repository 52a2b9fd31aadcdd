//! 会话 REST 接口
//!
//! POST /api/v1/sessions                         创建会话
//! GET  /api/v1/sessions                         列出会话
//! GET  /api/v1/sessions/:session_id             读取会话快照
//! PATCH /api/v1/sessions/:session_id            部分更新（反馈 / 状态）
//! POST /api/v1/sessions/:session_id/messages    producer 追加消息
//! POST /api/v1/sessions/:session_id/complete    producer 标记完成

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::handlers::error_response;
use crate::state::AppState;
use lemma_core::{Feedback, Message, MessageRole, MessageType, Session, SessionFilter, SessionStatus};

fn default_show_steps() -> bool {
    true
}

/// 创建会话请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub problem: String,
    #[serde(default = "default_show_steps")]
    pub show_steps: bool,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// PATCH 请求体，feedback 与 status 至少出现一个
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    #[serde(default)]
    pub feedback: Option<FeedbackPayload>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
}

/// 客户端提交的反馈，时间戳由服务端生成
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackPayload {
    pub score: u8,
    #[serde(default)]
    pub notes: Option<String>,
}

/// producer 追加消息请求体
#[derive(Debug, Deserialize)]
pub struct AppendMessageRequest {
    pub role: MessageRole,
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    pub content: String,
}

/// 列表查询参数
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: Session,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<Session>,
    pub total: usize,
}

/// 创建会话
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> impl IntoResponse {
    match state
        .manager
        .create_session(req.problem, req.show_steps, req.user_id)
        .await
    {
        Ok(session) => {
            state.notify_created(&session.id);
            (StatusCode::CREATED, Json(SessionResponse { session })).into_response()
        }
        Err(e) => error_response(e).into_response(),
    }
}

/// 列出会话
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> impl IntoResponse {
    let mut filter = SessionFilter::new();
    if let Some(user_id) = query.user_id {
        filter = filter.with_user_id(user_id);
    }
    if let Some(status) = query.status {
        filter = filter.with_status(status);
    }
    if let Some(limit) = query.limit {
        filter = filter.with_limit(limit);
    }

    match state.manager.list_sessions(&filter).await {
        Ok(sessions) => {
            let total = sessions.len();
            Json(SessionListResponse { sessions, total }).into_response()
        }
        Err(e) => error_response(e).into_response(),
    }
}

/// 读取会话快照（含全部历史消息）
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.manager.get_session(&session_id).await {
        Ok(session) => Json(SessionResponse { session }).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// 部分更新会话
///
/// 带 feedback 的更新走反馈提交路径（评分校验 + 状态原子推进），
/// 仅带 status 的更新走状态机转换。
pub async fn update_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<UpdateSessionRequest>,
) -> impl IntoResponse {
    let feedback = req
        .feedback
        .map(|payload| Feedback::new(payload.score, payload.notes));

    match state
        .manager
        .update_session(&session_id, feedback, req.status)
        .await
    {
        Ok(session) => {
            state.notify_status(&session.id, session.status);
            Json(SessionResponse { session }).into_response()
        }
        Err(e) => error_response(e).into_response(),
    }
}

/// producer 回调：追加一条消息
pub async fn append_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<AppendMessageRequest>,
) -> impl IntoResponse {
    let message = Message::new(req.role, req.content).with_kind(req.kind);

    match state.manager.append_message(&session_id, message).await {
        Ok(message) => {
            state.notify_message(&session_id, message.clone());
            (StatusCode::CREATED, Json(message)).into_response()
        }
        Err(e) => error_response(e).into_response(),
    }
}

/// producer 回调：证明流结束，标记 proof-completed
pub async fn complete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.manager.mark_completed(&session_id).await {
        Ok(session) => {
            info!("Producer completed session {}", session_id);
            state.notify_status(&session.id, session.status);
            Json(SessionResponse { session }).into_response()
        }
        Err(e) => error_response(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateSessionRequest =
            serde_json::from_str(r#"{"problem": "Prove Euler's formula"}"#).unwrap();
        assert!(req.show_steps);
        assert!(req.user_id.is_none());
    }

    #[test]
    fn test_create_request_camel_case() {
        let req: CreateSessionRequest = serde_json::from_str(
            r#"{"problem": "Handshake lemma", "showSteps": false, "userId": "u-1"}"#,
        )
        .unwrap();
        assert!(!req.show_steps);
        assert_eq!(req.user_id.as_deref(), Some("u-1"));
    }

    #[test]
    fn test_update_request_feedback() {
        let req: UpdateSessionRequest = serde_json::from_str(
            r#"{"feedback": {"score": 3, "notes": "helpful"}, "status": "feedback-submitted"}"#,
        )
        .unwrap();
        let payload = req.feedback.unwrap();
        assert_eq!(payload.score, 3);
        assert_eq!(req.status, Some(SessionStatus::FeedbackSubmitted));
    }

    #[test]
    fn test_append_request_type_field() {
        let req: AppendMessageRequest = serde_json::from_str(
            r#"{"role": "teacher", "type": "critique", "content": "The base case is missing."}"#,
        )
        .unwrap();
        assert_eq!(req.role, MessageRole::Teacher);
        assert_eq!(req.kind, MessageType::Critique);
    }

    #[test]
    fn test_append_request_default_kind() {
        let req: AppendMessageRequest =
            serde_json::from_str(r#"{"role": "student", "content": "hi"}"#).unwrap();
        assert_eq!(req.kind, MessageType::Default);
    }
}
