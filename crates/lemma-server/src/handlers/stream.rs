//! SSE 推送流
//!
//! GET /api/v1/sessions/:session_id/stream
//!
//! 只推送订阅之后发生的事件，历史消息由快照接口提供。
//! 会话离开 in-progress 后流自然关闭。

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::event_bus::SessionEvent;
use crate::handlers::error_response;
use crate::state::AppState;
use lemma_core::SessionStatus;

/// 订阅会话的消息流
///
/// 在读取快照之前订阅事件总线，避免订阅窗口内的消息丢失。
/// 快照显示会话已不在 in-progress 时直接返回空流。
pub async fn stream_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    // 先订阅后读快照，窗口内的事件不会漏
    let rx = state.event_bus.subscribe();

    let snapshot = match state.manager.get_session(&session_id).await {
        Ok(session) => session,
        Err(e) => return error_response(e).into_response(),
    };

    let live = snapshot.status == SessionStatus::InProgress;
    debug!(
        "SSE subscriber attached to session {} (live: {})",
        session_id, live
    );

    let stream = session_event_stream(session_id, rx, live);
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn session_event_stream(
    session_id: String,
    mut rx: tokio::sync::broadcast::Receiver<SessionEvent>,
    live: bool,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        if !live {
            // 会话已完成：没有未来的消息可推，流立即结束
            return;
        }

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if event.session_id() != session_id {
                        continue;
                    }
                    match event {
                        SessionEvent::MessageAppended { message, .. } => {
                            match Event::default().json_data(&message) {
                                Ok(sse_event) => yield Ok(sse_event),
                                Err(e) => {
                                    warn!("Failed to serialize SSE message: {}", e);
                                }
                            }
                        }
                        SessionEvent::StatusChanged { status, .. } => {
                            if status != SessionStatus::InProgress {
                                debug!("Session {} left in-progress, closing stream", session_id);
                                break;
                            }
                        }
                        SessionEvent::SessionCreated { .. } => {}
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "SSE subscriber for session {} lagged, skipped {} events",
                        session_id, skipped
                    );
                }
                Err(RecvError::Closed) => {
                    debug!("Event bus closed, ending stream for session {}", session_id);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use lemma_core::Message;
    use std::sync::Arc;

    use crate::event_bus::EventBus;

    #[tokio::test]
    async fn test_stream_forwards_matching_messages() {
        let bus = Arc::new(EventBus::default());
        let rx = bus.subscribe();
        let stream = session_event_stream("s-1".to_string(), rx, true);
        tokio::pin!(stream);

        bus.publish(SessionEvent::MessageAppended {
            session_id: "s-1".to_string(),
            message: Message::teacher("Consider the degree sum."),
        })
        .unwrap();

        let event = stream.next().await.unwrap();
        assert!(event.is_ok());
    }

    #[tokio::test]
    async fn test_stream_ignores_other_sessions() {
        let bus = Arc::new(EventBus::default());
        let rx = bus.subscribe();
        let stream = session_event_stream("s-1".to_string(), rx, true);
        tokio::pin!(stream);

        bus.publish(SessionEvent::MessageAppended {
            session_id: "s-2".to_string(),
            message: Message::teacher("other session"),
        })
        .unwrap();
        bus.publish(SessionEvent::StatusChanged {
            session_id: "s-1".to_string(),
            status: SessionStatus::ProofCompleted,
        })
        .unwrap();

        // s-2 的消息被过滤，s-1 的完成事件直接关流
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_closes_when_not_live() {
        let bus = Arc::new(EventBus::default());
        let rx = bus.subscribe();
        let stream = session_event_stream("s-1".to_string(), rx, false);
        tokio::pin!(stream);

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_closes_on_status_change() {
        let bus = Arc::new(EventBus::default());
        let rx = bus.subscribe();
        let stream = session_event_stream("s-1".to_string(), rx, true);
        tokio::pin!(stream);

        bus.publish(SessionEvent::MessageAppended {
            session_id: "s-1".to_string(),
            message: Message::teacher("QED"),
        })
        .unwrap();
        bus.publish(SessionEvent::StatusChanged {
            session_id: "s-1".to_string(),
            status: SessionStatus::ProofCompleted,
        })
        .unwrap();

        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.is_none());
    }
}
