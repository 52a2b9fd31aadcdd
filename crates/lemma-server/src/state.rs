//! 应用共享状态
//!
//! HTTP handlers 和 SSE 流共享同一个 SessionManager 与 EventBus，
//! 保证一次成功的变更恰好对应一次事件发布。

use std::sync::Arc;

use tracing::debug;

use crate::event_bus::{EventBus, SessionEvent};
use lemma_core::{Message, SessionStatus};
use lemma_session::SessionManager;

/// 应用状态 - 在 main.rs 中创建并共享给所有 handler
#[derive(Clone)]
pub struct AppState {
    /// 会话生命周期控制器，唯一的会话写入方
    pub manager: Arc<SessionManager>,
    /// 推送通道
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(manager: Arc<SessionManager>, event_bus: Arc<EventBus>) -> Self {
        Self { manager, event_bus }
    }

    /// 发布会话创建事件
    pub fn notify_created(&self, session_id: &str) {
        self.publish(SessionEvent::SessionCreated {
            session_id: session_id.to_string(),
        });
    }

    /// 发布消息追加事件
    pub fn notify_message(&self, session_id: &str, message: Message) {
        self.publish(SessionEvent::MessageAppended {
            session_id: session_id.to_string(),
            message,
        });
    }

    /// 发布状态变更事件
    pub fn notify_status(&self, session_id: &str, status: SessionStatus) {
        self.publish(SessionEvent::StatusChanged {
            session_id: session_id.to_string(),
            status,
        });
    }

    /// 没有订阅者时发布会失败，这是正常情况（没人在看流）
    fn publish(&self, event: SessionEvent) {
        if self.event_bus.publish(event).is_err() {
            debug!("No subscribers for event, dropping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemma_session::{MemoryStorage, SessionManagerConfig};

    #[tokio::test]
    async fn test_app_state_creation() {
        let manager = SessionManager::new(
            SessionManagerConfig::default().without_auto_save(),
            Arc::new(MemoryStorage::new()),
        );
        let event_bus = Arc::new(EventBus::default());

        let state = AppState::new(manager, event_bus);
        assert_eq!(state.event_bus.subscriber_count(), 0);

        // 无订阅者时通知不 panic
        state.notify_created("s-1");
        state.notify_status("s-1", SessionStatus::ProofCompleted);
    }

    #[tokio::test]
    async fn test_notify_reaches_subscriber() {
        let manager = SessionManager::new(
            SessionManagerConfig::default().without_auto_save(),
            Arc::new(MemoryStorage::new()),
        );
        let state = AppState::new(manager, Arc::new(EventBus::default()));

        let mut rx = state.event_bus.subscribe();
        state.notify_message("s-1", Message::student("Why five colors?"));

        match rx.recv().await.unwrap() {
            SessionEvent::MessageAppended {
                session_id,
                message,
            } => {
                assert_eq!(session_id, "s-1");
                assert_eq!(message.content, "Why five colors?");
            }
            _ => panic!("Expected MessageAppended event"),
        }
    }
}
