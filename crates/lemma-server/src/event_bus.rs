//! EventBus 模块 - 会话消息的服务端推送通道
//!
//! 生命周期控制器完成一次成功的变更后，把事件发布到这里；
//! SSE handler 订阅并按会话 id 过滤。通道不重放历史：订阅
//! 之前追加的消息只能通过一次会话快照获取。

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use lemma_core::{Message, SessionStatus};

/// 会话事件类型
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// 会话创建
    SessionCreated { session_id: String },
    /// 消息追加（按提交顺序，每个订阅者恰好收到一次）
    MessageAppended {
        session_id: String,
        message: Message,
    },
    /// 状态变更
    StatusChanged {
        session_id: String,
        status: SessionStatus,
    },
}

impl SessionEvent {
    /// 事件所属的会话 id
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::SessionCreated { session_id }
            | SessionEvent::MessageAppended { session_id, .. }
            | SessionEvent::StatusChanged { session_id, .. } => session_id,
        }
    }
}

/// EventBus 错误类型
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Send error: {0}")]
    Send(#[from] broadcast::error::SendError<SessionEvent>),
}

/// EventBus 结构体 - 使用广播通道
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// 创建新的 EventBus
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 发布事件
    ///
    /// 没有任何订阅者时返回 Err，调用方可以安全忽略。
    pub fn publish(&self, event: SessionEvent) -> Result<usize, EventBusError> {
        self.sender.send(event).map_err(EventBusError::from)
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// 获取当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(100);
        let mut rx = event_bus.subscribe();

        let event = SessionEvent::SessionCreated {
            session_id: "test-123".to_string(),
        };

        event_bus.publish(event).unwrap();

        let received = rx.recv().await.unwrap();
        match received {
            SessionEvent::SessionCreated { session_id } => {
                assert_eq!(session_id, "test-123");
            }
            _ => panic!("Expected SessionCreated event"),
        }
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let event_bus = EventBus::new(100);
        let mut rx1 = event_bus.subscribe();
        let mut rx2 = event_bus.subscribe();

        let event = SessionEvent::MessageAppended {
            session_id: "test-123".to_string(),
            message: Message::teacher("Consider a spanning tree of G."),
        };

        event_bus.publish(event).unwrap();

        let received1 = rx1.recv().await.unwrap();
        let received2 = rx2.recv().await.unwrap();

        match (&received1, &received2) {
            (
                SessionEvent::MessageAppended { session_id: s1, .. },
                SessionEvent::MessageAppended { session_id: s2, .. },
            ) => {
                assert_eq!(s1, s2);
                assert_eq!(s1, "test-123");
            }
            _ => panic!("Expected MessageAppended events"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_errors() {
        let event_bus = EventBus::new(100);
        let result = event_bus.publish(SessionEvent::SessionCreated {
            session_id: "lonely".to_string(),
        });
        assert!(result.is_err());
        assert_eq!(event_bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_publish_order() {
        let event_bus = EventBus::new(100);
        let mut rx = event_bus.subscribe();

        for content in ["A", "B", "C"] {
            event_bus
                .publish(SessionEvent::MessageAppended {
                    session_id: "s".to_string(),
                    message: Message::teacher(content),
                })
                .unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            if let SessionEvent::MessageAppended { message, .. } = rx.recv().await.unwrap() {
                seen.push(message.content);
            }
        }
        assert_eq!(seen, vec!["A", "B", "C"]);
    }
}
