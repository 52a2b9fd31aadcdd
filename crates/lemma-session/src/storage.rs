//! # Storage Traits
//!
//! 定义会话存储的核心 trait 以及测试用的内存实现。

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{SessionError, SessionResult};
use lemma_core::{Message, Session, SessionFilter};

/// 会话存储 trait
///
/// 生命周期控制器对持久化后端的全部要求：创建、读取、整体保存、
/// 增量追加消息、删除和过滤查询。
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// 创建新会话，id 已存在时失败
    async fn create_session(&self, session: &Session) -> SessionResult<()>;

    /// 加载会话
    async fn load_session(&self, session_id: &str) -> SessionResult<Option<Session>>;

    /// 保存会话（完整替换）
    async fn save_session(&self, session: &Session) -> SessionResult<()>;

    /// 检查会话是否存在
    async fn session_exists(&self, session_id: &str) -> SessionResult<bool>;

    /// 追加消息到会话（增量写入）
    async fn append_message(&self, session_id: &str, message: &Message) -> SessionResult<()>;

    /// 删除会话
    async fn delete_session(&self, session_id: &str) -> SessionResult<()>;

    /// 列出会话（支持过滤）
    async fn list_sessions(&self, filter: &SessionFilter) -> SessionResult<Vec<Session>>;
}

/// 内存存储实现
///
/// 不落盘，用于单元测试和一次性部署。
#[derive(Debug, Default)]
pub struct MemoryStorage {
    sessions: DashMap<String, Session>,
}

impl MemoryStorage {
    /// 创建空的内存存储
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn create_session(&self, session: &Session) -> SessionResult<()> {
        if self.sessions.contains_key(&session.id) {
            return Err(SessionError::AlreadyExists {
                id: session.id.clone(),
            });
        }
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn load_session(&self, session_id: &str) -> SessionResult<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|s| s.clone()))
    }

    async fn save_session(&self, session: &Session) -> SessionResult<()> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn session_exists(&self, session_id: &str) -> SessionResult<bool> {
        Ok(self.sessions.contains_key(session_id))
    }

    async fn append_message(&self, session_id: &str, message: &Message) -> SessionResult<()> {
        match self.sessions.get_mut(session_id) {
            Some(mut session) => {
                session.add_message(message.clone());
                Ok(())
            }
            None => Err(SessionError::not_found(session_id)),
        }
    }

    async fn delete_session(&self, session_id: &str) -> SessionResult<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> SessionResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        // 最近更新的排前面
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        if let Some(limit) = filter.limit {
            sessions.truncate(limit);
        }

        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let storage = MemoryStorage::new();
        let session = Session::new("Prove X", true);

        storage.create_session(&session).await.unwrap();
        let err = storage.create_session(&session).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_append_message_unknown_session() {
        let storage = MemoryStorage::new();
        let err = storage
            .append_message("no-such-id", &Message::teacher("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_sessions_filter_and_limit() {
        let storage = MemoryStorage::new();
        for i in 0..5 {
            let session = Session::new(format!("Problem {}", i), false)
                .with_user_id(if i % 2 == 0 { "user-a" } else { "user-b" });
            storage.create_session(&session).await.unwrap();
        }

        let filter = SessionFilter::new().with_user_id("user-a");
        let result = storage.list_sessions(&filter).await.unwrap();
        assert_eq!(result.len(), 3);

        let limited = storage
            .list_sessions(&SessionFilter::new().with_limit(2))
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }
}
