//! # Lemma Session
//!
//! 证明会话的生命周期控制器与持久化存储。
//!
//! ## 功能特性
//!
//! - **生命周期状态机**：in-progress → proof-completed → feedback-submitted，
//!   单向前进，由 `SessionManager` 统一校验
//! - **单写者约定**：每个会话 id 一把写锁，完成标记和尾部追加不会丢更新
//! - **消息历史存储**：快照 + 追加式 jsonl 消息流
//! - **内存缓存**：活跃会话内存缓存，脏条目后台自动保存
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use lemma_session::{
//!     JsonStorage, JsonStorageConfig, SessionManager, SessionManagerConfig,
//! };
//! use lemma_core::{Feedback, Message};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = Arc::new(
//!         JsonStorage::new(JsonStorageConfig::new("~/.lemma/sessions")).await?,
//!     );
//!     let manager = SessionManager::new(SessionManagerConfig::default(), storage);
//!
//!     // 创建会话
//!     let session = manager
//!         .create_session("Prove that K5 is not planar.", true, None)
//!         .await?;
//!
//!     // 外部 producer 追加证明对话
//!     manager
//!         .append_message(&session.id, Message::teacher("Suppose K5 were planar..."))
//!         .await?;
//!     manager.mark_completed(&session.id).await?;
//!
//!     // 用户评分
//!     manager
//!         .submit_feedback(&session.id, Feedback::new(4, None))
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod json_storage;
pub mod manager;
pub mod storage;

// 重新导出主要类型
pub use error::{SessionError, SessionResult};
pub use json_storage::{JsonStorage, JsonStorageConfig};
pub use manager::{SessionManager, SessionManagerConfig};
pub use storage::{MemoryStorage, SessionStorage};

/// 版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 创建默认存储路径
pub fn default_storage_path() -> std::path::PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".lemma").join("sessions"))
        .unwrap_or_else(|| std::path::PathBuf::from("./lemma_sessions"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemma_core::{Feedback, Message, SessionStatus};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_manager_over_json_storage() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(
            JsonStorage::new(JsonStorageConfig::new(temp_dir.path()))
                .await
                .unwrap(),
        );
        let manager = SessionManager::new(
            SessionManagerConfig::default().without_auto_save(),
            storage.clone(),
        );

        let session = manager
            .create_session("Prove that every tree is bipartite.", true, None)
            .await
            .unwrap();

        manager
            .append_message(&session.id, Message::teacher("Color by parity of depth."))
            .await
            .unwrap();
        manager.mark_completed(&session.id).await.unwrap();
        manager
            .submit_feedback(&session.id, Feedback::new(4, Some("clean".to_string())))
            .await
            .unwrap();

        // 绕过缓存直接从存储读取
        let persisted = storage.load_session(&session.id).await.unwrap().unwrap();
        assert_eq!(persisted.status, SessionStatus::FeedbackSubmitted);
        assert_eq!(persisted.messages.len(), 1);
        assert_eq!(persisted.feedback.unwrap().score, 4);
    }
}
