//! # JsonStorage Implementation
//!
//! 基于 JSON 文件的会话持久化存储实现。
//!
//! 存储结构:
//! ```text
//! <base_path>/
//! ├── sessions/
//! │   ├── <session_id>.json      # 会话快照（含消息）
//! │   └── ...
//! └── messages/
//!     ├── <session_id>.jsonl     # 消息流（追加写入）
//!     └── ...
//! ```
//!
//! 消息以 jsonl 增量追加；加载时如果 jsonl 比快照里的消息多，
//! 以 jsonl 为准，这样追加就不需要重写整个快照文件。

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::storage::SessionStorage;
use lemma_core::{Message, Session, SessionFilter};

/// JsonStorage 配置
#[derive(Debug, Clone)]
pub struct JsonStorageConfig {
    /// 存储根目录
    pub base_path: PathBuf,
}

impl JsonStorageConfig {
    /// 创建默认配置
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Default for JsonStorageConfig {
    fn default() -> Self {
        Self::new("~/.lemma/sessions")
    }
}

/// JsonStorage 实现
pub struct JsonStorage {
    sessions_path: PathBuf,
    messages_path: PathBuf,
}

impl JsonStorage {
    /// 创建新的 JsonStorage 实例
    pub async fn new(config: JsonStorageConfig) -> SessionResult<Self> {
        let base_path_str = config.base_path.to_string_lossy().to_string();
        let base_path = shellexpand::tilde(&base_path_str);
        let base_path = PathBuf::from(base_path.as_ref());

        let sessions_path = base_path.join("sessions");
        let messages_path = base_path.join("messages");

        fs::create_dir_all(&sessions_path).await?;
        fs::create_dir_all(&messages_path).await?;

        info!("JsonStorage initialized at {:?}", base_path);

        Ok(Self {
            sessions_path,
            messages_path,
        })
    }

    /// 获取会话文件路径
    fn session_file_path(&self, session_id: &str) -> PathBuf {
        self.sessions_path.join(format!("{}.json", session_id))
    }

    /// 获取消息文件路径
    fn message_file_path(&self, session_id: &str) -> PathBuf {
        self.messages_path.join(format!("{}.jsonl", session_id))
    }

    /// 写入会话快照
    async fn write_snapshot(&self, session: &Session) -> SessionResult<()> {
        let path = self.session_file_path(&session.id);
        let content = serde_json::to_string_pretty(session)?;
        fs::write(&path, content).await?;
        Ok(())
    }

    /// 从文件加载消息流
    async fn load_messages_from_file(&self, session_id: &str) -> SessionResult<Vec<Message>> {
        let path = self.message_file_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).await?;
        let mut messages = Vec::new();

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    warn!("Failed to parse message line for {}: {}", session_id, e);
                }
            }
        }

        Ok(messages)
    }
}

#[async_trait]
impl SessionStorage for JsonStorage {
    async fn create_session(&self, session: &Session) -> SessionResult<()> {
        let path = self.session_file_path(&session.id);
        if path.exists() {
            return Err(SessionError::AlreadyExists {
                id: session.id.clone(),
            });
        }

        self.write_snapshot(session).await?;
        debug!("Created session file: {}", session.id);
        Ok(())
    }

    async fn load_session(&self, session_id: &str) -> SessionResult<Option<Session>> {
        let path = self.session_file_path(session_id);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let mut session: Session = serde_json::from_str(&content)?;

        // jsonl 是追加写入的权威来源，快照可能落后
        let messages = self.load_messages_from_file(session_id).await?;
        if messages.len() > session.messages.len() {
            session.messages = messages;
        }

        Ok(Some(session))
    }

    async fn save_session(&self, session: &Session) -> SessionResult<()> {
        self.write_snapshot(session).await
    }

    async fn session_exists(&self, session_id: &str) -> SessionResult<bool> {
        Ok(self.session_file_path(session_id).exists())
    }

    async fn append_message(&self, session_id: &str, message: &Message) -> SessionResult<()> {
        if !self.session_file_path(session_id).exists() {
            return Err(SessionError::not_found(session_id));
        }

        let path = self.message_file_path(session_id);
        let line = serde_json::to_string(message)?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> SessionResult<()> {
        let session_path = self.session_file_path(session_id);
        if session_path.exists() {
            fs::remove_file(&session_path).await?;
        }

        let message_path = self.message_file_path(session_id);
        if message_path.exists() {
            fs::remove_file(&message_path).await?;
        }

        debug!("Deleted session data: {}", session_id);
        Ok(())
    }

    async fn list_sessions(&self, filter: &SessionFilter) -> SessionResult<Vec<Session>> {
        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.sessions_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(session_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match self.load_session(session_id).await {
                Ok(Some(session)) => {
                    if filter.matches(&session) {
                        sessions.push(session);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Skipping unreadable session file {:?}: {}", path, e);
                }
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        if let Some(limit) = filter.limit {
            sessions.truncate(limit);
        }

        Ok(sessions)
    }
}
