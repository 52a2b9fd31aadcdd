//! # Session Manager
//!
//! 会话生命周期控制器。
//!
//! 这是整个服务的核心组件，负责：
//! - 维护状态机 in-progress → proof-completed → feedback-submitted
//! - 校验每个操作在当前状态下是否合法
//! - 协调持久化存储操作
//! - 保证每个会话单写者（per-session 写锁），避免完成标记和
//!   尾部追加竞争时丢失更新

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::error::{SessionError, SessionResult};
use crate::storage::SessionStorage;
use lemma_core::{Feedback, Message, Session, SessionFilter, SessionStatus};

/// SessionManager 配置
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// 自动保存间隔
    pub auto_save_interval_secs: u64,
    /// 最大活跃会话数
    pub max_active_sessions: usize,
    /// 启用后台自动保存
    pub enable_auto_save: bool,
    /// 缓存驱逐阈值：超过该秒数未访问的干净会话从内存移除
    pub idle_eviction_secs: u64,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            auto_save_interval_secs: 60,
            max_active_sessions: 1000,
            enable_auto_save: true,
            idle_eviction_secs: 1800,
        }
    }
}

impl SessionManagerConfig {
    /// 设置自动保存间隔
    pub fn with_auto_save_interval(mut self, secs: u64) -> Self {
        self.auto_save_interval_secs = secs;
        self
    }

    /// 设置最大活跃会话数
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_active_sessions = max;
        self
    }

    /// 禁用后台自动保存（用于测试）
    pub fn without_auto_save(mut self) -> Self {
        self.enable_auto_save = false;
        self
    }

    /// 设置缓存驱逐阈值
    pub fn with_idle_eviction(mut self, secs: u64) -> Self {
        self.idle_eviction_secs = secs;
        self
    }
}

/// 内存中的会话条目
#[derive(Debug)]
struct SessionEntry {
    /// 会话数据
    session: Session,
    /// 最后访问时间
    last_accessed: chrono::DateTime<Utc>,
    /// 是否已修改（需要保存）
    dirty: bool,
}

impl SessionEntry {
    fn new(session: Session) -> Self {
        Self {
            session,
            last_accessed: Utc::now(),
            dirty: false,
        }
    }

    fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

/// SessionManager
///
/// 管理会话的生命周期，提供内存缓存和持久化协调。
/// 所有状态变更都经过这里，每个会话 id 对应一把写锁。
pub struct SessionManager {
    config: SessionManagerConfig,
    storage: Arc<dyn SessionStorage>,
    /// 内存会话缓存
    sessions: DashMap<String, RwLock<SessionEntry>>,
}

impl SessionManager {
    /// 创建新的 SessionManager
    pub fn new(config: SessionManagerConfig, storage: Arc<dyn SessionStorage>) -> Arc<Self> {
        let manager = Arc::new(Self {
            config,
            storage,
            sessions: DashMap::new(),
        });

        if manager.config.enable_auto_save {
            let manager_clone = Arc::clone(&manager);
            tokio::spawn(async move {
                manager_clone.auto_save_loop().await;
            });
        }

        info!("SessionManager initialized");
        manager
    }

    /// 后台自动保存任务
    async fn auto_save_loop(&self) {
        let mut save_interval = interval(Duration::from_secs(self.config.auto_save_interval_secs));
        loop {
            save_interval.tick().await;
            if let Err(e) = self.save_dirty_sessions().await {
                error!("Auto-save failed: {}", e);
            }
            self.evict_idle_sessions();
        }
    }

    /// 从缓存中移除长时间未访问的干净会话，存储中的数据不受影响
    fn evict_idle_sessions(&self) {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.config.idle_eviction_secs as i64);
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| {
            let guard = entry.read();
            guard.dirty || guard.last_accessed > cutoff
        });
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            debug!("Evicted {} idle session(s) from cache", evicted);
        }
    }

    /// 保存所有脏会话
    async fn save_dirty_sessions(&self) -> SessionResult<()> {
        // 收集需要保存的会话快照（不持有锁跨越 await）
        let dirty_sessions: Vec<_> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().read().dirty)
            .map(|entry| entry.value().read().session.clone())
            .collect();

        for session in dirty_sessions {
            let session_id = session.id.clone();
            if let Err(e) = self.storage.save_session(&session).await {
                error!("Failed to auto-save session {}: {}", session_id, e);
            } else {
                if let Some(entry) = self.sessions.get(&session_id) {
                    entry.write().clear_dirty();
                }
                debug!("Auto-saved session: {}", session_id);
            }
        }

        Ok(())
    }

    /// 确保会话已加载到缓存
    async fn ensure_cached(&self, session_id: &str) -> SessionResult<()> {
        if self.sessions.contains_key(session_id) {
            return Ok(());
        }

        match self.storage.load_session(session_id).await? {
            Some(session) => {
                self.sessions
                    .insert(session_id.to_string(), RwLock::new(SessionEntry::new(session)));
                debug!("Loaded session from storage: {}", session_id);
                Ok(())
            }
            None => Err(SessionError::not_found(session_id)),
        }
    }

    /// 创建新会话
    ///
    /// 空白问题被拒绝；新会话状态为 in-progress，消息列表为空。
    pub async fn create_session(
        &self,
        problem: impl Into<String>,
        show_steps: bool,
        user_id: Option<String>,
    ) -> SessionResult<Session> {
        let problem = problem.into();
        if problem.trim().is_empty() {
            return Err(SessionError::validation("problem must not be empty"));
        }

        if self.sessions.len() >= self.config.max_active_sessions {
            return Err(SessionError::conflict(format!(
                "max active sessions reached ({})",
                self.config.max_active_sessions,
            )));
        }

        let mut session = Session::new(problem, show_steps);
        if let Some(uid) = user_id {
            session = session.with_user_id(uid);
        }

        self.storage.create_session(&session).await?;
        self.sessions
            .insert(session.id.clone(), RwLock::new(SessionEntry::new(session.clone())));

        info!("Created session: {}", session.id);
        Ok(session)
    }

    /// 获取会话快照（优先从内存，否则从存储加载）
    pub async fn get_session(&self, session_id: &str) -> SessionResult<Session> {
        self.ensure_cached(session_id).await?;

        let entry = self
            .sessions
            .get(session_id)
            .ok_or_else(|| SessionError::not_found(session_id))?;
        let mut guard = entry.write();
        guard.touch();
        Ok(guard.session.clone())
    }

    /// 追加消息到会话
    ///
    /// in-progress 和 proof-completed 都接受追加：producer 的完成标记
    /// 和最后一条消息之间没有原子顺序。feedback-submitted 后拒绝。
    pub async fn append_message(
        &self,
        session_id: &str,
        message: Message,
    ) -> SessionResult<Message> {
        self.ensure_cached(session_id).await?;

        {
            let entry = self
                .sessions
                .get(session_id)
                .ok_or_else(|| SessionError::not_found(session_id))?;
            let mut guard = entry.write();

            if !guard.session.status.accepts_messages() {
                return Err(SessionError::conflict(format!(
                    "session {} no longer accepts messages (status: {})",
                    session_id, guard.session.status,
                )));
            }

            guard.session.add_message(message.clone());
            guard.touch();
            guard.mark_dirty();
        }

        // 增量持久化追加；会话快照由脏标记覆盖
        self.storage.append_message(session_id, &message).await?;

        debug!("Appended {} message to session {}", message.role, session_id);
        Ok(message)
    }

    /// 标记证明完成
    ///
    /// in-progress → proof-completed。已完成时幂等；
    /// 已提交反馈的终态会话拒绝。
    pub async fn mark_completed(&self, session_id: &str) -> SessionResult<Session> {
        self.ensure_cached(session_id).await?;

        let snapshot = {
            let entry = self
                .sessions
                .get(session_id)
                .ok_or_else(|| SessionError::not_found(session_id))?;
            let mut guard = entry.write();

            match guard.session.status {
                SessionStatus::InProgress => {
                    guard.session.set_status(SessionStatus::ProofCompleted);
                    guard.mark_dirty();
                }
                SessionStatus::ProofCompleted => {
                    // 幂等：重复完成不是错误
                }
                SessionStatus::FeedbackSubmitted => {
                    return Err(SessionError::conflict(format!(
                        "session {} is terminal, cannot mark completed",
                        session_id,
                    )));
                }
            }

            guard.touch();
            guard.session.clone()
        };

        // 保存失败时脏标记保留，交给 flush/自动保存重试
        self.storage.save_session(&snapshot).await?;
        if let Some(entry) = self.sessions.get(session_id) {
            entry.write().clear_dirty();
        }
        info!("Session {} marked proof-completed", session_id);
        Ok(snapshot)
    }

    /// 提交反馈
    ///
    /// 要求状态为 proof-completed；评分必须在 1..=4；每个会话
    /// 至多提交一次。反馈写入和状态转换在同一把锁下原子完成。
    pub async fn submit_feedback(
        &self,
        session_id: &str,
        feedback: Feedback,
    ) -> SessionResult<Session> {
        if !feedback.score_in_range() {
            return Err(SessionError::validation(format!(
                "score must be between {} and {}, got {}",
                lemma_core::MIN_SCORE,
                lemma_core::MAX_SCORE,
                feedback.score,
            )));
        }

        self.ensure_cached(session_id).await?;

        let snapshot = {
            let entry = self
                .sessions
                .get(session_id)
                .ok_or_else(|| SessionError::not_found(session_id))?;
            let mut guard = entry.write();

            if guard.session.feedback.is_some() {
                return Err(SessionError::conflict(format!(
                    "feedback already submitted for session {}",
                    session_id,
                )));
            }

            match guard.session.status {
                SessionStatus::InProgress => {
                    return Err(SessionError::conflict(format!(
                        "session {} is still in progress, feedback requires a completed proof",
                        session_id,
                    )));
                }
                SessionStatus::FeedbackSubmitted => {
                    return Err(SessionError::conflict(format!(
                        "session {} is already terminal",
                        session_id,
                    )));
                }
                SessionStatus::ProofCompleted => {
                    guard.session.feedback = Some(feedback);
                    guard.session.set_status(SessionStatus::FeedbackSubmitted);
                    guard.mark_dirty();
                }
            }

            guard.touch();
            guard.session.clone()
        };

        // 保存失败时脏标记保留，交给 flush/自动保存重试
        self.storage.save_session(&snapshot).await?;
        if let Some(entry) = self.sessions.get(session_id) {
            entry.write().clear_dirty();
        }
        info!("Feedback recorded for session {}", session_id);
        Ok(snapshot)
    }

    /// 应用部分更新（PATCH 语义）
    ///
    /// feedback 和 status 要么一起提交成功，要么都不生效。
    pub async fn update_session(
        &self,
        session_id: &str,
        feedback: Option<Feedback>,
        status: Option<SessionStatus>,
    ) -> SessionResult<Session> {
        match (feedback, status) {
            (Some(feedback), status) => {
                // 反馈只能把会话推进到 feedback-submitted
                if let Some(status) = status {
                    if status != SessionStatus::FeedbackSubmitted {
                        return Err(SessionError::validation(format!(
                            "feedback update cannot set status to {}",
                            status,
                        )));
                    }
                }
                self.submit_feedback(session_id, feedback).await
            }
            (None, Some(SessionStatus::ProofCompleted)) => self.mark_completed(session_id).await,
            (None, Some(SessionStatus::FeedbackSubmitted)) => Err(SessionError::validation(
                "status feedback-submitted requires a feedback payload",
            )),
            (None, Some(SessionStatus::InProgress)) => {
                let session = self.get_session(session_id).await?;
                if session.status == SessionStatus::InProgress {
                    // 幂等 no-op
                    Ok(session)
                } else {
                    Err(SessionError::conflict(format!(
                        "session {} cannot regress to in-progress",
                        session_id,
                    )))
                }
            }
            (None, None) => Err(SessionError::validation(
                "update must set feedback or status",
            )),
        }
    }

    /// 列出会话
    pub async fn list_sessions(&self, filter: &SessionFilter) -> SessionResult<Vec<Session>> {
        // 先落盘再查询，保证脏缓存不丢
        self.save_dirty_sessions().await?;
        self.storage.list_sessions(filter).await
    }

    /// 删除会话（彻底删除）
    pub async fn delete_session(&self, session_id: &str) -> SessionResult<()> {
        self.sessions.remove(session_id);
        self.storage.delete_session(session_id).await?;
        info!("Deleted session: {}", session_id);
        Ok(())
    }

    /// 获取内存中缓存的会话数量
    pub fn cached_session_count(&self) -> usize {
        self.sessions.len()
    }

    /// 强制保存所有脏会话
    pub async fn flush(&self) -> SessionResult<()> {
        self.save_dirty_sessions().await
    }
}
