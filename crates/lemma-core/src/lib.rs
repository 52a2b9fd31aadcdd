//! # Lemma Core
//!
//! 图论证明辅导会话的核心领域类型。
//!
//! 一个会话（Session）从用户提交问题开始，外部 producer 逐条追加
//! 证明对话消息，完成后用户提交一次 1–4 的评分反馈。状态机：
//!
//! ```text
//! in-progress ──> proof-completed ──> feedback-submitted
//! ```
//!
//! 状态只能前进，不会回退。

pub mod types;

pub use types::{
    Feedback, Message, MessageRole, MessageType, Session, SessionFilter, SessionStatus,
    MAX_SCORE, MIN_SCORE,
};

/// 版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
