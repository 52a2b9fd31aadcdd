//! # Session Error Types
//!
//! 定义会话生命周期与存储相关的错误类型。

use thiserror::Error;

/// 会话错误类型
#[derive(Error, Debug)]
pub enum SessionError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 输入校验失败（空问题、评分越界）
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// 会话不存在
    #[error("Session not found: {id}")]
    NotFound { id: String },

    /// 非法状态转换（完成前提交反馈、重复反馈、从终态转换）
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// 会话已存在
    #[error("Session already exists: {id}")]
    AlreadyExists { id: String },

    /// 其他错误
    #[error("Session error: {message}")]
    Other { message: String },
}

impl SessionError {
    /// 创建校验错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// 创建未找到错误
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// 创建冲突错误
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// 创建其他错误
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// 会话结果类型
pub type SessionResult<T> = Result<T, SessionError>;
