//! # Lemma Core Types
//!
//! 定义证明会话相关的核心类型，包括消息、反馈、会话状态等。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 反馈评分的下限
pub const MIN_SCORE: u8 = 1;
/// 反馈评分的上限
pub const MAX_SCORE: u8 = 4;

/// 消息角色
///
/// 标识生成的证明对话中的发言视角，不是终端用户。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Student,
    Teacher,
    Definitions,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::Student => write!(f, "student"),
            MessageRole::Teacher => write!(f, "teacher"),
            MessageRole::Definitions => write!(f, "definitions"),
        }
    }
}

/// 消息语义类型
///
/// 用于渲染和分组的语义标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Definition,
    Proof,
    Critique,
    Default,
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Default
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Definition => write!(f, "definition"),
            MessageType::Proof => write!(f, "proof"),
            MessageType::Critique => write!(f, "critique"),
            MessageType::Default => write!(f, "default"),
        }
    }
}

/// 会话状态
///
/// 状态只能单向前进：in-progress → proof-completed → feedback-submitted。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    /// 证明生成中
    InProgress,
    /// 证明已完成，等待反馈
    ProofCompleted,
    /// 反馈已提交（终态）
    FeedbackSubmitted,
}

impl SessionStatus {
    /// 状态的前进序号，用于单调性检查
    fn rank(&self) -> u8 {
        match self {
            SessionStatus::InProgress => 0,
            SessionStatus::ProofCompleted => 1,
            SessionStatus::FeedbackSubmitted => 2,
        }
    }

    /// 是否是终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::FeedbackSubmitted)
    }

    /// 检查状态转换是否合法（允许原地转换，保证幂等）
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        next.rank() >= self.rank()
    }

    /// 当前状态是否还接受消息追加
    ///
    /// producer 的完成标记和最后一条消息没有原子顺序，
    /// 因此 proof-completed 状态仍接受追加。
    pub fn accepts_messages(&self) -> bool {
        matches!(
            self,
            SessionStatus::InProgress | SessionStatus::ProofCompleted
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in-progress"),
            SessionStatus::ProofCompleted => write!(f, "proof-completed"),
            SessionStatus::FeedbackSubmitted => write!(f, "feedback-submitted"),
        }
    }
}

/// 消息结构
///
/// 一旦追加到会话即不可变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// 创建任意角色的消息
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            kind: MessageType::Default,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// 创建学生视角的消息
    pub fn student(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Student, content)
    }

    /// 创建老师视角的消息
    pub fn teacher(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Teacher, content)
    }

    /// 创建定义消息
    pub fn definitions(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Definitions, content).with_kind(MessageType::Definition)
    }

    /// 设置语义类型
    pub fn with_kind(mut self, kind: MessageType) -> Self {
        self.kind = kind;
        self
    }
}

/// 反馈
///
/// 每个会话最多提交一次，提交后不可变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// 评分，1..=4
    pub score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Feedback {
    /// 创建反馈
    pub fn new(score: u8, notes: Option<String>) -> Self {
        Self {
            score,
            notes,
            timestamp: Utc::now(),
        }
    }

    /// 评分是否在允许区间内
    pub fn score_in_range(&self) -> bool {
        (MIN_SCORE..=MAX_SCORE).contains(&self.score)
    }
}

/// 证明会话
///
/// 一次完整的问题求解对话，从提交问题到可选的反馈。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// 用户提交的原始问题，创建后不可变
    pub problem: String,
    /// 是否展示逐步推导，传递给外部 producer 的建议标志
    pub show_steps: bool,
    /// 按追加顺序排列的消息，只增不减
    pub messages: Vec<Message>,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    /// 可选的归属用户，预留给多租户场景
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// 创建新会话，初始状态 in-progress，消息列表为空
    pub fn new(problem: impl Into<String>, show_steps: bool) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            problem: problem.into(),
            show_steps,
            messages: Vec::new(),
            status: SessionStatus::InProgress,
            feedback: None,
            user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 设置归属用户
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// 追加消息并更新时间戳
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// 更新状态并更新时间戳
    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.touch();
    }

    /// 获取消息历史
    pub fn get_messages(&self) -> &[Message] {
        &self.messages
    }

    /// 获取最后一条消息
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// 更新 updated_at
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// 会话查询过滤器
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    /// 按归属用户过滤
    pub user_id: Option<String>,
    /// 按状态过滤
    pub status: Option<SessionStatus>,
    /// 最大返回数量
    pub limit: Option<usize>,
}

impl SessionFilter {
    /// 创建空过滤器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置用户过滤
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// 设置状态过滤
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// 设置最大返回数量
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// 判断会话是否满足过滤条件
    pub fn matches(&self, session: &Session) -> bool {
        if let Some(ref user_id) = self.user_id {
            if session.user_id.as_ref() != Some(user_id) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if session.status != status {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!(
            serde_json::to_string(&SessionStatus::ProofCompleted).unwrap(),
            "\"proof-completed\""
        );
        assert_eq!(
            serde_json::to_string(&SessionStatus::FeedbackSubmitted).unwrap(),
            "\"feedback-submitted\""
        );

        let status: SessionStatus = serde_json::from_str("\"proof-completed\"").unwrap();
        assert_eq!(status, SessionStatus::ProofCompleted);
    }

    #[test]
    fn test_status_transitions_are_monotonic() {
        use SessionStatus::*;

        assert!(InProgress.can_transition_to(ProofCompleted));
        assert!(InProgress.can_transition_to(FeedbackSubmitted));
        assert!(ProofCompleted.can_transition_to(FeedbackSubmitted));

        // 幂等转换合法
        assert!(ProofCompleted.can_transition_to(ProofCompleted));
        assert!(FeedbackSubmitted.can_transition_to(FeedbackSubmitted));

        // 不允许回退
        assert!(!ProofCompleted.can_transition_to(InProgress));
        assert!(!FeedbackSubmitted.can_transition_to(ProofCompleted));
        assert!(!FeedbackSubmitted.can_transition_to(InProgress));
    }

    #[test]
    fn test_status_accepts_messages() {
        assert!(SessionStatus::InProgress.accepts_messages());
        assert!(SessionStatus::ProofCompleted.accepts_messages());
        assert!(!SessionStatus::FeedbackSubmitted.accepts_messages());
    }

    #[test]
    fn test_message_wire_format_uses_type_field() {
        let message = Message::teacher("By induction on |V(G)|.").with_kind(MessageType::Proof);
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["role"], "teacher");
        assert_eq!(json["type"], "proof");
        assert_eq!(json["content"], "By induction on |V(G)|.");

        let parsed: Message = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_message_type_defaults_when_missing() {
        let parsed: Message = serde_json::from_str(
            r#"{"role":"student","content":"Why 5?","timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(parsed.kind, MessageType::Default);
    }

    #[test]
    fn test_definitions_constructor() {
        let message = Message::definitions("χ(G) denotes the chromatic number.");
        assert_eq!(message.role, MessageRole::Definitions);
        assert_eq!(message.kind, MessageType::Definition);
    }

    #[test]
    fn test_feedback_score_range() {
        for score in 1..=4u8 {
            assert!(Feedback::new(score, None).score_in_range());
        }
        assert!(!Feedback::new(0, None).score_in_range());
        assert!(!Feedback::new(5, None).score_in_range());
    }

    #[test]
    fn test_new_session_shape() {
        let session = Session::new("Prove that every tree on n vertices has n-1 edges.", true);

        assert_eq!(session.status, SessionStatus::InProgress);
        assert!(session.messages.is_empty());
        assert!(session.feedback.is_none());
        assert!(session.user_id.is_none());
        assert_eq!(session.created_at, session.updated_at);
    }

    #[test]
    fn test_add_message_preserves_order_and_touches() {
        let mut session = Session::new("Prove X", false);
        let before = session.updated_at;

        session.add_message(Message::definitions("A"));
        session.add_message(Message::student("B"));
        session.add_message(Message::teacher("C"));

        let contents: Vec<_> = session
            .get_messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["A", "B", "C"]);
        assert!(session.updated_at >= before);
    }

    #[test]
    fn test_session_wire_format_is_camel_case() {
        let session = Session::new("Prove X", true).with_user_id("user-1");
        let json = serde_json::to_value(&session).unwrap();

        assert!(json.get("showSteps").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("userId").is_some());
        assert!(json.get("show_steps").is_none());
    }

    #[test]
    fn test_filter_matches() {
        let session = Session::new("Prove X", true).with_user_id("user-a");

        assert!(SessionFilter::new().matches(&session));
        assert!(SessionFilter::new().with_user_id("user-a").matches(&session));
        assert!(!SessionFilter::new().with_user_id("user-b").matches(&session));
        assert!(SessionFilter::new()
            .with_status(SessionStatus::InProgress)
            .matches(&session));
        assert!(!SessionFilter::new()
            .with_status(SessionStatus::ProofCompleted)
            .matches(&session));
    }
}
