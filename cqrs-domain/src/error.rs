//! 领域层统一错误定义
//!
//! 聚焦元组结构校验、类型识别、过滤器组合、事件批次/日志与持久化等最小必要集合，
//! 便于在各实现层统一转换为 `DomainError`。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 元组/结构 ---
    #[error("schema violation: schema={schema}, reason={reason}")]
    SchemaViolation { schema: String, reason: String },
    #[error("unrecognized {kind} type: {type_name}")]
    UnrecognizedType {
        kind: &'static str,
        type_name: String,
    },

    // --- 过滤器/管道 ---
    #[error("filter composition error: {reason}")]
    FilterComposition { reason: String },

    // --- 事件系统 ---
    #[error("event batch already completed")]
    BatchCompleted,
    #[error("event handler error: handler={handler}, reason={reason}")]
    EventHandler { handler: String, reason: String },

    // --- 仓储/持久化 ---
    #[error("persistence error: {reason}")]
    Persistence { reason: String },

    // --- 状态 ---
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },

    // --- 序列化/解析 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("parse error: {reason}")]
    Parse { reason: String },
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn schema_violation(schema: impl Into<String>, reason: impl Into<String>) -> Self {
        DomainError::SchemaViolation {
            schema: schema.into(),
            reason: reason.into(),
        }
    }

    pub fn unrecognized_event(type_name: impl ToString) -> Self {
        DomainError::UnrecognizedType {
            kind: "event",
            type_name: type_name.to_string(),
        }
    }

    pub fn unrecognized_command(type_name: impl ToString) -> Self {
        DomainError::UnrecognizedType {
            kind: "command",
            type_name: type_name.to_string(),
        }
    }

    pub fn persistence(reason: impl Into<String>) -> Self {
        DomainError::Persistence {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        DomainError::InvalidState {
            reason: reason.into(),
        }
    }
}

impl From<uuid::Error> for DomainError {
    fn from(err: uuid::Error) -> Self {
        DomainError::Parse {
            reason: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for DomainError {
    fn from(err: chrono::ParseError) -> Self {
        DomainError::Parse {
            reason: err.to_string(),
        }
    }
}
