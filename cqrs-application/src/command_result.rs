//! 命令结果（CommandResult）
//!
//! 成功时携带可选的返回值，失败时携带处理器给出的原始错误。
//! 业务失败属于正常结果，不会以 `Err` 的形式出现在执行器的返回值中。
//!
use crate::error::{AppError, AppResult};
use cqrs_domain::error::DomainError;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum CommandResult {
    Success(Option<Value>),
    Failure(Arc<anyhow::Error>),
}

impl CommandResult {
    /// 无返回值的成功
    pub fn done() -> Self {
        CommandResult::Success(None)
    }

    pub fn success(value: Value) -> Self {
        CommandResult::Success(Some(value))
    }

    /// 序列化任意返回值
    pub fn success_of<T: Serialize>(value: &T) -> AppResult<Self> {
        let value = serde_json::to_value(value).map_err(DomainError::from)?;
        Ok(CommandResult::Success(Some(value)))
    }

    pub fn failure(error: impl Into<anyhow::Error>) -> Self {
        CommandResult::Failure(Arc::new(error.into()))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            CommandResult::Success(value) => value.as_ref(),
            CommandResult::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&anyhow::Error> {
        match self {
            CommandResult::Success(_) => None,
            CommandResult::Failure(error) => Some(error.as_ref()),
        }
    }

    /// 折叠为 `Result`；失败转换为 `ExecutionFailure`
    pub fn into_value(self, command: impl fmt::Display) -> AppResult<Option<Value>> {
        match self {
            CommandResult::Success(value) => Ok(value),
            CommandResult::Failure(error) => Err(AppError::ExecutionFailure {
                command: command.to_string(),
                reason: format!("{error:#}"),
            }),
        }
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResult::Success(None) => f.write_str("success"),
            CommandResult::Success(Some(value)) => write!(f, "success: {value}"),
            CommandResult::Failure(error) => write!(f, "failure: {error:#}"),
        }
    }
}
