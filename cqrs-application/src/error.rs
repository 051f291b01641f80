use cqrs_domain::error::DomainError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("execution failure: command={command}, reason={reason}")]
    ExecutionFailure { command: String, reason: String },

    #[error("command cancelled: {command}")]
    Cancelled { command: String },

    #[error("handler not found: {0}")]
    HandlerNotFound(String),

    #[error("handler already registered: command={command}")]
    AlreadyRegisteredCommand { command: String },

    #[error("infra: {0}")]
    Infra(String),
}

pub type AppResult<T> = Result<T, AppError>;
