//! 命令日志（CommandLog）
//!
//! 以过滤器形式包装执行器：执行前记录命令，执行后记录结果。
//! 结果原样返回；执行器以 `Err` 结束时同样会被记录。
//!
use crate::{
    command_executor::CommandExecutor,
    command_result::CommandResult,
    error::AppResult,
};
use async_trait::async_trait;
use cqrs_domain::{command::Command, filter::Filter};
use std::sync::Arc;
use tracing::{info, warn};

pub trait CommandLog: Send + Sync {
    fn log_command(&self, command: &Command);

    fn log_result(&self, command: &Command, result: &AppResult<CommandResult>);
}

/// 基于 `tracing` 的命令日志
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCommandLog;

impl CommandLog for TracingCommandLog {
    fn log_command(&self, command: &Command) {
        info!(
            command = %command.command_type(),
            aggregate_id = %command.aggregate_id(),
            timestamp = %command.command_timestamp(),
            parameters = %command.parameters(),
            "command received"
        );
    }

    fn log_result(&self, command: &Command, result: &AppResult<CommandResult>) {
        match result {
            Ok(result @ CommandResult::Success(_)) => info!(
                command = %command.command_type(),
                aggregate_id = %command.aggregate_id(),
                result = %result,
                "command succeeded"
            ),
            Ok(result) => warn!(
                command = %command.command_type(),
                aggregate_id = %command.aggregate_id(),
                result = %result,
                "command failed"
            ),
            Err(error) => warn!(
                command = %command.command_type(),
                aggregate_id = %command.aggregate_id(),
                error = %error,
                "command execution error"
            ),
        }
    }
}

pub fn command_log_filter(log: Arc<dyn CommandLog>) -> Filter<Arc<dyn CommandExecutor>> {
    Filter::new(move |inner: Arc<dyn CommandExecutor>| {
        Arc::new(LoggedExecutor {
            inner,
            log: log.clone(),
        }) as Arc<dyn CommandExecutor>
    })
}

struct LoggedExecutor {
    inner: Arc<dyn CommandExecutor>,
    log: Arc<dyn CommandLog>,
}

#[async_trait]
impl CommandExecutor for LoggedExecutor {
    async fn execute(&self, command: &Command) -> AppResult<CommandResult> {
        self.log.log_command(command);
        let result = self.inner.execute(command).await;
        self.log.log_result(command, &result);
        result
    }
}
