//! 命令总线（Command Bus）
//!
//! - 入口处用可选的 `CommandTypeMatcher` 校验命令类型与参数结构，
//!   未注册的类型直接返回 `UnrecognizedType`，不会进入执行器；
//! - 执行器可叠加过滤器（日志、守卫等），组合规则与领域层一致；
//! - `dispatch` 把执行放到 tokio 任务中，返回可等待、可取消的 `PendingCommand`。
//!
//! 取消只影响等待方：已开始的执行会继续运行到结束（批次照常完成），
//! 但等待 `PendingCommand` 得到的是 `Cancelled`。尚未开始的执行在取消后不再启动。
//!
use crate::{
    command_executor::CommandExecutor,
    command_result::CommandResult,
    error::{AppError, AppResult},
};
use cqrs_domain::{
    command::Command,
    error::DomainError,
    filter::Filter,
    identity::CommandType,
    registry::CommandTypeMatcher,
};
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Clone)]
pub struct CommandBus {
    executor: Arc<dyn CommandExecutor>,
    matcher: Option<Arc<dyn CommandTypeMatcher>>,
}

impl CommandBus {
    pub fn executing_with(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            matcher: None,
        }
    }

    /// 在入口处校验命令类型
    pub fn matching(mut self, matcher: Arc<dyn CommandTypeMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// 用过滤器（通常是 `compose` 的结果）包装当前执行器
    pub fn filtered(mut self, filter: Filter<Arc<dyn CommandExecutor>>) -> Self {
        self.executor = filter.apply(self.executor);
        self
    }

    /// 分发命令；须在 tokio 运行时中调用
    pub fn dispatch(&self, command: Command) -> AppResult<PendingCommand> {
        self.check(&command)?;

        let command_type = command.command_type();
        let token = CancellationToken::new();
        let executor = self.executor.clone();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            if task_token.is_cancelled() {
                return Err(AppError::Cancelled {
                    command: command.command_type().to_string(),
                });
            }
            let result = executor.execute(&command).await;
            if task_token.is_cancelled() {
                debug!(
                    command = %command.command_type(),
                    "result of cancelled command discarded"
                );
            }
            result
        });

        Ok(PendingCommand {
            command_type,
            token,
            handle,
        })
    }

    /// 分发并等待结果
    pub async fn execute(&self, command: Command) -> AppResult<CommandResult> {
        self.dispatch(command)?.await
    }

    fn check(&self, command: &Command) -> AppResult<()> {
        let Some(matcher) = &self.matcher else {
            return Ok(());
        };

        let command_type = command.command_type();
        let Some(schema) = matcher.match_command_type(&command_type) else {
            return Err(DomainError::unrecognized_command(command_type).into());
        };
        if !command.parameters().conforms_to(&schema) {
            return Err(DomainError::schema_violation(
                schema.name(),
                format!("parameters built with schema {}", command.parameters().schema()),
            )
            .into());
        }
        Ok(())
    }
}

/// 已分发、尚未取得结果的命令
pub struct PendingCommand {
    command_type: CommandType,
    token: CancellationToken,
    handle: JoinHandle<AppResult<CommandResult>>,
}

impl PendingCommand {
    pub fn command_type(&self) -> &CommandType {
        &self.command_type
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 取消令牌，可交给其他任务以便从外部取消
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn wait(self) -> AppResult<CommandResult> {
        let PendingCommand {
            command_type,
            token,
            handle,
        } = self;
        let cancelled = || AppError::Cancelled {
            command: command_type.to_string(),
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(cancelled()),
            joined = handle => match joined {
                Ok(_) if token.is_cancelled() => Err(cancelled()),
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(AppError::ExecutionFailure {
                    command: command_type.to_string(),
                    reason: "command task panicked".to_string(),
                }),
                Err(e) => Err(AppError::Infra(format!("command task failed: {e}"))),
            },
        }
    }
}

impl IntoFuture for PendingCommand {
    type Output = AppResult<CommandResult>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
