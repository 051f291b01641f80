//! 命令执行器（CommandExecutor）
//!
//! `DispatchingCommandExecutor` 按 `CommandType` 把命令路由到已注册的处理器：
//! 每次执行都从事件总线开启一个新批次，处理器经 `EventEmitter` 写入事件；
//! 处理成功时完成批次（记录 + 发布），失败时直接丢弃批次，不留下任何事件。
//!
//! 处理器返回的错误被捕获为 `CommandResult::Failure`；
//! 路由、校验或批次完成失败则以 `Err(AppError)` 返回。
//!
use crate::{
    command_result::CommandResult,
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use cqrs_domain::{
    command::Command,
    error::DomainError,
    eventing::{EventBus, EventEmitter},
    filter::Filter,
    identity::CommandType,
    registry::TypeRegistry,
};
use dashmap::{DashMap, mapref::entry::Entry};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &Command) -> AppResult<CommandResult>;
}

/// 业务逻辑：读取命令参数，经发射器写入事件，可选地返回一个值
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        command: &Command,
        events: &mut EventEmitter<'_>,
    ) -> anyhow::Result<Option<Value>>;
}

pub struct DispatchingCommandExecutor {
    registry: Arc<TypeRegistry>,
    event_bus: Arc<dyn EventBus>,
    handlers: DashMap<CommandType, Arc<dyn CommandHandler>>,
}

impl DispatchingCommandExecutor {
    pub fn new(registry: Arc<TypeRegistry>, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            registry,
            event_bus,
            handlers: DashMap::new(),
        }
    }

    /// 注册命令处理器；命令类型须已在注册表中声明，且每个类型只能注册一次
    pub fn register(
        &self,
        command_type: CommandType,
        handler: Arc<dyn CommandHandler>,
    ) -> AppResult<()> {
        if self.registry.command_definition(&command_type).is_none() {
            return Err(DomainError::unrecognized_command(command_type).into());
        }

        match self.handlers.entry(command_type) {
            Entry::Occupied(entry) => Err(AppError::AlreadyRegisteredCommand {
                command: entry.key().to_string(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(handler);
                Ok(())
            }
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[async_trait]
impl CommandExecutor for DispatchingCommandExecutor {
    async fn execute(&self, command: &Command) -> AppResult<CommandResult> {
        self.registry.validate_command(command)?;

        let command_type = command.command_type();
        let Some(handler) = self.handlers.get(&command_type).map(|h| h.clone()) else {
            return Err(AppError::HandlerNotFound(command_type.to_string()));
        };

        let mut batch = self.event_bus.start_batch();
        let outcome = {
            let mut events = EventEmitter::new(&self.registry, batch.as_mut());
            handler.handle(command, &mut events).await
        };

        match outcome {
            Ok(value) => {
                let recorded = batch.complete().await?;
                debug!(
                    command = %command_type,
                    aggregate_id = %command.aggregate_id(),
                    events = recorded.len(),
                    "command executed"
                );
                Ok(CommandResult::Success(value))
            }
            Err(error) => {
                warn!(
                    command = %command_type,
                    aggregate_id = %command.aggregate_id(),
                    discarded = batch.len(),
                    error = %error,
                    "command handler failed"
                );
                Ok(CommandResult::failure(error))
            }
        }
    }
}

/// 前置过滤：执行前检查命令，返回 `Err` 时不再委托
pub fn pre_execute<F>(f: F) -> Filter<Arc<dyn CommandExecutor>>
where
    F: Fn(&Command) -> AppResult<()> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Filter::new(move |inner: Arc<dyn CommandExecutor>| {
        Arc::new(HookedExecutor {
            inner,
            before: Some(f.clone() as Arc<BeforeExecute>),
            after: None,
        }) as Arc<dyn CommandExecutor>
    })
}

/// 后置过滤：观察执行结果（包括 `Err`），不改变结果
pub fn post_execute<F>(f: F) -> Filter<Arc<dyn CommandExecutor>>
where
    F: Fn(&Command, &AppResult<CommandResult>) + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Filter::new(move |inner: Arc<dyn CommandExecutor>| {
        Arc::new(HookedExecutor {
            inner,
            before: None,
            after: Some(f.clone() as Arc<AfterExecute>),
        }) as Arc<dyn CommandExecutor>
    })
}

type BeforeExecute = dyn Fn(&Command) -> AppResult<()> + Send + Sync;
type AfterExecute = dyn Fn(&Command, &AppResult<CommandResult>) + Send + Sync;

struct HookedExecutor {
    inner: Arc<dyn CommandExecutor>,
    before: Option<Arc<BeforeExecute>>,
    after: Option<Arc<AfterExecute>>,
}

#[async_trait]
impl CommandExecutor for HookedExecutor {
    async fn execute(&self, command: &Command) -> AppResult<CommandResult> {
        if let Some(before) = &self.before {
            before(command)?;
        }
        let result = self.inner.execute(command).await;
        if let Some(after) = &self.after {
            after(command, &result);
        }
        result
    }
}
