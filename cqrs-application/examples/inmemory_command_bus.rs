/// 内存命令总线示例
/// 展示 注册表 -> CommandBus（入口校验 + 日志过滤器） -> 执行器 -> 处理器 -> 事件批次 的闭环，
/// 以及业务失败、未注册命令与取消的表现
use async_trait::async_trait;
use cqrs_application::error::AppError;
use cqrs_application::{
    CommandBus, CommandExecutor, CommandHandler, DispatchingCommandExecutor, TracingCommandLog,
    command_log_filter,
};
use cqrs_domain::command::Command;
use cqrs_domain::eventing::{EventEmitter, LoggingEventBus, LoggingEventLog};
use cqrs_domain::identity::{AggregateId, CommandType, VersionedName};
use cqrs_domain::persist::InMemoryEventStore;
use cqrs_domain::registry::{CommandDefinition, EventDefinition, TypeRegistry};
use cqrs_domain::timestamp::StreamTimestamp;
use cqrs_domain::tuple::{TupleSlot, ValueType};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct CreateUserHandler;

#[async_trait]
impl CommandHandler for CreateUserHandler {
    async fn handle(
        &self,
        cmd: &Command,
        events: &mut EventEmitter<'_>,
    ) -> anyhow::Result<Option<Value>> {
        let key = cmd.parameters().schema().get_key::<String>("name")?;
        let name = cmd.parameters().get(&key)?;
        anyhow::ensure!(!name.trim().is_empty(), "name must not be blank");

        println!("CreateUser: name={name}");
        events.emit_for(cmd, VersionedName::unversioned("created"), [("name", name)])?;
        Ok(Some(json!({ "id": cmd.aggregate_id().id() })))
    }
}

struct SlowDeleteHandler;

#[async_trait]
impl CommandHandler for SlowDeleteHandler {
    async fn handle(
        &self,
        cmd: &Command,
        events: &mut EventEmitter<'_>,
    ) -> anyhow::Result<Option<Value>> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        println!("DeleteUser: id={}", cmd.aggregate_id().id());
        events.emit_for(
            cmd,
            VersionedName::unversioned("deleted"),
            Vec::<(&str, &str)>::new(),
        )?;
        Ok(None)
    }
}

fn registry() -> Result<TypeRegistry, Box<dyn std::error::Error>> {
    let name = || [TupleSlot::of("name", ValueType::Text)];
    let v = VersionedName::unversioned;
    Ok(TypeRegistry::builder()
        .event(EventDefinition::of("user", v("created"), name())?.initial())?
        .event(EventDefinition::of("user", v("deleted"), [])?.terminal())?
        .command(CommandDefinition::of("user", v("create"), name())?)?
        .command(CommandDefinition::of("user", v("delete"), [])?)?
        .build())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let registry = Arc::new(registry()?);
    let store = Arc::new(InMemoryEventStore::new());
    let event_bus = LoggingEventBus::builder()
        .event_log(Arc::new(LoggingEventLog::logging_to(store.clone())))
        .build();

    let executor = DispatchingCommandExecutor::new(registry.clone(), Arc::new(event_bus));
    executor.register(
        CommandType::of("user", VersionedName::unversioned("create")),
        Arc::new(CreateUserHandler),
    )?;
    executor.register(
        CommandType::of("user", VersionedName::unversioned("delete")),
        Arc::new(SlowDeleteHandler),
    )?;

    let bus = CommandBus::executing_with(Arc::new(executor) as Arc<dyn CommandExecutor>)
        .matching(registry.clone())
        .filtered(command_log_filter(Arc::new(TracingCommandLog)));

    let user = AggregateId::of("user", Uuid::new_v4());
    let command = |name: &str, params: Vec<(&str, &str)>| {
        registry.command(
            user.clone(),
            StreamTimestamp::now("users"),
            VersionedName::unversioned(name),
            params,
        )
    };

    let created = bus.execute(command("create", vec![("name", "Alice")])?).await?;
    println!("created -> {created}");

    // 业务失败 -> CommandResult::Failure，批次被丢弃
    let blank = bus.execute(command("create", vec![("name", "  ")])?).await?;
    println!("blank name -> {blank}");

    // 未注册的命令 -> 在构建或入口处返回 UnrecognizedType
    if let Err(err) = command("rename", vec![("name", "Eve")]) {
        eprintln!("rejected as expected: {err}");
    }

    // 取消：等待方立即得到 Cancelled，已开始的删除仍会完成
    let pending = bus.dispatch(command("delete", vec![])?)?;
    tokio::time::sleep(Duration::from_millis(20)).await;
    pending.cancel();
    if let Err(AppError::Cancelled { command }) = pending.await {
        eprintln!("cancelled: {command}");
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    println!("stored events: {}", store.records().len());
    Ok(())
}
