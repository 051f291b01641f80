/// 用户生命周期示例（内存版）
/// 展示 注册表 -> 批次 -> 事件日志/存储 -> 发布 -> 目录与状态缓存 的闭环，以及重复投递的窗口去重
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::Utc;
use cqrs_domain::catalogue::{AggregateCatalogue, CatalogueUpdater, InMemoryAggregateCatalogue};
use cqrs_domain::domain_event::Event;
use cqrs_domain::error::{DomainError, DomainResult};
use cqrs_domain::eventing::{
    EventBusExt, EventEmitter, EventHandler, HandledEventType, IdempotencyConfig,
    IdempotencyWindow, InMemoryEventPublisher, LoggingEventBus, LoggingEventLog, Subscribable,
    idempotent_filter,
};
use cqrs_domain::identity::{AggregateId, EventType, VersionedName};
use cqrs_domain::persist::InMemoryEventStore;
use cqrs_domain::registry::{EventDefinition, TypeRegistry};
use cqrs_domain::state::{Accumulator, CachingStateRepository};
use cqrs_domain::timestamp::StreamTimestamp;
use cqrs_domain::tuple::{TupleSlot, TupleValue, ValueType};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// 类型注册
// ============================================================================

fn registry() -> DomainResult<TypeRegistry> {
    let name = || [TupleSlot::of("name", ValueType::Text)];
    Ok(TypeRegistry::builder()
        .event(
            EventDefinition::of("user", VersionedName::unversioned("created"), name())?.initial(),
        )?
        .event(
            EventDefinition::of("user", VersionedName::of("renamed", "2"), name())?.ordered(1),
        )?
        .event(
            EventDefinition::of("user", VersionedName::unversioned("deleted"), [])?.terminal(),
        )?
        .build())
}

// ============================================================================
// 状态
// ============================================================================

#[derive(Debug, Clone)]
struct User {
    name: String,
    active: bool,
}

fn user_state(registry: &TypeRegistry) -> DomainResult<Accumulator<User>> {
    let key = |name: VersionedName| {
        registry
            .event_definition(&EventType::of("user", name.clone()))
            .ok_or_else(|| DomainError::unrecognized_event(name.formatted()))?
            .schema()
            .get_key::<String>("name")
    };
    let created = key(VersionedName::unversioned("created"))?;
    let renamed = key(VersionedName::of("renamed", "2"))?;

    Ok(Accumulator::new(
        move |event: &Event| {
            Ok(User {
                name: event.parameters().get(&created)?,
                active: true,
            })
        },
        move |event: &Event, user: &mut User| {
            match event.event_name().name() {
                "renamed" => user.name = event.parameters().get(&renamed)?,
                "deleted" => user.active = false,
                _ => {}
            }
            Ok(())
        },
    ))
}

// ============================================================================
// 订阅者
// ============================================================================

struct PrintingHandler;

#[async_trait]
impl EventHandler for PrintingHandler {
    fn handler_name(&self) -> &str {
        "printer"
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::All
    }

    async fn handle(&self, event: &Event) -> AnyResult<()> {
        println!("  published: {event}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let registry = Arc::new(registry()?);
    let store = Arc::new(InMemoryEventStore::new());
    let catalogue = Arc::new(InMemoryAggregateCatalogue::new());
    let users = Arc::new(CachingStateRepository::new(
        "user",
        store.clone(),
        registry.clone(),
        user_state(&registry)?,
    ));

    let publisher = Arc::new(InMemoryEventPublisher::new());
    publisher.subscribe(Arc::new(PrintingHandler));
    publisher.subscribe(Arc::new(CatalogueUpdater::new(catalogue.clone())));
    publisher.subscribe(users.clone());

    let window = Arc::new(IdempotencyWindow::new(IdempotencyConfig::default()));
    let shutdown = CancellationToken::new();
    let sweeper = window.spawn_sweeper(shutdown.clone());

    let log =
        idempotent_filter(window).apply(Arc::new(LoggingEventLog::logging_to(store.clone())));
    let bus = LoggingEventBus::builder()
        .event_log(log)
        .publisher(publisher)
        .build();

    let id = AggregateId::of("user", Uuid::new_v4());
    let created_at = StreamTimestamp::of("users", Utc::now());

    let emit = |ts: StreamTimestamp,
                name: VersionedName,
                parameters: Vec<(&'static str, TupleValue)>| {
        let registry = registry.clone();
        let id = id.clone();
        let bus = &bus;
        async move {
            bus.dispatch(move |batch| {
                EventEmitter::new(&registry, batch).emit(id, ts, name, parameters)
            })
            .await
        }
    };

    println!("== create + rename");
    emit(
        created_at.clone(),
        VersionedName::unversioned("created"),
        vec![("name", "Alice".into())],
    )
    .await?;
    emit(
        StreamTimestamp::now("users"),
        VersionedName::of("renamed", "2"),
        vec![("name", "Alicia".into())],
    )
    .await?;
    println!("catalogue: {:?}", catalogue.get_ids("user"));
    println!("state: {:?}", users.get_state(&id).await?);

    println!("== redelivered create (dropped by the idempotency window)");
    let again = emit(
        created_at,
        VersionedName::unversioned("created"),
        vec![("name", "Alice".into())],
    )
    .await?;
    println!(
        "recorded: {}, stored records: {}",
        again.len(),
        store.records().len()
    );

    println!("== delete");
    emit(
        StreamTimestamp::now("users"),
        VersionedName::unversioned("deleted"),
        vec![],
    )
    .await?;
    println!("catalogue: {:?}", catalogue.get_ids("user"));

    users.invalidate(&id);
    println!("rebuilt from store: {:?}", users.get_state(&id).await?);

    shutdown.cancel();
    sweeper.await?;
    Ok(())
}
