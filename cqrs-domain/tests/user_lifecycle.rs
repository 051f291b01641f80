use chrono::{Duration, TimeZone, Utc};
use cqrs_domain::catalogue::{AggregateCatalogue, CatalogueUpdater, InMemoryAggregateCatalogue};
use cqrs_domain::domain_event::Event;
use cqrs_domain::error::{DomainError, DomainResult};
use cqrs_domain::eventing::{
    EventBus, EventBusExt, EventEmitter, IdempotencyConfig, IdempotencyWindow,
    InMemoryEventPublisher, LoggingEventBus, LoggingEventLog, Subscribable, idempotent_filter,
};
use cqrs_domain::identity::{AggregateId, EventType, VersionedName};
use cqrs_domain::persist::InMemoryEventStore;
use cqrs_domain::registry::{EventDefinition, TypeRegistry};
use cqrs_domain::state::{Accumulator, CachingStateRepository};
use cqrs_domain::timestamp::StreamTimestamp;
use cqrs_domain::tuple::{TupleSlot, TupleValue, ValueType};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
struct User {
    name: String,
    renames: usize,
    deleted: bool,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn registry() -> DomainResult<TypeRegistry> {
    let name = || [TupleSlot::of("name", ValueType::Text)];
    Ok(TypeRegistry::builder()
        .event(
            EventDefinition::of("user", VersionedName::unversioned("created"), name())?.initial(),
        )?
        .event(
            EventDefinition::of("user", VersionedName::unversioned("nameChanged"), name())?
                .ordered(1),
        )?
        .event(
            EventDefinition::of("user", VersionedName::unversioned("deleted"), [])?.terminal(),
        )?
        .build())
}

fn user_accumulator(registry: &TypeRegistry) -> DomainResult<Accumulator<User>> {
    let schema_of = |name: &str| {
        registry
            .event_definition(&EventType::of("user", VersionedName::unversioned(name)))
            .map(|def| def.schema().clone())
    };
    let created_name = schema_of("created")
        .ok_or_else(|| DomainError::unrecognized_event("user/created"))?
        .get_key::<String>("name")?;
    let changed_name = schema_of("nameChanged")
        .ok_or_else(|| DomainError::unrecognized_event("user/nameChanged"))?
        .get_key::<String>("name")?;

    Ok(Accumulator::new(
        move |event: &Event| {
            Ok(User {
                name: event.parameters().get(&created_name)?,
                renames: 0,
                deleted: false,
            })
        },
        move |event: &Event, user: &mut User| {
            match event.event_name().name() {
                "nameChanged" => {
                    user.name = event.parameters().get(&changed_name)?;
                    user.renames += 1;
                }
                "deleted" => user.deleted = true,
                _ => {}
            }
            Ok(())
        },
    ))
}

struct Fixture {
    registry: Arc<TypeRegistry>,
    store: Arc<InMemoryEventStore>,
    catalogue: Arc<InMemoryAggregateCatalogue>,
    users: Arc<CachingStateRepository<User>>,
    bus: LoggingEventBus,
}

fn fixture() -> Fixture {
    init_tracing();
    let registry = Arc::new(registry().unwrap());
    let store = Arc::new(InMemoryEventStore::new());
    let catalogue = Arc::new(InMemoryAggregateCatalogue::new());
    let users = Arc::new(CachingStateRepository::new(
        "user",
        store.clone(),
        registry.clone(),
        user_accumulator(&registry).unwrap(),
    ));

    let publisher = Arc::new(InMemoryEventPublisher::new());
    publisher.subscribe(Arc::new(CatalogueUpdater::new(catalogue.clone())));
    publisher.subscribe(users.clone());

    let window = Arc::new(IdempotencyWindow::new(IdempotencyConfig::default()));
    let log =
        idempotent_filter(window).apply(Arc::new(LoggingEventLog::logging_to(store.clone())));
    let bus = LoggingEventBus::builder()
        .event_log(log)
        .publisher(publisher)
        .build();

    Fixture {
        registry,
        store,
        catalogue,
        users,
        bus,
    }
}

fn at(seconds: i64) -> StreamTimestamp {
    let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    StreamTimestamp::of("users", t0 + Duration::seconds(seconds))
}

async fn emit(
    fx: &Fixture,
    id: &AggregateId,
    seconds: i64,
    name: &str,
    parameters: Vec<(&'static str, TupleValue)>,
) -> DomainResult<Vec<Event>> {
    let registry = fx.registry.clone();
    let id = id.clone();
    let name = VersionedName::unversioned(name);
    fx.bus
        .dispatch(move |batch| {
            EventEmitter::new(&registry, batch).emit(id, at(seconds), name, parameters)
        })
        .await
}

#[tokio::test]
async fn created_renamed_deleted() {
    let fx = fixture();
    let user = AggregateId::of("user", Uuid::from_u128(123));

    emit(&fx, &user, 0, "created", vec![("name", "Ann".into())])
        .await
        .unwrap();
    assert!(fx.catalogue.get_ids("user").contains(&user.id()));
    let state = fx.users.get_state(&user).await.unwrap().unwrap();
    assert_eq!(state.name, "Ann");

    emit(&fx, &user, 1, "nameChanged", vec![("name", "Bea".into())])
        .await
        .unwrap();
    let state = fx.users.get_state(&user).await.unwrap().unwrap();
    assert_eq!(state.name, "Bea");

    emit(&fx, &user, 2, "deleted", vec![]).await.unwrap();
    assert!(!fx.catalogue.get_ids("user").contains(&user.id()));

    let expected = User {
        name: "Bea".to_string(),
        renames: 1,
        deleted: true,
    };
    assert_eq!(fx.users.get_state(&user).await.unwrap().unwrap(), expected);

    // 丢弃缓存后从存储完整重建，结果一致
    fx.users.invalidate(&user);
    assert_eq!(fx.users.get_state(&user).await.unwrap().unwrap(), expected);
    assert_eq!(fx.store.records().len(), 3);
}

#[tokio::test]
async fn redelivered_events_are_not_persisted_twice() {
    let fx = fixture();
    let user = AggregateId::of("user", Uuid::from_u128(123));

    emit(&fx, &user, 0, "created", vec![("name", "Ann".into())])
        .await
        .unwrap();
    let again = emit(&fx, &user, 0, "created", vec![("name", "Ann".into())])
        .await
        .unwrap();

    assert!(again.is_empty());
    assert_eq!(fx.store.records().len(), 1);
}

#[tokio::test]
async fn out_of_order_history_replays_causally() {
    let fx = fixture();
    let user = AggregateId::of("user", Uuid::new_v4());

    // 时间戳与因果顺序不一致的一批事件
    let mut batch = fx.bus.start_batch();
    {
        let mut emitter = EventEmitter::new(&fx.registry, batch.as_mut());
        let mut emit = |seconds: i64, name: &str, parameters: Vec<(&str, TupleValue)>| {
            emitter
                .emit(user.clone(), at(seconds), VersionedName::unversioned(name), parameters)
                .unwrap()
        };
        emit(5, "deleted", vec![]);
        emit(3, "nameChanged", vec![("name", "Cy".into())]);
        emit(4, "created", vec![("name", "Ann".into())]);
    }
    batch.complete().await.unwrap();

    fx.users.invalidate(&user);
    let state = fx.users.get_state(&user).await.unwrap().unwrap();
    assert_eq!(
        state,
        User {
            name: "Cy".to_string(),
            renames: 1,
            deleted: true,
        }
    );
}
