//! 持久化协议（persist）
//!
//! - `StoredEvent`：与格式无关的逻辑记录；
//! - `EventPersister` / `EventRetriever`：写入与按聚合、时间范围读取历史；
//! - `InMemoryEventStore`：同时实现两者的内存参考实现。
//!
//! 具体存储后端（数据库、消息系统等）由上层实现并注入。
//!
mod in_memory;
mod store;
mod stored_event;

pub use in_memory::InMemoryEventStore;
pub use store::{EventPersister, EventRetriever, TimeRange};
pub use stored_event::StoredEvent;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::Event;
    use crate::error::DomainError;
    use crate::identity::{AggregateId, EventType, VersionedName};
    use crate::registry::{EventDefinition, EventTypeMatcher, TypeRegistry};
    use crate::timestamp::StreamTimestamp;
    use crate::tuple::{TupleSchema, TupleSlot, TupleValue, ValueType};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    fn registry() -> TypeRegistry {
        TypeRegistry::builder()
            .event(
                EventDefinition::of(
                    "user",
                    VersionedName::unversioned("created"),
                    [
                        TupleSlot::of("name", ValueType::Text),
                        TupleSlot::of("age", ValueType::optional(ValueType::Integer)),
                    ],
                )
                .unwrap()
                .initial(),
            )
            .unwrap()
            .build()
    }

    fn created(registry: &TypeRegistry, id: &AggregateId, seconds: i64) -> Event {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        registry
            .event(
                id.clone(),
                StreamTimestamp::of("s", t0 + Duration::seconds(seconds)),
                VersionedName::unversioned("created"),
                [
                    ("name", TupleValue::from("Ann")),
                    ("age", TupleValue::from(None::<i64>)),
                ],
            )
            .unwrap()
            .processed(Uuid::new_v4())
            .unwrap()
    }

    #[tokio::test]
    async fn records_round_trip_through_the_store() {
        let registry = registry();
        let store = InMemoryEventStore::new();
        let id = AggregateId::of("user", Uuid::new_v4());
        let event = created(&registry, &id, 0);

        store.accept(std::slice::from_ref(&event)).await.unwrap();
        let back = store
            .get_events(&registry, &id, TimeRange::all())
            .await
            .unwrap();
        assert_eq!(back, vec![event]);
        // 特征由注册表补齐
        assert!(back[0].is_initial());
    }

    #[test]
    fn record_serializes_as_logical_shape() {
        let registry = registry();
        let id = AggregateId::of("user", Uuid::nil());
        let record = StoredEvent::from(&created(&registry, &id, 0));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["aggregate_type"], json!("user"));
        assert_eq!(value["event_name"], json!("created"));
        assert_eq!(value["event_version"], json!("0"));
        assert_eq!(value["parameters"], json!({"age": null, "name": "Ann"}));

        let parsed = StoredEvent::try_from(value).unwrap();
        assert_eq!(parsed, record);
    }

    #[tokio::test]
    async fn unknown_versions_are_skipped_and_bad_payloads_fail() {
        let registry = registry();
        let store = InMemoryEventStore::new();
        let id = AggregateId::of("user", Uuid::new_v4());
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = |version: &str, parameters: serde_json::Value| {
            StoredEvent::builder()
                .aggregate_type("user".to_string())
                .aggregate_id(id.id())
                .event_timestamp(at)
                .stream_id("s".to_string())
                .event_name("created".to_string())
                .event_version(version.to_string())
                .parameters(parameters.as_object().cloned().unwrap())
                .build()
        };

        store.insert_records([record("7", json!({"anything": 1}))]);
        let events = store
            .get_events(&registry, &id, TimeRange::all())
            .await
            .unwrap();
        assert!(events.is_empty());

        store.insert_records([record("0", json!({"name": 42}))]);
        let err = store
            .get_events(&registry, &id, TimeRange::all())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::SchemaViolation { .. }));
    }

    #[tokio::test]
    async fn time_range_is_half_open_and_multi_aggregate_reads_group_by_id() {
        let registry = registry();
        let store = InMemoryEventStore::new();
        let a = AggregateId::of("user", Uuid::new_v4());
        let b = AggregateId::of("user", Uuid::new_v4());
        store
            .accept(&[
                created(&registry, &a, 0),
                created(&registry, &a, 10),
                created(&registry, &b, 5),
            ])
            .await
            .unwrap();

        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let range = TimeRange::between(t0, t0 + Duration::seconds(10));
        let first = store.get_events(&registry, &a, range).await.unwrap();
        assert_eq!(first.len(), 1);

        let grouped = store
            .get_events_for(&registry, "user", &[a.id(), b.id()], TimeRange::all())
            .await
            .unwrap();
        assert_eq!(grouped[&a.id()].len(), 2);
        assert_eq!(grouped[&b.id()].len(), 1);
    }

    #[test]
    fn unmatched_matcher_defaults_to_no_characteristics() {
        struct Nothing;
        impl EventTypeMatcher for Nothing {
            fn match_event_type(&self, _: &EventType) -> Option<Arc<TupleSchema>> {
                None
            }
        }
        let ty = EventType::of("user", VersionedName::unversioned("created"));
        assert!(!Nothing.characteristics_of(&ty).is_initial());
    }
}
