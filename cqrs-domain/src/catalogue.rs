//! 聚合目录（Aggregate Catalogue）
//!
//! 按聚合类型维护当前存活的聚合 ID 集合：消费 INITIAL 事件时加入，
//! 消费 TERMINAL 事件时移除。每个类型的集合在首次加入时惰性创建，
//! 在移除后变空时删除，二者都在同一条目锁内完成。
//!
use crate::{
    domain_event::Event,
    eventing::{EventHandler, HandledEventType},
};
use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

pub trait AggregateCatalogue: Send + Sync {
    fn add(&self, aggregate_type: &str, id: Uuid);

    fn remove(&self, aggregate_type: &str, id: Uuid);

    /// 当前成员的快照，而非实时视图
    fn get_ids(&self, aggregate_type: &str) -> HashSet<Uuid>;

    /// 按事件特征更新目录
    fn consume(&self, event: &Event) {
        let aggregate_id = event.aggregate_id();
        if event.is_initial() {
            self.add(aggregate_id.aggregate_type(), aggregate_id.id());
        }
        if event.is_terminal() {
            self.remove(aggregate_id.aggregate_type(), aggregate_id.id());
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAggregateCatalogue {
    ids: DashMap<String, HashSet<Uuid>>,
}

impl InMemoryAggregateCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregate_types(&self) -> Vec<String> {
        self.ids.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl AggregateCatalogue for InMemoryAggregateCatalogue {
    fn add(&self, aggregate_type: &str, id: Uuid) {
        self.ids
            .entry(aggregate_type.to_string())
            .or_default()
            .insert(id);
    }

    fn remove(&self, aggregate_type: &str, id: Uuid) {
        if let Entry::Occupied(mut entry) = self.ids.entry(aggregate_type.to_string()) {
            entry.get_mut().remove(&id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }

    fn get_ids(&self, aggregate_type: &str) -> HashSet<Uuid> {
        self.ids
            .get(aggregate_type)
            .map(|ids| ids.value().clone())
            .unwrap_or_default()
    }
}

/// 以事件处理器形式订阅发布器，持续维护目录
pub struct CatalogueUpdater {
    catalogue: Arc<dyn AggregateCatalogue>,
}

impl CatalogueUpdater {
    pub fn new(catalogue: Arc<dyn AggregateCatalogue>) -> Self {
        Self { catalogue }
    }
}

#[async_trait]
impl EventHandler for CatalogueUpdater {
    fn handler_name(&self) -> &str {
        "aggregate-catalogue"
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::All
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        self.catalogue.consume(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::EventCharacteristics;
    use crate::identity::{AggregateId, VersionedName};
    use crate::timestamp::StreamTimestamp;
    use crate::tuple::TupleSchema;

    fn event(id: Uuid, characteristics: EventCharacteristics) -> Event {
        let schema = Arc::new(TupleSchema::of("e", []).unwrap());
        Event::builder()
            .aggregate_id(AggregateId::of("order", id))
            .event_timestamp(StreamTimestamp::now("cat"))
            .event_name(VersionedName::unversioned("e"))
            .parameters(schema.make_with(vec![]).unwrap())
            .characteristics(characteristics)
            .build()
    }

    #[test]
    fn add_then_remove() {
        let catalogue = InMemoryAggregateCatalogue::new();
        let id = Uuid::new_v4();

        catalogue.add("order", id);
        assert!(catalogue.get_ids("order").contains(&id));

        catalogue.remove("order", id);
        assert!(catalogue.get_ids("order").is_empty());
        // 变空的集合被移除
        assert!(catalogue.aggregate_types().is_empty());
    }

    #[test]
    fn removing_unknown_ids_is_harmless() {
        let catalogue = InMemoryAggregateCatalogue::new();
        catalogue.remove("order", Uuid::new_v4());
        let id = Uuid::new_v4();
        catalogue.add("order", id);
        catalogue.remove("order", Uuid::new_v4());
        assert_eq!(catalogue.get_ids("order"), HashSet::from([id]));
    }

    #[test]
    fn get_ids_is_a_snapshot() {
        let catalogue = InMemoryAggregateCatalogue::new();
        let id = Uuid::new_v4();
        catalogue.add("order", id);
        let snapshot = catalogue.get_ids("order");
        catalogue.remove("order", id);
        assert!(snapshot.contains(&id));
    }

    #[test]
    fn consumes_initial_and_terminal_events() {
        let catalogue = InMemoryAggregateCatalogue::new();
        let id = Uuid::new_v4();

        catalogue.consume(&event(id, EventCharacteristics::INITIAL));
        catalogue.consume(&event(id, EventCharacteristics::NONE));
        assert!(catalogue.get_ids("order").contains(&id));

        catalogue.consume(&event(id, EventCharacteristics::TERMINAL));
        assert!(!catalogue.get_ids("order").contains(&id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn updater_handles_concurrent_events() {
        let catalogue = Arc::new(InMemoryAggregateCatalogue::new());
        let updater = Arc::new(CatalogueUpdater::new(catalogue.clone()));
        let ids: Vec<Uuid> = (0..200).map(|_| Uuid::new_v4()).collect();

        let tasks: Vec<_> = ids
            .iter()
            .map(|id| {
                let updater = updater.clone();
                let event = event(*id, EventCharacteristics::INITIAL);
                tokio::spawn(async move { updater.handle(&event).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(catalogue.get_ids("order").len(), ids.len());
    }
}
