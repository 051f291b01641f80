//! 内存版事件存储（InMemoryEventStore）
//!
//! 以 `StoredEvent` 形态保存记录，同时实现 `EventPersister` 与
//! `EventRetriever`。典型用途：测试、示例与本地开发。
//!
use super::{EventPersister, EventRetriever, StoredEvent, TimeRange};
use crate::{
    domain_event::Event, error::DomainResult as Result, identity::AggregateId,
    registry::EventTypeMatcher,
};
use async_trait::async_trait;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    records: RwLock<Vec<StoredEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按写入顺序返回全部记录的快照
    pub fn records(&self) -> Vec<StoredEvent> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 直接写入原始记录（如来自其他进程或旧版本的数据）
    pub fn insert_records(&self, records: impl IntoIterator<Item = StoredEvent>) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(records);
    }
}

#[async_trait]
impl EventPersister for InMemoryEventStore {
    async fn accept(&self, events: &[Event]) -> Result<()> {
        let records: Vec<StoredEvent> = events.iter().map(StoredEvent::from).collect();
        self.insert_records(records);
        Ok(())
    }
}

#[async_trait]
impl EventRetriever for InMemoryEventStore {
    async fn get_events(
        &self,
        matcher: &dyn EventTypeMatcher,
        aggregate_id: &AggregateId,
        range: TimeRange,
    ) -> Result<Vec<Event>> {
        let records = self.records();
        let mut events = Vec::new();
        for record in records.iter().filter(|r| {
            r.aggregate_type() == aggregate_id.aggregate_type()
                && r.aggregate_id() == aggregate_id.id()
                && range.contains(r.event_timestamp())
        }) {
            if let Some(event) = record.to_event(matcher)? {
                events.push(event);
            }
        }
        Ok(events)
    }
}
