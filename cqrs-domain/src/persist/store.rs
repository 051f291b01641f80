//! 存储协议（EventPersister / EventRetriever）
//!
use crate::{
    domain_event::Event, error::DomainResult as Result, identity::AggregateId,
    registry::EventTypeMatcher,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// 时间范围 `[from, to)`，两端均可开放
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn starting_at(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn ending_before(to: DateTime<Utc>) -> Self {
        Self {
            from: None,
            to: Some(to),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at < to)
    }
}

/// 持久化一批已带处理 ID 的事件；失败必须返回给调用方
#[async_trait]
pub trait EventPersister: Send + Sync {
    async fn accept(&self, events: &[Event]) -> Result<()>;
}

/// 读取历史：跳过匹配方不认识的事件，参数不满足结构时报错
#[async_trait]
pub trait EventRetriever: Send + Sync {
    async fn get_events(
        &self,
        matcher: &dyn EventTypeMatcher,
        aggregate_id: &AggregateId,
        range: TimeRange,
    ) -> Result<Vec<Event>>;

    async fn get_events_for(
        &self,
        matcher: &dyn EventTypeMatcher,
        aggregate_type: &str,
        ids: &[Uuid],
        range: TimeRange,
    ) -> Result<HashMap<Uuid, Vec<Event>>> {
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            let aggregate_id = AggregateId::of(aggregate_type, *id);
            let events = self.get_events(matcher, &aggregate_id, range).await?;
            out.insert(*id, events);
        }
        Ok(out)
    }
}
