//! 事件持久化模型（StoredEvent）
//!
//! 与格式无关的逻辑记录：`{aggregate_type, aggregate_id, event_timestamp,
//! stream_id, processing_id, event_name, event_version, parameters}`，
//! 编解码与存储后端只需在该形态与自身格式之间转换。
//!
use crate::{
    domain_event::Event,
    error::{DomainError, DomainResult},
    identity::{AggregateId, EventType, VersionedName},
    registry::EventTypeMatcher,
    timestamp::StreamTimestamp,
};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct StoredEvent {
    /// 聚合类型
    aggregate_type: String,
    /// 聚合 ID
    aggregate_id: Uuid,
    /// 事件业务时间
    event_timestamp: DateTime<Utc>,
    /// 事件所属流
    stream_id: String,
    /// 记录时分配的处理 ID
    processing_id: Option<Uuid>,
    event_name: String,
    event_version: String,
    /// 参数表 `{name: value}`
    #[builder(default)]
    parameters: Map<String, Value>,
}

impl StoredEvent {
    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.aggregate_id
    }

    pub fn event_timestamp(&self) -> DateTime<Utc> {
        self.event_timestamp
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn processing_id(&self) -> Option<Uuid> {
        self.processing_id
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn event_version(&self) -> &str {
        &self.event_version
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn event_type(&self) -> EventType {
        EventType::of(
            self.aggregate_type.clone(),
            VersionedName::of(self.event_name.clone(), self.event_version.clone()),
        )
    }

    /// 按匹配方解释记录：未识别的 名称+版本 返回 `None`，
    /// 参数不满足结构时返回 `SchemaViolation`
    pub fn to_event(&self, matcher: &dyn EventTypeMatcher) -> DomainResult<Option<Event>> {
        let event_type = self.event_type();
        let Some(schema) = matcher.match_event_type(&event_type) else {
            return Ok(None);
        };

        let event = Event::builder()
            .aggregate_id(AggregateId::of(self.aggregate_type.clone(), self.aggregate_id))
            .event_timestamp(StreamTimestamp::of(
                self.stream_id.clone(),
                self.event_timestamp,
            ))
            .maybe_processing_id(self.processing_id)
            .event_name(event_type.name().clone())
            .parameters(schema.from_json(&self.parameters)?)
            .characteristics(matcher.characteristics_of(&event_type))
            .build();
        Ok(Some(event))
    }
}

impl From<&Event> for StoredEvent {
    fn from(event: &Event) -> Self {
        StoredEvent {
            aggregate_type: event.aggregate_id().aggregate_type().to_string(),
            aggregate_id: event.aggregate_id().id(),
            event_timestamp: event.event_timestamp().timestamp(),
            stream_id: event.event_timestamp().stream_id().to_string(),
            processing_id: event.processing_id(),
            event_name: event.event_name().name().to_string(),
            event_version: event.event_name().version().to_string(),
            parameters: event.parameters().to_json(),
        }
    }
}

impl TryFrom<Value> for StoredEvent {
    type Error = DomainError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value)?)
    }
}
