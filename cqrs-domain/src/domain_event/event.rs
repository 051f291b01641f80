use super::EventCharacteristics;
use crate::{
    error::{DomainError, DomainResult as Result},
    identity::{AggregateId, EventType, VersionedName},
    timestamp::StreamTimestamp,
    tuple::Tuple,
};
use bon::Builder;
use std::fmt;
use uuid::Uuid;

/// 不可变领域事件。
///
/// 仅 `processing_id` 会在记录到事件日志时由无到有地设置一次，
/// 且以复制方式完成（见 [`Event::processed`]）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Builder)]
pub struct Event {
    aggregate_id: AggregateId,
    event_timestamp: StreamTimestamp,
    processing_id: Option<Uuid>,
    event_name: VersionedName,
    parameters: Tuple,
    #[builder(default)]
    characteristics: EventCharacteristics,
}

impl Event {
    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    pub fn event_timestamp(&self) -> &StreamTimestamp {
        &self.event_timestamp
    }

    pub fn processing_id(&self) -> Option<Uuid> {
        self.processing_id
    }

    pub fn event_name(&self) -> &VersionedName {
        &self.event_name
    }

    pub fn parameters(&self) -> &Tuple {
        &self.parameters
    }

    pub fn characteristics(&self) -> EventCharacteristics {
        self.characteristics
    }

    pub fn event_type(&self) -> EventType {
        EventType::of(self.aggregate_id.aggregate_type(), self.event_name.clone())
    }

    pub fn is_initial(&self) -> bool {
        self.characteristics.is_initial()
    }

    pub fn is_terminal(&self) -> bool {
        self.characteristics.is_terminal()
    }

    /// 返回设置了处理 ID 的副本；已设置过时报错
    pub fn processed(&self, processing_id: Uuid) -> Result<Event> {
        if let Some(existing) = self.processing_id {
            return Err(DomainError::invalid_state(format!(
                "event {} already processed as {existing}",
                self.event_type()
            )));
        }

        Ok(Event {
            processing_id: Some(processing_id),
            ..self.clone()
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.aggregate_id, self.event_timestamp, self.event_name, self.parameters
        )?;
        if let Some(id) = self.processing_id {
            write!(f, " processed={id}")?;
        }
        Ok(())
    }
}
