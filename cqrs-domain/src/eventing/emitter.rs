//! 事件发射器（EventEmitter）
//!
//! 按注册表中的结构构建事件并写入当前批次。
//!
use super::EventBatch;
use crate::{
    command::Command,
    error::DomainResult as Result,
    identity::{AggregateId, VersionedName},
    registry::TypeRegistry,
    timestamp::StreamTimestamp,
    tuple::TupleValue,
};

pub struct EventEmitter<'a> {
    registry: &'a TypeRegistry,
    batch: &'a mut dyn EventBatch,
}

impl<'a> EventEmitter<'a> {
    pub fn new(registry: &'a TypeRegistry, batch: &'a mut dyn EventBatch) -> Self {
        Self { registry, batch }
    }

    pub fn registry(&self) -> &TypeRegistry {
        self.registry
    }

    /// 未注册的事件类型返回 `UnrecognizedType`，参数不符返回 `SchemaViolation`
    pub fn emit<I, K, V>(
        &mut self,
        aggregate_id: AggregateId,
        event_timestamp: StreamTimestamp,
        event_name: VersionedName,
        parameters: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<TupleValue>,
    {
        let event = self
            .registry
            .event(aggregate_id, event_timestamp, event_name, parameters)?;
        self.batch.accept(event)
    }

    /// 以命令的目标聚合与时间戳发射事件
    pub fn emit_for<I, K, V>(
        &mut self,
        command: &Command,
        event_name: VersionedName,
        parameters: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<TupleValue>,
    {
        self.emit(
            command.aggregate_id().clone(),
            command.command_timestamp().clone(),
            event_name,
            parameters,
        )
    }

    /// 已写入当前批次的事件数量
    pub fn emitted(&self) -> usize {
        self.batch.len()
    }
}
