//! 命令（Command）
//!
//! 表达写意图：引用目标聚合、命令时间戳、带版本的命令名与元组参数，
//! 经命令总线分发并产出 `CommandResult`。
//!
use crate::{
    identity::{AggregateId, CommandType, VersionedName},
    timestamp::StreamTimestamp,
    tuple::Tuple,
};
use bon::Builder;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Builder)]
pub struct Command {
    aggregate_id: AggregateId,
    command_timestamp: StreamTimestamp,
    command_name: VersionedName,
    parameters: Tuple,
}

impl Command {
    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    pub fn command_timestamp(&self) -> &StreamTimestamp {
        &self.command_timestamp
    }

    pub fn command_name(&self) -> &VersionedName {
        &self.command_name
    }

    pub fn parameters(&self) -> &Tuple {
        &self.parameters
    }

    pub fn command_type(&self) -> CommandType {
        CommandType::of(self.aggregate_id.aggregate_type(), self.command_name.clone())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.aggregate_id, self.command_timestamp, self.command_name, self.parameters
        )
    }
}
