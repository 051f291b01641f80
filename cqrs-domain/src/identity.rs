//! 标识（Identity）
//!
//! 聚合标识 `AggregateId`、带版本名称 `VersionedName`，以及用于结构查找与路由的
//! `EventType` / `CommandType`。均为不可变值类型。
//!
use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// 聚合标识：类型 + UUID，标识一条事件流
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AggregateId {
    aggregate_type: String,
    id: Uuid,
}

impl AggregateId {
    pub fn of(aggregate_type: impl Into<String>, id: Uuid) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            id,
        }
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.aggregate_type, self.id)
    }
}

/// 未指定版本时的默认版本号
pub const DEFAULT_VERSION: &str = "0";

/// 带版本的名称，规范形式为 `name_version`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionedName {
    name: String,
    version: String,
}

impl VersionedName {
    pub fn of(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// 使用默认版本 `"0"`
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self::of(name, DEFAULT_VERSION)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn formatted(&self) -> String {
        format!("{}_{}", self.name, self.version)
    }
}

impl fmt::Display for VersionedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.version)
    }
}

impl FromStr for VersionedName {
    type Err = DomainError;

    /// 以最后一个 `_` 切分名称与版本
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('_') {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => {
                Ok(Self::of(name, version))
            }
            _ => Err(DomainError::Parse {
                reason: format!("not a versioned name: {s}"),
            }),
        }
    }
}

/// 事件类型：聚合类型 + 事件名（含版本）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventType {
    aggregate_type: String,
    name: VersionedName,
}

impl EventType {
    pub fn of(aggregate_type: impl Into<String>, name: VersionedName) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            name,
        }
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn name(&self) -> &VersionedName {
        &self.name
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.aggregate_type, self.name)
    }
}

/// 命令类型：聚合类型 + 命令名（含版本）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandType {
    aggregate_type: String,
    name: VersionedName,
}

impl CommandType {
    pub fn of(aggregate_type: impl Into<String>, name: VersionedName) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            name,
        }
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn name(&self) -> &VersionedName {
        &self.name
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.aggregate_type, self.name)
    }
}
