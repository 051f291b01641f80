//! 元组与结构（Tuple & Schema）
//!
//! 为事件/命令参数提供结构化类型：无需为每种事件定义静态类型，
//! 由 `TupleSchema` 声明具名、带类型的槽位，`Tuple` 是经过校验的实例。
//! - `TupleSchema::of` 构建规范结构（槽位按名称排序）；
//! - `make_with` / `make` 绑定值并校验元数与类型；
//! - `get_key` 按名称 + 期望类型获取槽位键，用于类型化读取；
//! - `from_json` / `Tuple::to_json` 与持久化记录中的参数表互转。
//!
mod key;
mod schema;
mod value;

pub use key::{TupleKey, TupleType};
pub use schema::{TupleSchema, TupleSlot};
pub use value::{TupleValue, ValueType};

use crate::error::{DomainError, DomainResult as Result};
use serde_json::{Map, Value as Json};
use std::fmt;
use std::sync::Arc;

/// 结构实例：构建后不可变，相等性由结构 + 值决定
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tuple {
    schema: Arc<TupleSchema>,
    values: Vec<TupleValue>,
}

impl Tuple {
    pub(crate) fn new_unchecked(schema: Arc<TupleSchema>, values: Vec<TupleValue>) -> Self {
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<TupleSchema> {
        &self.schema
    }

    /// 值按槽位名排序
    pub fn values(&self) -> &[TupleValue] {
        &self.values
    }

    /// 类型化读取；键来自不可互换的结构时失败
    pub fn get<T: TupleType>(&self, key: &TupleKey<T>) -> Result<T> {
        if key.schema().as_ref() != self.schema.as_ref() {
            return Err(DomainError::schema_violation(
                self.schema.name(),
                format!("key belongs to schema {}", key.schema().name()),
            ));
        }

        T::from_value(&self.values[key.index()]).ok_or_else(|| {
            DomainError::schema_violation(
                self.schema.name(),
                format!("slot {} could not be read as requested type", key.name()),
            )
        })
    }

    pub fn get_value(&self, name: &str) -> Option<&TupleValue> {
        self.schema.index_of(name).map(|i| &self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TupleValue)> {
        self.schema
            .slots()
            .iter()
            .map(TupleSlot::name)
            .zip(self.values.iter())
    }

    /// 是否满足给定结构（结构可互换即满足）
    pub fn conforms_to(&self, schema: &TupleSchema) -> bool {
        self.schema.as_ref() == schema
    }

    pub fn to_json(&self) -> Map<String, Json> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.to_json()))
            .collect()
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.schema.name())?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}
