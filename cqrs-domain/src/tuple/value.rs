use super::{Tuple, TupleSchema};
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;

/// 槽位声明的值类型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    Integer,
    Float,
    Text,
    Uuid,
    Timestamp,
    /// 可为空；接受 `Null` 或可赋值给内部类型的值
    Optional(Box<ValueType>),
    List(Box<ValueType>),
    /// 嵌套元组，要求结构可互换
    Tuple(Arc<TupleSchema>),
}

impl ValueType {
    pub fn optional(inner: ValueType) -> Self {
        ValueType::Optional(Box::new(inner))
    }

    pub fn list(inner: ValueType) -> Self {
        ValueType::List(Box::new(inner))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => f.write_str("boolean"),
            ValueType::Integer => f.write_str("integer"),
            ValueType::Float => f.write_str("float"),
            ValueType::Text => f.write_str("text"),
            ValueType::Uuid => f.write_str("uuid"),
            ValueType::Timestamp => f.write_str("timestamp"),
            ValueType::Optional(inner) => write!(f, "optional<{inner}>"),
            ValueType::List(inner) => write!(f, "list<{inner}>"),
            ValueType::Tuple(schema) => write!(f, "tuple<{}>", schema.name()),
        }
    }
}

/// 元组中的运行时值
#[derive(Debug, Clone)]
pub enum TupleValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    List(Vec<TupleValue>),
    Tuple(Tuple),
}

impl TupleValue {
    /// 运行时类型能否赋值给声明类型
    pub fn is_assignable_to(&self, ty: &ValueType) -> bool {
        match (ty, self) {
            (ValueType::Optional(_), TupleValue::Null) => true,
            (ValueType::Optional(inner), value) => value.is_assignable_to(inner),
            (ValueType::Boolean, TupleValue::Boolean(_))
            | (ValueType::Integer, TupleValue::Integer(_))
            | (ValueType::Float, TupleValue::Float(_))
            | (ValueType::Text, TupleValue::Text(_))
            | (ValueType::Uuid, TupleValue::Uuid(_))
            | (ValueType::Timestamp, TupleValue::Timestamp(_)) => true,
            (ValueType::List(inner), TupleValue::List(items)) => {
                items.iter().all(|item| item.is_assignable_to(inner))
            }
            (ValueType::Tuple(schema), TupleValue::Tuple(tuple)) => {
                tuple.schema().as_ref() == schema.as_ref()
            }
            _ => false,
        }
    }

    /// 用于错误信息的运行时类型描述
    pub fn kind(&self) -> &'static str {
        match self {
            TupleValue::Null => "null",
            TupleValue::Boolean(_) => "boolean",
            TupleValue::Integer(_) => "integer",
            TupleValue::Float(_) => "float",
            TupleValue::Text(_) => "text",
            TupleValue::Uuid(_) => "uuid",
            TupleValue::Timestamp(_) => "timestamp",
            TupleValue::List(_) => "list",
            TupleValue::Tuple(_) => "tuple",
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            TupleValue::Null => Json::Null,
            TupleValue::Boolean(b) => Json::Bool(*b),
            TupleValue::Integer(i) => Json::from(*i),
            TupleValue::Float(x) => Json::from(*x),
            TupleValue::Text(s) => Json::String(s.clone()),
            TupleValue::Uuid(u) => Json::String(u.to_string()),
            TupleValue::Timestamp(t) => Json::String(t.to_rfc3339()),
            TupleValue::List(items) => Json::Array(items.iter().map(TupleValue::to_json).collect()),
            TupleValue::Tuple(tuple) => Json::Object(tuple.to_json()),
        }
    }

    /// 按声明类型解释一个 JSON 值；失败时返回原因
    pub fn from_json(json: &Json, ty: &ValueType) -> Result<TupleValue, String> {
        let mismatch = || format!("expected {ty}, found {json}");
        match (ty, json) {
            (ValueType::Optional(_), Json::Null) => Ok(TupleValue::Null),
            (ValueType::Optional(inner), other) => TupleValue::from_json(other, inner),
            (ValueType::Boolean, Json::Bool(b)) => Ok(TupleValue::Boolean(*b)),
            (ValueType::Integer, Json::Number(n)) => {
                n.as_i64().map(TupleValue::Integer).ok_or_else(mismatch)
            }
            (ValueType::Float, Json::Number(n)) => {
                n.as_f64().map(TupleValue::Float).ok_or_else(mismatch)
            }
            (ValueType::Text, Json::String(s)) => Ok(TupleValue::Text(s.clone())),
            (ValueType::Uuid, Json::String(s)) => Uuid::parse_str(s)
                .map(TupleValue::Uuid)
                .map_err(|e| e.to_string()),
            (ValueType::Timestamp, Json::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|t| TupleValue::Timestamp(t.with_timezone(&Utc)))
                .map_err(|e| e.to_string()),
            (ValueType::List(inner), Json::Array(items)) => items
                .iter()
                .map(|item| TupleValue::from_json(item, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(TupleValue::List),
            (ValueType::Tuple(schema), Json::Object(map)) => schema
                .from_json(map)
                .map(TupleValue::Tuple)
                .map_err(|e| e.to_string()),
            _ => Err(mismatch()),
        }
    }
}

// 浮点按位比较，保证 Eq/Hash 一致，元组才能作为 map 键
impl PartialEq for TupleValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TupleValue::Null, TupleValue::Null) => true,
            (TupleValue::Boolean(a), TupleValue::Boolean(b)) => a == b,
            (TupleValue::Integer(a), TupleValue::Integer(b)) => a == b,
            (TupleValue::Float(a), TupleValue::Float(b)) => a.to_bits() == b.to_bits(),
            (TupleValue::Text(a), TupleValue::Text(b)) => a == b,
            (TupleValue::Uuid(a), TupleValue::Uuid(b)) => a == b,
            (TupleValue::Timestamp(a), TupleValue::Timestamp(b)) => a == b,
            (TupleValue::List(a), TupleValue::List(b)) => a == b,
            (TupleValue::Tuple(a), TupleValue::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TupleValue {}

impl Hash for TupleValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TupleValue::Null => {}
            TupleValue::Boolean(b) => b.hash(state),
            TupleValue::Integer(i) => i.hash(state),
            TupleValue::Float(x) => x.to_bits().hash(state),
            TupleValue::Text(s) => s.hash(state),
            TupleValue::Uuid(u) => u.hash(state),
            TupleValue::Timestamp(t) => t.hash(state),
            TupleValue::List(items) => items.hash(state),
            TupleValue::Tuple(tuple) => tuple.hash(state),
        }
    }
}

impl fmt::Display for TupleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TupleValue::Null => f.write_str("null"),
            TupleValue::Boolean(b) => write!(f, "{b}"),
            TupleValue::Integer(i) => write!(f, "{i}"),
            TupleValue::Float(x) => write!(f, "{x}"),
            TupleValue::Text(s) => write!(f, "{s:?}"),
            TupleValue::Uuid(u) => write!(f, "{u}"),
            TupleValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            TupleValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            TupleValue::Tuple(tuple) => write!(f, "{tuple}"),
        }
    }
}

impl From<bool> for TupleValue {
    fn from(value: bool) -> Self {
        TupleValue::Boolean(value)
    }
}

impl From<i64> for TupleValue {
    fn from(value: i64) -> Self {
        TupleValue::Integer(value)
    }
}

impl From<i32> for TupleValue {
    fn from(value: i32) -> Self {
        TupleValue::Integer(value.into())
    }
}

impl From<f64> for TupleValue {
    fn from(value: f64) -> Self {
        TupleValue::Float(value)
    }
}

impl From<String> for TupleValue {
    fn from(value: String) -> Self {
        TupleValue::Text(value)
    }
}

impl From<&str> for TupleValue {
    fn from(value: &str) -> Self {
        TupleValue::Text(value.to_string())
    }
}

impl From<Uuid> for TupleValue {
    fn from(value: Uuid) -> Self {
        TupleValue::Uuid(value)
    }
}

impl From<DateTime<Utc>> for TupleValue {
    fn from(value: DateTime<Utc>) -> Self {
        TupleValue::Timestamp(value)
    }
}

impl From<Tuple> for TupleValue {
    fn from(value: Tuple) -> Self {
        TupleValue::Tuple(value)
    }
}

impl<T> From<Option<T>> for TupleValue
where
    T: Into<TupleValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(TupleValue::Null, Into::into)
    }
}

impl<T> From<Vec<T>> for TupleValue
where
    T: Into<TupleValue>,
{
    fn from(value: Vec<T>) -> Self {
        TupleValue::List(value.into_iter().map(Into::into).collect())
    }
}
