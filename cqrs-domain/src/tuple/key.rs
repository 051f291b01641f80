use super::{Tuple, TupleSchema, TupleValue, ValueType};
use chrono::{DateTime, Utc};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// 可从元组槽位中取出的 Rust 类型
pub trait TupleType: Sized {
    /// 该类型能否读取声明为 `ty` 的槽位
    fn matches(ty: &ValueType) -> bool;

    fn from_value(value: &TupleValue) -> Option<Self>;
}

/// 经结构校验过的类型化槽位键
pub struct TupleKey<T> {
    schema: Arc<TupleSchema>,
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TupleKey<T> {
    pub(crate) fn new(schema: Arc<TupleSchema>, index: usize) -> Self {
        Self {
            schema,
            index,
            _marker: PhantomData,
        }
    }

    pub fn schema(&self) -> &Arc<TupleSchema> {
        &self.schema
    }

    pub fn name(&self) -> &str {
        self.schema.slots()[self.index].name()
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }
}

impl<T> Clone for TupleKey<T> {
    fn clone(&self) -> Self {
        Self::new(self.schema.clone(), self.index)
    }
}

impl<T> fmt::Debug for TupleKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TupleKey")
            .field("schema", &self.schema.name())
            .field("slot", &self.name())
            .finish()
    }
}

macro_rules! scalar_tuple_type {
    ($ty:ty, $variant:ident) => {
        impl TupleType for $ty {
            fn matches(ty: &ValueType) -> bool {
                matches!(ty, ValueType::$variant)
            }

            fn from_value(value: &TupleValue) -> Option<Self> {
                match value {
                    TupleValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

scalar_tuple_type!(bool, Boolean);
scalar_tuple_type!(i64, Integer);
scalar_tuple_type!(f64, Float);
scalar_tuple_type!(String, Text);
scalar_tuple_type!(Uuid, Uuid);
scalar_tuple_type!(DateTime<Utc>, Timestamp);

impl TupleType for Tuple {
    fn matches(ty: &ValueType) -> bool {
        matches!(ty, ValueType::Tuple(_))
    }

    fn from_value(value: &TupleValue) -> Option<Self> {
        match value {
            TupleValue::Tuple(t) => Some(t.clone()),
            _ => None,
        }
    }
}

impl TupleType for TupleValue {
    fn matches(_ty: &ValueType) -> bool {
        true
    }

    fn from_value(value: &TupleValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl<T: TupleType> TupleType for Option<T> {
    fn matches(ty: &ValueType) -> bool {
        match ty {
            ValueType::Optional(inner) => T::matches(inner),
            _ => false,
        }
    }

    fn from_value(value: &TupleValue) -> Option<Self> {
        match value {
            TupleValue::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: TupleType> TupleType for Vec<T> {
    fn matches(ty: &ValueType) -> bool {
        match ty {
            ValueType::List(inner) => T::matches(inner),
            _ => false,
        }
    }

    fn from_value(value: &TupleValue) -> Option<Self> {
        match value {
            TupleValue::List(items) => items.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}
