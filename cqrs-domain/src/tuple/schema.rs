use super::{Tuple, TupleKey, TupleType, TupleValue, ValueType};
use crate::error::{DomainError, DomainResult as Result};
use serde_json::{Map, Value as Json};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 具名、带类型的槽位
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleSlot {
    name: String,
    value_type: ValueType,
}

impl TupleSlot {
    pub fn of(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }
}

/// 元组结构：槽位按名称排序后的规范形式。
///
/// 名称与槽位集合都相同的两个结构可以互换。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleSchema {
    name: String,
    slots: Vec<TupleSlot>,
}

impl TupleSchema {
    /// 构建规范结构；重复的槽位名视为结构违例
    pub fn of(name: impl Into<String>, slots: impl IntoIterator<Item = TupleSlot>) -> Result<Self> {
        let name = name.into();
        let mut slots: Vec<TupleSlot> = slots.into_iter().collect();
        slots.sort_by(|a, b| a.name.cmp(&b.name));

        if let Some(dup) = slots.windows(2).find(|w| w[0].name == w[1].name) {
            return Err(DomainError::schema_violation(
                &name,
                format!("duplicate slot: {}", dup[0].name),
            ));
        }

        Ok(Self { name, slots })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slots(&self) -> &[TupleSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.slots
            .binary_search_by(|slot| slot.name.as_str().cmp(name))
            .ok()
    }

    pub fn slot(&self, name: &str) -> Option<&TupleSlot> {
        self.index_of(name).map(|i| &self.slots[i])
    }

    /// 按排序后的槽位顺序绑定位置参数
    pub fn make_with(self: &Arc<Self>, values: Vec<TupleValue>) -> Result<Tuple> {
        if values.len() != self.slots.len() {
            return Err(self.violation(format!(
                "expected {} values, got {}",
                self.slots.len(),
                values.len()
            )));
        }

        for (slot, value) in self.slots.iter().zip(&values) {
            self.check_slot(slot, value)?;
        }

        Ok(Tuple::new_unchecked(self.clone(), values))
    }

    /// 按名称绑定；缺失、多余或类型不符均为结构违例
    pub fn make<I, K, V>(self: &Arc<Self>, named: I) -> Result<Tuple>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<TupleValue>,
    {
        let mut values: Vec<Option<TupleValue>> = vec![None; self.slots.len()];

        for (name, value) in named {
            let name = name.as_ref();
            let Some(index) = self.index_of(name) else {
                return Err(self.violation(format!("unexpected slot: {name}")));
            };
            if values[index].is_some() {
                return Err(self.violation(format!("slot bound twice: {name}")));
            }
            values[index] = Some(value.into());
        }

        let values = self
            .slots
            .iter()
            .zip(values)
            .map(|(slot, value)| {
                value.ok_or_else(|| self.violation(format!("missing slot: {}", slot.name)))
            })
            .collect::<Result<Vec<_>>>()?;

        self.make_with(values)
    }

    /// 获取类型化的槽位键：槽位不存在或类型不符时失败
    pub fn get_key<T: TupleType>(self: &Arc<Self>, name: &str) -> Result<TupleKey<T>> {
        let Some(index) = self.index_of(name) else {
            return Err(self.violation(format!("no such slot: {name}")));
        };

        let slot = &self.slots[index];
        if !T::matches(&slot.value_type) {
            return Err(self.violation(format!(
                "slot {name} has type {}, requested {}",
                slot.value_type,
                std::any::type_name::<T>()
            )));
        }

        Ok(TupleKey::new(self.clone(), index))
    }

    /// 按槽位类型解释持久化记录中的参数表 `{name: value}`
    pub fn from_json(self: &Arc<Self>, map: &Map<String, Json>) -> Result<Tuple> {
        let known: HashSet<&str> = self.slots.iter().map(|s| s.name.as_str()).collect();
        if let Some(extra) = map.keys().find(|k| !known.contains(k.as_str())) {
            return Err(self.violation(format!("unexpected slot: {extra}")));
        }

        let values = self
            .slots
            .iter()
            .map(|slot| {
                let json = map.get(&slot.name).unwrap_or(&Json::Null);
                TupleValue::from_json(json, &slot.value_type)
                    .map_err(|reason| self.violation(format!("slot {}: {reason}", slot.name)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Tuple::new_unchecked(self.clone(), values))
    }

    fn check_slot(&self, slot: &TupleSlot, value: &TupleValue) -> Result<()> {
        if value.is_assignable_to(&slot.value_type) {
            Ok(())
        } else {
            Err(self.violation(format!(
                "slot {} expects {}, got {}",
                slot.name,
                slot.value_type,
                value.kind()
            )))
        }
    }

    fn violation(&self, reason: String) -> DomainError {
        DomainError::schema_violation(&self.name, reason)
    }
}

impl fmt::Display for TupleSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.name)?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", slot.name, slot.value_type)?;
        }
        f.write_str("}")
    }
}
