//! 因果顺序（Causal Ordering）
//!
//! 在注册阶段为聚合类型下的事件/命令声明相对顺序，用于把乱序的历史
//! 排成确定的重放顺序：主键为因果顺序，次键为 `StreamTimestamp`。
//! 排序是稳定的：顺序与时间戳都相同的元素保持输入中的相对位置。
//!
use crate::{
    command::Command,
    domain_event::Event,
    identity::{CommandType, EventType},
    timestamp::StreamTimestamp,
};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

/// 因果顺序值，越小越靠前
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CausalOrder(i32);

impl CausalOrder {
    pub const INITIAL: Self = Self(i32::MIN);
    pub const TERMINAL: Self = Self(i32::MAX);
    /// 未声明顺序的名称默认值：位于终结事件之前
    pub const PRE_TERMINAL: Self = Self(i32::MAX - 1);

    pub const fn ordered(n: i32) -> Self {
        Self(n)
    }

    pub const fn value(&self) -> i32 {
        self.0
    }
}

/// 可参与因果排序的条目
pub trait CausallyOrdered {
    type Kind: Eq + Hash;

    fn causal_kind(&self) -> Self::Kind;

    fn stream_timestamp(&self) -> &StreamTimestamp;

    /// 未在顺序表中登记时的回退顺序（如事件的 INITIAL/TERMINAL 特征）
    fn fallback_order(&self) -> Option<CausalOrder> {
        None
    }
}

impl CausallyOrdered for Event {
    type Kind = EventType;

    fn causal_kind(&self) -> EventType {
        self.event_type()
    }

    fn stream_timestamp(&self) -> &StreamTimestamp {
        self.event_timestamp()
    }

    fn fallback_order(&self) -> Option<CausalOrder> {
        if self.is_initial() {
            Some(CausalOrder::INITIAL)
        } else if self.is_terminal() {
            Some(CausalOrder::TERMINAL)
        } else {
            None
        }
    }
}

impl CausallyOrdered for Command {
    type Kind = CommandType;

    fn causal_kind(&self) -> CommandType {
        self.command_type()
    }

    fn stream_timestamp(&self) -> &StreamTimestamp {
        self.command_timestamp()
    }
}

#[derive(Debug, Clone)]
pub struct CausalOrdering<K> {
    orders: HashMap<K, CausalOrder>,
}

impl CausalOrdering<EventType> {
    pub fn on_event_types(orders: HashMap<EventType, CausalOrder>) -> Self {
        Self { orders }
    }
}

impl CausalOrdering<CommandType> {
    pub fn on_command_types(orders: HashMap<CommandType, CausalOrder>) -> Self {
        Self { orders }
    }
}

impl<K: Eq + Hash> CausalOrdering<K> {
    pub fn order_of<T>(&self, item: &T) -> CausalOrder
    where
        T: CausallyOrdered<Kind = K>,
    {
        self.orders
            .get(&item.causal_kind())
            .copied()
            .or_else(|| item.fallback_order())
            .unwrap_or(CausalOrder::PRE_TERMINAL)
    }

    pub fn compare<T>(&self, a: &T, b: &T) -> Ordering
    where
        T: CausallyOrdered<Kind = K>,
    {
        self.order_of(a)
            .cmp(&self.order_of(b))
            .then_with(|| a.stream_timestamp().cmp(b.stream_timestamp()))
    }

    /// 稳定排序
    pub fn sort<T>(&self, items: &mut [T])
    where
        T: CausallyOrdered<Kind = K>,
    {
        items.sort_by_cached_key(|item| (self.order_of(item), item.stream_timestamp().clone()));
    }

    pub fn sorted<T>(&self, mut items: Vec<T>) -> Vec<T>
    where
        T: CausallyOrdered<Kind = K>,
    {
        self.sort(&mut items);
        items
    }
}
