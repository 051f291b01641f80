//! 事件处理器（EventHandler）
//!
//! 定义消费某类/多类/全部事件的处理逻辑与元信息（名称、订阅类型）。
//!
use crate::{domain_event::Event, identity::EventType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandledEventType {
    One(EventType),
    Many(Vec<EventType>),
    All,
}

/// 事件处理器：处理某一类型的事件
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于失败日志）
    fn handler_name(&self) -> &str;
    /// 返回该处理器订阅的事件类型
    fn handled_event_type(&self) -> HandledEventType;
    /// 处理事件
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

/// 按事件类型索引的处理器表，保持订阅顺序
#[derive(Clone, Default)]
pub(crate) struct HandlerRegistry {
    by_type: HashMap<EventType, Vec<Arc<dyn EventHandler>>>,
    all: Vec<Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub(crate) fn register(&mut self, handler: Arc<dyn EventHandler>) {
        match handler.handled_event_type() {
            HandledEventType::All => self.all.push(handler),
            HandledEventType::One(t) => {
                self.by_type.entry(t).or_default().push(handler);
            }
            HandledEventType::Many(ts) => {
                for t in ts {
                    self.by_type.entry(t).or_default().push(handler.clone());
                }
            }
        }
    }

    /// 先按类型订阅者，再全量订阅者
    pub(crate) fn matching(&self, event_type: &EventType) -> Vec<Arc<dyn EventHandler>> {
        let mut out = Vec::new();
        if let Some(v) = self.by_type.get(event_type) {
            out.extend(v.iter().cloned());
        }
        out.extend(self.all.iter().cloned());
        out
    }

    pub(crate) fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum::<usize>() + self.all.len()
    }
}
