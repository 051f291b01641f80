//! 事件总线（EventBus）协议
//!
//! 事件总线是批次工厂：`start_batch` 返回新的批次，`dispatch` 运行填充逻辑，
//! 仅在填充成功时完成批次，失败的批次被丢弃，永远不会被部分持久化。
//! 总线自身不保存任何批次状态，可被多个任务并发使用。
//!
use super::{EventBatch, EventLog, EventPublisher, LoggingEventBatch};
use crate::{domain_event::Event, error::DomainResult as Result, filter::Filter};
use async_trait::async_trait;
use bon::Builder;
use std::sync::Arc;

pub trait EventBus: Send + Sync {
    fn start_batch(&self) -> Box<dyn EventBatch>;
}

#[async_trait]
pub trait EventBusExt: EventBus {
    /// 启动批次 → 填充 → 完成；填充失败时直接返回错误，批次不会完成
    async fn dispatch<F>(&self, populator: F) -> Result<Vec<Event>>
    where
        F: FnOnce(&mut dyn EventBatch) -> Result<()> + Send;
}

#[async_trait]
impl<B> EventBusExt for B
where
    B: EventBus + ?Sized,
{
    async fn dispatch<F>(&self, populator: F) -> Result<Vec<Event>>
    where
        F: FnOnce(&mut dyn EventBatch) -> Result<()> + Send,
    {
        let mut batch = self.start_batch();
        populator(batch.as_mut())?;
        batch.complete().await
    }
}

/// 记录到事件日志、可选发布的总线
#[derive(Builder)]
pub struct LoggingEventBus {
    event_log: Arc<dyn EventLog>,
    publisher: Option<Arc<dyn EventPublisher>>,
    /// 作用于每个新批次
    batch_filter: Option<Filter<Box<dyn EventBatch>>>,
}

impl EventBus for LoggingEventBus {
    fn start_batch(&self) -> Box<dyn EventBatch> {
        let batch: Box<dyn EventBatch> = Box::new(LoggingEventBatch::new(
            self.event_log.clone(),
            self.publisher.clone(),
        ));
        match &self.batch_filter {
            Some(filter) => filter.apply(batch),
            None => batch,
        }
    }
}

/// 总线过滤：对被包装总线启动的每个批次应用批次过滤器
pub fn filtering_batches(batch_filter: Filter<Box<dyn EventBatch>>) -> Filter<Arc<dyn EventBus>> {
    Filter::new(move |inner: Arc<dyn EventBus>| {
        Arc::new(FilteringBus {
            inner,
            batch_filter: batch_filter.clone(),
        }) as Arc<dyn EventBus>
    })
}

struct FilteringBus {
    inner: Arc<dyn EventBus>,
    batch_filter: Filter<Box<dyn EventBatch>>,
}

impl EventBus for FilteringBus {
    fn start_batch(&self) -> Box<dyn EventBatch> {
        self.batch_filter.apply(self.inner.start_batch())
    }
}
