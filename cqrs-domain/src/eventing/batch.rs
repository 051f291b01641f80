//! 事件批次（EventBatch）
//!
//! 一个工作单元产生的事件先在批次中累积，`complete` 时作为一个集合交给
//! 事件日志，记录成功后再按接收顺序发布。批次只由一个写入方使用。
//!
use super::{EventLog, EventPublisher};
use crate::{
    domain_event::Event,
    error::{DomainError, DomainResult as Result},
    filter::Filter,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait EventBatch: Send {
    /// 追加事件；批次完成后返回 `BatchCompleted`
    fn accept(&mut self, event: Event) -> Result<()>;

    /// 完成批次：记录并发布，返回带处理 ID 的事件。
    /// 只能完成一次，再次调用返回 `BatchCompleted`
    async fn complete(&mut self) -> Result<Vec<Event>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct LoggingEventBatch {
    events: Vec<Event>,
    completed: bool,
    event_log: Arc<dyn EventLog>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl LoggingEventBatch {
    pub fn new(event_log: Arc<dyn EventLog>, publisher: Option<Arc<dyn EventPublisher>>) -> Self {
        Self {
            events: Vec::new(),
            completed: false,
            event_log,
            publisher,
        }
    }
}

#[async_trait]
impl EventBatch for LoggingEventBatch {
    fn accept(&mut self, event: Event) -> Result<()> {
        if self.completed {
            return Err(DomainError::BatchCompleted);
        }
        self.events.push(event);
        Ok(())
    }

    async fn complete(&mut self) -> Result<Vec<Event>> {
        if self.completed {
            return Err(DomainError::BatchCompleted);
        }
        self.completed = true;

        let events = std::mem::take(&mut self.events);
        let accepted = events.len();
        let logged = self.event_log.log(events).await?;

        if let Some(publisher) = &self.publisher {
            for event in &logged {
                publisher.publish(event).await?;
            }
        }

        debug!(accepted, logged = logged.len(), "event batch completed");
        Ok(logged)
    }

    fn len(&self) -> usize {
        self.events.len()
    }
}

/// 前置过滤：每个被接收的事件先经过变换（可返回错误拒绝）
pub fn pre_accept<F>(f: F) -> Filter<Box<dyn EventBatch>>
where
    F: Fn(Event) -> Result<Event> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Filter::new(move |inner: Box<dyn EventBatch>| {
        Box::new(HookedBatch {
            inner,
            before_accept: Some(f.clone() as Arc<BeforeAccept>),
            after_complete: None,
        }) as Box<dyn EventBatch>
    })
}

/// 后置过滤：观察批次完成的结果
pub fn post_complete<F>(observer: F) -> Filter<Box<dyn EventBatch>>
where
    F: Fn(&Result<Vec<Event>>) + Send + Sync + 'static,
{
    let observer = Arc::new(observer);
    Filter::new(move |inner: Box<dyn EventBatch>| {
        Box::new(HookedBatch {
            inner,
            before_accept: None,
            after_complete: Some(observer.clone() as Arc<AfterComplete>),
        }) as Box<dyn EventBatch>
    })
}

type BeforeAccept = dyn Fn(Event) -> Result<Event> + Send + Sync;
type AfterComplete = dyn Fn(&Result<Vec<Event>>) + Send + Sync;

struct HookedBatch {
    inner: Box<dyn EventBatch>,
    before_accept: Option<Arc<BeforeAccept>>,
    after_complete: Option<Arc<AfterComplete>>,
}

#[async_trait]
impl EventBatch for HookedBatch {
    fn accept(&mut self, event: Event) -> Result<()> {
        let event = match &self.before_accept {
            Some(before) => before(event)?,
            None => event,
        };
        self.inner.accept(event)
    }

    async fn complete(&mut self) -> Result<Vec<Event>> {
        let result = self.inner.complete().await;
        if let Some(after) = &self.after_complete {
            after(&result);
        }
        result
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}
