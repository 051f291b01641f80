//! 事件日志（EventLog）
//!
//! 为批次中的每个事件分配新的处理 ID（时间有序且全局唯一），
//! 转交持久化器，并返回带 ID 的事件集合。
//!
use crate::{
    domain_event::Event,
    error::{DomainError, DomainResult as Result},
    filter::Filter,
    persist::EventPersister,
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use ulid::Generator;
use uuid::Uuid;

#[async_trait]
pub trait EventLog: Send + Sync {
    /// 记录一个批次；整体成功或整体返回错误
    async fn log(&self, events: Vec<Event>) -> Result<Vec<Event>>;
}

/// 处理 ID 生成器：单调 ULID，以 `Uuid` 形式给出
///
/// 同一毫秒内的并发调用依靠单调递增的随机部分保持有序。
pub struct ProcessingIdGenerator {
    inner: Mutex<Generator>,
}

impl Default for ProcessingIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingIdGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }

    pub fn next_id(&self) -> Result<Uuid> {
        let mut generator = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let ulid = generator
            .generate()
            .map_err(|e| DomainError::invalid_state(format!("processing id exhausted: {e}")))?;
        Ok(Uuid::from_u128(ulid.0))
    }
}

pub struct LoggingEventLog {
    persister: Arc<dyn EventPersister>,
    ids: ProcessingIdGenerator,
}

impl LoggingEventLog {
    pub fn logging_to(persister: Arc<dyn EventPersister>) -> Self {
        Self {
            persister,
            ids: ProcessingIdGenerator::new(),
        }
    }
}

#[async_trait]
impl EventLog for LoggingEventLog {
    async fn log(&self, events: Vec<Event>) -> Result<Vec<Event>> {
        let stamped = events
            .iter()
            .map(|event| event.processed(self.ids.next_id()?))
            .collect::<Result<Vec<_>>>()?;

        if stamped.is_empty() {
            return Ok(stamped);
        }

        self.persister.accept(&stamped).await?;
        debug!(count = stamped.len(), "event batch logged");
        Ok(stamped)
    }
}

/// 前置过滤：在委托前变换（或丢弃）批次中的事件
pub fn pre_log<F>(f: F) -> Filter<Arc<dyn EventLog>>
where
    F: Fn(Vec<Event>) -> Result<Vec<Event>> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Filter::new(move |inner: Arc<dyn EventLog>| {
        Arc::new(HookedEventLog {
            inner,
            before: Some(f.clone() as Arc<BeforeLog>),
            after: None,
        }) as Arc<dyn EventLog>
    })
}

/// 后置过滤：观察委托结果，不改变结果
pub fn post_log<F>(f: F) -> Filter<Arc<dyn EventLog>>
where
    F: Fn(&Result<Vec<Event>>) + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Filter::new(move |inner: Arc<dyn EventLog>| {
        Arc::new(HookedEventLog {
            inner,
            before: None,
            after: Some(f.clone() as Arc<AfterLog>),
        }) as Arc<dyn EventLog>
    })
}

type BeforeLog = dyn Fn(Vec<Event>) -> Result<Vec<Event>> + Send + Sync;
type AfterLog = dyn Fn(&Result<Vec<Event>>) + Send + Sync;

struct HookedEventLog {
    inner: Arc<dyn EventLog>,
    before: Option<Arc<BeforeLog>>,
    after: Option<Arc<AfterLog>>,
}

#[async_trait]
impl EventLog for HookedEventLog {
    async fn log(&self, events: Vec<Event>) -> Result<Vec<Event>> {
        let events = match &self.before {
            Some(before) => before(events)?,
            None => events,
        };
        let result = self.inner.log(events).await;
        if let Some(after) = &self.after {
            after(&result);
        }
        result
    }
}
