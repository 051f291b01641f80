//! 事件发布（EventPublisher / Subscribable）
//!
//! 把已记录的事件按 `EventType` 扇出给订阅者。同一事件的多个处理器
//! 以有界并发执行；处理器失败会记录日志并以首个错误返回，不被吞掉。
//!
use super::handler::{EventHandler, HandlerRegistry};
use crate::{
    domain_event::Event,
    error::{DomainError, DomainResult as Result},
    filter::Filter,
};
use async_trait::async_trait;
use bon::Builder;
use futures_util::{StreamExt, future::BoxFuture, stream};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &Event) -> Result<()>;
}

pub trait Subscribable: Send + Sync {
    fn subscribe(&self, handler: Arc<dyn EventHandler>);
}

/// 发布器配置
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// 单事件的处理并发（同一事件广播给多个 handler）
    pub handler_concurrency: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            handler_concurrency: 8,
        }
    }
}

#[derive(Builder, Default)]
pub struct InMemoryEventPublisher {
    #[builder(skip)]
    registry: RwLock<HandlerRegistry>,
    #[builder(default)]
    config: PublisherConfig,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handlers(handlers: impl IntoIterator<Item = Arc<dyn EventHandler>>) -> Self {
        let publisher = Self::new();
        for handler in handlers {
            publisher.subscribe(handler);
        }
        publisher
    }

    pub fn handler_count(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Subscribable for InMemoryEventPublisher {
    fn subscribe(&self, handler: Arc<dyn EventHandler>) {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(handler);
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: &Event) -> Result<()> {
        let handlers = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .matching(&event.event_type());
        if handlers.is_empty() {
            return Ok(());
        }

        let handling: Vec<BoxFuture<'_, Option<DomainError>>> = handlers
            .into_iter()
            .map(|h| {
                Box::pin(async move {
                    match h.handle(event).await {
                        Ok(()) => None,
                        Err(err) => {
                            warn!(
                                handler = h.handler_name(),
                                event_type = %event.event_type(),
                                error = %err,
                                "event handler failed"
                            );
                            Some(DomainError::EventHandler {
                                handler: h.handler_name().to_string(),
                                reason: err.to_string(),
                            })
                        }
                    }
                }) as BoxFuture<'_, Option<DomainError>>
            })
            .collect();

        let concurrency = self.config.handler_concurrency.max(1);
        let outcomes: Vec<Option<DomainError>> = stream::iter(handling)
            .buffered(concurrency)
            .collect()
            .await;

        match outcomes.into_iter().flatten().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// 前置过滤：谓词为假的事件不再向下传递
pub fn pre_publish<F>(predicate: F) -> Filter<Arc<dyn EventPublisher>>
where
    F: Fn(&Event) -> bool + Send + Sync + 'static,
{
    let predicate = Arc::new(predicate);
    Filter::new(move |inner: Arc<dyn EventPublisher>| {
        Arc::new(HookedPublisher {
            inner,
            before: Some(predicate.clone() as Arc<BeforePublish>),
            after: None,
        }) as Arc<dyn EventPublisher>
    })
}

/// 后置过滤：观察每个事件的发布结果
pub fn post_publish<F>(observer: F) -> Filter<Arc<dyn EventPublisher>>
where
    F: Fn(&Event, &Result<()>) + Send + Sync + 'static,
{
    let observer = Arc::new(observer);
    Filter::new(move |inner: Arc<dyn EventPublisher>| {
        Arc::new(HookedPublisher {
            inner,
            before: None,
            after: Some(observer.clone() as Arc<AfterPublish>),
        }) as Arc<dyn EventPublisher>
    })
}

type BeforePublish = dyn Fn(&Event) -> bool + Send + Sync;
type AfterPublish = dyn Fn(&Event, &Result<()>) + Send + Sync;

struct HookedPublisher {
    inner: Arc<dyn EventPublisher>,
    before: Option<Arc<BeforePublish>>,
    after: Option<Arc<AfterPublish>>,
}

#[async_trait]
impl EventPublisher for HookedPublisher {
    async fn publish(&self, event: &Event) -> Result<()> {
        if let Some(before) = &self.before {
            if !before(event) {
                return Ok(());
            }
        }
        let result = self.inner.publish(event).await;
        if let Some(after) = &self.after {
            after(event, &result);
        }
        result
    }
}
