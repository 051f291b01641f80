//! 事件子系统（eventing）
//!
//! 提供事件从产生到扇出的协议与内存实现：
//! - `EventBatch` / `EventBus`：按工作单元累积事件并一次性完成；
//! - `EventLog`：分配处理 ID 并交给持久化器，`idempotent_filter` 做窗口去重；
//! - `EventPublisher` / `Subscribable`：按事件类型扇出给 `EventHandler`；
//! - `EventEmitter`：按注册结构构建事件并写入批次。
//!
//! 各阶段均可用 `Filter` 包装，组合规则见 [`crate::filter`]。
//!
pub mod batch;
pub mod bus;
pub mod dedup;
pub mod emitter;
pub mod handler;
pub mod log;
pub mod publisher;

pub use batch::{EventBatch, LoggingEventBatch, post_complete, pre_accept};
pub use bus::{EventBus, EventBusExt, LoggingEventBus, filtering_batches};
pub use dedup::{DedupKey, IdempotencyConfig, IdempotencyWindow, idempotent_filter};
pub use emitter::EventEmitter;
pub use handler::{EventHandler, HandledEventType};
pub use log::{EventLog, LoggingEventLog, ProcessingIdGenerator, post_log, pre_log};
pub use publisher::{
    EventPublisher, InMemoryEventPublisher, PublisherConfig, Subscribable, post_publish,
    pre_publish,
};
