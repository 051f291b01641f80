//! 事件溯源 / CQRS 领域核心（cqrs-domain）
//!
//! 提供记录不可变领域事件、把事件重放为聚合状态所需的通用构件：
//! - 元组与结构（`tuple`）：经校验的通用参数记录，代替每个事件一个值类型
//! - 事件与命令模型（`domain_event`、`command`）及其标识（`identity`、`timestamp`）
//! - 类型注册表（`registry`）：名称+版本 → 结构、因果顺序、事件特征
//! - 因果排序（`causal_order`）与过滤器组合（`filter`）
//! - 事件系统（`eventing`）：批次、总线、日志与窗口去重、发布与订阅
//! - 持久化协议（`persist`）与内存参考实现
//! - 聚合目录（`catalogue`）与状态构建（`state`）
//!
//! 本 crate 不绑定存储与传输实现，仅定义协议与最小必要的错误类型，
//! 具体后端由上层适配实现。
//!
//! 典型用法：
//! 1. 启动时用 `TypeRegistry` 注册事件/命令结构与顺序；
//! 2. 用 `LoggingEventLog` + `LoggingEventBus` 装配写入路径，按需套上过滤器；
//! 3. 订阅 `CatalogueUpdater` 与 `CachingStateRepository` 维护读模型；
//! 4. 在命令处理中经 `EventEmitter` 写入批次。
//!
pub mod catalogue;
pub mod causal_order;
pub mod command;
pub mod domain_event;
pub mod error;
pub mod eventing;
pub mod filter;
pub mod identity;
pub mod persist;
pub mod registry;
pub mod state;
pub mod timestamp;
pub mod tuple;
