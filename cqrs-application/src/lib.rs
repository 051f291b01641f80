//! CQRS 应用层（cqrs-application）
//!
//! 命令从 `CommandBus` 进入，经过滤器链到达 `CommandExecutor`，
//! 由注册的 `CommandHandler` 在新的事件批次中产生事件，最终得到 `CommandResult`。
//!
pub mod command_bus;
pub mod command_executor;
pub mod command_log;
pub mod command_result;
pub mod error;

pub use command_bus::{CommandBus, PendingCommand};
pub use command_executor::{
    CommandExecutor, CommandHandler, DispatchingCommandExecutor, post_execute, pre_execute,
};
pub use command_log::{CommandLog, TracingCommandLog, command_log_filter};
pub use command_result::CommandResult;
