//! 状态构建（State Builder / Accumulator）
//!
//! 第一条事件经初始处理函数得到状态，此后每条事件经变更函数折叠。
//! 完整重放与"快照 + 剩余历史"两条路径结果一致。
//!
mod accumulator;
mod repository;

pub use accumulator::{Accumulator, StateBuilder};
pub use repository::CachingStateRepository;
