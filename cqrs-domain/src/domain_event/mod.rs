//! 领域事件（Domain Event）
//!
//! 事件引用一个聚合、一个流时间戳、带版本的事件名与元组参数；
//! 创建后不可变，"修改"总是复制出新值。

mod characteristics;
mod event;

pub use characteristics::EventCharacteristics;
pub use event::Event;
