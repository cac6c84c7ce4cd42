//! 任务调度模块
//!
//! 提供任务生命周期管理、并发执行和结果历史功能

pub mod history;
pub mod ping_task;
pub mod registry;
mod runner;

// 重新导出主要类型
pub use history::ResultHistory;
pub use ping_task::{PingTask, TaskId, TaskSnapshot, TaskState};
pub use registry::{StartedTask, TaskLimits, TaskRegistry};
