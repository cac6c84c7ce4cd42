//! URL Pinger - 定时URL探测调度器
//!
//! 周期性地对一组URL发起GET请求，保持远程服务在线并记录最近的探测结果：
//! - 多个相互独立的探测任务并发运行
//! - 超时和连接失败时自动重试
//! - 每个任务保留固定容量的结果历史
//! - 通过 HTTP API 或命令行管理任务

pub mod cli;
pub mod common;
pub mod config;
pub mod error;
pub mod logging;
pub mod probe;
pub mod task;
pub mod web;

// 重新导出主要类型
pub use config::{Config, GlobalConfig, WebConfig};
pub use error::{PingerError, RegistryError};
pub use probe::{HttpProbe, OutcomeKind, ProbeOutcome, Prober};
pub use task::{TaskId, TaskRegistry, TaskSnapshot};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
