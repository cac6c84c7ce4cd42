//! 探测模块
//!
//! 提供单次HTTP探测、结果分类与重试功能

pub mod checker;
pub mod outcome;

// 重新导出主要类型
pub use checker::{validate_url, HttpProbe, ProbeSettings, Prober};
pub use outcome::{OutcomeKind, ProbeOutcome};
