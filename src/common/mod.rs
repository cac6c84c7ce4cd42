//! 通用模块
//!
//! 命令行输出等共享的辅助功能

pub mod format;

pub use format::format_duration;
