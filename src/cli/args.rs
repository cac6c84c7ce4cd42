//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use crate::config::{get_default_config_path, Config, TomlConfigLoader};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// URL Pinger - 定时探测URL，保持远程服务在线
#[derive(Parser, Debug, Clone)]
#[command(
    name = "url-pinger",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "URL_PINGER_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，未指定时使用配置文件中的值
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "URL_PINGER_LOG_LEVEL"
    )]
    pub log_level: Option<LogLevel>,

    /// 是否以JSON格式输出日志
    #[arg(long, help = "以JSON格式输出日志")]
    pub json_logs: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum LogLevel {
    /// 跟踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 启动HTTP服务，通过API管理探测任务
    Serve {
        /// 绑定地址
        #[arg(long, value_name = "ADDR", help = "绑定地址")]
        bind: Option<String>,

        /// 监听端口
        #[arg(short, long, value_name = "PORT", help = "监听端口", env = "PORT")]
        port: Option<u16>,

        /// 默认探测间隔（秒）
        #[arg(
            short,
            long,
            value_name = "SECONDS",
            help = "默认探测间隔（秒）",
            env = "URL_PINGER_INTERVAL"
        )]
        interval: Option<u64>,

        /// 请求超时（秒）
        #[arg(short, long, value_name = "SECONDS", help = "请求超时（秒）")]
        timeout: Option<u64>,
    },

    /// 在前台持续探测URL，按 Ctrl+C 停止
    Run {
        /// 要探测的URL，未指定时使用配置中的 default_urls
        #[arg(value_name = "URL", help = "要探测的URL")]
        urls: Vec<String>,

        /// 探测间隔（秒）
        #[arg(short, long, value_name = "SECONDS", help = "探测间隔（秒）")]
        interval: Option<u64>,
    },

    /// 对单个URL执行一次探测
    Once {
        /// 目标URL
        #[arg(value_name = "URL", help = "目标URL")]
        url: String,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 初始化配置文件
    Init {
        /// 配置文件路径
        #[arg(
            value_name = "FILE",
            help = "配置文件路径",
            default_value = "config.toml"
        )]
        config_path: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },

    /// 验证配置文件
    Validate {
        /// 配置文件路径
        #[arg(value_name = "FILE", help = "配置文件路径")]
        config_path: Option<PathBuf>,

        /// 是否显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

impl Args {
    /// 解析命令行参数
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(get_default_config_path)
    }

    /// 加载配置，未显式指定的默认配置文件不存在时使用内置默认值
    pub async fn load_config(&self) -> crate::error::Result<Config> {
        TomlConfigLoader::new(true)
            .load_or_default(self.config.as_deref())
            .await
    }

    /// 该命令是否需要在初始化日志前加载配置
    pub fn needs_config(&self) -> bool {
        matches!(
            self.command,
            Commands::Serve { .. } | Commands::Run { .. } | Commands::Once { .. }
        )
    }
}
