//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use serde::{Deserialize, Serialize};

/// 主配置结构，包含全局配置和Web配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 全局配置项
    #[serde(default)]
    pub global: GlobalConfig,
    /// Web 服务器配置
    #[serde(default)]
    pub web: WebConfig,
}

/// 全局配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 默认URL列表（`run` 未指定URL时使用）
    #[serde(default)]
    pub default_urls: Vec<String>,
    /// 默认探测间隔（秒）
    #[serde(default = "default_interval")]
    pub default_interval_seconds: u64,
    /// 最小探测间隔（秒）
    #[serde(default = "default_min_interval")]
    pub min_interval_seconds: u64,
    /// 最大探测间隔（秒）
    #[serde(default = "default_max_interval")]
    pub max_interval_seconds: u64,
    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// 请求使用的 User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// 超时/连接失败时的重试次数
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// 重试间隔（秒）
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    /// 单个任务最多包含的URL数
    #[serde(default = "default_max_urls")]
    pub max_urls_per_task: usize,
    /// 每个任务保留的历史结果数
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// 状态查询返回的最近结果数
    #[serde(default = "default_status_history_len")]
    pub status_history_len: usize,
    /// 停止标志检查粒度（毫秒）
    #[serde(default = "default_stop_check_millis")]
    pub stop_check_millis: u64,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_urls: Vec::new(),
            default_interval_seconds: default_interval(),
            min_interval_seconds: default_min_interval(),
            max_interval_seconds: default_max_interval(),
            request_timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            retry_attempts: default_retry_attempts(),
            retry_delay_seconds: default_retry_delay(),
            max_urls_per_task: default_max_urls(),
            history_capacity: default_history_capacity(),
            status_history_len: default_status_history_len(),
            stop_check_millis: default_stop_check_millis(),
            log_level: default_log_level(),
        }
    }
}

/// Web 服务器配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    /// 绑定地址
    #[serde(default = "default_web_bind_address")]
    pub bind_address: String,
    /// 监听端口
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// 是否允许跨域访问
    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: default_web_bind_address(),
            port: default_web_port(),
            cors_enabled: default_cors_enabled(),
        }
    }
}

impl WebConfig {
    /// 获取监听地址字符串
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

// 默认值函数
fn default_interval() -> u64 {
    300 // 5分钟
}
fn default_min_interval() -> u64 {
    1
}
fn default_max_interval() -> u64 {
    86_400
}
fn default_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    "URL-Pinger/1.0".to_string()
}
fn default_retry_attempts() -> u32 {
    2
}
fn default_retry_delay() -> u64 {
    2
}
fn default_max_urls() -> usize {
    10
}
fn default_history_capacity() -> usize {
    10
}
fn default_status_history_len() -> usize {
    3
}
fn default_stop_check_millis() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}

/// 默认 Web 服务器绑定地址
fn default_web_bind_address() -> String {
    "0.0.0.0".to_string()
}

/// 默认 Web 服务器端口
fn default_web_port() -> u16 {
    8000
}

fn default_cors_enabled() -> bool {
    true
}

/// 探测间隔上限（30天）
pub const MAX_INTERVAL_SECONDS: u64 = 30 * 86_400;

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    let global = &config.global;

    if global.request_timeout_seconds == 0 {
        return Err("请求超时时间不能为0".to_string());
    }

    if global.min_interval_seconds == 0 {
        return Err("最小探测间隔不能为0".to_string());
    }

    if global.max_interval_seconds > MAX_INTERVAL_SECONDS {
        return Err(format!(
            "最大探测间隔 {} 不能超过 {} 秒",
            global.max_interval_seconds, MAX_INTERVAL_SECONDS
        ));
    }

    if global.min_interval_seconds > global.max_interval_seconds {
        return Err(format!(
            "最小探测间隔 {} 不能大于最大探测间隔 {}",
            global.min_interval_seconds, global.max_interval_seconds
        ));
    }

    if !(global.min_interval_seconds..=global.max_interval_seconds)
        .contains(&global.default_interval_seconds)
    {
        return Err(format!(
            "默认探测间隔 {} 超出范围 [{}, {}]",
            global.default_interval_seconds,
            global.min_interval_seconds,
            global.max_interval_seconds
        ));
    }

    if global.max_urls_per_task == 0 {
        return Err("单个任务的最大URL数不能为0".to_string());
    }

    if global.history_capacity == 0 {
        return Err("历史结果容量不能为0".to_string());
    }

    if global.status_history_len == 0 || global.status_history_len > global.history_capacity {
        return Err(format!(
            "状态查询结果数 {} 必须在 1 到历史容量 {} 之间",
            global.status_history_len, global.history_capacity
        ));
    }

    if global.stop_check_millis == 0 {
        return Err("停止检查粒度不能为0".to_string());
    }

    if global.user_agent.trim().is_empty() {
        return Err("User-Agent 不能为空".to_string());
    }

    // 验证日志级别
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&global.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            global.log_level, valid_log_levels
        ));
    }

    if global.default_urls.len() > global.max_urls_per_task {
        return Err(format!(
            "默认URL数量 {} 超过单个任务上限 {}",
            global.default_urls.len(),
            global.max_urls_per_task
        ));
    }

    for url in &global.default_urls {
        crate::probe::validate_url(url).map_err(|e| format!("默认URL无效: {e}"))?;
    }

    // 验证Web配置
    if config.web.port == 0 {
        return Err("无效的Web服务器端口: 0，端口不能为0".to_string());
    }

    if config.web.bind_address.is_empty() {
        return Err("Web服务器绑定地址不能为空".to_string());
    }

    Ok(())
}
