//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// URL Pinger 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum PingerError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 任务注册表相关错误
    #[error("任务错误: {0}")]
    Registry(#[from] RegistryError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 任务注册表错误类型
///
/// 只描述调用方输入的问题；探测失败是记录在历史中的数据，不是错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// 调用参数无效（空URL列表、间隔为0、URL数量超限、URL格式错误）
    #[error("参数无效: {0}")]
    InvalidArgument(String),

    /// 任务不存在
    #[error("任务不存在: {id}")]
    NotFound { id: String },
}

impl RegistryError {
    /// 构造参数无效错误
    pub fn invalid(message: impl Into<String>) -> Self {
        RegistryError::InvalidArgument(message.into())
    }

    /// 构造任务不存在错误
    pub fn not_found(id: impl ToString) -> Self {
        RegistryError::NotFound { id: id.to_string() }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, PingerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::invalid("URL列表不能为空");
        assert_eq!(err.to_string(), "参数无效: URL列表不能为空");

        let err = RegistryError::not_found("task_7");
        assert_eq!(err.to_string(), "任务不存在: task_7");
    }

    #[test]
    fn test_error_conversion() {
        let err: PingerError = ConfigError::FileNotFound {
            path: "/tmp/none.toml".to_string(),
        }
        .into();
        assert!(matches!(err, PingerError::Config(_)));
        assert!(err.to_string().contains("/tmp/none.toml"));

        let err: PingerError = RegistryError::not_found("task_1").into();
        assert!(matches!(
            err,
            PingerError::Registry(RegistryError::NotFound { .. })
        ));
    }
}
