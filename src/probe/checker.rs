//! HTTP探测器实现
//!
//! 对单个URL发起GET请求，带超时、重试和结果分类

use crate::config::GlobalConfig;
use crate::error::RegistryError;
use crate::probe::outcome::{OutcomeKind, ProbeOutcome};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// 探测器trait，定义探测接口
#[async_trait]
pub trait Prober: Send + Sync {
    /// 使用默认超时与重试次数探测
    ///
    /// # 参数
    /// * `url` - 目标URL
    ///
    /// # 返回
    /// * `ProbeOutcome` - 最后一次尝试的结果
    async fn probe(&self, url: &str) -> ProbeOutcome;

    /// 使用指定超时与重试次数探测
    ///
    /// # 参数
    /// * `url` - 目标URL
    /// * `timeout_duration` - 单次请求超时时间
    /// * `max_retries` - 仅对超时/连接失败追加的最大重试次数
    ///
    /// # 返回
    /// * `ProbeOutcome` - 最后一次尝试的结果
    async fn probe_with(
        &self,
        url: &str,
        timeout_duration: Duration,
        max_retries: u32,
    ) -> ProbeOutcome;
}

/// 探测参数
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    /// 单次请求超时时间
    pub timeout: Duration,
    /// User-Agent
    pub user_agent: String,
    /// 最大重试次数
    pub max_retries: u32,
    /// 重试间隔
    pub retry_delay: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: "URL-Pinger/1.0".to_string(),
            max_retries: 2,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl From<&GlobalConfig> for ProbeSettings {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.request_timeout_seconds),
            user_agent: config.user_agent.clone(),
            max_retries: config.retry_attempts,
            retry_delay: Duration::from_secs(config.retry_delay_seconds),
        }
    }
}

/// 基于 reqwest 的HTTP探测器
pub struct HttpProbe {
    /// HTTP客户端
    client: Client,
    /// 探测参数
    settings: ProbeSettings,
}

impl HttpProbe {
    /// 创建新的HTTP探测器
    ///
    /// # 参数
    /// * `settings` - 探测参数
    ///
    /// # 返回
    /// * `Result<Self>` - 探测器实例
    pub fn new(settings: ProbeSettings) -> crate::error::Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("创建HTTP客户端失败: {e}"))?;

        Ok(Self { client, settings })
    }

    /// 获取探测参数
    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// 执行单次GET请求
    async fn perform_attempt(&self, url: &str, timeout_duration: Duration) -> ProbeOutcome {
        let start_time = Instant::now();

        match timeout(timeout_duration, self.client.get(url).send()).await {
            Ok(Ok(response)) => {
                ProbeOutcome::from_response(url, response.status().as_u16(), start_time.elapsed())
            }
            Ok(Err(e)) => {
                let (kind, detail) = classify_request_error(&e);
                ProbeOutcome::failure(url, kind, detail)
            }
            Err(_) => ProbeOutcome::failure(
                url,
                OutcomeKind::Timeout,
                format!("Request timeout after {}ms", timeout_duration.as_millis()),
            ),
        }
    }
}

#[async_trait]
impl Prober for HttpProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        self.probe_with(url, self.settings.timeout, self.settings.max_retries)
            .await
    }

    async fn probe_with(
        &self,
        url: &str,
        timeout_duration: Duration,
        max_retries: u32,
    ) -> ProbeOutcome {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = self.perform_attempt(url, timeout_duration).await;

            if !outcome.kind.is_retryable() || attempt > max_retries {
                return outcome.with_attempts(attempt);
            }

            debug!(
                "探测 {} 失败（{}），{}ms 后重试 ({}/{})",
                url,
                outcome.kind,
                self.settings.retry_delay.as_millis(),
                attempt,
                max_retries + 1
            );
            tokio::time::sleep(self.settings.retry_delay).await;
        }
    }
}

/// 将 reqwest 错误归类为探测结果类型
fn classify_request_error(error: &reqwest::Error) -> (OutcomeKind, String) {
    let chain = error_chain_text(error);
    // 只在底层错误链上匹配关键字，避免被URL本身的内容误导
    let lowered = std::error::Error::source(error)
        .map(error_chain_text)
        .unwrap_or_default()
        .to_lowercase();

    if error.is_timeout() {
        (OutcomeKind::Timeout, "Request timeout".to_string())
    } else if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("ssl")
    {
        (OutcomeKind::TlsError, format!("SSL/TLS certificate error: {chain}"))
    } else if lowered.contains("dns") || lowered.contains("resolve") {
        (OutcomeKind::ConnectionError, format!("DNS resolution failed: {chain}"))
    } else if error.is_connect() || error.is_request() {
        (OutcomeKind::ConnectionError, format!("Connection failed: {chain}"))
    } else {
        (OutcomeKind::UnknownError, format!("Request failed: {chain}"))
    }
}

/// 拼接错误链上的所有描述
fn error_chain_text(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(err) = source {
        text.push_str(": ");
        text.push_str(&err.to_string());
        source = err.source();
    }
    text
}

/// 校验URL：必须可解析，且为 http/https 并带主机名
pub fn validate_url(url: &str) -> Result<Url, RegistryError> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| RegistryError::invalid(format!("无效的URL '{url}': {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RegistryError::invalid(format!(
            "URL '{url}' 的协议必须是 http 或 https"
        )));
    }

    if parsed.host_str().map_or(true, |host| host.is_empty()) {
        return Err(RegistryError::invalid(format!("URL '{url}' 缺少主机名")));
    }

    Ok(parsed)
}
