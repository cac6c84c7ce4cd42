//! 探测结果数据结构
//!
//! 定义单次探测的结果类型和分类枚举

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// 错误详情的最大字符数
pub const MAX_DETAIL_CHARS: usize = 200;

/// 探测结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// 收到 2xx 响应
    Success,
    /// 收到非 2xx 响应
    HttpError,
    /// 超时未收到响应
    Timeout,
    /// 传输层/DNS/连接失败
    ConnectionError,
    /// 证书校验失败
    TlsError,
    /// 其他未知错误
    UnknownError,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "成功"),
            OutcomeKind::HttpError => write!(f, "HTTP错误"),
            OutcomeKind::Timeout => write!(f, "超时"),
            OutcomeKind::ConnectionError => write!(f, "连接失败"),
            OutcomeKind::TlsError => write!(f, "TLS错误"),
            OutcomeKind::UnknownError => write!(f, "未知错误"),
        }
    }
}

impl OutcomeKind {
    /// 判断是否成功
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeKind::Success)
    }

    /// 判断是否属于可重试的瞬时故障
    ///
    /// 非 2xx 响应是确定的结果，不重试。
    pub fn is_retryable(&self) -> bool {
        matches!(self, OutcomeKind::Timeout | OutcomeKind::ConnectionError)
    }

    /// 是否携带了服务端响应（状态码与延迟）
    pub fn has_response(&self) -> bool {
        matches!(self, OutcomeKind::Success | OutcomeKind::HttpError)
    }
}

/// 单次探测结果（不可变值）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// 结果ID
    pub id: Uuid,
    /// 探测的URL
    pub url: String,
    /// 探测完成时间
    pub timestamp: DateTime<Utc>,
    /// 结果分类
    pub kind: OutcomeKind,
    /// HTTP状态码（仅 Success/HttpError）
    pub status_code: Option<u16>,
    /// 响应延迟（仅收到响应时）
    #[serde(with = "optional_duration_millis", rename = "latency_ms")]
    pub latency: Option<Duration>,
    /// 简短的错误描述
    pub detail: Option<String>,
    /// 产生该结果所用的尝试次数
    pub attempts: u32,
}

impl ProbeOutcome {
    fn new(url: impl Into<String>, kind: OutcomeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            timestamp: Utc::now(),
            kind,
            status_code: None,
            latency: None,
            detail: None,
            attempts: 1,
        }
    }

    /// 根据收到的HTTP响应创建结果，状态码在 [200,300) 视为成功
    pub fn from_response(url: impl Into<String>, status_code: u16, latency: Duration) -> Self {
        let kind = if (200..300).contains(&status_code) {
            OutcomeKind::Success
        } else {
            OutcomeKind::HttpError
        };

        let mut outcome = Self::new(url, kind);
        outcome.status_code = Some(status_code);
        outcome.latency = Some(latency);

        if kind == OutcomeKind::HttpError {
            let reason = reqwest::StatusCode::from_u16(status_code)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown");
            outcome = outcome.with_detail(format!("HTTP {status_code} {reason}"));
        }

        outcome
    }

    /// 创建未收到响应的失败结果
    pub fn failure(url: impl Into<String>, kind: OutcomeKind, detail: impl Into<String>) -> Self {
        Self::new(url, kind).with_detail(detail)
    }

    /// 设置错误描述（超长时截断）
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(truncate_detail(&detail.into()));
        self
    }

    /// 设置尝试次数
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// 获取延迟（毫秒）
    pub fn latency_ms(&self) -> Option<u64> {
        self.latency.map(|d| d.as_millis() as u64)
    }

    /// 转换为JSON字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} {}", self.kind, self.url, self.timestamp.format("%Y-%m-%d %H:%M:%S"))?;
        if let Some(code) = self.status_code {
            write!(f, " 状态码: {code}")?;
        }
        if let Some(ms) = self.latency_ms() {
            write!(f, " 延迟: {ms}ms")?;
        }
        if let Some(ref detail) = self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// 按字符边界截断错误描述
fn truncate_detail(detail: &str) -> String {
    if detail.chars().count() <= MAX_DETAIL_CHARS {
        return detail.to_string();
    }
    let mut truncated: String = detail.chars().take(MAX_DETAIL_CHARS).collect();
    truncated.push('…');
    truncated
}

/// Option<Duration> 按毫秒序列化
mod optional_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
