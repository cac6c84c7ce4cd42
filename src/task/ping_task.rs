//! 探测任务
//!
//! 一个任务拥有固定的URL列表、探测间隔、运行状态和结果历史

use crate::error::RegistryError;
use crate::probe::ProbeOutcome;
use crate::task::history::ResultHistory;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};

/// 任务ID，由注册表单调分配，形如 `task_1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task_{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = RegistryError;

    /// 同时接受 `task_7` 和 `7`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("task_").unwrap_or(trimmed);
        digits
            .parse::<u64>()
            .map(TaskId)
            .map_err(|_| RegistryError::not_found(trimmed))
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 任务生命周期：Created → Running → Stopping → Terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// 已注册，执行器尚未开始
    Created,
    /// 执行器正在循环探测
    Running,
    /// 已请求停止，等待执行器退出
    Stopping,
    /// 执行器已退出
    Terminated,
}

impl TaskState {
    /// 运行标志：停止请求之前始终为 true
    pub fn is_running(&self) -> bool {
        matches!(self, TaskState::Created | TaskState::Running)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Created => write!(f, "已创建"),
            TaskState::Running => write!(f, "运行中"),
            TaskState::Stopping => write!(f, "停止中"),
            TaskState::Terminated => write!(f, "已终止"),
        }
    }
}

/// 任务的可变部分，由任务自身的锁保护
#[derive(Debug)]
struct TaskInner {
    state: TaskState,
    history: ResultHistory,
}

/// 探测任务
#[derive(Debug)]
pub struct PingTask {
    id: TaskId,
    urls: Vec<String>,
    interval: Duration,
    started_at: DateTime<Utc>,
    inner: RwLock<TaskInner>,
    /// 停止信号，唤醒正在休眠的执行器
    stop_signal: Notify,
}

impl PingTask {
    /// 创建新任务，初始状态为 Created
    pub fn new(id: TaskId, urls: Vec<String>, interval: Duration, history_capacity: usize) -> Self {
        Self {
            id,
            urls,
            interval,
            started_at: Utc::now(),
            inner: RwLock::new(TaskInner {
                state: TaskState::Created,
                history: ResultHistory::new(history_capacity),
            }),
            stop_signal: Notify::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub async fn state(&self) -> TaskState {
        self.inner.read().await.state
    }

    pub async fn is_running(&self) -> bool {
        self.inner.read().await.state.is_running()
    }

    /// 请求停止
    ///
    /// # 返回
    /// * `bool` - 本次调用是否把运行标志从 true 改为 false
    pub async fn request_stop(&self) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.state.is_running() {
            return false;
        }
        inner.state = TaskState::Stopping;
        drop(inner);

        // notify_one 会保留许可，执行器下次等待时立即返回
        self.stop_signal.notify_one();
        true
    }

    /// 执行器启动时调用：Created → Running
    ///
    /// 如果启动前已被请求停止则返回 false
    pub(crate) async fn mark_running(&self) -> bool {
        let mut inner = self.inner.write().await;
        if inner.state == TaskState::Created {
            inner.state = TaskState::Running;
        }
        inner.state == TaskState::Running
    }

    /// 执行器退出时调用
    pub(crate) async fn mark_terminated(&self) {
        self.inner.write().await.state = TaskState::Terminated;
    }

    /// 等待停止信号
    pub(crate) async fn stop_requested(&self) {
        self.stop_signal.notified().await
    }

    /// 记录一次探测结果
    pub async fn record(&self, outcome: ProbeOutcome) {
        self.inner.write().await.history.push(outcome);
    }

    /// 历史中的结果条数
    pub async fn history_len(&self) -> usize {
        self.inner.read().await.history.len()
    }

    /// 生成不可变快照，包含最近 `recent` 条结果
    pub async fn snapshot(&self, recent: usize) -> TaskSnapshot {
        let inner = self.inner.read().await;
        TaskSnapshot {
            task_id: self.id,
            urls: self.urls.clone(),
            interval_seconds: self.interval.as_secs(),
            running: inner.state.is_running(),
            state: inner.state,
            started_at: self.started_at,
            last_results: inner.history.snapshot(recent),
        }
    }
}

/// 任务状态快照，与执行器的后续写入相互隔离
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    /// 任务ID
    pub task_id: TaskId,
    /// URL列表
    pub urls: Vec<String>,
    /// 探测间隔（秒）
    #[serde(rename = "interval")]
    pub interval_seconds: u64,
    /// 运行标志
    #[serde(rename = "active")]
    pub running: bool,
    /// 生命周期状态
    pub state: TaskState,
    /// 创建时间
    pub started_at: DateTime<Utc>,
    /// 最近的探测结果（按时间先后）
    pub last_results: Vec<ProbeOutcome>,
}
