//! 任务执行器
//!
//! 每个任务对应一个执行器：按顺序探测URL、写入历史、可中断地休眠，
//! 直到任务被请求停止，然后把自己从注册表中移除

use crate::probe::{OutcomeKind, ProbeOutcome, Prober};
use crate::task::ping_task::PingTask;
use crate::task::registry::TaskMap;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// 单个任务的执行器
pub(crate) struct TaskRunner {
    task: Arc<PingTask>,
    prober: Arc<dyn Prober>,
    tasks: TaskMap,
    /// 休眠期间检查停止标志的粒度
    stop_check: Duration,
}

impl TaskRunner {
    pub(crate) fn new(
        task: Arc<PingTask>,
        prober: Arc<dyn Prober>,
        tasks: TaskMap,
        stop_check: Duration,
    ) -> Self {
        Self {
            task,
            prober,
            tasks,
            stop_check,
        }
    }

    /// 执行器入口
    ///
    /// 主循环无论正常结束还是 panic，任务都会被标记为终止并从注册表中移除
    pub(crate) async fn run(self) {
        let task_id = self.task.id();

        if let Err(panic) = AssertUnwindSafe(self.drive()).catch_unwind().await {
            error!("探测任务 {} 异常退出: {}", task_id, panic_message(panic.as_ref()));
        }

        self.task.mark_terminated().await;
        self.tasks.write().await.remove(&task_id);
        info!("探测任务已终止并注销: {}", task_id);
    }

    /// 执行器主循环
    async fn drive(&self) {
        let task_id = self.task.id();

        if !self.task.mark_running().await {
            debug!("任务 {} 在启动前已被停止", task_id);
            return;
        }

        info!(
            "启动探测任务: {}，URL数量: {}，间隔: {}s",
            task_id,
            self.task.urls().len(),
            self.task.interval().as_secs()
        );

        while self.task.is_running().await {
            self.run_cycle().await;

            if !self.task.is_running().await {
                break;
            }
            self.sleep_interruptibly().await;
        }
    }

    /// 按顺序探测一轮URL，每个URL之前检查停止标志
    async fn run_cycle(&self) {
        for url in self.task.urls() {
            if !self.task.is_running().await {
                debug!("任务 {} 在本轮中途停止", self.task.id());
                return;
            }

            let outcome = self.probe_guarded(url).await;

            if outcome.kind.is_success() {
                debug!(
                    "探测成功: {} [{}] 状态码: {:?} 延迟: {:?}ms",
                    url,
                    self.task.id(),
                    outcome.status_code,
                    outcome.latency_ms()
                );
            } else {
                warn!(
                    "探测失败: {} [{}] {}: {}",
                    url,
                    self.task.id(),
                    outcome.kind,
                    outcome.detail.as_deref().unwrap_or("N/A")
                );
            }

            self.task.record(outcome).await;
        }
    }

    /// 执行一次探测，探测过程中的 panic 转换为 UnknownError 结果
    async fn probe_guarded(&self, url: &str) -> ProbeOutcome {
        match AssertUnwindSafe(self.prober.probe(url)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("探测 {} 时发生异常 [{}]: {}", url, self.task.id(), message);
                ProbeOutcome::failure(url, OutcomeKind::UnknownError, format!("Probe panicked: {message}"))
            }
        }
    }

    /// 休眠一个探测间隔，每隔 `stop_check` 或收到停止信号时检查标志
    async fn sleep_interruptibly(&self) {
        let mut remaining = self.task.interval();

        while !remaining.is_zero() {
            let step = remaining.min(self.stop_check);
            let started = Instant::now();
            tokio::select! {
                _ = tokio::time::sleep(step) => {}
                _ = self.task.stop_requested() => {}
            }

            if !self.task.is_running().await {
                return;
            }
            remaining = remaining.saturating_sub(started.elapsed());
        }
    }
}

/// 提取 panic 负载中的文本
fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
