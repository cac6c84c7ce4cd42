//! 任务注册表
//!
//! 进程内唯一的任务目录：创建、查询、停止任务，并提供单次探测入口

use crate::config::GlobalConfig;
use crate::error::RegistryError;
use crate::probe::{validate_url, HttpProbe, ProbeOutcome, ProbeSettings, Prober};
use crate::task::ping_task::{PingTask, TaskId, TaskSnapshot, TaskState};
use crate::task::runner::TaskRunner;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// 任务表，执行器持有其引用以便终止时注销自己
pub(crate) type TaskMap = Arc<RwLock<HashMap<TaskId, TaskEntry>>>;

/// 注册表中的一项
pub(crate) struct TaskEntry {
    task: Arc<PingTask>,
    /// 执行器句柄，关闭时被取走并等待
    handle: Option<JoinHandle<()>>,
}

impl TaskEntry {
    pub(crate) fn new(task: Arc<PingTask>, handle: JoinHandle<()>) -> Self {
        Self {
            task,
            handle: Some(handle),
        }
    }
}

/// 任务创建与执行的限制参数
#[derive(Debug, Clone, PartialEq)]
pub struct TaskLimits {
    /// 单个任务最多包含的URL数
    pub max_urls: usize,
    /// 最小探测间隔
    pub min_interval: Duration,
    /// 最大探测间隔
    pub max_interval: Duration,
    /// 每个任务的历史容量
    pub history_capacity: usize,
    /// 状态查询返回的最近结果数
    pub status_window: usize,
    /// 休眠期间检查停止标志的粒度
    pub stop_check: Duration,
}

impl Default for TaskLimits {
    fn default() -> Self {
        Self::from(&GlobalConfig::default())
    }
}

impl From<&GlobalConfig> for TaskLimits {
    fn from(config: &GlobalConfig) -> Self {
        Self {
            max_urls: config.max_urls_per_task,
            min_interval: Duration::from_secs(config.min_interval_seconds),
            max_interval: Duration::from_secs(config.max_interval_seconds),
            history_capacity: config.history_capacity,
            status_window: config.status_history_len,
            stop_check: Duration::from_millis(config.stop_check_millis),
        }
    }
}

/// 任务创建成功后的回执
#[derive(Debug, Clone, Serialize)]
pub struct StartedTask {
    /// 新分配的任务ID
    pub task_id: TaskId,
    /// 任务URL列表
    pub urls: Vec<String>,
    /// 实际生效的探测间隔
    #[serde(serialize_with = "serialize_secs")]
    pub interval: Duration,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_secs())
}

/// 任务注册表
pub struct TaskRegistry {
    /// 任务表
    tasks: TaskMap,
    /// 最后分配的任务ID，只增不减
    last_id: AtomicU64,
    /// 探测器
    prober: Arc<dyn Prober>,
    /// 限制参数
    limits: TaskLimits,
}

impl TaskRegistry {
    /// 创建空的任务注册表
    ///
    /// # 参数
    /// * `prober` - 所有任务共用的探测器
    /// * `limits` - 任务限制参数
    pub fn new(prober: Arc<dyn Prober>, limits: TaskLimits) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            last_id: AtomicU64::new(0),
            prober,
            limits,
        }
    }

    /// 按全局配置创建使用 HTTP 探测器的注册表
    pub fn from_config(config: &GlobalConfig) -> crate::error::Result<Self> {
        let prober = HttpProbe::new(ProbeSettings::from(config))?;
        Ok(Self::new(Arc::new(prober), TaskLimits::from(config)))
    }

    /// 获取限制参数
    pub fn limits(&self) -> &TaskLimits {
        &self.limits
    }

    /// 创建并启动任务
    ///
    /// 校验通过后立即返回，不等待第一轮探测。间隔超出 [min, max] 时被截断。
    ///
    /// # 参数
    /// * `urls` - URL列表，不能为空且不能超过上限
    /// * `interval` - 探测间隔，必须大于0
    ///
    /// # 返回
    /// * `Result<StartedTask, RegistryError>` - 任务回执或 InvalidArgument
    pub async fn start_task(
        &self,
        urls: Vec<String>,
        interval: Duration,
    ) -> Result<StartedTask, RegistryError> {
        let urls = self.validate_urls(urls)?;
        let interval = self.effective_interval(interval)?;

        let id = TaskId::new(self.last_id.fetch_add(1, Ordering::SeqCst) + 1);
        let task = Arc::new(PingTask::new(
            id,
            urls.clone(),
            interval,
            self.limits.history_capacity,
        ));
        let runner = TaskRunner::new(
            Arc::clone(&task),
            Arc::clone(&self.prober),
            Arc::clone(&self.tasks),
            self.limits.stop_check,
        );

        // 持有写锁直到登记完成，执行器的注销操作只能发生在登记之后
        {
            let mut tasks = self.tasks.write().await;
            let handle = tokio::spawn(runner.run());
            tasks.insert(id, TaskEntry::new(task, handle));
        }

        info!(
            "创建探测任务 {}: {} 个URL，间隔 {}s",
            id,
            urls.len(),
            interval.as_secs()
        );

        Ok(StartedTask {
            task_id: id,
            urls,
            interval,
        })
    }

    /// 请求停止任务，不等待执行器退出
    ///
    /// 执行器在下一个检查点观察到标志后自行注销
    pub async fn stop_task(&self, id: TaskId) -> Result<(), RegistryError> {
        let task = self.find(id).await?;
        if task.request_stop().await {
            info!("已请求停止任务: {}", id);
        }
        Ok(())
    }

    /// 请求停止所有任务
    ///
    /// # 返回
    /// * `usize` - 本次调用由运行变为停止的任务数
    pub async fn stop_all(&self) -> usize {
        let tasks = self.live_tasks().await;

        let mut stopped = 0;
        for task in tasks {
            if task.request_stop().await {
                stopped += 1;
            }
        }

        info!("已请求停止 {} 个任务", stopped);
        stopped
    }

    /// 获取所有已登记任务的快照，按ID排序
    pub async fn get_status(&self) -> Vec<TaskSnapshot> {
        let mut snapshots = Vec::new();
        for task in self.live_tasks().await {
            let snapshot = task.snapshot(self.limits.status_window).await;
            if snapshot.state != TaskState::Terminated {
                snapshots.push(snapshot);
            }
        }
        snapshots.sort_by_key(|s| s.task_id);
        snapshots
    }

    /// 获取单个任务的快照，已终止但尚未注销的任务视为不存在
    pub async fn get_task(&self, id: TaskId) -> Result<TaskSnapshot, RegistryError> {
        let task = self.find(id).await?;
        let snapshot = task.snapshot(self.limits.status_window).await;
        if snapshot.state == TaskState::Terminated {
            return Err(RegistryError::not_found(id));
        }
        Ok(snapshot)
    }

    /// 获取任务最近 `n` 条结果，按时间先后排列
    pub async fn recent_results(
        &self,
        id: TaskId,
        n: usize,
    ) -> Result<Vec<ProbeOutcome>, RegistryError> {
        let task = self.find(id).await?;
        Ok(task.snapshot(n).await.last_results)
    }

    /// 对单个URL执行一次探测，不经过任务机制
    pub async fn ping_once(&self, url: &str) -> Result<ProbeOutcome, RegistryError> {
        validate_url(url)?;
        Ok(self.prober.probe(url.trim()).await)
    }

    /// 当前登记的任务数
    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// 停止所有任务并等待执行器退出
    ///
    /// # 参数
    /// * `grace` - 最长等待时间，超时后强制中止剩余执行器
    pub async fn shutdown(&self, grace: Duration) -> usize {
        let stopped = self.stop_all().await;

        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.write().await;
            tasks
                .values_mut()
                .filter_map(|entry| entry.handle.take())
                .collect()
        };
        let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        if tokio::time::timeout(grace, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!("等待任务退出超时，强制中止剩余 {} 个执行器", abort_handles.len());
            for handle in abort_handles {
                handle.abort();
            }
            self.tasks.write().await.clear();
        }

        info!("任务注册表已关闭");
        stopped
    }

    /// 校验并规范化URL列表
    fn validate_urls(&self, urls: Vec<String>) -> Result<Vec<String>, RegistryError> {
        if urls.is_empty() {
            return Err(RegistryError::invalid("URL列表不能为空"));
        }

        if urls.len() > self.limits.max_urls {
            return Err(RegistryError::invalid(format!(
                "URL数量 {} 超过上限 {}",
                urls.len(),
                self.limits.max_urls
            )));
        }

        urls.into_iter()
            .map(|url| validate_url(&url).map(|_| url.trim().to_string()))
            .collect()
    }

    /// 校验间隔并截断到允许范围
    fn effective_interval(&self, interval: Duration) -> Result<Duration, RegistryError> {
        if interval.is_zero() {
            return Err(RegistryError::invalid("探测间隔必须大于0"));
        }

        let clamped = interval.clamp(self.limits.min_interval, self.limits.max_interval);
        if clamped != interval {
            warn!(
                "探测间隔 {:?} 超出范围 [{:?}, {:?}]，已调整为 {:?}",
                interval, self.limits.min_interval, self.limits.max_interval, clamped
            );
        }
        Ok(clamped)
    }

    async fn find(&self, id: TaskId) -> Result<Arc<PingTask>, RegistryError> {
        self.tasks
            .read()
            .await
            .get(&id)
            .map(|entry| Arc::clone(&entry.task))
            .ok_or_else(|| RegistryError::not_found(id))
    }

    /// 复制出当前所有任务的引用，随后释放表锁
    async fn live_tasks(&self) -> Vec<Arc<PingTask>> {
        self.tasks
            .read()
            .await
            .values()
            .map(|entry| Arc::clone(&entry.task))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::OutcomeKind;
    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    /// 不访问网络的探测器
    struct StubProber;

    #[async_trait]
    impl Prober for StubProber {
        async fn probe(&self, url: &str) -> ProbeOutcome {
            ProbeOutcome::from_response(url, 200, Duration::from_millis(1))
        }

        async fn probe_with(&self, url: &str, _timeout: Duration, _retries: u32) -> ProbeOutcome {
            self.probe(url).await
        }
    }

    fn test_limits() -> TaskLimits {
        TaskLimits {
            max_urls: 3,
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(60),
            history_capacity: 5,
            status_window: 3,
            stop_check: Duration::from_millis(10),
        }
    }

    fn registry() -> TaskRegistry {
        TaskRegistry::new(Arc::new(StubProber), test_limits())
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    async fn wait_until_empty(registry: &TaskRegistry) {
        for _ in 0..300 {
            if registry.get_status().await.is_empty() && registry.task_count().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("任务未能在预期时间内注销");
    }

    #[tokio::test]
    async fn test_start_task_validation() {
        let registry = registry();

        let err = assert_err!(registry.start_task(vec![], Duration::from_secs(60)).await);
        assert!(matches!(err, RegistryError::InvalidArgument(_)));

        let err = assert_err!(
            registry
                .start_task(urls(&["https://x"]), Duration::ZERO)
                .await
        );
        assert!(matches!(err, RegistryError::InvalidArgument(_)));

        let err = assert_err!(
            registry
                .start_task(
                    urls(&["https://a", "https://b", "https://c", "https://d"]),
                    Duration::from_secs(5)
                )
                .await
        );
        assert!(matches!(err, RegistryError::InvalidArgument(_)));

        let err = assert_err!(
            registry
                .start_task(urls(&["https://a", "not-a-url"]), Duration::from_secs(5))
                .await
        );
        assert!(err.to_string().contains("not-a-url"));

        assert_eq!(registry.task_count().await, 0);
    }

    #[tokio::test]
    async fn test_start_task_returns_immediately_with_echo() {
        let registry = registry();
        let started = assert_ok!(
            registry
                .start_task(urls(&["https://a", "https://b"]), Duration::from_secs(5))
                .await
        );

        assert_eq!(started.task_id, TaskId::new(1));
        assert_eq!(started.urls, urls(&["https://a", "https://b"]));
        assert_eq!(started.interval, Duration::from_secs(5));
        assert_eq!(registry.task_count().await, 1);

        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_interval_is_clamped() {
        let registry = registry();
        let started = registry
            .start_task(urls(&["https://a"]), Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(started.interval, Duration::from_secs(60));

        let started = registry
            .start_task(urls(&["https://a"]), Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(started.interval, Duration::from_millis(10));

        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_ids_are_never_reused() {
        let registry = registry();

        let first = registry
            .start_task(urls(&["https://a"]), Duration::from_millis(20))
            .await
            .unwrap();
        registry.stop_task(first.task_id).await.unwrap();
        wait_until_empty(&registry).await;

        let second = registry
            .start_task(urls(&["https://a", "https://b"]), Duration::from_millis(20))
            .await
            .unwrap();
        assert_ne!(first.task_id, second.task_id);
        assert!(second.task_id > first.task_id);

        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_stop_task() {
        let registry = registry();

        let err = assert_err!(registry.stop_task(TaskId::new(99)).await);
        assert_eq!(err, RegistryError::not_found("task_99"));

        let started = registry
            .start_task(urls(&["https://a"]), Duration::from_millis(20))
            .await
            .unwrap();
        assert_ok!(registry.stop_task(started.task_id).await);
        // 重复停止仍然返回确认
        let _ = registry.stop_task(started.task_id).await;

        wait_until_empty(&registry).await;
        assert!(matches!(
            registry.stop_task(started.task_id).await,
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_stop_all() {
        let registry = registry();
        assert_eq!(registry.stop_all().await, 0);

        for _ in 0..3 {
            registry
                .start_task(urls(&["https://a"]), Duration::from_millis(50))
                .await
                .unwrap();
        }
        assert_eq!(registry.get_status().await.len(), 3);

        assert_eq!(registry.stop_all().await, 3);
        wait_until_empty(&registry).await;
        assert_eq!(registry.stop_all().await, 0);
    }

    #[tokio::test]
    async fn test_status_snapshots() {
        let registry = registry();
        assert!(registry.get_status().await.is_empty());

        let started = registry
            .start_task(urls(&["https://a", "https://b"]), Duration::from_millis(10))
            .await
            .unwrap();

        // 等待历史写满
        for _ in 0..300 {
            let snapshot = registry.get_task(started.task_id).await.unwrap();
            if snapshot.last_results.len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let status = registry.get_status().await;
        assert_eq!(status.len(), 1);
        let snapshot = &status[0];
        assert_eq!(snapshot.task_id, started.task_id);
        assert!(snapshot.running);
        assert_eq!(snapshot.last_results.len(), 3);
        assert!(snapshot
            .last_results
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));

        assert!(matches!(
            registry.get_task(TaskId::new(1234)).await,
            Err(RegistryError::NotFound { .. })
        ));

        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_recent_results_window() {
        let registry = registry();
        let started = registry
            .start_task(urls(&["https://a", "https://b"]), Duration::from_millis(10))
            .await
            .unwrap();

        for _ in 0..300 {
            if registry.recent_results(started.task_id, 5).await.unwrap().len() == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // 历史容量为5，窗口更大时也只返回已有的条数
        let results = registry.recent_results(started.task_id, 50).await.unwrap();
        assert_eq!(results.len(), 5);

        registry.shutdown(Duration::from_secs(1)).await;
        assert!(registry.recent_results(started.task_id, 5).await.is_err());
    }

    #[tokio::test]
    async fn test_ping_once() {
        let registry = registry();

        let outcome = registry.ping_once("https://example.com").await.unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Success);
        assert_eq!(outcome.url, "https://example.com");

        assert!(matches!(
            registry.ping_once("nonsense").await,
            Err(RegistryError::InvalidArgument(_))
        ));
        assert_eq!(registry.task_count().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_runners() {
        let registry = registry();
        for _ in 0..2 {
            registry
                .start_task(urls(&["https://a"]), Duration::from_secs(30))
                .await
                .unwrap();
        }

        let stopped = registry.shutdown(Duration::from_secs(2)).await;
        assert_eq!(stopped, 2);
        assert_eq!(registry.task_count().await, 0);
    }

    #[tokio::test]
    async fn test_terminated_task_is_hidden_before_removal() {
        let registry = registry();
        let id = TaskId::new(42);
        let task = Arc::new(PingTask::new(id, urls(&["https://a"]), Duration::from_secs(1), 5));
        task.mark_terminated().await;
        registry
            .tasks
            .write()
            .await
            .insert(id, TaskEntry::new(task, tokio::spawn(async {})));

        assert_eq!(registry.task_count().await, 1);
        assert!(registry.get_status().await.is_empty());
        let err = assert_err!(registry.get_task(id).await);
        assert_eq!(err, RegistryError::not_found(id));
    }

    #[tokio::test]
    async fn test_huge_interval_task_still_stops_and_deregisters() {
        let limits = TaskLimits {
            max_interval: Duration::from_secs(u64::MAX),
            ..test_limits()
        };
        let registry = TaskRegistry::new(Arc::new(StubProber), limits);

        let started = registry
            .start_task(urls(&["https://a"]), Duration::from_secs(u64::MAX / 2))
            .await
            .unwrap();
        assert_eq!(started.interval, Duration::from_secs(u64::MAX / 2));

        for _ in 0..300 {
            if assert_ok!(registry.recent_results(started.task_id, 1).await).len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // 执行器此时处于长休眠中，停止请求必须能唤醒并注销它
        assert_ok!(registry.stop_task(started.task_id).await);
        wait_until_empty(&registry).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_status_reads_during_writes() {
        let registry = Arc::new(registry());
        for _ in 0..3 {
            registry
                .start_task(urls(&["https://a", "https://b", "https://c"]), Duration::from_millis(10))
                .await
                .unwrap();
        }

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    for _ in 0..50 {
                        for snapshot in registry.get_status().await {
                            assert!(snapshot.last_results.len() <= 3);
                            assert!(snapshot
                                .last_results
                                .windows(2)
                                .all(|w| w[0].timestamp <= w[1].timestamp));
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        for reader in readers {
            reader.await.unwrap();
        }

        registry.shutdown(Duration::from_secs(1)).await;
    }
}
