//! 任务注册表集成测试
//!
//! 使用真实的 HTTP 探测器和本地模拟服务器验证完整的任务生命周期

use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use url_pinger::error::RegistryError;
use url_pinger::probe::{HttpProbe, OutcomeKind, ProbeSettings};
use url_pinger::task::{TaskId, TaskLimits, TaskRegistry};

fn fast_registry() -> TaskRegistry {
    let prober = HttpProbe::new(ProbeSettings {
        timeout: Duration::from_secs(2),
        user_agent: "URL-Pinger/integration".to_string(),
        max_retries: 1,
        retry_delay: Duration::from_millis(50),
    })
    .unwrap();

    let limits = TaskLimits {
        max_urls: 5,
        min_interval: Duration::from_millis(20),
        max_interval: Duration::from_secs(60),
        history_capacity: 6,
        status_window: 3,
        stop_check: Duration::from_millis(20),
    };

    TaskRegistry::new(Arc::new(prober), limits)
}

async fn wait_for<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..300 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("条件未在预期时间内满足");
}

#[tokio::test]
async fn test_task_lifecycle_against_mock_server() {
    let mut server = mockito::Server::new_async().await;
    let healthy = server
        .mock("GET", "/healthy")
        .with_status(200)
        .expect_at_least(2)
        .create_async()
        .await;
    let broken = server
        .mock("GET", "/broken")
        .with_status(503)
        .expect_at_least(2)
        .create_async()
        .await;

    let registry = fast_registry();
    let started = assert_ok!(
        registry
            .start_task(
                vec![
                    format!("{}/healthy", server.url()),
                    format!("{}/broken", server.url()),
                ],
                Duration::from_millis(20),
            )
            .await
    );
    assert_eq!(started.task_id, TaskId::new(1));

    wait_for(|| async {
        registry
            .recent_results(started.task_id, 6)
            .await
            .map(|r| r.len() >= 4)
            .unwrap_or(false)
    })
    .await;

    let results = registry.recent_results(started.task_id, 6).await.unwrap();
    for outcome in &results {
        if outcome.url.ends_with("/healthy") {
            assert_eq!(outcome.kind, OutcomeKind::Success);
            assert_eq!(outcome.status_code, Some(200));
            assert!(outcome.latency.is_some());
        } else {
            // 非2xx响应是最终结果，不重试
            assert_eq!(outcome.kind, OutcomeKind::HttpError);
            assert_eq!(outcome.status_code, Some(503));
            assert_eq!(outcome.attempts, 1);
        }
    }

    let status = registry.get_status().await;
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].last_results.len(), 3);

    assert_ok!(registry.stop_task(started.task_id).await);
    wait_for(|| async { registry.get_status().await.is_empty() }).await;

    let err = assert_err!(registry.stop_task(started.task_id).await);
    assert!(matches!(err, RegistryError::NotFound { .. }));

    healthy.assert_async().await;
    broken.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_url_is_recorded_without_stopping_task() {
    let registry = fast_registry();
    let started = registry
        .start_task(
            vec!["http://127.0.0.1:1/".to_string()],
            Duration::from_millis(20),
        )
        .await
        .unwrap();

    wait_for(|| async {
        registry
            .recent_results(started.task_id, 2)
            .await
            .map(|r| r.len() == 2)
            .unwrap_or(false)
    })
    .await;

    let snapshot = registry.get_task(started.task_id).await.unwrap();
    assert!(snapshot.running);
    for outcome in &snapshot.last_results {
        assert_eq!(outcome.kind, OutcomeKind::ConnectionError);
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.status_code.is_none());
    }

    assert_eq!(registry.shutdown(Duration::from_secs(3)).await, 1);
    assert_eq!(registry.task_count().await, 0);
}

#[tokio::test]
async fn test_ids_stay_unique_across_many_tasks() {
    let registry = fast_registry();
    let mut seen = Vec::new();

    for round in 0..3 {
        let started = registry
            .start_task(
                vec!["http://127.0.0.1:1/".to_string()],
                Duration::from_secs(30),
            )
            .await
            .unwrap();
        assert!(!seen.contains(&started.task_id), "第 {round} 轮出现重复ID");
        seen.push(started.task_id);

        registry.stop_all().await;
        wait_for(|| async { registry.task_count().await == 0 }).await;
    }

    assert_eq!(seen, vec![TaskId::new(1), TaskId::new(2), TaskId::new(3)]);
}

#[tokio::test]
async fn test_ping_once_bypasses_tasks() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .match_header("user-agent", "URL-Pinger/integration")
        .with_status(204)
        .create_async()
        .await;

    let registry = fast_registry();
    let outcome = registry.ping_once(&server.url()).await.unwrap();

    assert_eq!(outcome.kind, OutcomeKind::Success);
    assert_eq!(outcome.status_code, Some(204));
    assert_eq!(registry.task_count().await, 0);
    assert!(registry.get_status().await.is_empty());
    mock.assert_async().await;

    let err = registry.ping_once("mailto:someone@example.com").await;
    assert!(matches!(err, Err(RegistryError::InvalidArgument(_))));
}
