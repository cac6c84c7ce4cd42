//! Web 路由处理函数
//!
//! 每个处理函数对应一个注册表操作，返回JSON响应

use super::{ApiError, AppState};
use crate::probe::ProbeOutcome;
use crate::task::{TaskId, TaskSnapshot};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// POST /ping 请求体
#[derive(Debug, Deserialize)]
pub struct PingRequest {
    /// 要探测的URL列表
    #[serde(default)]
    pub urls: Vec<String>,
    /// 探测间隔（秒），缺省时使用配置的默认值，非正数被拒绝
    pub interval: Option<i64>,
}

/// GET /ping-once 查询参数
#[derive(Debug, Deserialize)]
pub struct PingOnceQuery {
    pub url: Option<String>,
}

/// GET /
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": crate::APP_NAME,
        "version": crate::VERSION,
        "description": crate::APP_DESCRIPTION,
        "active_tasks": state.registry.task_count().await,
        "endpoints": {
            "POST /ping": "启动探测任务，请求体 {\"urls\": [...], \"interval\": 秒}",
            "GET /status": "查看所有任务状态",
            "GET /status/{task_id}": "查看单个任务状态",
            "DELETE /stop/{task_id}": "停止指定任务",
            "DELETE /stop-all": "停止所有任务",
            "GET /ping-once?url=": "单次探测",
        },
    }))
}

/// POST /ping
pub async fn start_ping(
    State(state): State<AppState>,
    request: Result<Json<PingRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = request?;
    // 非正数映射为0，由注册表按无效参数拒绝
    let interval = match request.interval {
        Some(secs) => u64::try_from(secs).unwrap_or(0),
        None => state.config.default_interval_seconds,
    };

    let started = state
        .registry
        .start_task(request.urls, Duration::from_secs(interval))
        .await?;

    Ok(Json(json!({
        "message": format!("已启动探测任务，共 {} 个URL", started.urls.len()),
        "task_id": started.task_id,
        "urls": started.urls,
        "interval": started.interval.as_secs(),
    })))
}

/// GET /status
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let tasks = state.registry.get_status().await;
    Json(json!({
        "active_tasks": tasks.len(),
        "tasks": tasks,
    }))
}

/// GET /status/{task_id}
pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskSnapshot>, ApiError> {
    let id: TaskId = task_id.parse()?;
    Ok(Json(state.registry.get_task(id).await?))
}

/// DELETE /stop/{task_id}
pub async fn stop_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id: TaskId = task_id.parse()?;
    state.registry.stop_task(id).await?;
    Ok(Json(json!({ "message": format!("任务 {id} 已停止") })))
}

/// DELETE /stop-all
pub async fn stop_all(State(state): State<AppState>) -> Json<Value> {
    let stopped = state.registry.stop_all().await;
    Json(json!({
        "message": format!("已停止 {stopped} 个任务"),
        "stopped": stopped,
    }))
}

/// GET /ping-once?url=
pub async fn ping_once(
    State(state): State<AppState>,
    Query(query): Query<PingOnceQuery>,
) -> Result<Json<ProbeOutcome>, ApiError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("缺少 url 参数"))?;
    Ok(Json(state.registry.ping_once(&url).await?))
}
