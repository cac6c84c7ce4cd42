//! Web API模块
//!
//! 把HTTP请求转换为任务注册表操作的轻量前端

use crate::config::GlobalConfig;
use crate::error::RegistryError;
use crate::task::TaskRegistry;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

pub mod handlers;
pub mod server;

pub use server::WebServer;

/// 路由共享状态
#[derive(Clone)]
pub struct AppState {
    /// 任务注册表
    pub registry: Arc<TaskRegistry>,
    /// 全局配置（默认间隔等）
    pub config: Arc<GlobalConfig>,
}

impl AppState {
    pub fn new(registry: Arc<TaskRegistry>, config: GlobalConfig) -> Self {
        Self {
            registry,
            config: Arc::new(config),
        }
    }
}

/// API错误，响应体为 `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let status = match err {
            RegistryError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            RegistryError::NotFound { .. } => StatusCode::NOT_FOUND,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("请求体无效: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// 构建完整的API路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/ping", post(handlers::start_ping))
        .route("/status", get(handlers::status))
        .route("/status/{task_id}", get(handlers::task_status))
        .route("/stop/{task_id}", delete(handlers::stop_task))
        .route("/stop-all", delete(handlers::stop_all))
        .route("/ping-once", get(handlers::ping_once))
        .with_state(state)
}
