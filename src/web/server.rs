//! Web服务器实现
//!
//! 基于 axum 的HTTP服务器，支持跨域和优雅关闭

use super::{build_router, AppState};
use crate::config::WebConfig;
use crate::error::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Web服务器
pub struct WebServer {
    /// 配置
    config: WebConfig,
    /// 路由共享状态
    state: AppState,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(config: WebConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// 构建带中间件的路由
    pub fn router(&self) -> Router {
        let router = build_router(self.state.clone()).layer(TraceLayer::new_for_http());

        if self.config.cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// 绑定配置的地址并运行，直到收到关闭信号
    pub async fn start(self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener, shutdown_rx).await
    }

    /// 在已绑定的监听器上运行
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let router = self.router();
        let local_addr = listener.local_addr()?;
        info!("Web服务器已启动: http://{}", local_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("接收到关闭信号，正在关闭Web服务器...");
            })
            .await?;

        info!("Web服务器已关闭");
        Ok(())
    }
}
