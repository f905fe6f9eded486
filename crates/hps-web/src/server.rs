//! Web服务器

use axum::{
    routing::{get, post},
    Router,
};
use hps_core::{HpsError, Result};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::{api_root, health, predict, AppState};

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        let app = Self::create_app(state);
        Self { addr, app }
    }

    fn create_app(state: AppState) -> Router {
        Router::new()
            // 根路径
            .route("/", get(api_root))

            // 健康检查
            .route("/health", get(health))

            // API路由
            .route("/api/v1/predict", post(predict))
            .with_state(state)

            // 全局中间件
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(
                        CorsLayer::new()
                            .allow_origin(Any)
                            .allow_methods(Any)
                            .allow_headers(Any),
                    ),
            )
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| HpsError::Internal(format!("web server failed: {}", e)))?;

        Ok(())
    }
}
