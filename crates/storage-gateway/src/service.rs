//! Gateway service: HTTP server for the operations plus an optional admin server.

use crate::context::{ContextSettings, ServiceContext};
use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::middleware::{GatewayMetrics, TracingLayer};
use crate::ports::ChainConnector;
use crate::router::{create_router, AppState};
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info};

/// Storage gateway service
pub struct GatewayService {
    config: GatewayConfig,
    context: Arc<ServiceContext>,
    metrics: Arc<GatewayMetrics>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl GatewayService {
    /// Create a new gateway service
    pub fn new(
        config: GatewayConfig,
        connector: Arc<dyn ChainConnector>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let context = Arc::new(ServiceContext::new(
            ContextSettings::from(&config),
            connector,
        ));

        Ok(Self {
            config,
            context,
            metrics: Arc::new(GatewayMetrics::new()),
            shutdown_tx: None,
        })
    }

    pub fn context(&self) -> Arc<ServiceContext> {
        Arc::clone(&self.context)
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Handle that stops a running [`GatewayService::run`].
    pub fn shutdown_handle(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.shutdown_tx = Some(tx);
        rx
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Bind the listeners and serve until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), GatewayError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let http_addr = self.config.http_addr();
        let listener = bind(http_addr).await?;
        info!(addr = %http_addr, endpoint = %self.context.settings().endpoint, "Starting HTTP server");

        let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

        let admin_handle = if self.config.admin.enabled {
            let admin_addr = self.config.admin_addr();
            let admin_listener = bind(admin_addr).await?;
            info!(addr = %admin_addr, "Starting Admin server");
            let router = self.build_admin_router();
            let mut stop = stop_rx;
            Some(tokio::spawn(async move {
                axum::serve(admin_listener, router)
                    .with_graceful_shutdown(async move {
                        let _ = stop.changed().await;
                    })
                    .await
            }))
        } else {
            None
        };

        let result = axum::serve(listener, self.build_http_router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("Received shutdown signal");
                let _ = stop_tx.send(true);
            })
            .await
            .map_err(|e| GatewayError::Serve(e.to_string()));

        if let Some(handle) = admin_handle {
            if result.is_err() {
                handle.abort();
            }
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "Admin server error"),
                Err(e) if e.is_cancelled() => {}
                Err(e) => error!(error = %e, "Admin server task failed"),
            }
        }

        info!("Storage gateway stopped");
        result
    }

    /// Run until [`GatewayService::shutdown`] is called.
    pub async fn start(&mut self) -> Result<(), GatewayError> {
        let rx = self.shutdown_handle();
        self.run(async move {
            let _ = rx.await;
        })
        .await
    }

    /// Build HTTP router for the operations
    pub fn build_http_router(&self) -> Router {
        let state = AppState {
            context: Arc::clone(&self.context),
            metrics: Arc::clone(&self.metrics),
        };

        // Panics become 500s outside the request span
        let middleware = ServiceBuilder::new()
            .layer(CatchPanicLayer::new())
            .layer(TracingLayer::new());

        create_router(state).layer(middleware)
    }

    /// Build Admin router
    pub fn build_admin_router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/metrics", get(metrics))
            .with_state(AppState {
                context: Arc::clone(&self.context),
                metrics: Arc::clone(&self.metrics),
            })
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, GatewayError> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Bind(format!("{}: {}", addr, e)))
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let deployment = state.context.snapshot();
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storage-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "deployed": deployment.is_some(),
        "generation": deployment.as_ref().map(|d| d.generation),
        "contract": deployment.as_ref().map(|d| format!("{:?}", d.session.contract_address())),
    }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SimulatedChain;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn service() -> GatewayService {
        GatewayService::new(GatewayConfig::default(), Arc::new(SimulatedChain::new())).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = GatewayConfig::default();
        config.contract.gas_limit = 0;
        assert!(matches!(
            GatewayService::new(config, Arc::new(SimulatedChain::new())),
            Err(GatewayError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_admin_health_reports_deployment() {
        let service = service();
        let admin = service.build_admin_router();

        let response = admin
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["deployed"], false);

        service.context().deploy().await.unwrap();
        let response = admin
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["deployed"], true);
        assert_eq!(json["generation"], 1);
    }

    #[tokio::test]
    async fn test_http_router_records_metrics() {
        let service = service();
        let router = service.build_http_router();
        let response = router
            .oneshot(Request::builder().uri("/get").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().contains_key(crate::middleware::REQUEST_ID_HEADER));
        assert_eq!(service.metrics().snapshot()["get"]["client_errors"], 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut config = GatewayConfig::default();
        config.http.host = std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);
        config.http.port = 0;
        let mut service =
            GatewayService::new(config, Arc::new(SimulatedChain::new())).unwrap();

        let rx = service.shutdown_handle();
        service.shutdown();
        let result = service
            .run(async move {
                let _ = rx.await;
            })
            .await;
        assert!(result.is_ok());
    }
}
