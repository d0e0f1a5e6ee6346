use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::info;

use crate::{Engine, Result, config::GatewayConfig};

use super::routes;

/// Shared state of the axum handlers.
pub(crate) struct AppState {
    pub engine: Arc<Engine>,
}

pub struct GatewayServer {
    config: GatewayConfig,
    engine: Arc<Engine>,
}

impl GatewayServer {
    pub fn new(
        config: GatewayConfig,
        engine: Arc<Engine>,
    ) -> Self {
        Self {
            config,
            engine,
        }
    }

    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            engine: self.engine.clone(),
        });

        Router::new()
            .route("/ws", get(routes::ws_handler))
            .route("/api/health", get(routes::health))
            .route("/api/workflows", post(routes::deploy_workflow))
            .route("/api/triggers/{id}", post(routes::register_trigger))
            .route("/api/triggers/{id}/execute", post(routes::execute_trigger))
            .route("/api/executions", get(routes::running_executions).post(routes::create_execution))
            .route("/api/executions/{id}", get(routes::get_execution))
            .route("/api/executions/{id}/events", get(routes::execution_events))
            .route("/api/executions/{id}/input", post(routes::submit_input))
            .route("/api/executions/{id}/cancel", post(routes::cancel_execution))
            .with_state(state)
    }

    /// Binds the configured address and serves until the engine shuts down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind).await?;
        self.serve(listener).await
    }

    pub async fn serve(
        &self,
        listener: TcpListener,
    ) -> Result<()> {
        let addr = listener.local_addr()?;
        info!(bind = %addr, "gateway listening");

        axum::serve(listener, self.router()).with_graceful_shutdown(self.engine.wait_shutdown()).await?;

        info!("gateway shut down");
        Ok(())
    }
}
