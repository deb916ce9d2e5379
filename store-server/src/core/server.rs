//! Server Implementation
//!
//! HTTP 服务器启动和管理

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::core::tasks::BackgroundTasks;
use crate::core::{Config, ServerState};

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with existing state (tests inject collaborators here)
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    /// Build the axum application router
    pub fn build_router(state: ServerState) -> Router {
        api::router()
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        // Create application state if not provided
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config).await?,
        };

        // Start background tasks
        let tasks = BackgroundTasks::start(&state);

        let app = Self::build_router(state);
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Storefront server listening on {addr}");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Shutting down...");
            })
            .await?;

        tasks.shutdown().await;
        Ok(())
    }
}
