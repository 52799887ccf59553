//! Application startup and lifecycle management.

use crate::config::GatewayConfig;
use crate::handlers;
use crate::services::pipeline::Pipeline;
use crate::services::providers::gemini::{GeminiConfig, GeminiProvider};
use crate::services::providers::GenerationProvider;
use crate::services::temp_store::{LocalTempStore, TempStore};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use service_core::error::AppError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub provider: Arc<dyn GenerationProvider>,
    pub store: Arc<dyn TempStore>,
    pub pipeline: Pipeline,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the default components: the Gemini
    /// provider and disk-backed upload storage.
    pub async fn build(config: GatewayConfig) -> Result<Self, AppError> {
        let gemini_config = GeminiConfig {
            api_key: config.google.api_key.clone(),
            model: config.models.text_model.clone(),
            request_timeout: config.provider_timeout(),
        };
        let provider: Arc<dyn GenerationProvider> = Arc::new(GeminiProvider::new(gemini_config));

        tracing::info!(
            model = %config.models.text_model,
            "Initialized Gemini provider"
        );

        let store: Arc<dyn TempStore> =
            Arc::new(LocalTempStore::new(&config.uploads.dir).await.map_err(|e| {
                tracing::error!(
                    "Failed to initialize upload storage at {}: {}",
                    config.uploads.dir,
                    e
                );
                AppError::InternalError(anyhow::anyhow!(e))
            })?);

        Self::with_components(config, provider, store).await
    }

    /// Build with injected provider and storage. The provider is constructed
    /// once and shared across all requests; tests swap in fakes here.
    pub async fn with_components(
        config: GatewayConfig,
        provider: Arc<dyn GenerationProvider>,
        store: Arc<dyn TempStore>,
    ) -> Result<Self, AppError> {
        let pipeline = Pipeline::new(
            Arc::clone(&provider),
            Arc::clone(&store),
            config.provider_timeout(),
        );

        let state = AppState {
            config: config.clone(),
            provider,
            store,
            pipeline,
        };

        // Slack on top of the per-file cap covers multipart framing and the
        // prompt field.
        let body_limit = config.uploads.max_bytes + 64 * 1024;

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/ready", get(handlers::readiness_check))
            .route("/generate-text", post(handlers::generate_text))
            .route("/generate-from-image", post(handlers::generate_from_image))
            .route(
                "/generate-from-documents",
                post(handlers::generate_from_documents),
            )
            .route("/generate-from-audio", post(handlers::generate_from_audio))
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        // Port 0 binds a random port for testing.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run until the listener fails or a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
