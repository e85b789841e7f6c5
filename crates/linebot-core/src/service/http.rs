use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{any, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::channel::line::LineChannel;
use crate::channel::Channel;
use crate::completion::CompletionClient;
use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::WebhookError;
use crate::secret::SecretProvider;
use crate::service::dispatch::EventDispatcher;
use crate::service::handler::MessageHandler;
use crate::service::usage::UsageLogger;
use crate::util::truncate_string;
use crate::warehouse::{self, Warehouse};

pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Configured or degraded, decided once at startup.
pub enum BotState {
    Configured(EventDispatcher),
    /// LINE credentials were missing at startup; the webhook answers 500.
    Unconfigured,
}

/// Shared application state for the HTTP API.
pub struct AppState {
    pub config: Config,
    pub bot: BotState,
}

impl AppState {
    pub fn new(config: Config, bot: BotState) -> Self {
        Self { config, bot }
    }

    /// Cold start: resolve secrets and build every client.
    pub async fn bootstrap(config: Config, secrets: &dyn SecretProvider) -> Self {
        let credentials = Credentials::bootstrap(secrets, &config.secrets).await;
        let warehouse: Arc<dyn Warehouse> = Arc::from(warehouse::create_warehouse(&config));
        Self::from_credentials(config, &credentials, warehouse)
    }

    /// Wire the LINE channel, completion client and usage logger from
    /// already-resolved credentials.
    pub fn from_credentials(
        config: Config,
        credentials: &Credentials,
        warehouse: Arc<dyn Warehouse>,
    ) -> Self {
        let Some(line) = credentials.line() else {
            return Self::new(config, BotState::Unconfigured);
        };

        info!("Usage rows go to {}", warehouse.destination());

        let channel: Arc<dyn Channel> = Arc::new(LineChannel::new(
            line.channel_access_token,
            &config.line.api_base,
        ));
        let completion = CompletionClient::from_config(
            &config.completion,
            credentials.completion_api_key.as_deref(),
        );
        let handler = MessageHandler::new(completion, channel, UsageLogger::new(warehouse));
        let dispatcher = EventDispatcher::new(line.channel_secret, handler);

        Self::new(config, BotState::Configured(dispatcher))
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.bot, BotState::Configured(_))
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub project_id: String,
}

impl HealthResponse {
    pub fn healthy(project_id: &str) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: crate::util::timestamp(),
            project_id: project_id.to_string(),
        }
    }
}

/// Create the axum Router with the webhook and health routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Webhook
        .route("/webhooks/line", post(handle_line_webhook))
        .route("/line_webhook", post(handle_line_webhook))
        // Health
        .route("/health", any(handle_health))
        .route("/health_check", any(handle_health))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /webhooks/line
///
/// 500 when unconfigured, 400 on a bad signature, 500 on any other failure
/// (including a body over `gateway.bodyLimit`), otherwise 200.
async fn handle_line_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Body,
) -> impl IntoResponse {
    let dispatcher = match &state.bot {
        BotState::Configured(dispatcher) => dispatcher,
        BotState::Unconfigured => {
            error!("LINE webhook called but the bot is not configured");
            return (StatusCode::INTERNAL_SERVER_ERROR, "LINE Bot not configured");
        }
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let result = match axum::body::to_bytes(body, state.config.gateway.body_limit).await {
        Ok(body) => {
            info!("LINE webhook received: {} bytes", body.len());
            debug!(
                "Request body: {}",
                truncate_string(&String::from_utf8_lossy(&body), 4096, "...")
            );
            dispatcher.dispatch(&body, signature).await
        }
        Err(e) => Err(WebhookError::Body(e.to_string())),
    };

    match result {
        Ok(summary) => {
            debug!(
                "Dispatched {} events ({} handled, {} reply failures)",
                summary.events, summary.handled, summary.reply_failures
            );
            (StatusCode::OK, "OK")
        }
        Err(WebhookError::InvalidSignature) => {
            warn!("Invalid signature");
            (StatusCode::BAD_REQUEST, "Bad Request")
        }
        Err(e) => {
            error!("Webhook error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

/// GET /health
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse::healthy(&state.config.project_id))
}

/// Start the HTTP server on the given address.
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down HTTP server");
}
