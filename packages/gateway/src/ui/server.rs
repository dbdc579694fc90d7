//! Server execution logic.

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::{
    handler::{
        chat_ws_handler, debug_hub_state, health_check, list_mentions, list_notifications,
        mark_all_notifications_read, mark_notification_read, notifications_ws_handler,
    },
    middleware::rate_limit,
    signal::shutdown_signal,
    state::AppState,
};

/// Upper bound on how often idle rate-limit buckets are swept
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Kairo gateway server
///
/// # Example
///
/// ```ignore
/// let state = Arc::new(AppState::from_config(&config, Arc::new(SystemClock)));
/// let server = Server::new(state, config.rate_limit.idle_ttl);
/// server.run("127.0.0.1".to_string(), 8083).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
    /// Rate-limit buckets unused for this long are evicted
    rate_limit_idle_ttl: Duration,
}

impl Server {
    pub fn new(state: Arc<AppState>, rate_limit_idle_ttl: Duration) -> Self {
        Self {
            state,
            rate_limit_idle_ttl,
        }
    }

    /// All routes, wrapped in request tracing and per-IP rate limiting
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/ws/notifications", get(notifications_ws_handler))
            .route("/ws/chat/{chat_id}", get(chat_ws_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/notifications", get(list_notifications))
            .route("/api/notifications/mentions", get(list_mentions))
            .route(
                "/api/notifications/read-all",
                post(mark_all_notifications_read),
            )
            .route(
                "/api/notifications/{notification_id}/read",
                post(mark_notification_read),
            )
            .route("/debug/hub", get(debug_hub_state))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                rate_limit,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind to `host:port` and serve until Ctrl+C or SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Kairo gateway listening on {}", listener.local_addr()?);
        tracing::info!("Notifications: ws://{}/ws/notifications", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// The rate-limit sweeper runs for the lifetime of the server; upstream pools are closed
    /// once axum has drained.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let sweeper = self.state.rate_limiter.clone().spawn_sweeper(
            self.rate_limit_idle_ttl,
            self.rate_limit_idle_ttl.min(MAX_SWEEP_PERIOD),
        );

        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        sweeper.abort();
        self.state.upstream.close_all();
        tracing::info!("Server shutdown complete");

        result
    }
}
