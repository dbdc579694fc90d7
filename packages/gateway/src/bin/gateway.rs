//! Kairo edge gateway.
//!
//! Serves notification and chat WebSockets plus the notification HTTP API.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kairo-gateway
//! cargo run --bin kairo-gateway -- --host 0.0.0.0 --port 8083
//! WS_SEND_BUFFER_SIZE=512 RATE_LIMIT_CAPACITY=50 cargo run --bin kairo-gateway
//! ```

use std::sync::Arc;

use clap::Parser;
use kairo_gateway::{
    config::GatewayCli,
    ui::{Server, state::AppState},
};
use kairo_shared::{logger::setup_logger, time::SystemClock};

#[tokio::main]
async fn main() {
    let cli = GatewayCli::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &cli.server.log_level);

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    // Initialize dependencies in order:
    // 1. Hubs, notification log, rate limiter and upstream pools
    // 2. UseCases
    // 3. Server
    let state = Arc::new(AppState::from_config(&config, Arc::new(SystemClock)));
    tracing::info!(
        "Mailbox capacity {}, rate limit {} burst / {} per second",
        config.websocket.mailbox_capacity,
        config.rate_limit.capacity,
        config.rate_limit.refill_per_second
    );

    let server = Server::new(state, config.rate_limit.idle_ttl);
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
