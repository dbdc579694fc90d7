//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or through the environment variable named next to it.
//! [`GatewayCli::into_config`] turns the raw values into a validated [`GatewayConfig`].

use std::time::Duration;

use clap::{Args, Parser};
use thiserror::Error;

use crate::infrastructure::{
    message_pusher::PumpSettings,
    upstream::{PoolSettings, UpstreamService},
};

#[derive(Parser, Debug, Clone)]
#[command(name = "kairo-gateway")]
#[command(about = "Real-time delivery and admission core of the Kairo edge gateway", long_about = None)]
pub struct GatewayCli {
    #[command(flatten)]
    pub server: ServerArgs,

    #[command(flatten)]
    pub websocket: WebSocketArgs,

    #[command(flatten)]
    pub rate_limit: RateLimitArgs,

    #[command(flatten)]
    pub pool: PoolArgs,

    #[command(flatten)]
    pub upstream: UpstreamArgs,

    /// Pending commands the connection hub buffers before callers wait
    #[arg(long, env = "HUB_COMMAND_CAPACITY", default_value_t = 1024)]
    pub hub_command_capacity: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "GATEWAY_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "GATEWAY_PORT", default_value_t = 8083)]
    pub port: u16,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Args, Debug, Clone)]
pub struct WebSocketArgs {
    #[arg(long, env = "WS_READ_BUFFER_SIZE", default_value_t = 1024)]
    pub ws_read_buffer_size: usize,

    #[arg(long, env = "WS_WRITE_BUFFER_SIZE", default_value_t = 1024)]
    pub ws_write_buffer_size: usize,

    /// Outbound mailbox capacity per connection, in frames
    #[arg(long, env = "WS_SEND_BUFFER_SIZE", default_value_t = 256)]
    pub ws_send_buffer_size: usize,

    #[arg(long, env = "WS_READ_DEADLINE_SECS", default_value_t = 60)]
    pub ws_read_deadline_secs: u64,

    #[arg(long, env = "WS_WRITE_DEADLINE_SECS", default_value_t = 10)]
    pub ws_write_deadline_secs: u64,

    #[arg(long, env = "WS_PING_INTERVAL_SECS", default_value_t = 54)]
    pub ws_ping_interval_secs: u64,

    /// Largest inbound message accepted, in bytes
    #[arg(long, env = "WS_MAX_MESSAGE_SIZE", default_value_t = 4096)]
    pub ws_max_message_size: usize,
}

#[derive(Args, Debug, Clone)]
pub struct RateLimitArgs {
    /// Burst size per client IP
    #[arg(long, env = "RATE_LIMIT_CAPACITY", default_value_t = 20.0)]
    pub rate_limit_capacity: f64,

    /// Tokens regained per second
    #[arg(long, env = "RATE_LIMIT_REFILL_PER_SEC", default_value_t = 0.33)]
    pub rate_limit_refill_per_sec: f64,

    /// Buckets unused for this long are forgotten
    #[arg(long, env = "RATE_LIMIT_IDLE_TTL_SECS", default_value_t = 600)]
    pub rate_limit_idle_ttl_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct PoolArgs {
    #[arg(long, env = "POOL_MAX_IDLE", default_value_t = 5)]
    pub pool_max_idle: usize,

    #[arg(long, env = "POOL_MAX_OPEN", default_value_t = 20)]
    pub pool_max_open: usize,

    #[arg(long, env = "POOL_DIAL_TIMEOUT_SECS", default_value_t = 3)]
    pub pool_dial_timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct UpstreamArgs {
    #[arg(long, env = "AUTH_SERVICE_ADDR", default_value = "localhost:50051")]
    pub auth_service_addr: String,

    #[arg(long, env = "USER_SERVICE_ADDR", default_value = "localhost:50052")]
    pub user_service_addr: String,

    #[arg(long, env = "THREAD_SERVICE_ADDR", default_value = "localhost:9092")]
    pub thread_service_addr: String,

    #[arg(long, env = "COMMUNITY_SERVICE_ADDR", default_value = "localhost:9093")]
    pub community_service_addr: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("WS_SEND_BUFFER_SIZE must be at least 1")]
    ZeroMailboxCapacity,
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("ping interval ({ping:?}) must be shorter than the read deadline ({read:?})")]
    PingNotShorterThanReadDeadline { ping: Duration, read: Duration },
    #[error("RATE_LIMIT_CAPACITY must be a finite number of at least 1, got {0}")]
    RateLimitCapacity(f64),
    #[error("RATE_LIMIT_REFILL_PER_SEC must be a positive finite number, got {0}")]
    RateLimitRefill(f64),
    #[error("POOL_MAX_OPEN ({max_open}) must not be below POOL_MAX_IDLE ({max_idle})")]
    MaxOpenBelowMaxIdle { max_open: usize, max_idle: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketConfig {
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
    pub mailbox_capacity: usize,
    pub max_message_size: usize,
    pub pump: PumpSettings,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 1024,
            write_buffer_size: 1024,
            mailbox_capacity: 256,
            max_message_size: 4096,
            pump: PumpSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub capacity: f64,
    pub refill_per_second: f64,
    pub idle_ttl: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 20.0,
            refill_per_second: 0.33,
            idle_ttl: Duration::from_secs(600),
        }
    }
}

/// Validated gateway configuration
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub websocket: WebSocketConfig,
    pub rate_limit: RateLimitConfig,
    pub pool: PoolSettings,
    pub upstream: Vec<(UpstreamService, String)>,
    pub hub_command_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8083,
            websocket: WebSocketConfig::default(),
            rate_limit: RateLimitConfig::default(),
            pool: PoolSettings::default(),
            upstream: vec![
                (UpstreamService::Auth, "localhost:50051".to_string()),
                (UpstreamService::User, "localhost:50052".to_string()),
                (UpstreamService::Thread, "localhost:9092".to_string()),
                (UpstreamService::Community, "localhost:9093".to_string()),
            ],
            hub_command_capacity: 1024,
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ws = &self.websocket;
        if ws.mailbox_capacity == 0 {
            return Err(ConfigError::ZeroMailboxCapacity);
        }
        for (name, value) in [
            ("WS_READ_DEADLINE_SECS", ws.pump.read_deadline),
            ("WS_WRITE_DEADLINE_SECS", ws.pump.write_deadline),
            ("WS_PING_INTERVAL_SECS", ws.pump.ping_interval),
            ("POOL_DIAL_TIMEOUT_SECS", self.pool.dial_timeout),
            ("RATE_LIMIT_IDLE_TTL_SECS", self.rate_limit.idle_ttl),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration(name));
            }
        }
        if ws.pump.ping_interval >= ws.pump.read_deadline {
            return Err(ConfigError::PingNotShorterThanReadDeadline {
                ping: ws.pump.ping_interval,
                read: ws.pump.read_deadline,
            });
        }

        let capacity = self.rate_limit.capacity;
        if !capacity.is_finite() || capacity < 1.0 {
            return Err(ConfigError::RateLimitCapacity(capacity));
        }
        let refill = self.rate_limit.refill_per_second;
        if !refill.is_finite() || refill <= 0.0 {
            return Err(ConfigError::RateLimitRefill(refill));
        }

        if self.pool.max_open < self.pool.max_idle {
            return Err(ConfigError::MaxOpenBelowMaxIdle {
                max_open: self.pool.max_open,
                max_idle: self.pool.max_idle,
            });
        }
        Ok(())
    }
}

impl GatewayCli {
    pub fn into_config(self) -> Result<GatewayConfig, ConfigError> {
        let ws = self.websocket;
        let config = GatewayConfig {
            host: self.server.host,
            port: self.server.port,
            websocket: WebSocketConfig {
                read_buffer_size: ws.ws_read_buffer_size,
                write_buffer_size: ws.ws_write_buffer_size,
                mailbox_capacity: ws.ws_send_buffer_size,
                max_message_size: ws.ws_max_message_size,
                pump: PumpSettings {
                    write_deadline: Duration::from_secs(ws.ws_write_deadline_secs),
                    read_deadline: Duration::from_secs(ws.ws_read_deadline_secs),
                    ping_interval: Duration::from_secs(ws.ws_ping_interval_secs),
                },
            },
            rate_limit: RateLimitConfig {
                capacity: self.rate_limit.rate_limit_capacity,
                refill_per_second: self.rate_limit.rate_limit_refill_per_sec,
                idle_ttl: Duration::from_secs(self.rate_limit.rate_limit_idle_ttl_secs),
            },
            pool: PoolSettings {
                max_idle: self.pool.pool_max_idle,
                max_open: self.pool.pool_max_open,
                dial_timeout: Duration::from_secs(self.pool.pool_dial_timeout_secs),
            },
            upstream: vec![
                (UpstreamService::Auth, self.upstream.auth_service_addr),
                (UpstreamService::User, self.upstream.user_service_addr),
                (UpstreamService::Thread, self.upstream.thread_service_addr),
                (UpstreamService::Community, self.upstream.community_service_addr),
            ],
            hub_command_capacity: self.hub_command_capacity,
        };
        config.validate()?;
        Ok(config)
    }
}
