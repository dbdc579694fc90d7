//! Data Transfer Objects (DTOs) for the gateway.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket frame DTOs (notification and chat sockets)
//! - `http`: HTTP API request/response DTOs

pub mod conversion;
pub mod http;
pub mod websocket;
