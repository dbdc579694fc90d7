//! Kairo gateway library.
//!
//! Real-time delivery and admission core of the edge gateway: per-IP rate limiting, pooled
//! upstream connections, a WebSocket connection hub and an in-memory notification log.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
