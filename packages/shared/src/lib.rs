//! Utilities shared across the Kairo gateway crates.

pub mod logger;
pub mod time;
