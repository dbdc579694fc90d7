//! HTTP and WebSocket surface of the gateway.

mod error;
mod extract;
mod handler;
mod middleware;
mod server;
mod signal;
pub mod state;

pub use error::ApiError;
pub use extract::{AuthenticatedUser, USER_ID_HEADER};
pub use server::Server;
