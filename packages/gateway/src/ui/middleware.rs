//! Admission control in front of every route.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{error::ApiError, state::AppState};

/// Per-IP token bucket check.
///
/// The key is the peer address of the TCP connection. Requests without connect info
/// (routers served without `into_make_service_with_connect_info`) share one bucket.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);
    if !state.rate_limiter.allow(ip) {
        tracing::warn!("Rate limit exceeded for {} on {}", ip, request.uri().path());
        return ApiError::RateLimited.into_response();
    }
    next.run(request).await
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
