//! HTTP error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    infrastructure::{dto::http::ErrorResponse, message_pusher::HubStopped},
    usecase::{ConnectError, MarkReadError},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    #[error("Invalid notification id: {0}")]
    InvalidNotificationId(String),
    #[error("Invalid chat id")]
    InvalidChatId,
    #[error("Connection hub is unavailable")]
    HubUnavailable,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidNotificationId(_) | ApiError::InvalidChatId => StatusCode::BAD_REQUEST,
            ApiError::HubUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::RateLimited => "RATE_LIMIT_EXCEEDED",
            ApiError::InvalidNotificationId(_) => "INVALID_NOTIFICATION_ID",
            ApiError::InvalidChatId => "INVALID_CHAT_ID",
            ApiError::HubUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            message: self.to_string(),
            code: self.code().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<MarkReadError> for ApiError {
    fn from(err: MarkReadError) -> Self {
        match err {
            MarkReadError::InvalidId(id) => ApiError::InvalidNotificationId(id),
        }
    }
}

impl From<ConnectError> for ApiError {
    fn from(_: ConnectError) -> Self {
        ApiError::HubUnavailable
    }
}

impl From<HubStopped> for ApiError {
    fn from(_: HubStopped) -> Self {
        ApiError::HubUnavailable
    }
}
