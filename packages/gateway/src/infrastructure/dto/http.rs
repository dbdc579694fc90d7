//! HTTP API DTOs.

use serde::{Deserialize, Serialize};

use super::websocket::NotificationDto;

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const DEFAULT_PAGE_OFFSET: usize = 0;

/// Query string of `GET /api/notifications`.
///
/// Values are kept raw so that malformed numbers fall back to the defaults instead of
/// rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListNotificationsQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListNotificationsQuery {
    /// Positive integer, otherwise [`DEFAULT_PAGE_LIMIT`]
    pub fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
    }

    /// Non-negative integer, otherwise [`DEFAULT_PAGE_OFFSET`]
    pub fn offset(&self) -> usize {
        self.offset
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_PAGE_OFFSET)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationDto {
    pub per_page: usize,
    pub offset: usize,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationDto>,
    pub pagination: PaginationDto,
    pub unread_count: usize,
}

/// Body of `GET /api/notifications/mentions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionListResponse {
    pub mentions: Vec<NotificationDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub success: bool,
    pub notification_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkAllReadResponse {
    pub success: bool,
    /// Notifications that were unread before the call
    pub updated: usize,
}

/// Body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatsDto {
    pub service: String,
    pub address: String,
    pub idle: usize,
    pub open: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubStatsDto {
    pub connections: usize,
    pub users: usize,
    pub rooms: usize,
    pub dropped_frames: u64,
}

/// Body of `GET /debug/hub`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugStateResponse {
    pub notification_hub: HubStatsDto,
    pub chat_hub: HubStatsDto,
    pub rate_limited_clients: usize,
    pub pools: Vec<PoolStatsDto>,
}
