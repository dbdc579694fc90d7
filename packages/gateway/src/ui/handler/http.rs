//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::{
    infrastructure::dto::{
        http::{
            DebugStateResponse, HealthResponse, ListNotificationsQuery, MarkAllReadResponse,
            MarkReadResponse, MentionListResponse, NotificationListResponse, PaginationDto,
        },
        websocket::NotificationDto,
    },
    ui::{error::ApiError, extract::AuthenticatedUser, state::AppState},
    usecase::MENTION_SCAN_LIMIT,
};

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Page through the caller's notifications, oldest first
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(query): Query<ListNotificationsQuery>,
) -> Json<NotificationListResponse> {
    let page = state
        .list_notifications_usecase
        .execute(&user_id, query.limit(), query.offset())
        .await;

    // Domain Model から DTO への変換
    Json(NotificationListResponse {
        notifications: page.notifications.iter().map(NotificationDto::from).collect(),
        pagination: PaginationDto {
            per_page: page.limit,
            offset: page.offset,
            total_count: page.total_count,
        },
        unread_count: page.unread_count,
    })
}

/// Mentions among the leading entries of the caller's log, as a single page
pub async fn list_mentions(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Json<MentionListResponse> {
    let mentions = state.list_notifications_usecase.mentions(&user_id).await;
    Json(MentionListResponse {
        pagination: PaginationDto {
            per_page: MENTION_SCAN_LIMIT,
            offset: 0,
            total_count: mentions.len(),
        },
        mentions: mentions.iter().map(NotificationDto::from).collect(),
    })
}

pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(notification_id): Path<String>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let id = state
        .mark_read_usecase
        .execute(&user_id, &notification_id)
        .await?;

    Ok(Json(MarkReadResponse {
        success: true,
        notification_id: id.to_string(),
    }))
}

pub async fn mark_all_notifications_read(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Json<MarkAllReadResponse> {
    let updated = state.mark_read_usecase.execute_all(&user_id).await;
    Json(MarkAllReadResponse {
        success: true,
        updated,
    })
}

/// Debug endpoint exposing hub, rate limiter and pool occupancy
pub async fn debug_hub_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DebugStateResponse>, ApiError> {
    let notification_hub = state.notification_hub.snapshot().await?;
    let chat_hub = state.chat_hub.snapshot().await?;

    Ok(Json(DebugStateResponse {
        notification_hub: notification_hub.into(),
        chat_hub: chat_hub.into(),
        rate_limited_clients: state.rate_limiter.tracked_clients(),
        pools: state
            .upstream
            .stats()
            .into_iter()
            .map(Into::into)
            .collect(),
    }))
}
