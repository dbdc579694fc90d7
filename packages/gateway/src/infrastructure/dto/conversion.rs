//! Conversion logic between DTOs and domain entities.

use kairo_shared::time::to_rfc3339;

use crate::{
    domain::Notification,
    infrastructure::{
        dto::{
            http::{HubStatsDto, PoolStatsDto},
            websocket as dto,
        },
        message_pusher::HubSnapshot,
        upstream::PoolStats,
    },
};

// ========================================
// Domain Entity → DTO
// ========================================

impl From<Notification> for dto::NotificationDto {
    fn from(model: Notification) -> Self {
        Self {
            id: model.id.to_string(),
            user_id: model.user_id.into_string(),
            kind: model.kind,
            content: model.content,
            data: model.data,
            read: model.read,
            created_at: to_rfc3339(model.created_at),
        }
    }
}

impl From<&Notification> for dto::NotificationDto {
    fn from(model: &Notification) -> Self {
        model.clone().into()
    }
}

impl From<HubSnapshot> for HubStatsDto {
    fn from(snapshot: HubSnapshot) -> Self {
        Self {
            connections: snapshot.connections,
            users: snapshot.users,
            rooms: snapshot.rooms,
            dropped_frames: snapshot.dropped_frames,
        }
    }
}

impl From<PoolStats> for PoolStatsDto {
    fn from(stats: PoolStats) -> Self {
        Self {
            service: stats.service.to_string(),
            address: stats.address,
            idle: stats.idle,
            open: stats.open,
        }
    }
}
