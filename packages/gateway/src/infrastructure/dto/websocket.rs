//! WebSocket frame DTOs.
//!
//! Every frame is a JSON object with a `type` field. Outbound frames carry a typed
//! [`MessageType`]; inbound frames keep `type` as a plain string so that unknown values can be
//! answered with an `invalid_type` error instead of failing to parse.

use serde::{Deserialize, Serialize};

use crate::domain::NotificationType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    ConnectionEstablished,
    Notification,
    NotificationBundle,
    MarkRead,
    MarkAllRead,
    Text,
    Typing,
    ConnectionCheck,
    ConnectionAck,
    Error,
}

/// A notification as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationDto {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub content: String,
    pub data: serde_json::Value,
    pub read: bool,
    /// RFC 3339
    pub created_at: String,
}

/// First frame on every accepted socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEstablishedMessage {
    pub r#type: MessageType,
    /// RFC 3339
    pub timestamp: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

/// Live push of one notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub r#type: MessageType,
    pub notification: NotificationDto,
}

impl NotificationMessage {
    pub fn new(notification: NotificationDto) -> Self {
        Self {
            r#type: MessageType::Notification,
            notification,
        }
    }
}

/// Unread notifications sent once at connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationBundleMessage {
    pub r#type: MessageType,
    pub notifications: Vec<NotificationDto>,
}

/// Inbound action on the notification socket (`mark_read`, `mark_all_read`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientAction {
    pub r#type: String,
    #[serde(default)]
    pub notification_id: Option<String>,
}

/// Chat frame, inbound as sent by the client and outbound as broadcast to the room
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Unix seconds, stamped by the gateway on relay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Answer to `connection_check`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionAckMessage {
    pub r#type: MessageType,
    pub timestamp: i64,
}

/// Error frame sent back to the offending client only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub r#type: MessageType,
    pub code: String,
    pub message: String,
}

impl ErrorMessage {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            r#type: MessageType::Error,
            code: code.to_string(),
            message: message.into(),
        }
    }
}
