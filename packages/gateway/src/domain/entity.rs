//! Domain entities.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_object::{NotificationId, UserId};

/// Kind of event a notification describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Message,
    Like,
    Follow,
    Reply,
    Mention,
    Community,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Like => "like",
            Self::Follow => "follow",
            Self::Reply => "reply",
            Self::Mention => "mention",
            Self::Community => "community",
            Self::System => "system",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Self::Message),
            "like" => Ok(Self::Like),
            "follow" => Ok(Self::Follow),
            "reply" => Ok(Self::Reply),
            "mention" => Ok(Self::Mention),
            "community" => Ok(Self::Community),
            "system" => Ok(Self::System),
            other => Err(format!("unknown notification type '{other}'")),
        }
    }
}

/// One event destined for a user.
///
/// Only the `read` flag changes after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationType,
    pub content: String,
    /// Opaque business payload supplied by the caller
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: UserId,
        kind: NotificationType,
        content: String,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            user_id,
            kind,
            content,
            data,
            read: false,
            created_at: Utc::now(),
        }
    }

    pub fn mark_read(&mut self) {
        self.read = true;
    }
}
