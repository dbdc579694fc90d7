//! MessagePusher trait 定義
//!
//! 接続中のクライアントへフレームを届けるためのインターフェース。
//! 通知ストアや UseCase はこの trait に依存し、接続ハブの具体的な実装には依存しない。

use async_trait::async_trait;

use super::value_object::{ConnectionId, RoomId, UserId};

/// Result of a single non-blocking delivery attempt to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The frame was queued in the connection's mailbox
    Delivered,
    /// The user has no live connection; the frame was not sent
    Offline,
    /// The mailbox was full and the frame was dropped
    Dropped,
    /// The connection's write side is gone; the connection was removed
    Closed,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Summary of one room broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections whose mailbox accepted the frame
    pub delivered: usize,
    /// Connections removed because their mailbox was full or closed
    pub evicted: Vec<ConnectionId>,
}

/// MessagePusher trait
///
/// 送信は常にノンブロッキングで、失敗は結果として返す（リトライしない）。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// Queue `frame` on the user's current connection, if any
    async fn push_to_user(&self, user_id: &UserId, frame: &str) -> DeliveryOutcome;

    /// Queue `frame` on every connection in `room_id`, evicting connections that cannot accept it
    async fn broadcast_to_room(&self, room_id: &RoomId, frame: &str) -> BroadcastReport;
}
