//! UseCase: チャットメッセージの中継
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - RelayChatMessageUseCase::execute() メソッド
//! - 受信フレームの検証と、ルームへのブロードキャスト / 送信者への返信の振り分け
//!
//! ### どのような状況を想定しているか
//! - 正常系：text / typing のブロードキャスト、connection_check への応答
//! - 異常系：不正な JSON、ユーザー ID の不一致、未知の type、空の text

use std::sync::Arc;

use kairo_shared::time::now_unix_seconds;
use serde::Serialize;

use crate::{
    domain::{BroadcastReport, MessagePusher, RoomId, UserId},
    infrastructure::dto::websocket::{ChatFrame, ConnectionAckMessage, ErrorMessage, MessageType},
};

const ENCODE_FAILURE_FRAME: &str =
    r#"{"type":"error","code":"server_error","message":"failed to encode frame"}"#;

/// 受信フレームの処理結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRelayOutcome {
    /// The frame was fanned out to the room
    Broadcast(BroadcastReport),
    /// A frame to send back to the sender only
    Reply(String),
}

/// チャット中継のユースケース
///
/// メッセージの永続化はコミュニティサービスの責務で、ここでは扱わない。
pub struct RelayChatMessageUseCase {
    message_pusher: Arc<dyn MessagePusher>,
}

impl RelayChatMessageUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>) -> Self {
        Self { message_pusher }
    }

    pub async fn execute(&self, user_id: &UserId, room_id: &RoomId, raw: &str) -> ChatRelayOutcome {
        let mut frame: ChatFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Unparseable chat frame from '{}': {}", user_id, e);
                return reply_error("invalid_format", "Invalid message format");
            }
        };

        let sender = frame.user_id.get_or_insert_with(|| user_id.to_string());
        if sender.as_str() != user_id.as_str() {
            tracing::warn!(
                "Chat frame from '{}' claims to be from '{}'",
                user_id,
                sender
            );
            return reply_error("unauthorized", "User ID mismatch");
        }
        frame.chat_id = Some(room_id.to_string());

        match frame.r#type.as_str() {
            "text" => {
                if frame.content.as_deref().is_none_or(|c| c.trim().is_empty()) {
                    return reply_error("invalid_format", "Text message requires content");
                }
                frame.timestamp = Some(now_unix_seconds());
                self.broadcast(room_id, &frame).await
            }
            "typing" => {
                frame.content = None;
                frame.timestamp = Some(now_unix_seconds());
                self.broadcast(room_id, &frame).await
            }
            "connection_check" => reply(&ConnectionAckMessage {
                r#type: MessageType::ConnectionAck,
                timestamp: now_unix_seconds(),
            }),
            other => {
                tracing::debug!("Unknown chat frame type '{}' from '{}'", other, user_id);
                reply_error("invalid_type", "Unknown message type")
            }
        }
    }

    async fn broadcast(&self, room_id: &RoomId, frame: &ChatFrame) -> ChatRelayOutcome {
        match serde_json::to_string(frame) {
            Ok(encoded) => ChatRelayOutcome::Broadcast(
                self.message_pusher.broadcast_to_room(room_id, &encoded).await,
            ),
            Err(e) => {
                tracing::error!("Failed to encode chat frame: {}", e);
                ChatRelayOutcome::Reply(ENCODE_FAILURE_FRAME.to_string())
            }
        }
    }
}

fn reply<T: Serialize>(message: &T) -> ChatRelayOutcome {
    ChatRelayOutcome::Reply(
        serde_json::to_string(message).unwrap_or_else(|_| ENCODE_FAILURE_FRAME.to_string()),
    )
}

fn reply_error(code: &str, message: &str) -> ChatRelayOutcome {
    reply(&ErrorMessage::new(code, message))
}
