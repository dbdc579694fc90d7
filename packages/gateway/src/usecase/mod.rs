//! UseCase 層
//!
//! UI 層（WebSocket / HTTP ハンドラ）から呼ばれるアプリケーションロジック。

pub mod connect_client;
pub mod disconnect_client;
pub mod error;
pub mod list_notifications;
pub mod mark_notification_read;
pub mod relay_chat_message;

pub use connect_client::{ConnectClientUseCase, ConnectedClient};
pub use disconnect_client::DisconnectClientUseCase;
pub use error::{ConnectError, MarkReadError};
pub use list_notifications::{ListNotificationsUseCase, MENTION_SCAN_LIMIT, NotificationPage};
pub use mark_notification_read::MarkNotificationReadUseCase;
pub use relay_chat_message::{ChatRelayOutcome, RelayChatMessageUseCase};
