//! UseCase: クライアント接続処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectClientUseCase::execute() メソッド
//! - ハブへの登録、到達可能性の更新、接続時に送る未読通知の取得
//!
//! ### どのような状況を想定しているか
//! - 正常系：通知ソケットの接続（未読通知あり）
//! - 正常系：チャットソケットの接続（ルーム参加、到達可能性は変えない）
//! - 異常系：ハブが停止している

use std::sync::Arc;

use crate::{
    domain::{ConnectionId, Notification, RoomId, UserId},
    infrastructure::{
        message_pusher::{Client, ConnectionHub, Mailbox, ReplyHandle},
        repository::inmemory::NotificationStore,
    },
};

use super::error::ConnectError;

/// Log entries scanned for the connect-time unread bundle
pub const UNREAD_BUNDLE_SCAN: usize = 50;

/// 登録済みの接続
pub struct ConnectedClient {
    pub connection_id: ConnectionId,
    /// Consumed by the write pump
    pub mailbox: Mailbox,
    /// Lets the session answer its own client without keeping the mailbox open
    pub reply: ReplyHandle,
    /// Unread notifications to send once after the welcome frame
    pub unread: Vec<Notification>,
}

/// クライアント接続のユースケース
///
/// `store` を持つ場合（通知ソケット）はユーザーを到達可能にし、未読通知を返す。
pub struct ConnectClientUseCase {
    hub: ConnectionHub,
    store: Option<Arc<NotificationStore>>,
    mailbox_capacity: usize,
}

impl ConnectClientUseCase {
    /// 通知ソケット用
    pub fn for_notifications(
        hub: ConnectionHub,
        store: Arc<NotificationStore>,
        mailbox_capacity: usize,
    ) -> Self {
        Self {
            hub,
            store: Some(store),
            mailbox_capacity,
        }
    }

    /// チャットソケット用
    pub fn for_chat(hub: ConnectionHub, mailbox_capacity: usize) -> Self {
        Self {
            hub,
            store: None,
            mailbox_capacity,
        }
    }

    /// 接続を実行
    ///
    /// 登録 → 到達可能化 → 未読取得 の順に行う。未読取得より前に到達可能にするので、
    /// その間に追加された通知はライブ配信と未読バンドルの両方に含まれることがある。
    pub async fn execute(
        &self,
        user_id: UserId,
        room_id: Option<RoomId>,
    ) -> Result<ConnectedClient, ConnectError> {
        let (client, mailbox) = Client::new(user_id.clone(), room_id, self.mailbox_capacity);
        let connection_id = client.id();
        let reply = client.reply_handle();

        self.hub
            .register(client)
            .await
            .map_err(|_| ConnectError::HubUnavailable)?;

        let unread = match &self.store {
            Some(store) => {
                store.set_reachable(&user_id, true).await;
                store.unread(&user_id, UNREAD_BUNDLE_SCAN).await
            }
            None => Vec::new(),
        };

        Ok(ConnectedClient {
            connection_id,
            mailbox,
            reply,
            unread,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeliveryOutcome, MessagePusher, NotificationType};
    use serde_json::json;

    fn user(id: &str) -> UserId {
        UserId::new(id.to_string()).unwrap()
    }

    fn setup() -> (ConnectionHub, Arc<NotificationStore>) {
        let (hub, _task) = ConnectionHub::spawn(16);
        let pusher: Arc<dyn MessagePusher> = Arc::new(hub.clone());
        (hub, Arc::new(NotificationStore::new(pusher)))
    }

    #[tokio::test]
    async fn test_notification_client_becomes_reachable_with_unread() {
        // テスト項目: 通知ソケットの接続でユーザーが到達可能になり、未読通知が返される
        // given (前提条件):
        let (hub, store) = setup();
        let alice = user("alice");
        let first = store
            .add(&alice, NotificationType::Like, "liked", &json!({}))
            .await
            .unwrap();
        let second = store
            .add(&alice, NotificationType::Reply, "replied", &json!({}))
            .await
            .unwrap();
        store.mark_read(&alice, first).await;
        let usecase = ConnectClientUseCase::for_notifications(hub.clone(), store.clone(), 8);

        // when (操作):
        let connected = usecase.execute(alice.clone(), None).await.unwrap();

        // then (期待する結果):
        assert!(store.is_reachable(&alice).await);
        let unread_ids: Vec<_> = connected.unread.iter().map(|n| n.id).collect();
        assert_eq!(unread_ids, vec![second]);
        assert_eq!(
            hub.deliver_to_user(&alice, "ping").await,
            DeliveryOutcome::Delivered
        );
    }

    #[tokio::test]
    async fn test_chat_client_joins_room_without_reachability() {
        // テスト項目: チャットソケットの接続はルームに参加し、通知の到達可能性は変えない
        // given (前提条件):
        let (hub, store) = setup();
        let alice = user("alice");
        let room = RoomId::new("chat-1".to_string()).unwrap();
        let usecase = ConnectClientUseCase::for_chat(hub.clone(), 8);

        // when (操作):
        let mut connected = usecase
            .execute(alice.clone(), Some(room.clone()))
            .await
            .unwrap();
        let report = hub.broadcast_to_room(&room, "hello room").await;

        // then (期待する結果):
        assert!(!store.is_reachable(&alice).await);
        assert!(connected.unread.is_empty());
        assert_eq!(report.delivered, 1);
        assert_eq!(connected.mailbox.try_recv().unwrap(), "hello room");
    }

    #[tokio::test]
    async fn test_connect_fails_when_hub_stopped() {
        // テスト項目: ハブが停止していると HubUnavailable が返る
        // given (前提条件):
        let (hub, task) = ConnectionHub::spawn(16);
        task.abort();
        let _ = task.await;
        let usecase = ConnectClientUseCase::for_chat(hub, 8);

        // when (操作):
        let result = usecase.execute(user("alice"), None).await;

        // then (期待する結果):
        assert!(matches!(result, Err(ConnectError::HubUnavailable)));
    }
}
