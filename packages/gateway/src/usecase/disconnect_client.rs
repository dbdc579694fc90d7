//! UseCase: クライアント切断処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectClientUseCase::execute() メソッド
//! - ハブからの登録解除と到達可能性の更新
//!
//! ### どのような状況を想定しているか
//! - 正常系：唯一の接続が切断され、ユーザーが到達不能になる
//! - エッジケース：同じユーザーの新しい接続が残っている場合は到達可能のまま

use std::sync::Arc;

use crate::{
    domain::{ConnectionId, UserId},
    infrastructure::{
        message_pusher::{ConnectionHub, UnregisterOutcome},
        repository::inmemory::NotificationStore,
    },
};

/// クライアント切断のユースケース
pub struct DisconnectClientUseCase {
    hub: ConnectionHub,
    store: Option<Arc<NotificationStore>>,
}

impl DisconnectClientUseCase {
    pub fn for_notifications(hub: ConnectionHub, store: Arc<NotificationStore>) -> Self {
        Self {
            hub,
            store: Some(store),
        }
    }

    pub fn for_chat(hub: ConnectionHub) -> Self {
        Self { hub, store: None }
    }

    /// 切断を実行
    ///
    /// ユーザーに他の接続が残っていない場合に限り到達不能にする。
    ///
    /// 到達不能にした直後にハブを再確認し、その間に同じユーザーが接続していれば到達可能に戻す。
    pub async fn execute(&self, connection_id: ConnectionId, user_id: &UserId) -> UnregisterOutcome {
        let outcome = self.hub.unregister(connection_id).await;

        if let Some(store) = &self.store
            && !outcome.user_still_connected
        {
            store.set_reachable(user_id, false).await;
            if self.hub.is_user_connected(user_id).await {
                store.set_reachable(user_id, true).await;
            }
        }

        tracing::info!(
            "Connection {} for user '{}' disconnected (removed: {}, still connected: {})",
            connection_id,
            user_id,
            outcome.removed,
            outcome.user_still_connected
        );
        outcome
    }
}
