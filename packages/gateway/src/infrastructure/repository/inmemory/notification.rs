//! InMemory Notification Store 実装
//!
//! ユーザーごとの通知ログと到達可能性（WebSocket 接続の有無）を保持する。
//! 通知の追加時、ユーザーが到達可能であれば `MessagePusher` 経由で即座に配信する。
//!
//! ## 制約
//!
//! - プロセスのメモリ上にのみ保持する（再起動で消える）
//! - ログは上限なく増え続ける

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    domain::{
        DeliveryOutcome, MessagePusher, Notification, NotificationError, NotificationId,
        NotificationType, UserId,
    },
    infrastructure::dto::websocket::NotificationMessage,
};

#[derive(Default)]
struct StoreState {
    logs: HashMap<UserId, Vec<Notification>>,
    reachable: HashSet<UserId>,
}

/// インメモリ通知ストア
///
/// 1 つのロックで全ユーザーのログを守る。`add` は配信が終わるまでロックを保持するので、
/// 同じユーザーへの通知は追加順にメールボックスへ積まれる。
pub struct NotificationStore {
    state: Mutex<StoreState>,
    pusher: Arc<dyn MessagePusher>,
}

impl NotificationStore {
    pub fn new(pusher: Arc<dyn MessagePusher>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            pusher,
        }
    }

    /// Append a notification and push it to the user when reachable.
    ///
    /// Fails only when `payload` cannot be serialized, in which case nothing is stored.
    pub async fn add<T>(
        &self,
        user_id: &UserId,
        kind: NotificationType,
        content: impl Into<String>,
        payload: &T,
    ) -> Result<NotificationId, NotificationError>
    where
        T: Serialize + ?Sized,
    {
        let data = serde_json::to_value(payload)?;
        let notification = Notification::new(user_id.clone(), kind, content.into(), data);
        let frame = serde_json::to_string(&NotificationMessage::new((&notification).into()))?;
        let id = notification.id;

        let mut state = self.state.lock().await;
        state
            .logs
            .entry(user_id.clone())
            .or_default()
            .push(notification);

        if state.reachable.contains(user_id) {
            match self.pusher.push_to_user(user_id, &frame).await {
                DeliveryOutcome::Delivered => {
                    tracing::debug!("Notification {} pushed to user '{}'", id, user_id)
                }
                outcome => tracing::warn!(
                    "Notification {} for user '{}' not pushed: {:?}",
                    id,
                    user_id,
                    outcome
                ),
            }
        } else {
            tracing::debug!(
                "User '{}' is not reachable, notification {} stored only",
                user_id,
                id
            );
        }
        Ok(id)
    }

    /// Set the read flag. Returns whether the notification exists; repeating the call is harmless.
    pub async fn mark_read(&self, user_id: &UserId, id: NotificationId) -> bool {
        let mut state = self.state.lock().await;
        let Some(notification) = state
            .logs
            .get_mut(user_id)
            .and_then(|log| log.iter_mut().find(|n| n.id == id))
        else {
            return false;
        };
        notification.mark_read();
        true
    }

    /// Mark every notification of the user as read. Returns how many changed.
    pub async fn mark_all_read(&self, user_id: &UserId) -> usize {
        let mut state = self.state.lock().await;
        let Some(log) = state.logs.get_mut(user_id) else {
            return 0;
        };
        let mut changed = 0;
        for notification in log.iter_mut().filter(|n| !n.read) {
            notification.mark_read();
            changed += 1;
        }
        changed
    }

    /// Contiguous window of the user's log in insertion order. Out-of-range offsets yield nothing.
    pub async fn list(&self, user_id: &UserId, limit: usize, offset: usize) -> Vec<Notification> {
        let state = self.state.lock().await;
        state
            .logs
            .get(user_id)
            .map(|log| log.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Unread entries among the first `limit` entries of the log
    pub async fn unread(&self, user_id: &UserId, limit: usize) -> Vec<Notification> {
        let state = self.state.lock().await;
        state
            .logs
            .get(user_id)
            .map(|log| {
                log.iter()
                    .take(limit)
                    .filter(|n| !n.read)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entries of one kind among the first `scan` entries of the log
    pub async fn list_by_kind(
        &self,
        user_id: &UserId,
        kind: NotificationType,
        scan: usize,
    ) -> Vec<Notification> {
        let state = self.state.lock().await;
        state
            .logs
            .get(user_id)
            .map(|log| {
                log.iter()
                    .take(scan)
                    .filter(|n| n.kind == kind)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn total_count(&self, user_id: &UserId) -> usize {
        let state = self.state.lock().await;
        state.logs.get(user_id).map_or(0, Vec::len)
    }

    pub async fn unread_count(&self, user_id: &UserId) -> usize {
        let state = self.state.lock().await;
        state
            .logs
            .get(user_id)
            .map_or(0, |log| log.iter().filter(|n| !n.read).count())
    }

    pub async fn set_reachable(&self, user_id: &UserId, reachable: bool) {
        let mut state = self.state.lock().await;
        if reachable {
            state.reachable.insert(user_id.clone());
        } else {
            state.reachable.remove(user_id);
        }
        tracing::debug!("User '{}' reachable: {}", user_id, reachable);
    }

    pub async fn is_reachable(&self, user_id: &UserId) -> bool {
        self.state.lock().await.reachable.contains(user_id)
    }
}
