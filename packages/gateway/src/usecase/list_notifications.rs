//! UseCase: 通知一覧の取得

use std::sync::Arc;

use crate::{
    domain::{Notification, NotificationType, UserId},
    infrastructure::repository::inmemory::NotificationStore,
};

/// メンション一覧で走査するログ先頭の件数
pub const MENTION_SCAN_LIMIT: usize = 50;

/// 通知一覧の 1 ページ
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub limit: usize,
    pub offset: usize,
    pub total_count: usize,
    pub unread_count: usize,
}

/// 通知一覧取得のユースケース
pub struct ListNotificationsUseCase {
    store: Arc<NotificationStore>,
}

impl ListNotificationsUseCase {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, user_id: &UserId, limit: usize, offset: usize) -> NotificationPage {
        let notifications = self.store.list(user_id, limit, offset).await;
        let total_count = self.store.total_count(user_id).await;
        let unread_count = self.store.unread_count(user_id).await;
        NotificationPage {
            notifications,
            limit,
            offset,
            total_count,
            unread_count,
        }
    }

    /// ログ先頭 [`MENTION_SCAN_LIMIT`] 件のうちメンション通知だけを返す
    pub async fn mentions(&self, user_id: &UserId) -> Vec<Notification> {
        self.store
            .list_by_kind(user_id, NotificationType::Mention, MENTION_SCAN_LIMIT)
            .await
    }
}
