//! UseCase: 通知の既読化
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - MarkNotificationReadUseCase::execute() / execute_all()
//!
//! ### どのような状況を想定しているか
//! - 正常系：1 件の既読化、全件の既読化
//! - 異常系：ID の形式が不正
//! - エッジケース：存在しない ID（エラーにしない）

use std::sync::Arc;

use crate::{
    domain::{NotificationId, UserId},
    infrastructure::repository::inmemory::NotificationStore,
};

use super::error::MarkReadError;

/// 既読化のユースケース（WebSocket の `mark_read` / `mark_all_read` と HTTP の両方から使う）
pub struct MarkNotificationReadUseCase {
    store: Arc<NotificationStore>,
}

impl MarkNotificationReadUseCase {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        Self { store }
    }

    /// `raw_id` の通知を既読にする。既に既読でも、存在しない ID でも成功する。
    pub async fn execute(&self, user_id: &UserId, raw_id: &str) -> Result<NotificationId, MarkReadError> {
        let id = NotificationId::parse(raw_id)
            .map_err(|_| MarkReadError::InvalidId(raw_id.to_string()))?;
        if !self.store.mark_read(user_id, id).await {
            tracing::debug!("Notification {} not found for user '{}'", id, user_id);
        }
        Ok(id)
    }

    /// 全件既読にし、変化した件数を返す
    pub async fn execute_all(&self, user_id: &UserId) -> usize {
        self.store.mark_all_read(user_id).await
    }
}
