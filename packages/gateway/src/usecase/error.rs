//! UseCase 層のエラー定義

use thiserror::Error;

/// 接続登録のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("connection hub is not running")]
    HubUnavailable,
}

/// 既読化のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkReadError {
    #[error("invalid notification id: {0}")]
    InvalidId(String),
}
