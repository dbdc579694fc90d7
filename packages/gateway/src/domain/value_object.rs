//! Value objects identifying users, connections, rooms and notifications.

use std::fmt;

use uuid::Uuid;

use super::error::ValueObjectError;

/// Upper bound for externally supplied identifiers (user ids, room ids)
const MAX_EXTERNAL_ID_LEN: usize = 128;

fn validate_external_id(field: &'static str, value: &str) -> Result<(), ValueObjectError> {
    if value.is_empty() {
        return Err(ValueObjectError::Empty(field));
    }
    let len = value.chars().count();
    if len > MAX_EXTERNAL_ID_LEN {
        return Err(ValueObjectError::TooLong {
            field,
            max: MAX_EXTERNAL_ID_LEN,
            actual: len,
        });
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValueObjectError::InvalidCharacter(field));
    }
    Ok(())
}

/// Identity of an authenticated user, as resolved by the upstream auth layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate_external_id("user_id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat room a connection is subscribed to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate_external_id("room_id", &value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of one accepted WebSocket connection. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Notification identifier.
///
/// UUIDv7, so ids generated later sort after ids generated earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(Uuid);

impl NotificationId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(value: &str) -> Result<Self, ValueObjectError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| ValueObjectError::Malformed {
                field: "notification_id",
                value: value.to_string(),
            })
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_accepts_typical_value() {
        // テスト項目: 通常のユーザー ID は受け入れられる
        // given (前提条件):
        let raw = "user-123".to_string();

        // when (操作):
        let result = UserId::new(raw);

        // then (期待する結果):
        assert_eq!(result.unwrap().as_str(), "user-123");
    }

    #[test]
    fn test_user_id_rejects_empty() {
        // テスト項目: 空文字列のユーザー ID は拒否される
        // given (前提条件):
        let raw = String::new();

        // when (操作):
        let result = UserId::new(raw);

        // then (期待する結果):
        assert_eq!(result.unwrap_err(), ValueObjectError::Empty("user_id"));
    }

    #[test]
    fn test_user_id_rejects_whitespace() {
        // テスト項目: 空白を含むユーザー ID は拒否される
        // given (前提条件):
        let raw = "user 123".to_string();

        // when (操作):
        let result = UserId::new(raw);

        // then (期待する結果):
        assert_eq!(
            result.unwrap_err(),
            ValueObjectError::InvalidCharacter("user_id")
        );
    }

    #[test]
    fn test_room_id_rejects_too_long() {
        // テスト項目: 最大長を超えるルーム ID は拒否される
        // given (前提条件):
        let raw = "r".repeat(MAX_EXTERNAL_ID_LEN + 1);

        // when (操作):
        let result = RoomId::new(raw);

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(ValueObjectError::TooLong { field: "room_id", .. })
        ));
    }

    #[test]
    fn test_connection_ids_are_unique() {
        // テスト項目: 接続 ID は生成のたびに異なる値になる
        // given (前提条件):

        // when (操作):
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();

        // then (期待する結果):
        assert_ne!(a, b);
    }

    #[test]
    fn test_notification_ids_are_time_ordered() {
        // テスト項目: 後から生成した通知 ID は先に生成した ID より大きい
        // given (前提条件):
        let first = NotificationId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));

        // when (操作):
        let second = NotificationId::generate();

        // then (期待する結果):
        assert!(second > first);
    }

    #[test]
    fn test_notification_id_parse_round_trip_and_malformed() {
        // テスト項目: 文字列から通知 ID を復元でき、不正な文字列はエラーになる
        // given (前提条件):
        let id = NotificationId::generate();

        // when (操作):
        let parsed = NotificationId::parse(&id.to_string());
        let malformed = NotificationId::parse("not-a-uuid");

        // then (期待する結果):
        assert_eq!(parsed.unwrap(), id);
        assert!(matches!(
            malformed,
            Err(ValueObjectError::Malformed { field: "notification_id", .. })
        ));
    }
}
