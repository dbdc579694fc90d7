//! InMemory 実装

pub mod notification;

pub use notification::NotificationStore;
