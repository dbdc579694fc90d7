//! 接続中クライアントへのメッセージ配信の実装
//!
//! ## 構成
//!
//! - `client`: 1 本の WebSocket 接続（ID・所有ユーザー・有界メールボックス）
//! - `registry`: 接続・ユーザー・ルームの 3 つの対応表
//! - `hub`: registry を単独で所有するイベントループ（`MessagePusher` の実装）
//! - `pump`: 接続ごとの読み取り / 書き込みループ

pub mod client;
pub mod hub;
pub mod pump;
pub mod registry;

pub use client::{Client, Mailbox, ReplyHandle, SendFailure};
pub use hub::{ConnectionHub, HubSnapshot, HubStopped, UnregisterOutcome};
pub use pump::{
    InboundFrameHandler, PumpSettings, ReadPumpExit, WritePumpExit, read_pump, write_pump,
};
pub use registry::Registry;
