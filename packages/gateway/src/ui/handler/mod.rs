mod http;
mod websocket;

pub use http::{
    debug_hub_state, health_check, list_mentions, list_notifications,
    mark_all_notifications_read, mark_notification_read,
};
pub use websocket::{chat_ws_handler, notifications_ws_handler};
