//! Shared application state and its wiring.

use std::sync::Arc;

use kairo_shared::time::Clock;

use crate::{
    config::{GatewayConfig, WebSocketConfig},
    domain::MessagePusher,
    infrastructure::{
        message_pusher::ConnectionHub, rate_limit::RateLimiter,
        repository::inmemory::NotificationStore, upstream::UpstreamPools,
    },
    usecase::{
        ConnectClientUseCase, DisconnectClientUseCase, ListNotificationsUseCase,
        MarkNotificationReadUseCase, RelayChatMessageUseCase,
    },
};

/// Shared application state
///
/// Notification sockets and chat sockets register with separate hubs, so a user's chat
/// connection never replaces the connection that receives their notifications.
pub struct AppState {
    /// 通知ソケットの接続
    pub connect_notifications_usecase: ConnectClientUseCase,
    /// 通知ソケットの切断
    pub disconnect_notifications_usecase: DisconnectClientUseCase,
    /// チャットソケットの接続
    pub connect_chat_usecase: ConnectClientUseCase,
    /// チャットソケットの切断
    pub disconnect_chat_usecase: DisconnectClientUseCase,
    pub relay_chat_usecase: RelayChatMessageUseCase,
    pub list_notifications_usecase: ListNotificationsUseCase,
    pub mark_read_usecase: MarkNotificationReadUseCase,

    /// Entry point for producers of notifications
    pub notifications: Arc<NotificationStore>,
    pub notification_hub: ConnectionHub,
    pub chat_hub: ConnectionHub,
    pub rate_limiter: Arc<RateLimiter>,
    pub upstream: Arc<UpstreamPools>,
    pub websocket: WebSocketConfig,
}

impl AppState {
    /// Build every component from a validated configuration.
    ///
    /// Spawns the two hub tasks, so it must be called inside a Tokio runtime.
    pub fn from_config(config: &GatewayConfig, clock: Arc<dyn Clock>) -> Self {
        // Initialize dependencies in order:
        // 1. Hubs (own the connection registries)
        let (notification_hub, _) = ConnectionHub::spawn(config.hub_command_capacity);
        let (chat_hub, _) = ConnectionHub::spawn(config.hub_command_capacity);

        // 2. Notification log, pushing through the notification hub
        let notification_pusher: Arc<dyn MessagePusher> = Arc::new(notification_hub.clone());
        let notifications = Arc::new(NotificationStore::new(notification_pusher));

        // 3. Admission control and upstream pools
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit.capacity,
            config.rate_limit.refill_per_second,
            clock,
        ));
        let upstream = Arc::new(UpstreamPools::tcp(config.upstream.clone(), config.pool));

        // 4. UseCases
        let mailbox_capacity = config.websocket.mailbox_capacity;
        let chat_pusher: Arc<dyn MessagePusher> = Arc::new(chat_hub.clone());

        Self {
            connect_notifications_usecase: ConnectClientUseCase::for_notifications(
                notification_hub.clone(),
                notifications.clone(),
                mailbox_capacity,
            ),
            disconnect_notifications_usecase: DisconnectClientUseCase::for_notifications(
                notification_hub.clone(),
                notifications.clone(),
            ),
            connect_chat_usecase: ConnectClientUseCase::for_chat(
                chat_hub.clone(),
                mailbox_capacity,
            ),
            disconnect_chat_usecase: DisconnectClientUseCase::for_chat(chat_hub.clone()),
            relay_chat_usecase: RelayChatMessageUseCase::new(chat_pusher),
            list_notifications_usecase: ListNotificationsUseCase::new(notifications.clone()),
            mark_read_usecase: MarkNotificationReadUseCase::new(notifications.clone()),
            notifications,
            notification_hub,
            chat_hub,
            rate_limiter,
            upstream,
            websocket: config.websocket.clone(),
        }
    }
}
