//! WebSocket connection handlers.
//!
//! Each accepted socket is registered with a hub, greeted, and then driven by a read pump and a
//! write pump running as separate tasks. Whichever pump stops first ends the session.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        Path, State,
        ws::{Message, OnFailedUpgrade, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use kairo_shared::time::now_rfc3339;
use serde::Serialize;
use tokio::time::timeout;
use tracing::Instrument;

use crate::{
    domain::{RoomId, UserId},
    infrastructure::{
        dto::websocket::{
            ClientAction, ConnectionEstablishedMessage, MessageType, NotificationBundleMessage,
            NotificationDto,
        },
        message_pusher::{InboundFrameHandler, PumpSettings, ReplyHandle, read_pump, write_pump},
    },
    ui::{error::ApiError, extract::AuthenticatedUser, state::AppState},
    usecase::{ChatRelayOutcome, ConnectedClient, DisconnectClientUseCase},
};

/// `GET /ws/notifications`
pub async fn notifications_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Response {
    configure(ws, &state).on_upgrade(move |socket| notification_session(socket, state, user_id))
}

/// `GET /ws/chat/{chat_id}`
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(chat_id): Path<String>,
) -> Result<Response, ApiError> {
    let room_id = RoomId::new(chat_id).map_err(|e| {
        tracing::warn!("Rejected chat id from '{}': {}", user_id, e);
        ApiError::InvalidChatId
    })?;
    Ok(configure(ws, &state)
        .on_upgrade(move |socket| chat_session(socket, state, user_id, room_id)))
}

fn configure(ws: WebSocketUpgrade, state: &AppState) -> WebSocketUpgrade<impl OnFailedUpgrade> {
    let settings = &state.websocket;
    ws.read_buffer_size(settings.read_buffer_size)
        .write_buffer_size(settings.write_buffer_size)
        .max_message_size(settings.max_message_size)
        .on_failed_upgrade(|e: axum::Error| tracing::warn!("WebSocket upgrade failed: {}", e))
}

async fn notification_session(socket: WebSocket, state: Arc<AppState>, user_id: UserId) {
    let connected = match state
        .connect_notifications_usecase
        .execute(user_id.clone(), None)
        .await
    {
        Ok(connected) => connected,
        Err(e) => {
            tracing::error!("Failed to register notification socket for '{}': {}", user_id, e);
            return;
        }
    };

    let span = tracing::info_span!(
        "notification_session",
        connection_id = %connected.connection_id,
        user_id = %user_id,
    );
    async move {
        let welcome = ConnectionEstablishedMessage {
            r#type: MessageType::ConnectionEstablished,
            timestamp: now_rfc3339(),
            message: "Connected to notification service".to_string(),
            user_id: Some(user_id.to_string()),
            chat_id: None,
        };
        let bundle = (!connected.unread.is_empty()).then(|| NotificationBundleMessage {
            r#type: MessageType::NotificationBundle,
            notifications: connected.unread.iter().map(NotificationDto::from).collect(),
        });
        let handler = NotificationActions {
            state: state.clone(),
            user_id: user_id.clone(),
        };

        run_session(
            socket,
            state.websocket.pump,
            connected,
            &welcome,
            bundle.as_ref(),
            handler,
            &state.disconnect_notifications_usecase,
            &user_id,
        )
        .await;
    }
    .instrument(span)
    .await
}

async fn chat_session(socket: WebSocket, state: Arc<AppState>, user_id: UserId, room_id: RoomId) {
    let connected = match state
        .connect_chat_usecase
        .execute(user_id.clone(), Some(room_id.clone()))
        .await
    {
        Ok(connected) => connected,
        Err(e) => {
            tracing::error!("Failed to register chat socket for '{}': {}", user_id, e);
            return;
        }
    };

    let span = tracing::info_span!(
        "chat_session",
        connection_id = %connected.connection_id,
        user_id = %user_id,
        chat_id = %room_id,
    );
    async move {
        let welcome = ConnectionEstablishedMessage {
            r#type: MessageType::ConnectionEstablished,
            timestamp: now_rfc3339(),
            message: "Connected to chat".to_string(),
            user_id: Some(user_id.to_string()),
            chat_id: Some(room_id.to_string()),
        };
        let handler = ChatRelay {
            state: state.clone(),
            user_id: user_id.clone(),
            room_id,
            reply: connected.reply.clone(),
        };

        run_session::<_, NotificationBundleMessage>(
            socket,
            state.websocket.pump,
            connected,
            &welcome,
            None,
            handler,
            &state.disconnect_chat_usecase,
            &user_id,
        )
        .await;
    }
    .instrument(span)
    .await
}

#[allow(clippy::too_many_arguments)]
async fn run_session<H, B>(
    socket: WebSocket,
    settings: PumpSettings,
    connected: ConnectedClient,
    welcome: &ConnectionEstablishedMessage,
    bundle: Option<&B>,
    handler: H,
    disconnect: &DisconnectClientUseCase,
    user_id: &UserId,
) where
    H: InboundFrameHandler + 'static,
    B: Serialize,
{
    let ConnectedClient {
        connection_id,
        mailbox,
        ..
    } = connected;
    let (mut sink, stream) = socket.split();

    let greeted = match send_direct(&mut sink, welcome, settings).await {
        Ok(()) => match bundle {
            Some(bundle) => send_direct(&mut sink, bundle, settings).await,
            None => Ok(()),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = greeted {
        tracing::warn!("Failed to greet client: {}", e);
    } else {
        tracing::info!("Client connected");

        let mut write_task = tokio::spawn(write_pump(sink, mailbox, settings).in_current_span());
        let mut read_task = tokio::spawn(
            async move {
                let mut handler = handler;
                read_pump(stream, &mut handler, settings).await
            }
            .in_current_span(),
        );

        // If any one of the pumps completes, abort the other
        tokio::select! {
            exit = &mut write_task => {
                read_task.abort();
                tracing::debug!("Write pump stopped: {:?}", exit);
            }
            exit = &mut read_task => {
                write_task.abort();
                tracing::debug!("Read pump stopped: {:?}", exit);
            }
        }
    }

    disconnect.execute(connection_id, user_id).await;
}

/// Write one frame straight to the socket, bypassing the mailbox
async fn send_direct<T: Serialize + ?Sized>(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &T,
    settings: PumpSettings,
) -> Result<(), String> {
    let json = serde_json::to_string(frame).map_err(|e| e.to_string())?;
    match timeout(settings.write_deadline, sink.send(Message::Text(json.into()))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("write deadline exceeded".to_string()),
    }
}

/// Actions a client sends on its notification socket
struct NotificationActions {
    state: Arc<AppState>,
    user_id: UserId,
}

#[async_trait]
impl InboundFrameHandler for NotificationActions {
    async fn on_text(&mut self, text: &str) {
        let action = match serde_json::from_str::<ClientAction>(text) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!("Ignoring unparseable frame: {}", e);
                return;
            }
        };

        match action.r#type.as_str() {
            "mark_read" => {
                let Some(raw_id) = action.notification_id else {
                    tracing::warn!("mark_read without notification_id");
                    return;
                };
                match self
                    .state
                    .mark_read_usecase
                    .execute(&self.user_id, &raw_id)
                    .await
                {
                    Ok(id) => tracing::debug!("Marked notification {} as read", id),
                    Err(e) => tracing::warn!("mark_read failed: {}", e),
                }
            }
            "mark_all_read" => {
                let updated = self.state.mark_read_usecase.execute_all(&self.user_id).await;
                tracing::debug!("Marked {} notifications as read", updated);
            }
            other => tracing::warn!("Ignoring unknown action type '{}'", other),
        }
    }
}

/// Frames a client sends into a chat room
struct ChatRelay {
    state: Arc<AppState>,
    user_id: UserId,
    room_id: RoomId,
    reply: ReplyHandle,
}

#[async_trait]
impl InboundFrameHandler for ChatRelay {
    async fn on_text(&mut self, text: &str) {
        let outcome = self
            .state
            .relay_chat_usecase
            .execute(&self.user_id, &self.room_id, text)
            .await;

        match outcome {
            ChatRelayOutcome::Broadcast(report) => {
                tracing::debug!(
                    "Relayed to {} members ({} evicted)",
                    report.delivered,
                    report.evicted.len()
                );
            }
            ChatRelayOutcome::Reply(frame) => {
                if let Err(e) = self.reply.try_send(&frame) {
                    tracing::warn!("Dropped reply to sender: {:?}", e);
                }
            }
        }
    }
}
