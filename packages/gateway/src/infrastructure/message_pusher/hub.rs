//! 接続ハブ
//!
//! ## 責務
//!
//! - 接続中クライアントの登録・登録解除
//! - ユーザー単位の配信（`deliver_to_user`）とルーム単位の配信（`broadcast_to_room`）
//!
//! ## 設計ノート
//!
//! `Registry` は 1 つのタスク（`HubActor`）だけが所有し、他のタスクはコマンドチャネル経由で操作する。
//! そのためロックは不要で、コマンドは到着順に 1 つずつ処理される。
//! メールボックスへの送信は常に `try_send` で行い、ハブのループが遅いクライアントに引きずられることはない。

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use serde::Serialize;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::domain::{
    BroadcastReport, ConnectionId, DeliveryOutcome, MessagePusher, RoomId, UserId,
};

use super::{
    client::{Client, SendFailure},
    registry::Registry,
};

/// The hub's event loop is no longer running
#[derive(Debug, thiserror::Error)]
#[error("connection hub is not running")]
pub struct HubStopped;

/// What `unregister` observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnregisterOutcome {
    /// The connection was registered and has been removed
    pub removed: bool,
    /// The user still has another live connection mapped after the removal
    pub user_still_connected: bool,
}

/// Point-in-time view of the hub, served by the debug endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubSnapshot {
    pub connections: usize,
    pub users: usize,
    pub rooms: usize,
    pub dropped_frames: u64,
}

enum Command {
    Register {
        client: Client,
        ack: oneshot::Sender<Option<ConnectionId>>,
    },
    Unregister {
        id: ConnectionId,
        reply: oneshot::Sender<UnregisterOutcome>,
    },
    DeliverToUser {
        user_id: UserId,
        frame: String,
        reply: oneshot::Sender<DeliveryOutcome>,
    },
    BroadcastToRoom {
        room_id: RoomId,
        frame: String,
        reply: oneshot::Sender<BroadcastReport>,
    },
    IsUserConnected {
        user_id: UserId,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<HubSnapshot>,
    },
}

/// Handle to the hub's event loop. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionHub {
    commands: mpsc::Sender<Command>,
    dropped: Arc<AtomicU64>,
}

impl ConnectionHub {
    /// Start the event loop. It stops once every handle has been dropped.
    pub fn spawn(command_capacity: usize) -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::channel(command_capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let actor = HubActor {
            registry: Registry::new(),
            dropped: Arc::clone(&dropped),
        };
        let handle = tokio::spawn(actor.run(receiver));
        (Self { commands, dropped }, handle)
    }

    /// Register a client. Resolves once the registration is visible to later commands.
    ///
    /// Returns the connection id that previously owned the user's mapping, if any.
    pub async fn register(&self, client: Client) -> Result<Option<ConnectionId>, HubStopped> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(Command::Register { client, ack })
            .await
            .map_err(|_| HubStopped)?;
        done.await.map_err(|_| HubStopped)
    }

    pub async fn unregister(&self, id: ConnectionId) -> UnregisterOutcome {
        self.request(|reply| Command::Unregister { id, reply })
            .await
            .unwrap_or_default()
    }

    pub async fn deliver_to_user(&self, user_id: &UserId, frame: &str) -> DeliveryOutcome {
        self.request(|reply| Command::DeliverToUser {
            user_id: user_id.clone(),
            frame: frame.to_string(),
            reply,
        })
        .await
        .unwrap_or(DeliveryOutcome::Offline)
    }

    pub async fn broadcast_to_room(&self, room_id: &RoomId, frame: &str) -> BroadcastReport {
        self.request(|reply| Command::BroadcastToRoom {
            room_id: room_id.clone(),
            frame: frame.to_string(),
            reply,
        })
        .await
        .unwrap_or_default()
    }

    /// Whether the user currently has a connection mapped
    pub async fn is_user_connected(&self, user_id: &UserId) -> bool {
        self.request(|reply| Command::IsUserConnected {
            user_id: user_id.clone(),
            reply,
        })
        .await
        .unwrap_or(false)
    }

    pub async fn snapshot(&self) -> Result<HubSnapshot, HubStopped> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Frames dropped so far because a mailbox was full
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, HubStopped> {
        let (reply, response) = oneshot::channel();
        if self.commands.send(command(reply)).await.is_err() {
            tracing::warn!("Connection hub is not running, command discarded");
            return Err(HubStopped);
        }
        response.await.map_err(|_| HubStopped)
    }
}

#[async_trait]
impl MessagePusher for ConnectionHub {
    async fn push_to_user(&self, user_id: &UserId, frame: &str) -> DeliveryOutcome {
        self.deliver_to_user(user_id, frame).await
    }

    async fn broadcast_to_room(&self, room_id: &RoomId, frame: &str) -> BroadcastReport {
        ConnectionHub::broadcast_to_room(self, room_id, frame).await
    }
}

struct HubActor {
    registry: Registry,
    dropped: Arc<AtomicU64>,
}

impl HubActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        tracing::debug!("Connection hub started");
        while let Some(command) = commands.recv().await {
            self.handle(command);
        }
        tracing::debug!("Connection hub stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Register { client, ack } => {
                let _ = ack.send(self.register(client));
            }
            Command::Unregister { id, reply } => {
                let _ = reply.send(self.unregister(&id));
            }
            Command::DeliverToUser {
                user_id,
                frame,
                reply,
            } => {
                let _ = reply.send(self.deliver_to_user(&user_id, &frame));
            }
            Command::BroadcastToRoom {
                room_id,
                frame,
                reply,
            } => {
                let _ = reply.send(self.broadcast_to_room(&room_id, &frame));
            }
            Command::IsUserConnected { user_id, reply } => {
                let _ = reply.send(self.registry.is_user_connected(&user_id));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(HubSnapshot {
                    connections: self.registry.connection_count(),
                    users: self.registry.user_count(),
                    rooms: self.registry.room_count(),
                    dropped_frames: self.dropped.load(Ordering::Relaxed),
                });
            }
        }
    }

    fn register(&mut self, client: Client) -> Option<ConnectionId> {
        let id = client.id();
        let user_id = client.user_id().clone();
        let displaced = self.registry.register(client);
        match displaced {
            Some(previous) => tracing::info!(
                "Connection {} registered for user '{}', replacing {} as current",
                id,
                user_id,
                previous
            ),
            None => tracing::info!("Connection {} registered for user '{}'", id, user_id),
        }
        displaced
    }

    fn unregister(&mut self, id: &ConnectionId) -> UnregisterOutcome {
        match self.registry.unregister(id) {
            Some(client) => {
                let user_still_connected = self.registry.is_user_connected(client.user_id());
                tracing::info!(
                    "Connection {} unregistered for user '{}'",
                    id,
                    client.user_id()
                );
                // dropping the client closes its mailbox, which stops the write pump
                drop(client);
                UnregisterOutcome {
                    removed: true,
                    user_still_connected,
                }
            }
            None => {
                tracing::debug!("Connection {} was not registered", id);
                UnregisterOutcome::default()
            }
        }
    }

    fn deliver_to_user(&mut self, user_id: &UserId, frame: &str) -> DeliveryOutcome {
        let Some(client) = self.registry.current_connection(user_id) else {
            return DeliveryOutcome::Offline;
        };
        let id = client.id();
        match client.try_send(frame) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(SendFailure::Full) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "Mailbox of connection {} (user '{}') is full, frame dropped",
                    id,
                    user_id
                );
                DeliveryOutcome::Dropped
            }
            Err(SendFailure::Closed) => {
                tracing::warn!("Connection {} is closed, removing it", id);
                self.registry.unregister(&id);
                DeliveryOutcome::Closed
            }
        }
    }

    fn broadcast_to_room(&mut self, room_id: &RoomId, frame: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for id in self.registry.room_members(room_id) {
            let Some(client) = self.registry.get(&id) else {
                continue;
            };
            match client.try_send(frame) {
                Ok(()) => report.delivered += 1,
                Err(failure) => {
                    if failure == SendFailure::Full {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    tracing::warn!(
                        "Evicting connection {} from room '{}': mailbox {:?}",
                        id,
                        room_id,
                        failure
                    );
                    self.registry.unregister(&id);
                    report.evicted.push(id);
                }
            }
        }
        report
    }
}
