//! A single accepted WebSocket connection as seen by the hub.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::{ConnectionId, RoomId, UserId};

/// Receiving side of a client's outbound mailbox, consumed by the write pump
pub type Mailbox = mpsc::Receiver<String>;

/// Why a non-blocking mailbox send did not go through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The mailbox is at capacity; the frame is dropped
    Full,
    /// The write pump is gone
    Closed,
}

/// One live connection: identity plus the sending side of its bounded mailbox.
///
/// The hub owns the only strong sender, so dropping the `Client` closes the mailbox.
#[derive(Debug)]
pub struct Client {
    id: ConnectionId,
    user_id: UserId,
    room_id: Option<RoomId>,
    sender: mpsc::Sender<String>,
}

impl Client {
    /// Create a client and its mailbox. A capacity of zero is raised to one.
    pub fn new(user_id: UserId, room_id: Option<RoomId>, capacity: usize) -> (Self, Mailbox) {
        let (sender, mailbox) = mpsc::channel(capacity.max(1));
        let client = Self {
            id: ConnectionId::generate(),
            user_id,
            room_id,
            sender,
        };
        (client, mailbox)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    /// Queue a frame without waiting for mailbox space
    pub fn try_send(&self, frame: &str) -> Result<(), SendFailure> {
        self.sender
            .try_send(frame.to_string())
            .map_err(|e| match e {
                TrySendError::Full(_) => SendFailure::Full,
                TrySendError::Closed(_) => SendFailure::Closed,
            })
    }

    /// A handle that can write into this client's mailbox without keeping it open
    pub fn reply_handle(&self) -> ReplyHandle {
        ReplyHandle {
            sender: self.sender.downgrade(),
        }
    }
}

/// Weak handle to a client's mailbox, used by a session to answer its own client.
///
/// Once the hub drops the `Client` the handle stops delivering.
#[derive(Debug, Clone)]
pub struct ReplyHandle {
    sender: mpsc::WeakSender<String>,
}

impl ReplyHandle {
    pub fn try_send(&self, frame: &str) -> Result<(), SendFailure> {
        let sender = self.sender.upgrade().ok_or(SendFailure::Closed)?;
        sender.try_send(frame.to_string()).map_err(|e| match e {
            TrySendError::Full(_) => SendFailure::Full,
            TrySendError::Closed(_) => SendFailure::Closed,
        })
    }
}
