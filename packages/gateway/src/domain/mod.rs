//! Domain layer: value objects, entities and the seams the infrastructure implements.

pub mod entity;
pub mod error;
pub mod pusher;
pub mod value_object;

pub use entity::{Notification, NotificationType};
pub use error::{NotificationError, ValueObjectError};
pub use pusher::{BroadcastReport, DeliveryOutcome, MessagePusher};
pub use value_object::{ConnectionId, NotificationId, RoomId, UserId};
