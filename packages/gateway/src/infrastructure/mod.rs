//! Infrastructure layer: concrete implementations behind the domain seams.

pub mod dto;
pub mod message_pusher;
pub mod rate_limit;
pub mod repository;
pub mod upstream;
