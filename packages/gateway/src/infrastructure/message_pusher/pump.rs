//! Per-connection read and write loops.
//!
//! Both pumps are generic over the socket halves so they can be driven by an axum
//! `WebSocket` split in production and by in-memory channels in tests.

use std::{fmt::Display, time::Duration};

use async_trait::async_trait;
use axum::{body::Bytes, extract::ws::Message};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};

use super::client::Mailbox;

/// Socket deadlines and keepalive cadence for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpSettings {
    /// Upper bound on one network write (including the flush)
    pub write_deadline: Duration,
    /// Maximum silence from the peer; any received frame resets it
    pub read_deadline: Duration,
    /// Ping cadence; must be shorter than `read_deadline`
    pub ping_interval: Duration,
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self {
            write_deadline: Duration::from_secs(10),
            read_deadline: Duration::from_secs(60),
            ping_interval: Duration::from_secs(54),
        }
    }
}

/// Why the write pump stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePumpExit {
    /// The hub dropped the client; a close frame was sent
    MailboxClosed,
    WriteFailed,
    WriteTimedOut,
}

/// Why the read pump stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPumpExit {
    /// The peer sent a close frame
    ClosedByPeer,
    /// The stream ended without a close frame
    StreamEnded,
    /// Nothing arrived within the read deadline
    DeadlineExpired,
    ReadFailed,
}

/// Receives text frames decoded by the read pump
#[async_trait]
pub trait InboundFrameHandler: Send {
    async fn on_text(&mut self, text: &str);
}

/// Drain the mailbox onto the socket and keep the connection alive with pings.
///
/// Frames already queued when one is picked up go out in the same flush.
pub async fn write_pump<S>(mut sink: S, mut mailbox: Mailbox, settings: PumpSettings) -> WritePumpExit
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ticker = interval_at(
        Instant::now() + settings.ping_interval,
        settings.ping_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = mailbox.recv() => {
                let Some(frame) = frame else {
                    let _ = timeout(settings.write_deadline, sink.send(Message::Close(None))).await;
                    return WritePumpExit::MailboxClosed;
                };
                let mut batch = vec![frame];
                while let Ok(next) = mailbox.try_recv() {
                    batch.push(next);
                }
                match timeout(settings.write_deadline, write_batch(&mut sink, batch)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!("Write failed: {}", e);
                        return WritePumpExit::WriteFailed;
                    }
                    Err(_) => {
                        tracing::warn!("Write deadline of {:?} exceeded", settings.write_deadline);
                        return WritePumpExit::WriteTimedOut;
                    }
                }
            }
            _ = ticker.tick() => {
                match timeout(settings.write_deadline, sink.send(Message::Ping(Bytes::new()))).await {
                    Ok(Ok(())) => tracing::trace!("Ping sent"),
                    Ok(Err(e)) => {
                        tracing::warn!("Ping failed: {}", e);
                        return WritePumpExit::WriteFailed;
                    }
                    Err(_) => {
                        tracing::warn!("Ping exceeded write deadline of {:?}", settings.write_deadline);
                        return WritePumpExit::WriteTimedOut;
                    }
                }
            }
        }
    }
}

async fn write_batch<S>(sink: &mut S, batch: Vec<String>) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
{
    for frame in batch {
        sink.feed(Message::Text(frame.into())).await?;
    }
    sink.flush().await
}

/// Read frames until the peer goes away or stays silent past the read deadline.
///
/// Pings are answered by the socket itself; pongs and other control frames only reset the
/// deadline. Binary frames are ignored.
pub async fn read_pump<St, E, H>(mut stream: St, handler: &mut H, settings: PumpSettings) -> ReadPumpExit
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    H: InboundFrameHandler + ?Sized,
{
    loop {
        let message = match timeout(settings.read_deadline, stream.next()).await {
            Err(_) => {
                tracing::warn!("No frame within read deadline of {:?}", settings.read_deadline);
                return ReadPumpExit::DeadlineExpired;
            }
            Ok(None) => return ReadPumpExit::StreamEnded,
            Ok(Some(Err(e))) => {
                tracing::warn!("WebSocket error: {}", e);
                return ReadPumpExit::ReadFailed;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => handler.on_text(text.as_str()).await,
            Message::Close(_) => {
                tracing::debug!("Peer requested close");
                return ReadPumpExit::ClosedByPeer;
            }
            Message::Binary(_) => tracing::debug!("Ignoring binary frame"),
            Message::Ping(_) | Message::Pong(_) => tracing::trace!("Control frame received"),
        }
    }
}
