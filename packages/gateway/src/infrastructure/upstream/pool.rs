//! Bounded pool of reusable outbound connections to one upstream address.
//!
//! `get` prefers an idle connection and otherwise dials under a timeout. At most `max_open`
//! connections exist at once (idle plus handed out); beyond that `get` fails fast with
//! [`PoolError::Exhausted`] instead of waiting. Every connection handed out by `get` must come
//! back exactly once through `put` (still healthy) or `discard` (failed in use).

use std::{
    collections::VecDeque,
    io,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::net::TcpStream;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("dialing {addr} timed out after {timeout:?}")]
    DialTimeout { addr: String, timeout: Duration },
    #[error("all {max_open} connections to {addr} are in use")]
    Exhausted { addr: String, max_open: usize },
    #[error("connection pool for {addr} is closed")]
    Closed { addr: String },
}

/// Opens and closes transport connections for a pool
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;

    async fn connect(&self, addr: &str) -> io::Result<Self::Connection>;

    fn close(&self, conn: Self::Connection) {
        drop(conn);
    }
}

/// Plain TCP transport
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Connection = TcpStream;

    async fn connect(&self, addr: &str) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Connections kept for reuse
    pub max_idle: usize,
    /// Connections alive at once, idle or handed out
    pub max_open: usize,
    pub dial_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_idle: 5,
            max_open: 20,
            dial_timeout: Duration::from_secs(3),
        }
    }
}

pub struct ConnectionPool<C: Connector> {
    addr: String,
    connector: C,
    settings: PoolSettings,
    idle: Mutex<VecDeque<C::Connection>>,
    open: AtomicUsize,
    closed: AtomicBool,
}

impl<C: Connector> ConnectionPool<C> {
    pub fn new(addr: impl Into<String>, connector: C, settings: PoolSettings) -> Self {
        Self {
            addr: addr.into(),
            connector,
            settings,
            idle: Mutex::new(VecDeque::with_capacity(settings.max_idle)),
            open: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Take the most recently returned idle connection, or dial a new one if none is idle
    pub async fn get(&self) -> Result<C::Connection, PoolError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed {
                addr: self.addr.clone(),
            });
        }

        if let Some(conn) = self.lock_idle().pop_back() {
            tracing::trace!("Reusing idle connection to {}", self.addr);
            return Ok(conn);
        }

        let max_open = self.settings.max_open;
        if self
            .open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| {
                (open < max_open).then_some(open + 1)
            })
            .is_err()
        {
            tracing::warn!("Connection pool for {} exhausted ({} open)", self.addr, max_open);
            return Err(PoolError::Exhausted {
                addr: self.addr.clone(),
                max_open,
            });
        }

        let dialed = tokio::time::timeout(
            self.settings.dial_timeout,
            self.connector.connect(&self.addr),
        )
        .await;
        match dialed {
            Ok(Ok(conn)) => {
                tracing::debug!("Dialed new connection to {}", self.addr);
                Ok(conn)
            }
            Ok(Err(source)) => {
                self.open.fetch_sub(1, Ordering::AcqRel);
                Err(PoolError::Dial {
                    addr: self.addr.clone(),
                    source,
                })
            }
            Err(_) => {
                self.open.fetch_sub(1, Ordering::AcqRel);
                Err(PoolError::DialTimeout {
                    addr: self.addr.clone(),
                    timeout: self.settings.dial_timeout,
                })
            }
        }
    }

    /// Hand a healthy connection back. It is closed if the idle list is full or the pool is closed.
    pub fn put(&self, conn: C::Connection) {
        if !self.closed.load(Ordering::Acquire) {
            let mut idle = self.lock_idle();
            if idle.len() < self.settings.max_idle {
                idle.push_back(conn);
                return;
            }
        }
        self.close_one(conn);
    }

    /// Close a connection that failed while in use
    pub fn discard(&self, conn: C::Connection) {
        tracing::debug!("Discarding connection to {}", self.addr);
        self.close_one(conn);
    }

    /// Close every idle connection and refuse further `get` calls.
    ///
    /// Connections still handed out are closed when they come back.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let drained: Vec<C::Connection> = self.lock_idle().drain(..).collect();
        let count = drained.len();
        for conn in drained {
            self.close_one(conn);
        }
        tracing::info!("Closed connection pool for {} ({} idle)", self.addr, count);
    }

    pub fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    pub fn open_count(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    fn close_one(&self, conn: C::Connection) {
        self.connector.close(conn);
        // saturating: a connection that did not come from this pool must not wrap the counter
        let _ = self
            .open
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| open.checked_sub(1));
    }

    fn lock_idle(&self) -> std::sync::MutexGuard<'_, VecDeque<C::Connection>> {
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }
}
