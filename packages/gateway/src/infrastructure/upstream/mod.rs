//! Outbound connections to the RPC services behind the gateway.
//!
//! One [`ConnectionPool`] per service, keyed by [`UpstreamService`]. Business handlers take a
//! connection, use it and hand it back; the pools themselves know nothing about the RPC schema.

pub mod pool;

use std::{collections::HashMap, fmt, sync::Arc};

pub use pool::{ConnectionPool, Connector, PoolError, PoolSettings, TcpConnector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UpstreamService {
    Auth,
    User,
    Thread,
    Community,
}

impl UpstreamService {
    pub const ALL: [UpstreamService; 4] = [Self::Auth, Self::User, Self::Thread, Self::Community];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::User => "user",
            Self::Thread => "thread",
            Self::Community => "community",
        }
    }
}

impl fmt::Display for UpstreamService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pool occupancy for one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub service: UpstreamService,
    pub address: String,
    pub idle: usize,
    pub open: usize,
}

/// Connection pools for every configured upstream service
pub struct UpstreamPools<C: Connector = TcpConnector> {
    pools: HashMap<UpstreamService, Arc<ConnectionPool<C>>>,
}

impl UpstreamPools<TcpConnector> {
    /// TCP pools for the given `(service, address)` pairs, all sharing `settings`
    pub fn tcp(
        addresses: impl IntoIterator<Item = (UpstreamService, String)>,
        settings: PoolSettings,
    ) -> Self {
        Self::with_connector(addresses, settings, |_| TcpConnector)
    }
}

impl<C: Connector> UpstreamPools<C> {
    pub fn with_connector(
        addresses: impl IntoIterator<Item = (UpstreamService, String)>,
        settings: PoolSettings,
        mut connector: impl FnMut(UpstreamService) -> C,
    ) -> Self {
        let pools = addresses
            .into_iter()
            .map(|(service, addr)| {
                tracing::info!("Upstream {} at {}", service, addr);
                let pool = ConnectionPool::new(addr, connector(service), settings);
                (service, Arc::new(pool))
            })
            .collect();
        Self { pools }
    }

    pub fn get(&self, service: UpstreamService) -> Option<Arc<ConnectionPool<C>>> {
        self.pools.get(&service).cloned()
    }

    /// Occupancy of every pool, ordered by service
    pub fn stats(&self) -> Vec<PoolStats> {
        let mut stats: Vec<PoolStats> = self
            .pools
            .iter()
            .map(|(service, pool)| PoolStats {
                service: *service,
                address: pool.addr().to_string(),
                idle: pool.idle_count(),
                open: pool.open_count(),
            })
            .collect();
        stats.sort_by_key(|s| s.service);
        stats
    }

    pub fn close_all(&self) {
        for pool in self.pools.values() {
            pool.close();
        }
    }
}
