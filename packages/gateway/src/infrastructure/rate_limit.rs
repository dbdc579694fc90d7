//! Per-client-IP token bucket admission control.
//!
//! Buckets are created lazily on first sight of an IP and start full. The map is behind a
//! reader/writer lock and every bucket has its own mutex, so requests from different IPs only
//! contend on the map when a new IP shows up.

use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{Arc, Mutex, RwLock},
    time::{Duration, Instant},
};

use kairo_shared::time::Clock;
use tokio::task::JoinHandle;

/// Token bucket state for one client
#[derive(Debug)]
pub struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_second: f64,
    last_refill: Instant,
    /// Set once the sweeper has dropped this bucket from the map
    evicted: bool,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_per_second: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_per_second,
            last_refill: now,
            evicted: false,
        }
    }

    /// Refill for the time elapsed since the last call, then take one token if available
    pub fn allow(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_per_second).min(self.capacity);
        self.last_refill = self.last_refill.max(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_refill)
    }
}

pub struct RateLimiter {
    buckets: RwLock<HashMap<IpAddr, Arc<Mutex<TokenBucket>>>>,
    capacity: f64,
    refill_per_second: f64,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(capacity: f64, refill_per_second: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            capacity,
            refill_per_second,
            clock,
        }
    }

    /// Admission decision for one request from `ip`. Never blocks on I/O.
    pub fn allow(&self, ip: IpAddr) -> bool {
        let now = self.clock.now();
        loop {
            let bucket = self.bucket_for(ip, now);
            // the sweeper may have dropped the bucket between lookup and lock
            if let Some(allowed) = take_token(&bucket, now) {
                return allowed;
            }
        }
    }

    fn bucket_for(&self, ip: IpAddr, now: Instant) -> Arc<Mutex<TokenBucket>> {
        {
            let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
            if let Some(bucket) = buckets.get(&ip) {
                return Arc::clone(bucket);
            }
        }
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        let bucket = buckets.entry(ip).or_insert_with(|| {
            tracing::debug!("Tracking new client {}", ip);
            Arc::new(Mutex::new(TokenBucket::new(
                self.capacity,
                self.refill_per_second,
                now,
            )))
        });
        Arc::clone(bucket)
    }

    /// Drop buckets that have not been used for `ttl`. Returns how many were removed.
    ///
    /// An evicted client starts again with a full bucket.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let now = self.clock.now();
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            let mut bucket = bucket.lock().unwrap_or_else(|e| e.into_inner());
            let keep = bucket.idle_for(now) < ttl;
            bucket.evicted = !keep;
            keep
        });
        before - buckets.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Periodically evict idle buckets until the returned task is aborted
    pub fn spawn_sweeper(self: Arc<Self>, ttl: Duration, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle(ttl);
                if evicted > 0 {
                    tracing::debug!("Evicted {} idle rate-limit buckets", evicted);
                }
            }
        })
    }
}

/// `None` when the bucket is no longer tracked and a fresh one must be looked up
fn take_token(bucket: &Mutex<TokenBucket>, now: Instant) -> Option<bool> {
    let mut bucket = bucket.lock().unwrap_or_else(|e| e.into_inner());
    (!bucket.evicted).then(|| bucket.allow(now))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use kairo_shared::time::ManualClock;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, last))
    }

    fn limiter(capacity: f64, refill: f64) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (RateLimiter::new(capacity, refill, clock.clone()), clock)
    }

    #[test]
    fn test_capacity_then_refill() {
        // テスト項目: 容量分は即座に許可され、次は拒否、1/r 秒後に 1 回だけ許可される
        // given (前提条件):
        let (limiter, clock) = limiter(3.0, 0.5);

        // when (操作):
        let burst: Vec<bool> = (0..4).map(|_| limiter.allow(ip(1))).collect();
        clock.advance(Duration::from_secs(2));
        let after_refill = limiter.allow(ip(1));
        let next = limiter.allow(ip(1));

        // then (期待する結果):
        assert_eq!(burst, vec![true, true, true, false]);
        assert!(after_refill);
        assert!(!next);
    }

    #[test]
    fn test_fractional_tokens_persist() {
        // テスト項目: 端数のトークンは次回の補充に持ち越される
        // given (前提条件):
        let (limiter, clock) = limiter(1.0, 0.5);
        assert!(limiter.allow(ip(1)));

        // when (操作):
        clock.advance(Duration::from_secs(1));
        let half = limiter.allow(ip(1));
        clock.advance(Duration::from_secs(1));
        let full = limiter.allow(ip(1));

        // then (期待する結果):
        assert!(!half);
        assert!(full);
    }

    #[test]
    fn test_tokens_never_exceed_capacity() {
        // テスト項目: 長時間経過してもトークンは容量を超えない
        // given (前提条件):
        let now = Instant::now();
        let mut bucket = TokenBucket::new(2.0, 1.0, now);

        // when (操作):
        let later = now + Duration::from_secs(3600);
        let results: Vec<bool> = (0..3).map(|_| bucket.allow(later)).collect();

        // then (期待する結果):
        assert_eq!(results, vec![true, true, false]);
        assert!(bucket.tokens() >= 0.0 && bucket.tokens() <= 2.0);
    }

    #[test]
    fn test_clock_going_backwards_does_not_refill() {
        // テスト項目: 過去の時刻で呼ばれても補充されずトークンが負にならない
        // given (前提条件):
        let now = Instant::now() + Duration::from_secs(10);
        let mut bucket = TokenBucket::new(1.0, 1.0, now);
        assert!(bucket.allow(now));

        // when (操作):
        let result = bucket.allow(now - Duration::from_secs(5));

        // then (期待する結果):
        assert!(!result);
        assert_eq!(bucket.tokens(), 0.0);
    }

    #[test]
    fn test_clients_are_limited_independently() {
        // テスト項目: IP ごとに独立したバケットが使われる
        // given (前提条件):
        let (limiter, _clock) = limiter(1.0, 0.1);
        assert!(limiter.allow(ip(1)));

        // when (操作):
        let same = limiter.allow(ip(1));
        let other = limiter.allow(ip(2));

        // then (期待する結果):
        assert!(!same);
        assert!(other);
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_evict_idle_removes_only_stale_buckets() {
        // テスト項目: TTL を超えて使われていないバケットだけが削除される
        // given (前提条件):
        let (limiter, clock) = limiter(5.0, 1.0);
        limiter.allow(ip(1));
        clock.advance(Duration::from_secs(60));
        limiter.allow(ip(2));

        // when (操作):
        clock.advance(Duration::from_secs(30));
        let evicted = limiter.evict_idle(Duration::from_secs(45));

        // then (期待する結果):
        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_evicted_bucket_is_not_charged() {
        // テスト項目: 削除済みのバケットは消費されず、次の判定は新しいバケットで行われる
        // given (前提条件):
        let (limiter, clock) = limiter(1.0, 0.001);
        let now = clock.now();
        let stale = limiter.bucket_for(ip(1), now);
        clock.advance(Duration::from_secs(120));
        limiter.evict_idle(Duration::from_secs(60));

        // when (操作):
        let on_stale = take_token(&stale, clock.now());
        let first = limiter.allow(ip(1));
        let second = limiter.allow(ip(1));

        // then (期待する結果):
        assert_eq!(on_stale, None);
        assert_eq!(stale.lock().unwrap().tokens(), 1.0);
        assert!(first);
        assert!(!second);
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
