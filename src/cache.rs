//! Cache capability.
//!
//! `Cache` is a key-value surface with set-with-expiry semantics: absence is
//! a normal, common result (cold cache or expiry), and backend errors are
//! expected to be absorbed by the caller. `MemoryCache` is the process-local
//! implementation; time is injected through `Clock` so TTL behavior is
//! testable without wall-clock sleeps.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

// ---

/// Time source for cache expiry and payload timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ---

/// Key-value cache with per-entry TTL.
///
/// Values are opaque serialized payloads. Implementations must return an
/// entry stored with TTL `t` for the full duration `t` and treat it as
/// absent thereafter.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
}

// ---

struct Entry {
    data: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// In-process cache backing the facade.
///
/// Expired entries are dropped lazily on `get`; there is no background
/// sweeper. Entries are never explicitly invalidated, the staleness window
/// equals the TTL.
pub struct MemoryCache {
    // ---
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    // ---
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if now < entry.expires_at => return Ok(Some(entry.data.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired: drop the entry before reporting a miss.
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        // TTLs here are small fixed constants; an out-of-range conversion is
        // capped rather than surfaced as a caller-visible failure.
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365));
        let expires_at = self.clock.now() + ttl;
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                data: value,
                expires_at,
            },
        );
        Ok(())
    }
}

// ---

#[cfg(test)]
pub(crate) mod manual {
    //! Settable clock for TTL tests.

    use std::sync::Mutex;

    use super::*;

    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn at(now: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::from_std(by).unwrap();
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use chrono::TimeZone;

    use super::manual::ManualClock;
    use super::*;

    fn cache_at_epoch() -> (Arc<ManualClock>, MemoryCache) {
        let clock = Arc::new(ManualClock::at(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let cache = MemoryCache::new(clock.clone());
        (clock, cache)
    }

    #[tokio::test]
    async fn entry_lives_for_full_ttl_then_expires() {
        // ---
        let (clock, cache) = cache_at_epoch();
        cache
            .set("summary:v1", b"payload".to_vec(), Duration::from_secs(30))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(29));
        assert_eq!(
            cache.get("summary:v1").await.unwrap(),
            Some(b"payload".to_vec())
        );

        // The boundary instant is already expired.
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("summary:v1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn absent_key_is_a_miss_not_an_error() {
        // ---
        let (_clock, cache) = cache_at_epoch();
        assert_eq!(cache.get("overlays:v1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_replaces_value_and_expiry() {
        // ---
        let (clock, cache) = cache_at_epoch();
        cache
            .set("history:v1:days:7", b"old".to_vec(), Duration::from_secs(10))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(8));
        cache
            .set("history:v1:days:7", b"new".to_vec(), Duration::from_secs(10))
            .await
            .unwrap();

        // Past the first entry's deadline but within the second's.
        clock.advance(Duration::from_secs(5));
        assert_eq!(
            cache.get("history:v1:days:7").await.unwrap(),
            Some(b"new".to_vec())
        );
    }
}
