use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::clock::Clock;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend unavailable")]
    Unavailable,
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Latest submission snapshot kept alongside a member's cumulative score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberMeta {
    pub last_score: i64,
    pub time_ms: i64,
    pub combo: i32,
    pub perfect: bool,
    pub mode: String,
    pub updated_at: DateTime<Utc>,
}

/// The cache backend contract: atomic sorted-set increment/range plus a
/// member metadata hash with per-bucket expiry. Implementations must be
/// safe under concurrent writers.
pub trait RankingStore: Send + Sync {
    /// Atomically add `delta` to the member's score, returning the new total.
    fn increment_score(&self, bucket: &str, member: &str, delta: i64) -> CacheResult<i64>;

    /// Top members by descending score; ties resolve by member key.
    fn top_n(&self, bucket: &str, n: usize) -> CacheResult<Vec<(String, i64)>>;

    fn put_meta(&self, bucket: &str, member: &str, meta: MemberMeta) -> CacheResult<()>;

    /// Batched metadata lookup, one slot per requested member.
    fn get_meta(&self, bucket: &str, members: &[String]) -> CacheResult<Vec<Option<MemberMeta>>>;

    /// (Re)arm the bucket's TTL.
    fn expire(&self, bucket: &str, ttl: Duration) -> CacheResult<()>;
}

#[derive(Default)]
struct Bucket {
    scores: HashMap<String, i64>,
    meta: HashMap<String, MemberMeta>,
    expires_at: Option<DateTime<Utc>>,
}

/// Process-local ranking store. Expiry is lazy: a bucket past its deadline
/// is dropped on next access. The availability flag lets operators (and
/// tests) force the degraded path without tearing the process down.
pub struct MemoryRankingStore {
    buckets: RwLock<HashMap<String, Bucket>>,
    available: AtomicBool,
    clock: Arc<dyn Clock>,
}

impl MemoryRankingStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            clock,
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> CacheResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Unavailable)
        }
    }

    fn drop_if_expired(&self, buckets: &mut HashMap<String, Bucket>, bucket: &str) {
        let now = self.clock.now();
        let expired = buckets
            .get(bucket)
            .and_then(|b| b.expires_at)
            .map(|deadline| deadline <= now)
            .unwrap_or(false);
        if expired {
            buckets.remove(bucket);
        }
    }
}

impl RankingStore for MemoryRankingStore {
    fn increment_score(&self, bucket: &str, member: &str, delta: i64) -> CacheResult<i64> {
        self.check_available()?;
        let mut buckets = self.buckets.write().map_err(|_| CacheError::Unavailable)?;
        self.drop_if_expired(&mut buckets, bucket);
        let entry = buckets.entry(bucket.to_string()).or_default();
        let score = entry.scores.entry(member.to_string()).or_insert(0);
        *score += delta;
        Ok(*score)
    }

    fn top_n(&self, bucket: &str, n: usize) -> CacheResult<Vec<(String, i64)>> {
        self.check_available()?;
        let mut buckets = self.buckets.write().map_err(|_| CacheError::Unavailable)?;
        self.drop_if_expired(&mut buckets, bucket);
        let Some(state) = buckets.get(bucket) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(String, i64)> = state
            .scores
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        members.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        members.truncate(n);
        Ok(members)
    }

    fn put_meta(&self, bucket: &str, member: &str, meta: MemberMeta) -> CacheResult<()> {
        self.check_available()?;
        let mut buckets = self.buckets.write().map_err(|_| CacheError::Unavailable)?;
        self.drop_if_expired(&mut buckets, bucket);
        let entry = buckets.entry(bucket.to_string()).or_default();
        entry.meta.insert(member.to_string(), meta);
        Ok(())
    }

    fn get_meta(&self, bucket: &str, members: &[String]) -> CacheResult<Vec<Option<MemberMeta>>> {
        self.check_available()?;
        let mut buckets = self.buckets.write().map_err(|_| CacheError::Unavailable)?;
        self.drop_if_expired(&mut buckets, bucket);
        let Some(state) = buckets.get(bucket) else {
            return Ok(vec![None; members.len()]);
        };
        Ok(members
            .iter()
            .map(|m| state.meta.get(m).cloned())
            .collect())
    }

    fn expire(&self, bucket: &str, ttl: Duration) -> CacheResult<()> {
        self.check_available()?;
        let mut buckets = self.buckets.write().map_err(|_| CacheError::Unavailable)?;
        let entry = buckets.entry(bucket.to_string()).or_default();
        entry.expires_at = Some(self.clock.now() + ttl);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Clock whose current instant can be advanced mid-test.
    struct SteppingClock(Mutex<DateTime<Utc>>);

    impl SteppingClock {
        fn at(t: DateTime<Utc>) -> Self {
            Self(Mutex::new(t))
        }

        fn advance(&self, by: Duration) {
            let mut t = self.0.lock().unwrap();
            *t = *t + by;
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn meta(score: i64) -> MemberMeta {
        MemberMeta {
            last_score: score,
            time_ms: 60_000,
            combo: 2,
            perfect: false,
            mode: "standard".to_string(),
            updated_at: t0(),
        }
    }

    #[test]
    fn increments_accumulate() {
        let store = MemoryRankingStore::new(Arc::new(crate::clock::FixedClock(t0())));
        assert_eq!(store.increment_score("b", "alice", 100).unwrap(), 100);
        assert_eq!(store.increment_score("b", "alice", 250).unwrap(), 350);
        assert_eq!(store.increment_score("b", "bob", 50).unwrap(), 50);
    }

    #[test]
    fn top_n_orders_descending_with_stable_ties() {
        let store = MemoryRankingStore::new(Arc::new(crate::clock::FixedClock(t0())));
        store.increment_score("b", "carol", 200).unwrap();
        store.increment_score("b", "alice", 300).unwrap();
        store.increment_score("b", "bob", 200).unwrap();
        let top = store.top_n("b", 10).unwrap();
        assert_eq!(
            top,
            vec![
                ("alice".to_string(), 300),
                ("bob".to_string(), 200),
                ("carol".to_string(), 200),
            ]
        );
        assert_eq!(store.top_n("b", 1).unwrap().len(), 1);
    }

    #[test]
    fn meta_roundtrip_and_missing_members() {
        let store = MemoryRankingStore::new(Arc::new(crate::clock::FixedClock(t0())));
        store.put_meta("b", "alice", meta(300)).unwrap();
        let got = store
            .get_meta("b", &["alice".to_string(), "ghost".to_string()])
            .unwrap();
        assert_eq!(got[0].as_ref().unwrap().last_score, 300);
        assert!(got[1].is_none());
    }

    #[test]
    fn unavailable_store_errors_on_every_op() {
        let store = MemoryRankingStore::new(Arc::new(crate::clock::FixedClock(t0())));
        store.set_available(false);
        assert!(matches!(
            store.increment_score("b", "alice", 1),
            Err(CacheError::Unavailable)
        ));
        assert!(store.top_n("b", 10).is_err());
        assert!(store.put_meta("b", "alice", meta(1)).is_err());
        assert!(store.expire("b", Duration::days(1)).is_err());

        store.set_available(true);
        assert!(store.increment_score("b", "alice", 1).is_ok());
    }

    #[test]
    fn expired_bucket_is_dropped_on_access() {
        let clock = Arc::new(SteppingClock::at(t0()));
        let store = MemoryRankingStore::new(clock.clone());
        store.increment_score("weekly", "alice", 500).unwrap();
        store.expire("weekly", Duration::days(35)).unwrap();

        clock.advance(Duration::days(34));
        assert_eq!(store.top_n("weekly", 10).unwrap().len(), 1);

        clock.advance(Duration::days(2));
        assert!(store.top_n("weekly", 10).unwrap().is_empty());
        // A fresh increment starts a new bucket from zero.
        assert_eq!(store.increment_score("weekly", "alice", 100).unwrap(), 100);
    }
}
