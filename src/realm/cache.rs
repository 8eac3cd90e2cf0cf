use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use tokio::sync::OnceCell;

use super::RealmError;
use crate::{auth::Principal, authz::AuthorizationInfo, config::AuthorizationCacheConfig};

/// A realm's own principals, in the order it contributed them.
type PrincipalKey = Vec<Principal>;

/// A load in progress for one key. Marked stale when that key is
/// invalidated so the result is handed to waiters but not stored.
#[derive(Default)]
struct InFlight {
    cell: OnceCell<Arc<AuthorizationInfo>>,
    stale: AtomicBool,
}

struct CacheEntry {
    info: Arc<AuthorizationInfo>,
    expires_at: Option<Instant>,
    last_accessed: Instant,
}

impl CacheEntry {
    fn new(info: Arc<AuthorizationInfo>, expires_at: Option<Instant>) -> Self {
        Self {
            info,
            expires_at,
            last_accessed: Instant::now(),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

/// Per-realm memo of authorization records, keyed by the realm's principals.
///
/// Bounded by `max_entries` with batch LRU eviction, expired by TTL, and
/// cleared explicitly on logout or reconfiguration. Concurrent misses for one
/// key share a single load.
///
/// The cache is local to the process. Invalidation does not propagate to
/// other instances; rely on the TTL there.
pub struct AuthorizationCache {
    entries: DashMap<PrincipalKey, CacheEntry>,
    in_flight: DashMap<PrincipalKey, Arc<InFlight>>,
    /// Bumped by `clear`; loads that straddle a bump are not stored.
    generation: AtomicU64,
    ttl: Option<Duration>,
    max_entries: usize,
    eviction_batch_size: usize,
}

impl AuthorizationCache {
    pub fn new(config: &AuthorizationCacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            generation: AtomicU64::new(0),
            ttl: (config.ttl_secs > 0).then(|| Duration::from_secs(config.ttl_secs)),
            max_entries: config.max_entries.max(1),
            eviction_batch_size: config.eviction_batch_size.max(1),
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl.filter(|t| !t.is_zero());
        self
    }

    pub fn get(&self, key: &[Principal]) -> Option<Arc<AuthorizationInfo>> {
        let mut entry = self.entries.get_mut(key)?;
        if entry.is_expired() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }

        entry.touch();
        Some(entry.info.clone())
    }

    pub fn insert(&self, key: PrincipalKey, info: Arc<AuthorizationInfo>) {
        self.evict_if_needed();
        let expires_at = self.ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key, CacheEntry::new(info, expires_at));
    }

    /// Return the cached record for `key`, or run `load` once and cache it.
    ///
    /// Callers that miss while a load for the same key is running wait for
    /// that load instead of starting their own. The boolean is true only when
    /// the record was already cached; callers that joined a load see false.
    pub async fn get_or_load<F, Fut>(
        &self,
        key: PrincipalKey,
        load: F,
    ) -> Result<(Arc<AuthorizationInfo>, bool), RealmError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AuthorizationInfo, RealmError>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok((hit, true));
        }

        let flight = self.in_flight.entry(key.clone()).or_default().value().clone();

        let hit = AtomicBool::new(false);
        let result = {
            let (key, hit, flight_ref) = (&key, &hit, &flight);
            flight
                .cell
                .get_or_try_init(move || async move {
                    // Another waiter may have stored the record between our miss and now.
                    if let Some(cached) = self.get(key) {
                        hit.store(true, Ordering::Relaxed);
                        return Ok::<_, RealmError>(cached);
                    }
                    let generation = self.generation.load(Ordering::SeqCst);
                    let info = Arc::new(load().await?);
                    self.store_unless_stale(key, &info, flight_ref, generation);
                    Ok(info)
                })
                .await
                .cloned()
        };

        self.in_flight
            .remove_if(&key, |_, current| Arc::ptr_eq(current, &flight));

        result.map(|info| (info, hit.load(Ordering::Relaxed)))
    }

    /// Checked again after inserting. An invalidation marks before it
    /// removes, so either the second check sees the mark or the removal sees
    /// the entry.
    fn store_unless_stale(
        &self,
        key: &PrincipalKey,
        info: &Arc<AuthorizationInfo>,
        flight: &InFlight,
        generation: u64,
    ) {
        let is_stale = || {
            flight.stale.load(Ordering::SeqCst)
                || self.generation.load(Ordering::SeqCst) != generation
        };
        if is_stale() {
            return;
        }
        self.insert(key.clone(), info.clone());
        if is_stale() {
            self.entries
                .remove_if(key, |_, entry| Arc::ptr_eq(&entry.info, info));
        }
    }

    /// Drop the record for one key. Loads running for other keys are unaffected.
    pub fn invalidate(&self, key: &[Principal]) {
        if let Some((_, flight)) = self.in_flight.remove(key) {
            flight.stale.store(true, Ordering::SeqCst);
        }
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.in_flight.clear();
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_if_needed(&self) {
        if self.entries.len() < self.max_entries {
            return;
        }

        self.entries.retain(|_, entry| !entry.is_expired());

        let current_len = self.entries.len();
        if current_len < self.max_entries {
            return;
        }

        let target_size = self.max_entries.saturating_sub(self.eviction_batch_size);
        let to_evict = current_len.saturating_sub(target_size);
        if to_evict == 0 {
            return;
        }

        // Oldest access first
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.last_accessed))
            .collect();
        entries.sort_by_key(|(_, last_accessed)| *last_accessed);

        for (key, _) in entries.into_iter().take(to_evict) {
            self.entries.remove(&key);
        }

        tracing::debug!(evicted = to_evict, "Authorization cache evicted entries");
    }
}
