//! Bounded LRU keyed by leaf-name within a single directory, mapping to an inferred [Type].

use std::sync::Arc;
use std::time::Duration;

use linked_hash_map::LinkedHashMap;

use crate::clock::Clock;
use crate::expiry::Expiry;
use crate::types::Type;

/// Fixed per-entry overhead charged against the configured budget, approximating the cost of the
/// linked-list node, hash bucket, and [Expiry]/[Type] fields beyond the name's own bytes.
const ENTRY_OVERHEAD_BYTES: usize = 64;

#[derive(Debug, Clone, Copy)]
enum Budget {
    /// `TypeCacheMaxSizeMb == -1`: never evict for size, only for TTL.
    Unbounded,
    /// `TypeCacheMaxSizeMb == 0`: the cache is disabled outright.
    Disabled,
    Bytes(usize),
}

impl Budget {
    fn from_config_mb(size_mb: i64) -> Self {
        match size_mb {
            0 => Budget::Disabled,
            n if n < 0 => Budget::Unbounded,
            n => Budget::Bytes((n as usize).saturating_mul(1024 * 1024)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    expiry: Expiry,
    ty: Type,
}

/// Per-directory leaf-name -> [Type] cache with a TTL and an optional size bound.
///
/// A cached entry for a name is authoritative until its TTL expires, even if conflicting server
/// state appears in the interim: this is intentional, trading a window of possible staleness for
/// stable `readdir` results within the TTL.
#[derive(Debug)]
pub struct TypeCache {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    budget: Budget,
    entries: LinkedHashMap<String, Entry>,
    used_bytes: usize,
}

impl TypeCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration, size_mb: i64) -> Self {
        Self {
            clock,
            ttl,
            budget: Budget::from_config_mb(size_mb),
            entries: LinkedHashMap::new(),
            used_bytes: 0,
        }
    }

    fn entry_cost(name: &str) -> usize {
        name.len() + ENTRY_OVERHEAD_BYTES
    }

    /// Insert or overwrite the type for `name`. No-op if the cache is disabled.
    pub fn insert(&mut self, name: &str, ty: Type) {
        if matches!(self.budget, Budget::Disabled) {
            return;
        }
        self.remove_internal(name);

        let cost = Self::entry_cost(name);
        if let Budget::Bytes(cap) = self.budget {
            while self.used_bytes + cost > cap {
                let Some((evicted_name, _)) = self.entries.pop_front() else {
                    break;
                };
                self.used_bytes -= Self::entry_cost(&evicted_name);
                metrics::counter!("typecache.evict", 1);
            }
            // If a single entry is larger than the whole budget, don't bother caching it.
            if cost > cap {
                return;
            }
        }

        let expiry = Expiry::from_clock(self.clock.as_ref(), self.ttl);
        self.entries.insert(name.to_owned(), Entry { expiry, ty });
        self.used_bytes += cost;
    }

    pub fn erase(&mut self, name: &str) {
        self.remove_internal(name);
    }

    fn remove_internal(&mut self, name: &str) {
        if self.entries.remove(name).is_some() {
            self.used_bytes -= Self::entry_cost(name);
        }
    }

    /// Returns [Type::Unknown] if the name is absent or its entry has expired; an expired entry
    /// is evicted as a side effect of this read.
    pub fn get(&mut self, name: &str) -> Type {
        if matches!(self.budget, Budget::Disabled) {
            metrics::counter!("typecache.miss", 1);
            return Type::Unknown;
        }

        let found = self.entries.get_refresh(name).copied();
        match found {
            Some(entry) if !entry.expiry.is_expired(self.clock.as_ref()) => {
                metrics::counter!("typecache.hit", 1);
                entry.ty
            }
            Some(_) => {
                self.remove_internal(name);
                metrics::counter!("typecache.miss", 1);
                Type::Unknown
            }
            None => {
                metrics::counter!("typecache.miss", 1);
                Type::Unknown
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;

    fn cache(ttl_secs: u64, size_mb: i64) -> (TypeCache, TestClock) {
        let clock = TestClock::new();
        let cache = TypeCache::new(Arc::new(clock.clone()), Duration::from_secs(ttl_secs), size_mb);
        (cache, clock)
    }

    #[test]
    fn ttl_expiry() {
        let (mut cache, clock) = cache(10, -1);
        cache.insert("a", Type::RegularFile);
        assert_eq!(cache.get("a"), Type::RegularFile);

        clock.advance(Duration::from_secs(9));
        assert_eq!(cache.get("a"), Type::RegularFile);

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("a"), Type::Unknown);
        assert_eq!(cache.len(), 0, "expired entry should be evicted on read");
    }

    #[test]
    fn disabled_cache_is_always_a_miss() {
        let (mut cache, _clock) = cache(10, 0);
        cache.insert("a", Type::RegularFile);
        assert_eq!(cache.get("a"), Type::Unknown);
    }

    #[test]
    fn erase_removes_entry() {
        let (mut cache, _clock) = cache(10, -1);
        cache.insert("a", Type::Nonexistent);
        cache.erase("a");
        assert_eq!(cache.get("a"), Type::Unknown);
    }

    #[test]
    fn size_bound_evicts_lru() {
        // Budget big enough for exactly two entries named "a" and "b".
        let budget = TypeCache::entry_cost("a") + TypeCache::entry_cost("b");
        let mut cache = TypeCache {
            budget: Budget::Bytes(budget),
            ..TypeCache::new(Arc::new(TestClock::new()), Duration::from_secs(60), -1)
        };

        cache.insert("a", Type::RegularFile);
        cache.insert("b", Type::RegularFile);
        assert_eq!(cache.get("a"), Type::RegularFile);
        assert_eq!(cache.get("b"), Type::RegularFile);
        // "a" was refreshed by the get() above, so inserting "c" evicts "b" (the new LRU front).
        cache.insert("c", Type::ExplicitDir);
        assert_eq!(cache.get("b"), Type::Unknown);
        assert_eq!(cache.get("a"), Type::RegularFile);
        assert_eq!(cache.get("c"), Type::ExplicitDir);
    }
}
