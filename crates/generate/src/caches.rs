//! Pool of cache mounts shared across steps

use indexmap::IndexMap;
use kiln_types::CacheMount;

/// Interns cache mounts by logical id so steps share one mount per id
#[derive(Debug, Clone, Default)]
pub struct CachePool {
    caches: IndexMap<String, CacheMount>,
}

impl CachePool {
    /// Create an empty pool
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a cache mount, returning the canonical entry for `id`
    ///
    /// Inserts are idempotent: the first path registered for an id wins.
    pub fn add(&mut self, id: &str, path: &str) -> CacheMount {
        self.caches
            .entry(id.to_string())
            .or_insert_with(|| CacheMount::new(id, path))
            .clone()
    }

    /// All interned mounts in insertion order
    #[must_use]
    pub fn all(&self) -> Vec<CacheMount> {
        self.caches.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_idempotent() {
        let mut pool = CachePool::new();
        let first = pool.add("pip", "/opt/pip-cache");
        let second = pool.add("pip", "/somewhere/else");

        assert_eq!(first, second);
        assert_eq!(pool.all().len(), 1);
    }
}
