//! Memoized resolution keyed by template id

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::registry::{TemplateError, TemplateStore};
use super::resolved::ResolvedTemplate;
use super::resolver::resolve_template;

#[derive(Debug, Default)]
struct CacheState {
    /// Store generation the entries were resolved against
    generation: u64,
    /// Bumped by every explicit invalidation
    epoch: u64,
    entries: HashMap<String, Arc<ResolvedTemplate>>,
}

/// When a resolution started, as seen by the cache
///
/// Taken before resolving and handed back on insert, so a result that raced
/// with a store change or an invalidation is not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStamp {
    pub generation: u64,
    epoch: u64,
}

/// Concurrency-safe cache of resolved templates
///
/// Entries are tagged with the store generation they came from; a lookup under
/// a newer generation clears the whole cache first.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    state: RwLock<CacheState>,
}

impl ResolutionCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached entry if it is still current
    pub fn get(&self, id: &str, generation: u64) -> Option<Arc<ResolvedTemplate>> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.generation != generation {
            return None;
        }
        state.entries.get(id).cloned()
    }

    /// Stamp a resolution about to run against store `generation`
    pub fn stamp(&self, generation: u64) -> CacheStamp {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        CacheStamp {
            generation,
            epoch: state.epoch,
        }
    }

    /// Store an entry resolved under `stamp`
    pub fn insert(&self, id: &str, stamp: CacheStamp, resolved: Arc<ResolvedTemplate>) {
        let generation = stamp.generation;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        // Invalidated while this resolution was running
        if stamp.epoch < state.epoch {
            return;
        }
        if state.generation < generation {
            debug!(
                from = state.generation,
                to = generation,
                "template store changed, dropping cached resolutions"
            );
            state.entries.clear();
            state.generation = generation;
        }
        // Resolved against a store that has since moved on
        if state.generation > generation {
            return;
        }
        state.entries.insert(id.to_string(), resolved);
    }

    /// Drop every entry, and refuse results from resolutions already running
    pub fn invalidate(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.entries.clear();
        state.epoch += 1;
        debug!(epoch = state.epoch, "template cache invalidated");
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves templates from a store, memoizing successful results
#[derive(Debug)]
pub struct TemplateResolver<S> {
    store: S,
    cache: ResolutionCache,
}

impl<S: TemplateStore> TemplateResolver<S> {
    /// Create a resolver over `store`
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: ResolutionCache::new(),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The cache, for inspection
    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Resolve a template, serving from cache when possible
    ///
    /// Failures are not cached, so fixing a broken template takes effect on
    /// the next store change without touching unrelated entries.
    pub fn resolve(&self, id: &str) -> Result<Arc<ResolvedTemplate>, TemplateError> {
        let generation = self.store.generation();
        if let Some(hit) = self.cache.get(id, generation) {
            return Ok(hit);
        }

        let stamp = self.cache.stamp(generation);
        let resolved = Arc::new(resolve_template(&self.store, id)?);
        self.cache.insert(id, stamp, Arc::clone(&resolved));
        Ok(resolved)
    }

    /// Resolve every template in the store
    pub fn resolve_all(&self) -> Vec<(String, Result<Arc<ResolvedTemplate>, TemplateError>)> {
        self.store
            .ids()
            .into_iter()
            .map(|id| {
                let result = self.resolve(&id);
                (id, result)
            })
            .collect()
    }

    /// Change notification hook: drop every cached resolution
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }
}
