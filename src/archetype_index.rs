// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Registry of archetypes plus a generation-invalidated query-result cache.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::archetype::{signature_of, Archetype, ComponentIdList, DEFAULT_CHUNK_CAPACITY};
use crate::component::ComponentTypeRegistry;
use crate::signature::Signature;

/// Advisory upper bound on the number of cached query results kept at once.
/// Exceeding it triggers a full cache clear rather than an eviction scheme -
/// simpler, and spec-permitted since selective and full invalidation are
/// both acceptable.
const QUERY_CACHE_SIZE_BOUND: usize = 100;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct QueryKey {
    with: Signature,
    without: Signature,
    world_gen: u64,
}

/// Counters describing cache effectiveness, surfaced to callers via
/// `World::stats()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexStats {
    pub archetype_count: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_invalidations: u64,
}

#[derive(Default)]
struct QueryCache {
    entries: AHashMap<QueryKey, Arc<[usize]>>,
    hits: u64,
    misses: u64,
    invalidations: u64,
}

impl QueryCache {
    fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.invalidations += 1;
        }
        self.entries.clear();
    }
}

/// Owns every archetype and the query-result cache over them.
///
/// The cache lives behind a `parking_lot::RwLock` rather than a `RefCell` so
/// read-only `matching` lookups can genuinely be served through a shared
/// `&World` from more than one thread at once, rather than just logically
/// read-only from a single thread's point of view. A `RefCell` would make
/// `ArchetypeIndex`, and therefore `World`, `!Sync`, which would rule out
/// `Query::par_for_each_chunk` ever compiling. Archetype creation still goes
/// through an explicit `&mut self` method, since it is the one structural
/// mutation queries are never allowed to trigger themselves.
pub struct ArchetypeIndex {
    archetypes: Vec<Archetype>,
    by_signature: AHashMap<Signature, usize>,
    world_gen: u64,
    cache: RwLock<QueryCache>,
    chunk_capacity: usize,
}

impl ArchetypeIndex {
    pub fn new(chunk_capacity: usize) -> Self {
        Self {
            archetypes: Vec::new(),
            by_signature: AHashMap::new(),
            world_gen: 0,
            cache: RwLock::new(QueryCache::default()),
            chunk_capacity,
        }
    }

    pub fn archetype(&self, index: usize) -> &Archetype {
        &self.archetypes[index]
    }

    pub fn archetype_mut(&mut self, index: usize) -> &mut Archetype {
        &mut self.archetypes[index]
    }

    /// Borrows two distinct archetypes mutably at once, needed while copying
    /// component columns from one archetype to another during a migration.
    ///
    /// # Panics
    /// Panics if `a == b`.
    pub fn archetype_pair_mut(&mut self, a: usize, b: usize) -> (&mut Archetype, &mut Archetype) {
        assert_ne!(a, b, "archetype_pair_mut requires two distinct archetypes");
        if a < b {
            let (left, right) = self.archetypes.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }

    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub fn world_gen(&self) -> u64 {
        self.world_gen
    }

    /// Looks up or creates the archetype for an exact component-id set,
    /// returning its index. Component order in `component_ids` does not
    /// affect identity - the canonical order is derived inside `Archetype`.
    pub fn get_or_create(
        &mut self,
        registry: &ComponentTypeRegistry,
        component_ids: ComponentIdList,
    ) -> usize {
        let sig = signature_of(&component_ids);
        if let Some(&idx) = self.by_signature.get(&sig) {
            return idx;
        }
        let id = self.archetypes.len() as u64;
        let archetype = Archetype::new(id, registry, component_ids.into_vec(), self.chunk_capacity);
        let idx = self.archetypes.len();
        self.by_signature.insert(sig, idx);
        self.archetypes.push(archetype);
        self.world_gen += 1;
        self.cache.write().clear();
        idx
    }

    /// Returns the indices of every archetype that has all of `with`'s
    /// components and none of `without`'s, using the cache keyed by
    /// `(with, without, world_gen)` when possible.
    ///
    /// Two calls with the same key and no intervening archetype creation
    /// return `Arc`s pointing at the *same* allocation (`Arc::ptr_eq` holds)
    /// - cloning the return value is a refcount bump, not a fresh `Vec`, so a
    /// warmed-up repeated query allocates nothing.
    pub fn matching(&self, with: &Signature, without: &Signature) -> Arc<[usize]> {
        let key = QueryKey {
            with: with.clone(),
            without: without.clone(),
            world_gen: self.world_gen,
        };
        let mut cache = self.cache.write();
        if let Some(hit) = cache.entries.get(&key) {
            cache.hits += 1;
            return hit.clone();
        }
        cache.misses += 1;
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!(
            "archetype_index.get_matching",
            archetype_count = self.archetypes.len(),
            with_bits = with.popcount(),
            without_bits = without.popcount()
        )
        .entered();
        if cache.entries.len() >= QUERY_CACHE_SIZE_BOUND {
            cache.clear();
        }
        let matches: Arc<[usize]> = self
            .archetypes
            .iter()
            .enumerate()
            .filter(|(_, arch)| {
                arch.signature().is_superset_of(with) && !arch.signature().has_intersection(without)
            })
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>()
            .into();
        cache.entries.insert(key, matches.clone());
        matches
    }

    pub fn stats(&self) -> IndexStats {
        let cache = self.cache.read();
        IndexStats {
            archetype_count: self.archetypes.len(),
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            cache_invalidations: cache.invalidations,
        }
    }
}

impl Default for ArchetypeIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_CAPACITY)
    }
}
