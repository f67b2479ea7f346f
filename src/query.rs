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

//! Fluent query builder and the chunk enumerators it produces.
//!
//! `World::query()` returns a value-type builder: `with::<T>()`/
//! `without::<T>()` only ever record a component-type id, they never touch
//! archetype storage. Storage is only visited once a terminal method
//! (`chunks_stack`, `chunks_pooled`, `count`, `first_chunk`) is called.

use std::sync::Arc;

use crate::archetype::Archetype;
use crate::chunk::Chunk;
use crate::component::Component;
use crate::entity::Entity;
use crate::pool::PooledArchetypeList;
use crate::signature::Signature;
use crate::world::World;

/// A single chunk's worth of rows matching a query, paired with the
/// archetype that owns it so typed columns can be resolved regardless of
/// that archetype's particular column order.
pub struct QueryChunk<'w> {
    archetype: &'w Archetype,
    chunk: &'w Chunk,
}

impl<'w> QueryChunk<'w> {
    pub fn len(&self) -> usize {
        self.chunk.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunk.is_empty()
    }

    pub fn entities(&self) -> &'w [Entity] {
        self.chunk.entities()
    }

    /// Typed view over one component column, or `None` if this archetype
    /// doesn't carry `T` (shouldn't happen for a component named in
    /// `with::<T>()`, but `without`-only queries have no such guarantee).
    pub fn column<T: Component>(&self) -> Option<&'w [T]> {
        // A column's position is the same index both into the archetype's
        // descriptor list and into its chunks' column arrays, so matching by
        // `TypeId` here needs no round trip through the component registry.
        let tid = std::any::TypeId::of::<T>();
        let column = self
            .archetype
            .descriptors()
            .iter()
            .position(|desc| desc.type_id == tid)?;
        Some(unsafe { self.chunk.span::<T>(column) })
    }
}

/// Fluent, value-type query builder. Cloning or discarding a builder before
/// calling a terminal method has no effect on the `World`.
#[derive(Clone)]
pub struct Query<'w> {
    world: &'w World,
    with: Signature,
    without: Signature,
    unsatisfiable: bool,
}

impl<'w> Query<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self {
            world,
            with: Signature::empty(),
            without: Signature::empty(),
            unsatisfiable: false,
        }
    }

    /// Requires the archetype to carry component `T`.
    pub fn with<T: Component>(mut self) -> Self {
        match self.world.component_type_id::<T>() {
            Some(id) => self.with.insert(id),
            None => self.unsatisfiable = true,
        }
        self
    }

    /// Excludes archetypes carrying component `T`.
    pub fn without<T: Component>(mut self) -> Self {
        if let Some(id) = self.world.component_type_id::<T>() {
            self.without.insert(id);
        }
        self
    }

    fn matching_archetypes(&self) -> Arc<[usize]> {
        let matches = if self.unsatisfiable {
            Arc::from(Vec::new())
        } else {
            self.world.matching_archetype_indices(&self.with, &self.without)
        };
        self.world.emit(crate::logging::EcsEvent::Query {
            correlation_id: self.world.next_correlation_id(),
            matched_archetypes: matches.len(),
        });
        matches
    }

    /// Total number of entities across every matching, non-empty chunk.
    pub fn count(&self) -> usize {
        self.matching_archetypes()
            .iter()
            .map(|&idx| self.world.archetype_at(idx).entity_count())
            .sum()
    }

    /// The first non-empty matching chunk, if any.
    pub fn first_chunk(&self) -> Option<QueryChunk<'w>> {
        self.chunks_stack().next()
    }

    /// Zero-allocation-after-warm-up chunk enumerator: holds a cheap `Arc`
    /// clone of the cached matching-archetype list and walks it directly.
    pub fn chunks_stack(&self) -> ChunkIter<'w> {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!(
            "query.chunks_stack",
            with_bits = self.with.popcount(),
            without_bits = self.without.popcount()
        )
        .entered();
        ChunkIter {
            world: self.world,
            matches: self.matching_archetypes(),
            archetype_cursor: 0,
            chunk_cursor: 0,
        }
    }

    /// Runs `f` over every non-empty matching chunk, splitting work across
    /// Rayon's thread pool at archetype granularity - a common
    /// archetype-granularity parallel-iteration pattern where each
    /// archetype's chunk list is handed to one task.
    ///
    /// `World` only exposes interior mutability through lock-protected state
    /// (the component-type registry and the query cache), so sharing `&World`
    /// across threads here is sound - no chunk's bytes are touched by more
    /// than one task, since distinct archetypes never share chunks and a
    /// single archetype's chunks are only ever handed to the one task
    /// processing that archetype.
    #[cfg(feature = "parallel")]
    pub fn par_for_each_chunk<F>(&self, f: F)
    where
        F: Fn(QueryChunk<'w>) + Sync,
    {
        use rayon::prelude::*;

        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!(
            "query.par_for_each_chunk",
            with_bits = self.with.popcount(),
            without_bits = self.without.popcount()
        )
        .entered();

        let matches = self.matching_archetypes();
        let world = self.world;
        matches.to_vec().par_iter().for_each(|&idx| {
            let archetype = world.archetype_at(idx);
            for chunk in archetype.chunks() {
                if !chunk.is_empty() {
                    f(QueryChunk { archetype, chunk });
                }
            }
        });
    }

    /// Same enumeration as `chunks_stack`, but copies the matching-archetype
    /// list into a thread-local pooled buffer first, exercising the pool
    /// path described for worker-thread query loops.
    pub fn chunks_pooled(&self) -> PooledChunkIter<'w> {
        #[cfg(feature = "profiling")]
        let _span = tracing::info_span!(
            "query.chunks_pooled",
            with_bits = self.with.popcount(),
            without_bits = self.without.popcount()
        )
        .entered();
        let matches = self.matching_archetypes();
        let mut list = PooledArchetypeList::rent();
        list.as_vec().extend_from_slice(&matches);
        PooledChunkIter {
            world: self.world,
            list,
            archetype_cursor: 0,
            chunk_cursor: 0,
        }
    }
}

/// Iterator over non-empty chunks backed directly by the cached archetype
/// match list (an `Arc<[usize]>` clone - no allocation on the hot path).
pub struct ChunkIter<'w> {
    world: &'w World,
    matches: Arc<[usize]>,
    archetype_cursor: usize,
    chunk_cursor: usize,
}

impl<'w> Iterator for ChunkIter<'w> {
    type Item = QueryChunk<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.archetype_cursor < self.matches.len() {
            let archetype = self.world.archetype_at(self.matches[self.archetype_cursor]);
            let chunks = archetype.chunks();
            while self.chunk_cursor < chunks.len() {
                let chunk = &chunks[self.chunk_cursor];
                self.chunk_cursor += 1;
                if !chunk.is_empty() {
                    return Some(QueryChunk { archetype, chunk });
                }
            }
            self.archetype_cursor += 1;
            self.chunk_cursor = 0;
        }
        None
    }
}

/// Same enumeration as [`ChunkIter`], but walking a thread-local pooled
/// buffer instead of the `Arc` directly.
pub struct PooledChunkIter<'w> {
    world: &'w World,
    list: PooledArchetypeList,
    archetype_cursor: usize,
    chunk_cursor: usize,
}

impl<'w> Iterator for PooledChunkIter<'w> {
    type Item = QueryChunk<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.archetype_cursor < self.list.as_vec().len() {
            let archetype_idx = self.list.as_vec()[self.archetype_cursor];
            let archetype = self.world.archetype_at(archetype_idx);
            let chunks = archetype.chunks();
            while self.chunk_cursor < chunks.len() {
                let chunk = &chunks[self.chunk_cursor];
                self.chunk_cursor += 1;
                if !chunk.is_empty() {
                    return Some(QueryChunk { archetype, chunk });
                }
            }
            self.archetype_cursor += 1;
            self.chunk_cursor = 0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::world::World;

    #[derive(Clone, Copy)]
    struct Position {
        x: f32,
    }

    #[derive(Clone, Copy)]
    struct Velocity {
        x: f32,
    }

    #[test]
    fn with_filters_to_matching_archetype_only() {
        let mut world = World::new();
        let moving = world.create_entity();
        world.add_component(moving, Position { x: 1.0 });
        world.add_component(moving, Velocity { x: 2.0 });
        let still = world.create_entity();
        world.add_component(still, Position { x: 3.0 });

        let count = world.query().with::<Position>().with::<Velocity>().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn without_excludes_matching_archetype() {
        let mut world = World::new();
        let moving = world.create_entity();
        world.add_component(moving, Position { x: 1.0 });
        world.add_component(moving, Velocity { x: 2.0 });
        let still = world.create_entity();
        world.add_component(still, Position { x: 3.0 });

        let count = world.query().with::<Position>().without::<Velocity>().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn query_for_unregistered_component_is_empty_not_an_error() {
        let world = World::new();
        struct NeverUsed;
        assert_eq!(world.query().with::<NeverUsed>().count(), 0);
    }

    #[test]
    fn chunks_stack_only_yields_nonempty_chunks() {
        let mut world = World::new();
        for _ in 0..3 {
            let e = world.create_entity();
            world.add_component(e, Position { x: 0.0 });
        }
        let chunks: Vec<_> = world.query().with::<Position>().chunks_stack().collect();
        assert!(chunks.iter().all(|c| !c.is_empty()));
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn chunks_pooled_matches_chunks_stack_counts() {
        let mut world = World::new();
        for _ in 0..5 {
            let e = world.create_entity();
            world.add_component(e, Position { x: 0.0 });
        }
        let pooled_total: usize = world.query().with::<Position>().chunks_pooled().map(|c| c.len()).sum();
        assert_eq!(pooled_total, 5);
    }

    #[test]
    #[cfg(feature = "parallel")]
    fn par_for_each_chunk_visits_every_matching_row_exactly_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let mut world = World::new();
        for i in 0..500u32 {
            let e = world.create_entity();
            world.add_component(e, Position { x: i as f32 });
            if i % 2 == 0 {
                world.add_component(e, Velocity { x: 1.0 });
            }
        }

        let rows_seen = AtomicUsize::new(0);
        world
            .query()
            .with::<Position>()
            .with::<Velocity>()
            .par_for_each_chunk(|chunk| {
                rows_seen.fetch_add(chunk.len(), Ordering::Relaxed);
            });
        assert_eq!(rows_seen.load(Ordering::Relaxed), 250);
    }

    #[test]
    fn world_is_sync_so_queries_can_be_shared_across_threads() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<World>();
    }

    #[test]
    fn terminal_query_methods_emit_a_query_event() {
        use crate::logging::EcsEvent;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        #[derive(Default)]
        struct CountingLogger(AtomicUsize);
        impl crate::logging::Logger for CountingLogger {
            fn log(&self, event: EcsEvent) {
                if matches!(event, EcsEvent::Query { .. }) {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let mut world = World::new();
        let logger = Arc::new(CountingLogger::default());
        world.set_logger(logger.clone());
        let e = world.create_entity();
        world.add_component(e, Position { x: 1.0 });

        world.query().with::<Position>().count();
        assert_eq!(logger.0.load(Ordering::SeqCst), 1);

        world.query().with::<Position>().chunks_stack().count();
        assert_eq!(logger.0.load(Ordering::SeqCst), 2);
    }
}
