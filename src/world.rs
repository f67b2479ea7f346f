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

//! `World`: the facade tying the entity registry, component-type registry,
//! and archetype index together into entity create/destroy, component
//! add/remove/get/has, and the query-builder entry point.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::archetype::{Archetype, ComponentIdList, DEFAULT_CHUNK_CAPACITY};
use crate::archetype_index::{ArchetypeIndex, IndexStats};
use crate::component::{Bundle, Component, ComponentTypeRegistry, MAX_BUNDLE_COMPONENTS};
use crate::entity::{Entity, EntityRegistry};
use crate::error::{EcsError, Result};
use crate::logging::{EcsEvent, HealthMonitor, Logger, NullHealthMonitor, NullLogger, SharedHealthMonitor, SharedLogger};
use crate::query::Query;
use crate::signature::Signature;

/// Construction-time configuration for a [`World`]. The only knob spec'd is
/// chunk capacity; everything else about the storage engine is derived from
/// the sequence of API calls, not a config file or environment variable,
/// since this is an embeddable library rather than a service.
#[derive(Debug, Clone, Copy)]
pub struct WorldConfig {
    pub chunk_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_capacity: DEFAULT_CHUNK_CAPACITY,
        }
    }
}

impl WorldConfig {
    /// Builds a `World` from this configuration.
    ///
    /// # Panics
    /// Panics if `chunk_capacity` is zero or not a power of two - bit-shift
    /// addressing of `global_row / capacity` depends on it.
    pub fn build(self) -> World {
        World::with_chunk_capacity(self.chunk_capacity)
    }
}

/// Facade over the entity registry, component-type registry, and archetype
/// index. Owns every `Archetype` (which in turn exclusively owns its
/// `Chunk`s); there is exactly one `World` per simulation.
pub struct World {
    entities: EntityRegistry,
    registry: ComponentTypeRegistry,
    index: ArchetypeIndex,
    tick: u32,
    next_correlation_id: AtomicU64,
    logger: SharedLogger,
    health: SharedHealthMonitor,
}

impl World {
    /// Creates an empty world with the default chunk capacity (512).
    pub fn new() -> Self {
        Self::with_chunk_capacity(DEFAULT_CHUNK_CAPACITY)
    }

    /// Creates an empty world with an explicit chunk capacity.
    ///
    /// # Panics
    /// Panics if `chunk_capacity` is zero or not a power of two.
    pub fn with_chunk_capacity(chunk_capacity: usize) -> Self {
        assert!(
            chunk_capacity != 0 && chunk_capacity.is_power_of_two(),
            "chunk_capacity must be a nonzero power of two, got {chunk_capacity}"
        );
        let registry = ComponentTypeRegistry::new();
        let mut index = ArchetypeIndex::new(chunk_capacity);
        // The empty archetype always exists and is always index/id 0 - every
        // entity starts here and a bare `create_entity` needs nowhere else
        // to land.
        index.get_or_create(&registry, ComponentIdList::new());
        Self {
            entities: EntityRegistry::new(),
            registry,
            index,
            tick: 1,
            next_correlation_id: AtomicU64::new(0),
            logger: Arc::new(NullLogger),
            health: Arc::new(NullHealthMonitor),
        }
    }

    /// Installs a structured-event sink. Replaces any previously configured
    /// logger.
    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = logger;
    }

    /// Installs a health-monitor sink. Replaces any previously configured one.
    pub fn set_health_monitor(&mut self, monitor: Arc<dyn HealthMonitor>) {
        self.health = monitor;
    }

    pub(crate) fn emit(&self, event: EcsEvent) {
        self.health.record(&event);
        self.logger.log(event);
    }

    pub(crate) fn next_correlation_id(&self) -> u64 {
        self.next_correlation_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The current world tick. Exists only so an external change-detection
    /// layer has a clock to read; the core itself never compares ticks.
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Advances the world tick by one. Never called automatically.
    pub fn advance_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    /// Creates a new entity in the empty archetype.
    pub fn create_entity(&mut self) -> Entity {
        #[cfg(feature = "profiling")]
        let _span = info_span!("world.create_entity").entered();

        let entity = self.entities.create();
        let empty = self.index.get_or_create(&self.registry, ComponentIdList::new());
        let (chunk_index, row) = self.index.archetype_mut(empty).allocate_row(entity);
        self.entities.set_location(entity, empty as u64, chunk_index, row);
        self.emit(EcsEvent::EntityCreate {
            correlation_id: self.next_correlation_id(),
            entity_id: entity.id(),
        });
        entity
    }

    /// Creates `n` entities in the empty archetype in one pass.
    pub fn create_entities(&mut self, n: usize) -> Vec<Entity> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.create_entity());
        }
        out
    }

    /// Creates a new entity carrying every component in `bundle`, moving it
    /// directly into the target archetype instead of one `add_component`
    /// migration per field.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Entity {
        #[cfg(feature = "profiling")]
        let _span = info_span!("world.spawn").entered();

        let entity = self.entities.create();
        let type_ids = B::type_ids(&self.registry);
        let mut ids = ComponentIdList::new();
        ids.extend(type_ids.iter().copied());
        let archetype_idx = self.index.get_or_create(&self.registry, ids);

        let archetype = self.index.archetype_mut(archetype_idx);
        let (chunk_index, row) = archetype.allocate_row(entity);
        let mut ptrs: [*mut u8; MAX_BUNDLE_COMPONENTS] = [std::ptr::null_mut(); MAX_BUNDLE_COMPONENTS];
        for (i, &component_id) in type_ids.iter().enumerate() {
            let column = archetype
                .column_of(component_id)
                .expect("bundle component missing from its own freshly built archetype");
            ptrs[i] = archetype.chunks_mut()[chunk_index].column_ptr_mut(column, row);
        }
        unsafe {
            bundle.write_components(&ptrs[..type_ids.len()]);
        }
        self.entities.set_location(entity, archetype_idx as u64, chunk_index, row);
        entity
    }

    /// True iff `entity`'s generation matches its current slot and it hasn't
    /// been destroyed.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Destroys `entity`, fixing up whatever entity a swap-remove moved into
    /// its vacated row. A no-op if `entity` is already dead.
    pub fn destroy_entity(&mut self, entity: Entity) {
        #[cfg(feature = "profiling")]
        let _span = info_span!("world.despawn").entered();

        let Some((archetype_id, chunk_index, row)) = self.entities.location(entity) else {
            return;
        };
        self.entities.destroy(entity);
        let archetype = self.index.archetype_mut(archetype_id as usize);
        if let Some(swapped) = archetype.remove_row(chunk_index, row) {
            self.entities.set_row(swapped.id(), chunk_index, row);
        }
        self.emit(EcsEvent::EntityDestroy {
            correlation_id: self.next_correlation_id(),
            entity_id: entity.id(),
        });
    }

    /// Resolves `T`'s dense component-type id if it has been registered
    /// (i.e. some entity somewhere has carried it via `add_component`/
    /// `spawn`). Used by `Query::with`/`without` to translate a type
    /// parameter into a bit to test.
    pub(crate) fn component_type_id<T: Component>(&self) -> Option<u32> {
        self.registry.id_of::<T>()
    }

    pub(crate) fn matching_archetype_indices(&self, with: &Signature, without: &Signature) -> Arc<[usize]> {
        self.index.matching(with, without)
    }

    pub(crate) fn archetype_at(&self, index: usize) -> &Archetype {
        self.index.archetype(index)
    }

    /// Returns an immutable reference to `entity`'s `T` component.
    ///
    /// # Errors
    /// `EntityDead` if `entity` is not alive; `ComponentMissing` if it is
    /// alive but does not carry `T`.
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<&T> {
        let (archetype_id, chunk_index, row) = self.entities.location(entity).ok_or(EcsError::EntityDead)?;
        let component_id = self.registry.id_of::<T>().ok_or(EcsError::ComponentMissing)?;
        let archetype = self.index.archetype(archetype_id as usize);
        let column = archetype.column_of(component_id).ok_or(EcsError::ComponentMissing)?;
        let chunk = &archetype.chunks()[chunk_index];
        Ok(unsafe { &chunk.span::<T>(column)[row] })
    }

    /// Returns a mutable reference to `entity`'s `T` component. Same error
    /// contract as [`World::get_component`].
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        let (archetype_id, chunk_index, row) = self.entities.location(entity).ok_or(EcsError::EntityDead)?;
        let component_id = self.registry.id_of::<T>().ok_or(EcsError::ComponentMissing)?;
        let archetype = self.index.archetype_mut(archetype_id as usize);
        let column = archetype.column_of(component_id).ok_or(EcsError::ComponentMissing)?;
        let chunk = &mut archetype.chunks_mut()[chunk_index];
        Ok(unsafe { &mut chunk.span_mut::<T>(column)[row] })
    }

    /// True iff `entity` is alive and carries a `T` component. Never fails -
    /// an unregistered type or a dead entity both simply answer `false`.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        let Some(component_id) = self.registry.id_of::<T>() else {
            return false;
        };
        let Some((archetype_id, _, _)) = self.entities.location(entity) else {
            return false;
        };
        self.index.archetype(archetype_id as usize).signature().has(component_id)
    }

    /// Adds (or overwrites, if already present) a `T` component on `entity`.
    /// A no-op if `entity` is dead.
    ///
    /// Migrating to a new archetype preserves every component the entity
    /// already carried: shared columns are copied byte-for-byte via the
    /// component-type registry's descriptor, never re-derived from `T`.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        #[cfg(feature = "profiling")]
        let _span = info_span!("world.add_component").entered();

        let Some((from_idx, from_chunk, from_row)) = self.entities.location(entity) else {
            return;
        };
        let from_idx = from_idx as usize;
        let component_id = self.registry.register::<T>();

        if self.index.archetype(from_idx).signature().has(component_id) {
            let column = self.index.archetype(from_idx).column_of(component_id).unwrap();
            let chunk = &mut self.index.archetype_mut(from_idx).chunks_mut()[from_chunk];
            unsafe {
                *(chunk.column_ptr_mut(column, from_row) as *mut T) = value;
            }
            return;
        }

        let mut to_ids: ComponentIdList = self
            .index
            .archetype(from_idx)
            .component_types()
            .iter()
            .copied()
            .collect();
        to_ids.push(component_id);
        let to_idx = self.index.get_or_create(&self.registry, to_ids);

        let (to_chunk, to_row) = self.index.archetype_mut(to_idx).allocate_row(entity);
        {
            let (from_archetype, to_archetype) = self.index.archetype_pair_mut(from_idx, to_idx);
            copy_shared_columns(from_archetype, from_chunk, from_row, to_archetype, to_chunk, to_row);
            let new_column = to_archetype.column_of(component_id).unwrap();
            let dst = to_archetype.chunks_mut()[to_chunk].column_ptr_mut(new_column, to_row);
            unsafe {
                std::ptr::write(dst as *mut T, value);
            }
        }

        // Every column that existed in `from` now has a live copy in `to` -
        // nothing left behind needs dropping, just the bookkeeping row freed.
        if let Some(swapped) = self.index.archetype_mut(from_idx).chunks_mut()[from_chunk]
            .swap_remove_no_drop(from_row)
        {
            self.entities.set_row(swapped.id(), from_chunk, from_row);
        }
        self.entities.set_location(entity, to_idx as u64, to_chunk, to_row);

        self.emit(EcsEvent::ComponentAdd {
            correlation_id: self.next_correlation_id(),
            entity_id: entity.id(),
            component_id,
        });
        self.emit(EcsEvent::ArchetypeTransition {
            correlation_id: self.next_correlation_id(),
            entity_id: entity.id(),
            from_archetype: from_idx as u64,
            to_archetype: to_idx as u64,
        });
    }

    /// Removes `entity`'s `T` component, migrating it back to the archetype
    /// for its remaining component set. A no-op if the entity is dead or
    /// does not carry `T`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        #[cfg(feature = "profiling")]
        let _span = info_span!("world.remove_component").entered();

        let Some((from_idx, from_chunk, from_row)) = self.entities.location(entity) else {
            return;
        };
        let from_idx = from_idx as usize;
        let Some(component_id) = self.registry.id_of::<T>() else {
            return;
        };
        if !self.index.archetype(from_idx).signature().has(component_id) {
            return;
        }

        let to_ids: ComponentIdList = self
            .index
            .archetype(from_idx)
            .component_types()
            .iter()
            .copied()
            .filter(|&id| id != component_id)
            .collect();
        let to_idx = self.index.get_or_create(&self.registry, to_ids);

        let (to_chunk, to_row) = self.index.archetype_mut(to_idx).allocate_row(entity);
        {
            let (from_archetype, to_archetype) = self.index.archetype_pair_mut(from_idx, to_idx);
            copy_shared_columns(from_archetype, from_chunk, from_row, to_archetype, to_chunk, to_row);

            // The removed column has no destination; drop its old value
            // explicitly so `swap_remove_no_drop` below doesn't leak it.
            let old_column = from_archetype.column_of(component_id).unwrap();
            let descriptor = from_archetype.descriptors()[old_column];
            if let Some(drop_fn) = descriptor.drop_fn {
                let chunk = &mut from_archetype.chunks_mut()[from_chunk];
                unsafe { drop_fn(chunk.column_ptr_mut(old_column, from_row)) };
            }
        }

        if let Some(swapped) = self.index.archetype_mut(from_idx).chunks_mut()[from_chunk]
            .swap_remove_no_drop(from_row)
        {
            self.entities.set_row(swapped.id(), from_chunk, from_row);
        }
        self.entities.set_location(entity, to_idx as u64, to_chunk, to_row);

        self.emit(EcsEvent::ArchetypeTransition {
            correlation_id: self.next_correlation_id(),
            entity_id: entity.id(),
            from_archetype: from_idx as u64,
            to_archetype: to_idx as u64,
        });
    }

    /// Returns a fresh query builder bound to this world.
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    /// Number of entities currently alive.
    pub fn alive_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Number of distinct archetypes created so far (at least 1: the empty
    /// archetype always exists).
    pub fn archetype_count(&self) -> usize {
        self.index.archetypes().len()
    }

    /// Archetype count and query-cache hit/miss/invalidation counters, for
    /// callers that want to verify the cache is actually earning its keep.
    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies every column `from_archetype` and `to_archetype` have in common
/// from `(from_chunk, from_row)` to `(to_chunk, to_row)`, byte-for-byte via
/// each column's type-erased `copy_fn`. Columns present only in one side are
/// the caller's responsibility (write the new value; drop the discarded
/// one).
fn copy_shared_columns(
    from_archetype: &Archetype,
    from_chunk: usize,
    from_row: usize,
    to_archetype: &mut Archetype,
    to_chunk: usize,
    to_row: usize,
) {
    for (column, &component_id) in from_archetype.component_types().iter().enumerate() {
        let Some(to_column) = to_archetype.column_of(component_id) else {
            continue;
        };
        let descriptor = from_archetype.descriptors()[column];
        let src = from_archetype.chunks()[from_chunk].column_ptr(column, from_row);
        let dst = to_archetype.chunks_mut()[to_chunk].column_ptr_mut(to_column, to_row);
        unsafe {
            (descriptor.copy_fn)(src, dst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
        z: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Velocity {
        x: f32,
        y: f32,
        z: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Tag(u32);

    // S1 - create/destroy/recycle.
    #[test]
    fn create_destroy_recycle() {
        let mut world = World::new();
        let e1 = world.create_entity();
        assert_eq!(e1.id(), 1);
        assert_eq!(e1.generation(), 0);
        world.destroy_entity(e1);
        let e2 = world.create_entity();
        assert_eq!(e2.id(), 1);
        assert_eq!(e2.generation(), e1.generation() + 1);
        assert!(!world.is_alive(e1));
        assert!(world.is_alive(e2));
    }

    // S2 - add then query.
    #[test]
    fn add_then_query() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Position { x: 1.0, y: 2.0, z: 3.0 });
        world.add_component(e, Velocity { x: 4.0, y: 5.0, z: 6.0 });

        assert_eq!(world.query().with::<Position>().with::<Velocity>().count(), 1);
        assert_eq!(world.query().with::<Position>().without::<Velocity>().count(), 0);
    }

    // S3 - migration preserves values across 1000 entities.
    #[test]
    fn migration_preserves_values_at_scale() {
        let mut world = World::new();
        for i in 0..1000u32 {
            let e = world.create_entity();
            world.add_component(
                e,
                Position {
                    x: i as f32,
                    y: i as f32,
                    z: i as f32,
                },
            );
            if i % 2 == 0 {
                world.add_component(e, Velocity { x: 1.0, y: 1.0, z: 1.0 });
            }
        }

        let mut sum = 0.0f32;
        for chunk in world.query().with::<Position>().with::<Velocity>().chunks_stack() {
            for p in chunk.column::<Position>().unwrap() {
                sum += p.x;
            }
        }
        let expected: f32 = (0..1000u32).step_by(2).map(|i| i as f32).sum();
        assert_eq!(sum, expected);
    }

    // S4 - swap-remove fixup.
    #[test]
    fn swap_remove_fixup_after_destroy() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        let c = world.create_entity();
        world.add_component(a, Tag(1));
        world.add_component(c, Tag(3));
        let _ = b;

        world.destroy_entity(a);

        assert!(world.is_alive(c));
        assert_eq!(*world.get_component::<Tag>(c).unwrap(), Tag(3));
    }

    #[test]
    fn add_component_is_idempotent_overwrite() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Position { x: 1.0, y: 1.0, z: 1.0 });
        world.add_component(e, Position { x: 9.0, y: 9.0, z: 9.0 });
        assert_eq!(
            *world.get_component::<Position>(e).unwrap(),
            Position { x: 9.0, y: 9.0, z: 9.0 }
        );
        assert_eq!(world.archetype_count(), 2); // empty + {Position}, no duplicate archetype
    }

    #[test]
    fn remove_component_is_noop_when_absent() {
        let mut world = World::new();
        let e = world.create_entity();
        world.remove_component::<Position>(e);
        assert!(!world.has_component::<Position>(e));
    }

    #[test]
    fn remove_component_migrates_back_and_drops_cleanly() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Position { x: 1.0, y: 2.0, z: 3.0 });
        world.add_component(e, Velocity { x: 4.0, y: 5.0, z: 6.0 });

        world.remove_component::<Velocity>(e);

        assert!(world.has_component::<Position>(e));
        assert!(!world.has_component::<Velocity>(e));
        assert_eq!(*world.get_component::<Position>(e).unwrap(), Position { x: 1.0, y: 2.0, z: 3.0 });
    }

    #[test]
    fn mutating_components_on_dead_entity_is_silent_noop() {
        let mut world = World::new();
        let e = world.create_entity();
        world.destroy_entity(e);
        world.add_component(e, Position { x: 0.0, y: 0.0, z: 0.0 });
        world.remove_component::<Position>(e);
        world.destroy_entity(e);
        assert!(!world.is_alive(e));
    }

    #[test]
    fn get_component_errors_are_distinct() {
        let mut world = World::new();
        let e = world.create_entity();
        assert_eq!(world.get_component::<Position>(e).unwrap_err(), EcsError::ComponentMissing);
        world.destroy_entity(e);
        assert_eq!(world.get_component::<Position>(e).unwrap_err(), EcsError::EntityDead);
    }

    // S5 - query cache invalidation.
    #[test]
    fn query_cache_invalidates_on_new_archetype() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add_component(e, Position { x: 0.0, y: 0.0, z: 0.0 });
        world.add_component(e, Velocity { x: 0.0, y: 0.0, z: 0.0 });

        let _ = world.query().with::<Position>().with::<Velocity>().count();
        let misses_before = world.stats().cache_misses;
        let _ = world.query().with::<Position>().with::<Velocity>().count();
        assert_eq!(world.stats().cache_misses, misses_before);
        assert!(world.stats().cache_hits >= 1);

        let e2 = world.create_entity();
        world.add_component(e2, Position { x: 0.0, y: 0.0, z: 0.0 });
        world.add_component(e2, Velocity { x: 0.0, y: 0.0, z: 0.0 });
        world.add_component(e2, Tag(7));

        let _ = world.query().with::<Position>().with::<Velocity>().count();
        assert_eq!(world.stats().cache_misses, misses_before + 1);
    }

    // S6 - determinism across two identical Worlds.
    #[test]
    fn two_worlds_driven_identically_agree_on_archetype_layout() {
        fn drive(world: &mut World) {
            let e1 = world.create_entity();
            world.add_component(e1, Position { x: 1.0, y: 2.0, z: 3.0 });
            let e2 = world.create_entity();
            world.add_component(e2, Position { x: 4.0, y: 5.0, z: 6.0 });
            world.add_component(e2, Velocity { x: 1.0, y: 1.0, z: 1.0 });
        }

        let mut w1 = World::new();
        let mut w2 = World::new();
        drive(&mut w1);
        drive(&mut w2);

        assert_eq!(w1.archetype_count(), w2.archetype_count());
        for i in 0..w1.archetype_count() {
            assert_eq!(w1.archetype_at(i).component_types(), w2.archetype_at(i).component_types());
            assert_eq!(w1.archetype_at(i).entity_count(), w2.archetype_at(i).entity_count());
        }
    }

    #[test]
    fn spawn_bundle_writes_every_component_in_one_move() {
        let mut world = World::new();
        let e = world.spawn((Position { x: 1.0, y: 2.0, z: 3.0 }, Velocity { x: 4.0, y: 5.0, z: 6.0 }));
        assert_eq!(*world.get_component::<Position>(e).unwrap(), Position { x: 1.0, y: 2.0, z: 3.0 });
        assert_eq!(*world.get_component::<Velocity>(e).unwrap(), Velocity { x: 4.0, y: 5.0, z: 6.0 });
    }

    #[test]
    fn create_entities_batches_allocation() {
        let mut world = World::new();
        let ids = world.create_entities(10);
        assert_eq!(ids.len(), 10);
        assert_eq!(world.alive_count(), 10);
    }

    #[test]
    #[should_panic]
    fn non_power_of_two_chunk_capacity_panics() {
        World::with_chunk_capacity(100);
    }
}
