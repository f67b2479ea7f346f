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

//! Entity handles and the registry that allocates, recycles, and locates them.

/// A lightweight, copyable handle to an entity.
///
/// `id` is 1-based; `0` is reserved as the invalid/null id. `generation`
/// increments every time `id` is recycled, so a stale handle naturally
/// compares unequal to whatever entity currently occupies that id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    id: u32,
    generation: u32,
}

impl Entity {
    pub(crate) fn new(id: u32, generation: u32) -> Self {
        debug_assert!(id != 0, "entity id 0 is reserved invalid");
        Self { id, generation }
    }

    /// The invalid entity handle. Never returned by `EntityRegistry::create`.
    pub const INVALID: Entity = Entity { id: 0, generation: 0 };

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Packs this handle into a single `u64`: `(generation << 32) | id`.
    pub fn to_packed(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.id as u64)
    }

    /// Reconstructs a handle from its packed `u64` form. Inverse of `to_packed`.
    pub fn from_packed(packed: u64) -> Self {
        Self {
            id: (packed & 0xFFFF_FFFF) as u32,
            generation: (packed >> 32) as u32,
        }
    }
}

/// Per-id bookkeeping: current generation and, while alive, the entity's
/// archetype location. `row == -1` marks a destroyed (or never-allocated)
/// slot; `archetype_id`/`row` are meaningless when the slot is dead.
#[derive(Debug, Clone, Copy)]
struct EntityRecord {
    generation: u32,
    archetype_id: u64,
    chunk_index: u32,
    row: isize,
}

impl Default for EntityRecord {
    fn default() -> Self {
        Self {
            generation: 0,
            archetype_id: 0,
            chunk_index: 0,
            row: -1,
        }
    }
}

/// Allocates, recycles, and locates entity handles.
///
/// Ids are handed out from a freelist stack before growing the dense record
/// array, matching the recycle-before-grow discipline spec'd for entity
/// creation: destroying an entity bumps its generation and returns the id to
/// the freelist; creating an entity prefers a freelist id over minting a new
/// one.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    records: Vec<EntityRecord>,
    freelist: Vec<u32>,
    alive_count: usize,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new entity handle, recycling a freed id when available.
    pub fn create(&mut self) -> Entity {
        self.alive_count += 1;
        if let Some(id) = self.freelist.pop() {
            let record = &self.records[(id - 1) as usize];
            Entity::new(id, record.generation)
        } else {
            self.records.push(EntityRecord::default());
            let id = self.records.len() as u32;
            Entity::new(id, 0)
        }
    }

    /// True iff `entity`'s generation matches the slot's current generation.
    pub fn is_alive(&self, entity: Entity) -> bool {
        if entity.id == 0 {
            return false;
        }
        self.records
            .get((entity.id - 1) as usize)
            .map(|r| r.generation == entity.generation && r.row >= 0)
            .unwrap_or(false)
    }

    /// Marks `entity` destroyed, bumps its generation, and returns the id to
    /// the freelist. Idempotent no-op if the entity is already dead.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let record = &mut self.records[(entity.id - 1) as usize];
        record.generation = record.generation.wrapping_add(1);
        record.row = -1;
        self.freelist.push(entity.id);
        self.alive_count -= 1;
        true
    }

    /// Current `(archetype_id, chunk_index, row)` location of a live entity.
    pub fn location(&self, entity: Entity) -> Option<(u64, usize, usize)> {
        if !self.is_alive(entity) {
            return None;
        }
        let record = &self.records[(entity.id - 1) as usize];
        Some((record.archetype_id, record.chunk_index as usize, record.row as usize))
    }

    /// Updates the stored location for a live entity. No-op if dead.
    pub fn set_location(&mut self, entity: Entity, archetype_id: u64, chunk_index: usize, row: usize) {
        if let Some(record) = self.records.get_mut((entity.id.wrapping_sub(1)) as usize) {
            if record.generation == entity.generation {
                record.archetype_id = archetype_id;
                record.chunk_index = chunk_index as u32;
                record.row = row as isize;
            }
        }
    }

    /// Updates the row of an already-located entity after a swap-remove
    /// shuffled another entity into a new row within the same chunk.
    pub fn set_row(&mut self, id: u32, chunk_index: usize, row: usize) {
        if let Some(record) = self.records.get_mut((id.wrapping_sub(1)) as usize) {
            record.chunk_index = chunk_index as u32;
            record.row = row as isize;
        }
    }

    /// Number of currently-alive entities.
    pub fn alive_count(&self) -> usize {
        self.alive_count
    }
}
