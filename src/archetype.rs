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

//! An archetype: the set of chunks holding every entity with one exact
//! component-type signature.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::chunk::Chunk;
use crate::component::{ComponentDescriptor, ComponentTypeRegistry};
use crate::entity::Entity;
use crate::signature::Signature;

/// Default chunk capacity, chosen so a typical 32-64 byte entity's columns
/// stay within a handful of cache lines per chunk.
pub const DEFAULT_CHUNK_CAPACITY: usize = 512;

/// 64-bit summary of an archetype's component-type ids, used as a cheap
/// false-positive-only pre-filter before the authoritative bitwise
/// signature test. Never the sole test - only ever a short-circuit.
fn bloom_of(component_types: &[u32]) -> u64 {
    let mut bits = 0u64;
    for &id in component_types {
        bits |= 1u64 << (id % 64);
    }
    bits
}

/// Orders a set of component-type ids deterministically so that two
/// archetypes built from the same type set - regardless of the order
/// components were added in - end up with bit-identical column layouts.
/// Larger, more strictly aligned components sort first (better packing
/// locality for the common case of iterating the "big" components together),
/// ties broken by the component's own id for a total order.
fn canonical_order(registry: &ComponentTypeRegistry, mut ids: Vec<u32>) -> Vec<u32> {
    ids.sort_by(|&a, &b| {
        let da = registry.descriptor(a);
        let db = registry.descriptor(b);
        db.align
            .cmp(&da.align)
            .then(db.size.cmp(&da.size))
            .then(a.cmp(&b))
    });
    ids
}

/// The set of entities sharing one exact component-type signature, stored as
/// a list of fixed-capacity chunks.
pub struct Archetype {
    id: u64,
    signature: Signature,
    component_types: Vec<u32>,
    type_to_column: FxHashMap<u32, usize>,
    descriptors: Vec<ComponentDescriptor>,
    chunks: Vec<Chunk>,
    chunk_capacity: usize,
    bloom: u64,
}

impl Archetype {
    pub(crate) fn new(
        id: u64,
        registry: &ComponentTypeRegistry,
        component_ids: Vec<u32>,
        chunk_capacity: usize,
    ) -> Self {
        let component_types = canonical_order(registry, component_ids);
        let mut signature = Signature::empty();
        let mut type_to_column = FxHashMap::default();
        let mut descriptors = Vec::with_capacity(component_types.len());
        for (col, &id) in component_types.iter().enumerate() {
            signature.insert(id);
            type_to_column.insert(id, col);
            descriptors.push(registry.descriptor(id));
        }
        let bloom = bloom_of(&component_types);
        Self {
            id,
            signature,
            component_types,
            type_to_column,
            descriptors,
            chunks: Vec::new(),
            chunk_capacity,
            bloom,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn component_types(&self) -> &[u32] {
        &self.component_types
    }

    pub fn column_of(&self, component_id: u32) -> Option<usize> {
        self.type_to_column.get(&component_id).copied()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunks_mut(&mut self) -> &mut [Chunk] {
        &mut self.chunks
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    pub fn entity_count(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }

    /// Cheap false-positive-only pre-filter: `false` means this archetype
    /// definitely lacks `component_id`; `true` means it might have it (or
    /// does).
    pub fn might_have(&self, component_id: u32) -> bool {
        (self.bloom & (1u64 << (component_id % 64))) != 0
    }

    /// Appends a new empty chunk and returns its index.
    fn push_chunk(&mut self) -> usize {
        self.chunks
            .push(Chunk::new(self.chunk_capacity, &self.descriptors));
        self.chunks.len() - 1
    }

    /// Reserves a row for `entity`, appending a fresh chunk if every
    /// existing one is full. Returns `(chunk_index, row)`; component bytes
    /// at that row are uninitialized until the caller writes them.
    pub(crate) fn allocate_row(&mut self, entity: Entity) -> (usize, usize) {
        let chunk_index = match self.chunks.last() {
            Some(c) if !c.is_full() => self.chunks.len() - 1,
            _ => self.push_chunk(),
        };
        let row = self.chunks[chunk_index].push_entity(entity);
        (chunk_index, row)
    }

    /// Removes the row at `(chunk_index, row)` via swap-remove, returning the
    /// id of whatever entity moved into that row (for registry fix-up), if
    /// any.
    pub(crate) fn remove_row(&mut self, chunk_index: usize, row: usize) -> Option<Entity> {
        self.chunks[chunk_index].swap_remove(row)
    }

    pub(crate) fn descriptors(&self) -> &[ComponentDescriptor] {
        &self.descriptors
    }
}

/// Computes the canonical signature for a component-id set without building
/// a full archetype, so the index can look up an existing archetype before
/// deciding whether to create a new one.
pub(crate) fn signature_of(ids: &[u32]) -> Signature {
    let mut sig = Signature::empty();
    for &id in ids {
        sig.insert(id);
    }
    sig
}

pub(crate) type ComponentIdList = SmallVec<[u32; 8]>;
