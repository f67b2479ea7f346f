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

//! Fixed-capacity Structure-of-Arrays storage block.
//!
//! One `Chunk` holds up to `capacity` rows of a single archetype: a parallel
//! entity-id column plus one typed byte column per component, laid out
//! contiguously so iterating a single component across every live row in the
//! chunk is a linear scan with no indirection.

use std::any::TypeId;

use crate::component::ComponentDescriptor;
use crate::entity::Entity;
use crate::simd;

/// A single component's backing storage within a chunk: a byte buffer
/// pre-sized to `capacity * descriptor.size`, plus the descriptor needed to
/// drop or type-erase-copy its elements.
struct Column {
    descriptor: ComponentDescriptor,
    data: Vec<u8>,
}

impl Column {
    fn new(descriptor: ComponentDescriptor, capacity: usize) -> Self {
        Self {
            data: vec![0u8; descriptor.size * capacity],
            descriptor,
        }
    }

    fn ptr_mut(&mut self, row: usize) -> *mut u8 {
        unsafe { self.data.as_mut_ptr().add(row * self.descriptor.size) }
    }

    fn ptr(&self, row: usize) -> *const u8 {
        unsafe { self.data.as_ptr().add(row * self.descriptor.size) }
    }

    /// Runs this column's drop glue over its first `len` rows. `Column`
    /// itself doesn't know how many of its rows are live - that's tracked on
    /// the owning `Chunk` - so the chunk drives this directly instead of the
    /// column having its own `Drop` impl.
    fn drop_live_rows(&mut self, len: usize) {
        if let Some(drop_fn) = self.descriptor.drop_fn {
            for row in 0..len {
                unsafe { drop_fn(self.ptr_mut(row)) };
            }
        }
    }
}

/// Fixed-capacity SoA block of one archetype's rows.
pub struct Chunk {
    capacity: usize,
    len: usize,
    entities: Vec<Entity>,
    columns: Vec<Column>,
}

impl Chunk {
    /// Creates an empty chunk with one column per descriptor in `descriptors`,
    /// in the same order the owning archetype enumerates its component types.
    pub fn new(capacity: usize, descriptors: &[ComponentDescriptor]) -> Self {
        Self {
            capacity,
            len: 0,
            entities: Vec::with_capacity(capacity),
            columns: descriptors
                .iter()
                .map(|d| Column::new(*d, capacity))
                .collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    pub fn entity_at(&self, row: usize) -> Entity {
        self.entities[row]
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Reserves the next row for `entity` and returns its row index.
    /// Component column bytes are left uninitialized; callers must write
    /// every column's value before the row is observable through a query.
    ///
    /// # Panics
    /// Panics if the chunk is already at capacity. A full chunk is an
    /// archetype-level invariant violation (the archetype should have
    /// appended a fresh chunk first), never a caller-recoverable condition.
    pub fn push_entity(&mut self, entity: Entity) -> usize {
        assert!(!self.is_full(), "chunk is full");
        let row = self.len;
        self.entities.push(entity);
        self.len += 1;
        row
    }

    pub fn column_ptr_mut(&mut self, column: usize, row: usize) -> *mut u8 {
        self.columns[column].ptr_mut(row)
    }

    pub fn column_ptr(&self, column: usize, row: usize) -> *const u8 {
        self.columns[column].ptr(row)
    }

    /// Removes `row` by swapping the last live row into its place (and
    /// dropping the original occupant of `row`), returning the id of the
    /// entity that moved into `row` so the caller can fix up its registry
    /// location, or `None` if `row` was already the last row.
    pub fn swap_remove(&mut self, row: usize) -> Option<Entity> {
        self.swap_remove_impl(row, true)
    }

    /// Same shuffle as [`Chunk::swap_remove`], but never runs a column's
    /// drop glue on the vacated row. Used during archetype migration, where
    /// every column's value at `row` has already been moved elsewhere
    /// (copied byte-for-byte into the destination archetype, or read out by
    /// value for the caller) and must not also be dropped in place here.
    pub fn swap_remove_no_drop(&mut self, row: usize) -> Option<Entity> {
        self.swap_remove_impl(row, false)
    }

    fn swap_remove_impl(&mut self, row: usize, drop_vacated: bool) -> Option<Entity> {
        let last = self.len - 1;
        for column in &mut self.columns {
            if drop_vacated {
                if let Some(drop_fn) = column.descriptor.drop_fn {
                    unsafe { drop_fn(column.ptr_mut(row)) };
                }
            }
            if row != last {
                unsafe {
                    let src = column.ptr(last);
                    let dst = column.ptr_mut(row);
                    std::ptr::copy_nonoverlapping(src, dst, column.descriptor.size);
                }
            }
        }
        self.entities.swap_remove(row);
        self.len -= 1;
        if row == last {
            None
        } else {
            Some(self.entities[row])
        }
    }

    /// Typed immutable view over a component column's live rows.
    ///
    /// # Safety
    /// `column` must be the index of a column actually storing `T` (callers
    /// resolve this via the owning archetype's type -> column index map).
    pub unsafe fn span<T: 'static>(&self, column: usize) -> &[T] {
        let col = &self.columns[column];
        debug_assert_eq!(col.descriptor.type_id, TypeId::of::<T>());
        std::slice::from_raw_parts(col.data.as_ptr() as *const T, self.len)
    }

    /// Typed mutable view over a component column's live rows.
    ///
    /// # Safety
    /// Same contract as [`Chunk::span`].
    pub unsafe fn span_mut<T: 'static>(&mut self, column: usize) -> &mut [T] {
        let col = &mut self.columns[column];
        debug_assert_eq!(col.descriptor.type_id, TypeId::of::<T>());
        std::slice::from_raw_parts_mut(col.data.as_mut_ptr() as *mut T, self.len)
    }

    /// Splits a typed column into its SIMD-width-aligned prefix and scalar
    /// remainder. For types `simd::is_simd_supported` refuses, the "simd"
    /// half is empty and everything lands in the remainder.
    ///
    /// # Safety
    /// Same contract as [`Chunk::span`].
    pub unsafe fn simd_span<T: 'static + Copy>(&mut self, column: usize) -> (&mut [T], &mut [T]) {
        simd::simd_split(self.span_mut::<T>(column))
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        for column in &mut self.columns {
            column.drop_live_rows(self.len);
        }
    }
}
