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

//! Component type registry: dense integer ids and type-erased descriptors
//! for the component types a `World` knows about.
//!
//! Also carries the `Component`/`Bundle` traits used to spawn entities with
//! several components in a single archetype move.

use std::any::TypeId;
use std::mem::{align_of, needs_drop, size_of};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};

/// Maximum number of components supported by a single `Bundle`.
pub const MAX_BUNDLE_COMPONENTS: usize = 8;

/// Marker trait for anything storable as a component. Components must be
/// `'static` (no borrowed data) and safe to share across threads, since a
/// `World` may be read from several threads at once.
pub trait Component: 'static + Send + Sync {}

impl<T: 'static + Send + Sync> Component for T {}

/// Type-erased copy/drop glue for a single component type, resolved once at
/// first registration and reused for every chunk migration thereafter.
#[derive(Clone, Copy)]
pub struct ComponentDescriptor {
    pub type_id: TypeId,
    pub size: usize,
    pub align: usize,
    pub drop_fn: Option<unsafe fn(*mut u8)>,
    pub copy_fn: unsafe fn(*const u8, *mut u8),
}

unsafe fn drop_in_place_erased<T>(ptr: *mut u8) {
    std::ptr::drop_in_place(ptr as *mut T);
}

unsafe fn copy_erased<T>(src: *const u8, dst: *mut u8) {
    std::ptr::copy_nonoverlapping(src as *const T, dst as *mut T, 1);
}

impl ComponentDescriptor {
    fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
            drop_fn: if needs_drop::<T>() {
                Some(drop_in_place_erased::<T>)
            } else {
                None
            },
            copy_fn: copy_erased::<T>,
        }
    }
}

/// Process-wide-per-`World` registry assigning each component type a dense
/// `u32` id on first use. Safe to call concurrently from multiple threads,
/// unlike the rest of the ECS storage which is single-writer.
#[derive(Default)]
pub struct ComponentTypeRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    ids: FxHashMap<TypeId, u32>,
    descriptors: Vec<ComponentDescriptor>,
}

impl ComponentTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dense id for `T`, registering it on first use.
    pub fn register<T: Component>(&self) -> u32 {
        let type_id = TypeId::of::<T>();
        if let Some(&id) = self.inner.read().ids.get(&type_id) {
            return id;
        }
        let mut inner = self.inner.write();
        if let Some(&id) = inner.ids.get(&type_id) {
            return id;
        }
        let id = inner.descriptors.len() as u32;
        inner.descriptors.push(ComponentDescriptor::of::<T>());
        inner.ids.insert(type_id, id);
        id
    }

    /// Returns the dense id for `T` only if it was already registered.
    pub fn id_of<T: Component>(&self) -> Option<u32> {
        self.inner.read().ids.get(&TypeId::of::<T>()).copied()
    }

    pub fn descriptor(&self, id: u32) -> ComponentDescriptor {
        self.inner.read().descriptors[id as usize]
    }
}

/// Groups several components together so they can be written into a freshly
/// created archetype row in one pass, instead of one `add_component` move
/// per field.
pub trait Bundle: Send + Sync + 'static {
    fn type_ids(registry: &ComponentTypeRegistry) -> SmallVec<[u32; MAX_BUNDLE_COMPONENTS]>
    where
        Self: Sized;

    /// # Safety
    /// `ptrs` must contain one valid, correctly aligned, writable pointer
    /// per component in the same order `type_ids` enumerated them.
    unsafe fn write_components(self, ptrs: &[*mut u8]);
}

macro_rules! impl_bundle {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn type_ids(registry: &ComponentTypeRegistry) -> SmallVec<[u32; MAX_BUNDLE_COMPONENTS]> {
                smallvec![$(registry.register::<$T>()),*]
            }

            #[allow(non_snake_case)]
            unsafe fn write_components(self, ptrs: &[*mut u8]) {
                let ($($T,)*) = self;
                let mut i = 0;
                $(
                    std::ptr::write(ptrs[i] as *mut $T, $T);
                    i += 1;
                )*
                let _ = i;
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
