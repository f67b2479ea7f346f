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

//! SIMD-width helpers for chunk column access.
//!
//! `is_simd_supported::<T>` only answers yes for types that can be operated
//! on in place as their own representation - never for a type that would
//! need boxing or a fallback conversion to pretend to be SIMD-friendly.

use std::any::TypeId;
use std::mem::size_of;

/// Number of `T` lanes per SIMD-width sub-span on this platform.
#[cfg(target_arch = "x86_64")]
pub fn effective_width<T: 'static>() -> usize {
    if is_simd_supported::<T>() {
        8
    } else {
        1
    }
}

#[cfg(not(target_arch = "x86_64"))]
pub fn effective_width<T: 'static>() -> usize {
    1
}

/// True only for plain 32-bit-or-narrower numeric primitives, where treating
/// `N` contiguous elements as one SIMD-width lane group requires no layout
/// transformation.
pub fn is_simd_supported<T: 'static>() -> bool {
    let id = TypeId::of::<T>();
    (id == TypeId::of::<f32>()
        || id == TypeId::of::<i32>()
        || id == TypeId::of::<u32>()
        || id == TypeId::of::<i16>()
        || id == TypeId::of::<u16>()
        || id == TypeId::of::<i8>()
        || id == TypeId::of::<u8>())
        && size_of::<T>() <= size_of::<u32>()
}

/// Splits `data` into full SIMD-width chunks and a scalar remainder.
pub fn simd_split<T: 'static + Copy>(data: &mut [T]) -> (&mut [T], &mut [T]) {
    let width = effective_width::<T>();
    let simd_len = (data.len() / width) * width;
    data.split_at_mut(simd_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_report_simd_support() {
        assert!(is_simd_supported::<f32>());
        assert!(is_simd_supported::<u8>());
    }

    #[test]
    fn composite_types_never_claim_support() {
        #[derive(Clone, Copy)]
        struct Position {
            x: f32,
            y: f32,
        }
        assert!(!is_simd_supported::<Position>());
        assert!(!is_simd_supported::<String>());
    }

    #[test]
    fn simd_split_respects_width() {
        let mut data = [0f32; 10];
        let (simd, rem) = simd_split(&mut data);
        assert_eq!(simd.len() % effective_width::<f32>(), 0);
        assert_eq!(simd.len() + rem.len(), 10);
    }
}
