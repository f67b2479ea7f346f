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

//! Thread-local object pools backing zero-allocation query iteration.
//!
//! Every pool here is an optimization: a caller that bypasses it (drops a
//! rented buffer instead of returning it, or runs on a thread that never
//! warms the pool up) still gets correct results, just with an extra
//! allocation.

use std::cell::RefCell;

thread_local! {
    static ARCHETYPE_INDEX_POOL: RefCell<Vec<Vec<usize>>> = RefCell::new(Vec::new());
    static SIGNATURE_WORD_POOLS: [RefCell<Vec<Vec<u64>>>; 3] =
        [RefCell::new(Vec::new()), RefCell::new(Vec::new()), RefCell::new(Vec::new())];
}

/// Buckets a word count into one of three pools so a two-word signature
/// never gets handed a buffer sized for a two-hundred-component one (and
/// vice versa): `<= 4` words, `<= 16` words, and everything larger.
fn bucket_index(words: usize) -> usize {
    if words <= 4 {
        0
    } else if words <= 16 {
        1
    } else {
        2
    }
}

/// Rents a zeroed `Vec<u64>` of exactly `min_words` length from the bucket
/// that fits it, reusing a previously returned buffer when one with enough
/// capacity is sitting idle.
pub(crate) fn rent_words(min_words: usize) -> Vec<u64> {
    let bucket = bucket_index(min_words);
    let buf = SIGNATURE_WORD_POOLS.with(|pools| {
        let mut pool = pools[bucket].borrow_mut();
        let pos = pool.iter().position(|b| b.capacity() >= min_words);
        pos.map(|i| pool.swap_remove(i))
    });
    let mut buf = buf.unwrap_or_default();
    buf.clear();
    buf.resize(min_words, 0);
    buf
}

/// Returns a buffer to the bucket matching its capacity. A zero-capacity
/// buffer (e.g. a `Signature` that never grew past its default `Vec::new()`)
/// is not worth keeping and is dropped instead.
pub(crate) fn return_words(buf: Vec<u64>) {
    if buf.capacity() == 0 {
        return;
    }
    let bucket = bucket_index(buf.capacity());
    SIGNATURE_WORD_POOLS.with(|pools| pools[bucket].borrow_mut().push(buf));
}

/// A rented `Vec<usize>` of archetype indices, returned to the thread-local
/// pool on drop (cleared, not deallocated).
pub struct PooledArchetypeList {
    buf: Option<Vec<usize>>,
}

impl PooledArchetypeList {
    pub fn rent() -> Self {
        let buf = ARCHETYPE_INDEX_POOL.with(|pool| pool.borrow_mut().pop());
        Self {
            buf: Some(buf.unwrap_or_default()),
        }
    }

    pub fn as_vec(&mut self) -> &mut Vec<usize> {
        self.buf.as_mut().unwrap()
    }
}

impl Drop for PooledArchetypeList {
    fn drop(&mut self) {
        if let Some(mut buf) = self.buf.take() {
            buf.clear();
            ARCHETYPE_INDEX_POOL.with(|pool| pool.borrow_mut().push(buf));
        }
    }
}

/// A rented `Vec<u64>` sized for a signature's backing words, grouped by a
/// size bucket so differently sized signatures don't keep reallocating each
/// other's buffers. Clones of a rented buffer are never returned to the
/// pool - only the original rental's `Drop` recycles it - so the pool never
/// accidentally hands out an alias of live data.
pub struct PooledSignatureBits {
    buf: Option<Vec<u64>>,
}

impl PooledSignatureBits {
    pub fn rent(min_words: usize) -> Self {
        Self {
            buf: Some(rent_words(min_words)),
        }
    }

    pub fn as_slice(&self) -> &[u64] {
        self.buf.as_ref().unwrap()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u64] {
        self.buf.as_mut().unwrap()
    }
}

impl Drop for PooledSignatureBits {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            return_words(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rented_archetype_list_starts_empty() {
        let mut list = PooledArchetypeList::rent();
        assert!(list.as_vec().is_empty());
        list.as_vec().push(3);
    }

    #[test]
    fn rented_list_is_cleared_on_next_rental() {
        {
            let mut list = PooledArchetypeList::rent();
            list.as_vec().push(1);
            list.as_vec().push(2);
        }
        let mut list = PooledArchetypeList::rent();
        assert!(list.as_vec().is_empty());
    }

    #[test]
    fn signature_bits_rental_is_sized_and_zeroed() {
        let mut bits = PooledSignatureBits::rent(2);
        assert_eq!(bits.as_slice().len(), 2);
        bits.as_mut_slice()[0] = 7;
        assert_eq!(bits.as_slice()[0], 7);
    }

    #[test]
    fn bucket_index_separates_small_medium_and_large_requests() {
        assert_eq!(bucket_index(1), 0);
        assert_eq!(bucket_index(4), 0);
        assert_eq!(bucket_index(5), 1);
        assert_eq!(bucket_index(16), 1);
        assert_eq!(bucket_index(17), 2);
    }

    #[test]
    fn returned_buffer_is_reused_by_a_later_same_bucket_rental() {
        let first = rent_words(3);
        let first_ptr = first.as_ptr();
        return_words(first);
        let second = rent_words(3);
        assert_eq!(second.as_ptr(), first_ptr);
    }

    #[test]
    fn rent_words_zeroes_every_word() {
        let mut buf = rent_words(4);
        buf[0] = u64::MAX;
        return_words(buf);
        let reused = rent_words(4);
        assert!(reused.iter().all(|&w| w == 0));
    }
}
