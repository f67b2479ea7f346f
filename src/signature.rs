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

//! Component-type signature: a dynamically sized bitset keyed by component id.
//!
//! Backed by a `Vec<u64>`, same "no bloat" shape as the crate's original
//! flat `BitSet` - just extended with the set-algebra operations the
//! archetype graph and query engine need.

use std::hash::{Hash, Hasher};

use crate::pool;

/// Bitset of component-type ids identifying an archetype's exact component set.
#[derive(Debug, Clone, Default, Eq)]
pub struct Signature {
    words: Vec<u64>,
}

impl Signature {
    /// Empty signature (no components).
    pub fn empty() -> Self {
        Self { words: Vec::new() }
    }

    /// Signature with a single bit set.
    pub fn single(id: u32) -> Self {
        let mut sig = Self::empty();
        sig.insert(id);
        sig
    }

    /// Number of trailing all-zero words, ignored for equality/hash so that
    /// two signatures differing only in over-allocated backing length still
    /// compare and hash equal.
    fn significant_len(&self) -> usize {
        let mut len = self.words.len();
        while len > 0 && self.words[len - 1] == 0 {
            len -= 1;
        }
        len
    }

    /// Returns a new signature with `id` set. Idempotent.
    pub fn with(&self, id: u32) -> Self {
        let mut copy = self.clone();
        copy.insert(id);
        copy
    }

    /// Returns a new signature with `id` cleared. No-op if `id` was absent.
    pub fn without(&self, id: u32) -> Self {
        let mut copy = self.clone();
        copy.remove(id);
        copy
    }

    /// Sets the bit for `id` in place. Idempotent.
    pub fn insert(&mut self, id: u32) {
        let (word, bit) = (id as usize / 64, id as usize % 64);
        self.ensure_words(word + 1);
        self.words[word] |= 1u64 << bit;
    }

    /// Grows the backing buffer to at least `min_words`, renting a
    /// bucket-sized buffer from the thread-local word pool rather than
    /// letting `Vec::resize` reallocate on its own whenever the current
    /// buffer's capacity is already exhausted.
    fn ensure_words(&mut self, min_words: usize) {
        if self.words.len() >= min_words {
            return;
        }
        if self.words.capacity() >= min_words {
            self.words.resize(min_words, 0);
            return;
        }
        let mut rented = pool::rent_words(min_words);
        rented[..self.words.len()].copy_from_slice(&self.words);
        let old = std::mem::replace(&mut self.words, rented);
        pool::return_words(old);
    }

    /// Clears the bit for `id` in place. No-op if `id` was absent.
    pub fn remove(&mut self, id: u32) {
        let (word, bit) = (id as usize / 64, id as usize % 64);
        if word < self.words.len() {
            self.words[word] &= !(1u64 << bit);
        }
    }

    /// True iff `id` is a member of this signature.
    pub fn has(&self, id: u32) -> bool {
        let (word, bit) = (id as usize / 64, id as usize % 64);
        self.words
            .get(word)
            .map(|w| (w & (1u64 << bit)) != 0)
            .unwrap_or(false)
    }

    /// True iff every bit set in `other` is also set in `self`.
    pub fn is_superset_of(&self, other: &Self) -> bool {
        for i in 0..other.words.len() {
            let mine = self.words.get(i).copied().unwrap_or(0);
            if (mine & other.words[i]) != other.words[i] {
                return false;
            }
        }
        true
    }

    /// True iff `self` and `other` share at least one set bit.
    pub fn has_intersection(&self, other: &Self) -> bool {
        let len = self.words.len().min(other.words.len());
        for i in 0..len {
            if (self.words[i] & other.words[i]) != 0 {
                return true;
            }
        }
        false
    }

    /// Number of set bits.
    pub fn popcount(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Number of bits set in both `self` and `other`.
    pub fn intersection_count(&self, other: &Self) -> u32 {
        let len = self.words.len().min(other.words.len());
        (0..len)
            .map(|i| (self.words[i] & other.words[i]).count_ones())
            .sum()
    }

    /// Iterator over the set bit indices, in ascending order.
    pub fn iter(&self) -> SignatureIter<'_> {
        SignatureIter {
            words: &self.words,
            word_idx: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }
}

impl Drop for Signature {
    fn drop(&mut self) {
        let words = std::mem::take(&mut self.words);
        pool::return_words(words);
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        let len = self.significant_len().max(other.significant_len());
        for i in 0..len {
            let a = self.words.get(i).copied().unwrap_or(0);
            let b = other.words.get(i).copied().unwrap_or(0);
            if a != b {
                return false;
            }
        }
        true
    }
}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let len = self.significant_len();
        for word in &self.words[..len] {
            word.hash(state);
        }
    }
}

pub struct SignatureIter<'a> {
    words: &'a [u64],
    word_idx: usize,
    current: u64,
}

impl<'a> Iterator for SignatureIter<'a> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        loop {
            if self.current != 0 {
                let bit = self.current.trailing_zeros();
                self.current &= !(1u64 << bit);
                return Some((self.word_idx * 64) as u32 + bit);
            }
            self.word_idx += 1;
            if self.word_idx >= self.words.len() {
                return None;
            }
            self.current = self.words[self.word_idx];
        }
    }
}
