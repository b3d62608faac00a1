//! Fixed-width bit masks over component and tag ids.
//!
//! A [`Mask`] is a small inline array of `u64` words. Archetypes are
//! identified by a pair of masks (components, tags) and queries match
//! archetypes by mask containment, so every operation here is word-wise and
//! allocation free.
//!
//! ## Invariants
//! - Bit `i` is set if and only if type id `i` belongs to the set.
//! - Equality and hashing look only at the words, making masks cheap hash
//!   keys.
//! - Bit `0` is never set by the registry-driven code paths (ids start at 1).

use std::fmt;
use std::iter::FusedIterator;

use crate::engine::types::{MASK_BITS, MASK_WORDS};


/// Largest 64-bit prime, used to mix words into archetype key hashes.
pub(crate) const MIX_PRIME: u64 = 11_400_714_819_323_198_549;

/// Bitset representing a set of component or tag ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mask {
    words: [u64; MASK_WORDS],
}

impl Mask {
    /// The empty mask.
    pub const EMPTY: Mask = Mask { words: [0; MASK_WORDS] };

    /// Builds a mask from a list of ids.
    ///
    /// ## Panics
    /// Panics if any id is outside the mask width.
    pub fn from_ids(ids: &[u16]) -> Self {
        let mut mask = Mask::EMPTY;
        for &id in ids {
            mask.set(id);
        }
        mask
    }

    /// Returns the raw words backing this mask.
    #[inline]
    pub fn words(&self) -> &[u64; MASK_WORDS] {
        &self.words
    }

    #[inline]
    fn split(id: u16) -> (usize, u64) {
        let id = id as usize;
        debug_assert!(id < MASK_BITS, "mask id {id} exceeds mask width {MASK_BITS}");
        (id / 64, 1u64 << (id % 64))
    }

    /// Sets the bit for `id`.
    ///
    /// ## Panics
    /// Panics if `id` is outside the mask width.
    #[inline]
    pub fn set(&mut self, id: u16) {
        let (word, bit) = Self::split(id);
        self.words[word] |= bit;
    }

    /// Clears the bit for `id`.
    #[inline]
    pub fn clear(&mut self, id: u16) {
        let (word, bit) = Self::split(id);
        self.words[word] &= !bit;
    }

    /// Returns a copy of this mask with `id` set.
    #[inline]
    pub fn with(mut self, id: u16) -> Self {
        self.set(id);
        self
    }

    /// Returns a copy of this mask with `id` cleared.
    #[inline]
    pub fn without(mut self, id: u16) -> Self {
        self.clear(id);
        self
    }

    /// Returns `true` if `id` is in the set. Ids beyond the mask width are
    /// never present.
    #[inline]
    pub fn has(&self, id: u16) -> bool {
        let id = id as usize;
        if id >= MASK_BITS {
            return false;
        }
        (self.words[id / 64] >> (id % 64)) & 1 == 1
    }

    /// Returns `true` if every id in `other` is also in `self`.
    #[inline]
    pub fn has_all(&self, other: &Mask) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == *b)
    }

    /// Returns `true` if `self` and `other` share at least one id.
    #[inline]
    pub fn has_any(&self, other: &Mask) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Number of ids in the set.
    #[inline]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Returns `true` if no id is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Set union.
    #[inline]
    pub fn union(&self, other: &Mask) -> Mask {
        let mut out = *self;
        for (a, b) in out.words.iter_mut().zip(other.words.iter()) {
            *a |= b;
        }
        out
    }

    /// Set intersection.
    #[inline]
    pub fn intersection(&self, other: &Mask) -> Mask {
        let mut out = *self;
        for (a, b) in out.words.iter_mut().zip(other.words.iter()) {
            *a &= b;
        }
        out
    }

    /// Ids in `self` that are not in `other`.
    #[inline]
    pub fn difference(&self, other: &Mask) -> Mask {
        let mut out = *self;
        for (a, b) in out.words.iter_mut().zip(other.words.iter()) {
            *a &= !b;
        }
        out
    }

    /// Iterates the set ids in ascending order.
    ///
    /// The iterator copies the words, so it is independent of `self` and a
    /// new call always starts again from the lowest id.
    #[inline]
    pub fn iter(&self) -> MaskIter {
        MaskIter {
            words: self.words,
            word_index: 0,
            current: self.words[0],
            remaining: self.count(),
        }
    }

    /// Folds the words into a well-mixed 64-bit value.
    pub(crate) fn mix(&self, seed: u64) -> u64 {
        self.words.iter().fold(seed, |hash, &word| {
            (hash.rotate_left(5) ^ word).wrapping_mul(MIX_PRIME)
        })
    }
}

impl FromIterator<u16> for Mask {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        let mut mask = Mask::EMPTY;
        for id in iter {
            mask.set(id);
        }
        mask
    }
}

impl<'a> IntoIterator for &'a Mask {
    type Item = u16;
    type IntoIter = MaskIter;

    fn into_iter(self) -> MaskIter {
        self.iter()
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, id) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{id}")?;
        }
        f.write_str("]")
    }
}

/// Ascending iterator over the ids set in a [`Mask`].
#[derive(Clone, Debug)]
pub struct MaskIter {
    words: [u64; MASK_WORDS],
    word_index: usize,
    current: u64,
    remaining: usize,
}

impl Iterator for MaskIter {
    type Item = u16;

    #[inline]
    fn next(&mut self) -> Option<u16> {
        while self.current == 0 {
            self.word_index += 1;
            if self.word_index >= MASK_WORDS {
                return None;
            }
            self.current = self.words[self.word_index];
        }
        let tz = self.current.trailing_zeros() as usize;
        self.current &= self.current - 1;
        self.remaining -= 1;
        Some((self.word_index * 64 + tz) as u16)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for MaskIter {}

impl FusedIterator for MaskIter {}
