//! # CPU Sets
//!
//! Fixed-width bitmap of processor ids. Bit `n` set means CPU `n` is a
//! member. Every iteration walks CPUs in ascending id order, which is what
//! pins the tie-breaking rule of both CPU selectors.

use crate::config::MAX_CPUS;

/// Number of u64 words needed to represent `MAX_CPUS` bits.
const WORDS: usize = (MAX_CPUS + 63) / 64;

/// Set of CPUs, at most [`MAX_CPUS`] wide.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuMask {
    bits: [u64; WORDS],
}

impl CpuMask {
    /// The empty set.
    pub const fn empty() -> Self {
        Self { bits: [0; WORDS] }
    }

    /// CPUs `0..n` (clamped to `MAX_CPUS`).
    pub fn first_n(n: usize) -> Self {
        let mut mask = Self::empty();
        for cpu in 0..n.min(MAX_CPUS) {
            mask.set(cpu);
        }
        mask
    }

    /// Build a set from a slice of CPU ids; out-of-range ids are ignored.
    pub fn from_cpus(cpus: &[usize]) -> Self {
        let mut mask = Self::empty();
        for &cpu in cpus {
            mask.set(cpu);
        }
        mask
    }

    #[inline]
    pub fn set(&mut self, cpu: usize) {
        if cpu < MAX_CPUS {
            self.bits[cpu / 64] |= 1u64 << (cpu % 64);
        }
    }

    #[inline]
    pub fn clear(&mut self, cpu: usize) {
        if cpu < MAX_CPUS {
            self.bits[cpu / 64] &= !(1u64 << (cpu % 64));
        }
    }

    #[inline]
    pub const fn contains(&self, cpu: usize) -> bool {
        if cpu >= MAX_CPUS {
            return false;
        }
        (self.bits[cpu / 64] & (1u64 << (cpu % 64))) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    /// Number of CPUs in the set.
    pub fn weight(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Lowest CPU id in the set.
    pub fn first(&self) -> Option<usize> {
        self.bits
            .iter()
            .enumerate()
            .find(|&(_, &w)| w != 0)
            .map(|(i, w)| i * 64 + w.trailing_zeros() as usize)
    }

    /// Intersection of two sets.
    #[must_use]
    pub fn and(&self, other: &CpuMask) -> CpuMask {
        let mut out = *self;
        for (a, b) in out.bits.iter_mut().zip(other.bits.iter()) {
            *a &= *b;
        }
        out
    }

    /// Members of `self` that are not in `other`.
    #[must_use]
    pub fn and_not(&self, other: &CpuMask) -> CpuMask {
        let mut out = *self;
        for (a, b) in out.bits.iter_mut().zip(other.bits.iter()) {
            *a &= !*b;
        }
        out
    }

    pub fn intersects(&self, other: &CpuMask) -> bool {
        self.bits.iter().zip(other.bits.iter()).any(|(a, b)| a & b != 0)
    }

    /// Iterate member CPU ids in ascending order.
    pub fn iter(&self) -> CpuMaskIter {
        CpuMaskIter {
            bits: self.bits,
            word: 0,
        }
    }
}

impl core::fmt::Debug for CpuMask {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a CpuMask {
    type Item = usize;
    type IntoIter = CpuMaskIter;

    fn into_iter(self) -> CpuMaskIter {
        self.iter()
    }
}

/// Ascending iterator over the members of a [`CpuMask`].
pub struct CpuMaskIter {
    bits: [u64; WORDS],
    word: usize,
}

impl Iterator for CpuMaskIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.word < WORDS {
            let w = self.bits[self.word];
            if w != 0 {
                let bit = w.trailing_zeros() as usize;
                self.bits[self.word] &= w - 1; // clear lowest set bit
                return Some(self.word * 64 + bit);
            }
            self.word += 1;
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
