//! Fixed-universe bit sets.
//!
//! Every set algebra operation in the look-ahead engine runs over a universe
//! whose size is known up front (the terminal codes, or the nonterminal
//! ordinals). `BitSet` pins that universe size at construction and treats any
//! mixing of universes as a programming error rather than a data error.

use std::fmt;

/// A set of small integers drawn from the half-open universe `[0, capacity)`.
///
/// Binary operations require both operands to share the same capacity and
/// panic otherwise; element accesses outside the universe panic as well.
#[derive(Clone, PartialEq, Eq)]
pub struct BitSet {
    capacity: usize,
    inner: bit_set::BitSet,
}

impl BitSet {
    /// Create an empty set over the universe `[0, capacity)`.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: bit_set::BitSet::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, value: usize) -> bool {
        self.check_range(value);
        self.inner.contains(value)
    }

    /// Returns `true` when `value` was not yet present.
    pub fn insert(&mut self, value: usize) -> bool {
        self.check_range(value);
        self.inner.insert(value)
    }

    /// Returns `true` when `value` was present.
    pub fn remove(&mut self, value: usize) -> bool {
        self.check_range(value);
        self.inner.remove(value)
    }

    /// `self <- self ∪ other`
    pub fn union_with(&mut self, other: &Self) {
        self.check_capacity(other);
        self.inner.union_with(&other.inner);
    }

    /// `self <- self ∩ other`
    pub fn intersect_with(&mut self, other: &Self) {
        self.check_capacity(other);
        self.inner.intersect_with(&other.inner);
    }

    /// `self \ other`, as a new set.
    pub fn difference(&self, other: &Self) -> Self {
        self.check_capacity(other);
        let mut out = self.clone();
        out.inner.difference_with(&other.inner);
        out
    }

    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.check_capacity(other);
        self.inner.is_disjoint(&other.inner)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterate the members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.inner.iter()
    }

    fn check_range(&self, value: usize) {
        assert!(
            value < self.capacity,
            "element {} outside the set universe [0, {})",
            value,
            self.capacity,
        );
    }

    fn check_capacity(&self, other: &Self) {
        assert_eq!(
            self.capacity, other.capacity,
            "set operation over mismatched universes",
        );
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl crate::digraph::Set for BitSet {
    fn union_with(&mut self, other: &Self) {
        self.union_with(other)
    }
}
