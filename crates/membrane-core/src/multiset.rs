//! Symbol multisets — the object algebra every region computes over.
//!
//! A [`Multiset`] maps a symbol (one `char`) to a strictly positive count.
//! Absence means count zero; a decrement that reaches zero removes the entry.
//! Iteration and display are in symbol order (`BTreeMap`), so the rendered
//! form of a multiset is stable across runs.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign};

use crate::error::CoreError;

// ─────────────────────────────────────────────
// Multiset
// ─────────────────────────────────────────────

/// A multiset of `char` symbols with positive multiplicities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Multiset {
    counts: BTreeMap<char, usize>,
}

impl Multiset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of object instances (sum of all multiplicities).
    pub fn len(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn contains(&self, symbol: char) -> bool {
        self.counts.contains_key(&symbol)
    }

    /// Multiplicity of `symbol`, zero when absent.
    pub fn count(&self, symbol: char) -> usize {
        self.counts.get(&symbol).copied().unwrap_or(0)
    }

    /// Multiplicity of `symbol`, failing when the multiset does not contain it.
    pub fn multiplicity(&self, symbol: char) -> Result<usize, CoreError> {
        self.counts
            .get(&symbol)
            .copied()
            .ok_or(CoreError::ObjectNotFound(symbol))
    }

    /// Iterate `(symbol, multiplicity)` pairs in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (char, usize)> + '_ {
        self.counts.iter().map(|(&s, &c)| (s, c))
    }

    /// Add `count` instances of `symbol`. Adding zero is a no-op.
    pub fn add(&mut self, symbol: char, count: usize) {
        if count > 0 {
            *self.counts.entry(symbol).or_insert(0) += count;
        }
    }

    /// Remove `count` instances of `symbol`.
    ///
    /// Fails with [`CoreError::ObjectNotFound`] when the symbol is absent and
    /// [`CoreError::NotEnoughObjects`] when fewer than `count` instances are
    /// stored. Removing the last instance deletes the entry.
    pub fn remove(&mut self, symbol: char, count: usize) -> Result<(), CoreError> {
        let available = self
            .counts
            .get(&symbol)
            .copied()
            .ok_or(CoreError::ObjectNotFound(symbol))?;
        match available.checked_sub(count) {
            None => Err(CoreError::NotEnoughObjects {
                symbol,
                requested: count,
                available,
            }),
            Some(0) => {
                self.counts.remove(&symbol);
                Ok(())
            }
            Some(rest) => {
                self.counts.insert(symbol, rest);
                Ok(())
            }
        }
    }

    /// Remove every instance of `symbol`.
    pub fn remove_all(&mut self, symbol: char) -> Result<(), CoreError> {
        self.counts
            .remove(&symbol)
            .map(|_| ())
            .ok_or(CoreError::ObjectNotFound(symbol))
    }

    /// `true` iff every symbol of `other` is present here with at least the
    /// same multiplicity.
    pub fn has_subset(&self, other: &Multiset) -> bool {
        other.iter().all(|(s, c)| self.count(s) >= c)
    }

    /// In-place union: multiplicities of shared symbols add up.
    pub fn merge(&mut self, other: &Multiset) {
        for (s, c) in other.iter() {
            self.add(s, c);
        }
    }

    /// In-place difference. Fails with [`CoreError::InvalidOperation`] unless
    /// `other` is a subset of `self`; on failure `self` is left unchanged.
    pub fn subtract(&mut self, other: &Multiset) -> Result<(), CoreError> {
        if !self.has_subset(other) {
            return Err(CoreError::InvalidOperation("subtrahend is not a subset"));
        }
        for (s, c) in other.iter() {
            // Cannot fail: subset was checked above.
            self.remove(s, c)?;
        }
        Ok(())
    }

    /// Non-mutating union.
    pub fn union(&self, other: &Multiset) -> Multiset {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// Non-mutating difference, with the same precondition as [`subtract`].
    ///
    /// [`subtract`]: Multiset::subtract
    pub fn difference(&self, other: &Multiset) -> Result<Multiset, CoreError> {
        let mut out = self.clone();
        out.subtract(other)?;
        Ok(out)
    }

    /// Build a multiset from a string: every character that is not one of
    /// `separators` contributes one instance of that symbol.
    pub fn parse(s: &str, separators: &[char]) -> Multiset {
        let mut out = Multiset::new();
        for c in s.chars() {
            if !separators.contains(&c) {
                Multiset::add(&mut out, c, 1);
            }
        }
        out
    }

    /// [`parse`](Multiset::parse) with whitespace as the only separator.
    pub fn parse_default(s: &str) -> Multiset {
        let mut out = Multiset::new();
        for c in s.chars() {
            if !c.is_whitespace() {
                Multiset::add(&mut out, c, 1);
            }
        }
        out
    }
}

impl FromIterator<(char, usize)> for Multiset {
    fn from_iter<I: IntoIterator<Item = (char, usize)>>(iter: I) -> Self {
        let mut out = Multiset::new();
        for (s, c) in iter {
            Multiset::add(&mut out, s, c);
        }
        out
    }
}

impl AddAssign<&Multiset> for Multiset {
    fn add_assign(&mut self, other: &Multiset) {
        self.merge(other);
    }
}

impl Add<&Multiset> for &Multiset {
    type Output = Multiset;

    fn add(self, other: &Multiset) -> Multiset {
        self.union(other)
    }
}

impl fmt::Display for Multiset {
    /// Each symbol repeated by its multiplicity, in symbol order:
    /// `{a:2, b:1}` renders as `"aab"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (s, c) in self.iter() {
            for _ in 0..c {
                write!(f, "{s}")?;
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
