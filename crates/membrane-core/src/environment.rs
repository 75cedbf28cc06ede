//! The environment outside the skin membrane.
//!
//! An [`Environment`] is a [`Multiset`] plus a set of infinite-supply
//! symbols. Infinite symbols never occupy the count map: they satisfy any
//! requested multiplicity in subset checks, are never consumed by
//! subtraction and are never accumulated by addition.
//!
//! The environment is a process-wide accumulator, not a value to be
//! recombined — only the in-place operations exist; there is deliberately no
//! `+`/`-` surface on this type.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::CoreError;
use crate::multiset::Multiset;

// ─────────────────────────────────────────────
// Environment
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    objects:  Multiset,
    infinite: BTreeSet<char>,
}

impl Environment {
    /// Build an environment from an initial multiset and the infinite-supply
    /// symbols. Infinite symbols are stripped from the count map.
    pub fn new(mut objects: Multiset, infinite: impl IntoIterator<Item = char>) -> Self {
        let infinite: BTreeSet<char> = infinite.into_iter().collect();
        for &s in &infinite {
            if objects.contains(s) {
                // Cannot fail: presence was just checked.
                let _ = objects.remove_all(s);
            }
        }
        Self { objects, infinite }
    }

    /// The finite contents (infinite symbols excluded by construction).
    pub fn objects(&self) -> &Multiset {
        &self.objects
    }

    pub fn infinite_symbols(&self) -> &BTreeSet<char> {
        &self.infinite
    }

    pub fn is_infinite(&self, symbol: char) -> bool {
        self.infinite.contains(&symbol)
    }

    /// Number of finite object instances.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Subset check where every infinite symbol satisfies any multiplicity.
    pub fn has_subset(&self, multiset: &Multiset) -> bool {
        multiset
            .iter()
            .all(|(s, c)| self.is_infinite(s) || self.objects.count(s) >= c)
    }

    /// Add `count` instances of `symbol`; a no-op for infinite symbols.
    pub fn add(&mut self, symbol: char, count: usize) {
        if !self.is_infinite(symbol) {
            self.objects.add(symbol, count);
        }
    }

    /// In-place union, skipping infinite symbols.
    pub fn merge(&mut self, multiset: &Multiset) {
        for (s, c) in multiset.iter() {
            self.add(s, c);
        }
    }

    /// In-place difference, skipping infinite symbols. Fails with
    /// [`CoreError::InvalidOperation`] on a finite shortfall, leaving the
    /// environment unchanged.
    pub fn subtract(&mut self, multiset: &Multiset) -> Result<(), CoreError> {
        if !self.has_subset(multiset) {
            return Err(CoreError::InvalidOperation("subtrahend is not a subset"));
        }
        for (s, c) in multiset.iter() {
            if !self.is_infinite(s) {
                // Cannot fail: subset was checked above.
                self.objects.remove(s, c)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.objects.fmt(f)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(pairs: &[(char, usize)]) -> Multiset {
        pairs.iter().copied().collect()
    }

    #[test]
    fn construction_strips_infinite_symbols() {
        let env = Environment::new(ms(&[('a', 2), ('b', 1)]), []);
        assert_eq!(env.len(), 3);
        assert!(env.infinite_symbols().is_empty());

        let env = Environment::new(ms(&[('a', 2), ('b', 1)]), ['a', 'c', 'd']);
        assert_eq!(env.len(), 1);
        assert!(!env.objects().contains('a'));
    }

    #[test]
    fn infinite_symbols_satisfy_any_request() {
        let env = Environment::new(ms(&[('a', 2), ('b', 1)]), ['c', 'd']);
        assert!(env.has_subset(&ms(&[('c', 1_000_000), ('a', 1)])));
        assert!(!env.has_subset(&ms(&[('c', 1_000_000), ('a', 3)])));
    }

    #[test]
    fn merge_skips_infinite_symbols() {
        let mut env = Environment::new(ms(&[('b', 1)]), ['a', 'c', 'd']);
        env.merge(&ms(&[('a', 10), ('b', 3), ('g', 2)]));
        assert_eq!(env.len(), 6);
        assert_eq!(env.objects().count('b'), 4);
        assert!(!env.objects().contains('a'));
    }

    #[test]
    fn subtract_skips_infinite_and_checks_finite_shortfall() {
        let mut env = Environment::new(ms(&[('b', 4), ('g', 2)]), ['a', 'c', 'd']);
        env.subtract(&ms(&[('c', 2), ('a', 10_000), ('g', 1), ('b', 2)]))
            .unwrap();
        assert_eq!(env.objects(), &ms(&[('b', 2), ('g', 1)]));

        let before = env.clone();
        assert!(env
            .subtract(&ms(&[('c', 2), ('a', 10_000), ('g', 2), ('b', 2)]))
            .is_err());
        assert_eq!(env, before);
    }
}
