//! Parameter expansion
//!
//! Expands a [`FilterListRequest`] into the cartesian product of its
//! value-lists. Enumeration order is HS x Product x Exporter x Port x IEC x
//! Country x Party, outermost to innermost, so the foreign-party value
//! changes fastest.
//!
//! The sequence is lazy: each key is decoded from its position with
//! mixed-radix arithmetic, so the expander can be enumerated any number of
//! times and the total is known without enumerating.

use crate::domain::request::{FilterField, FilterListRequest};
use crate::domain::CombinationKey;

/// Cartesian-product expander over a request
#[derive(Debug, Clone, Copy)]
pub struct ParameterExpander<'a> {
    request: &'a FilterListRequest,
}

impl<'a> ParameterExpander<'a> {
    pub fn new(request: &'a FilterListRequest) -> Self {
        Self { request }
    }

    /// Number of combinations (product of list lengths)
    ///
    /// An empty list yields zero. Saturates at `usize::MAX`.
    pub fn total_combinations(&self) -> usize {
        FilterField::ALL
            .iter()
            .map(|f| self.request.values(*f).len())
            .try_fold(1usize, |acc, len| acc.checked_mul(len))
            .unwrap_or(usize::MAX)
    }

    /// Whether there is nothing to do
    pub fn is_empty(&self) -> bool {
        self.total_combinations() == 0
    }

    /// Key at a position in enumeration order
    pub fn combination_at(&self, position: usize) -> Option<CombinationKey> {
        if position >= self.total_combinations() {
            return None;
        }

        let mut values: [String; 7] = Default::default();
        let mut remainder = position;
        for field in FilterField::ALL.iter().rev() {
            let list = self.request.values(*field);
            values[field.index()] = list[remainder % list.len()].clone();
            remainder /= list.len();
        }

        Some(CombinationKey::new(
            values,
            self.request.from_month,
            self.request.to_month,
        ))
    }

    /// Fresh iterator from the first combination
    pub fn iter(&self) -> CombinationIter<'a> {
        CombinationIter {
            expander: *self,
            position: 0,
            total: self.total_combinations(),
        }
    }
}

impl<'a> IntoIterator for &ParameterExpander<'a> {
    type Item = CombinationKey;
    type IntoIter = CombinationIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over combination keys in enumeration order
#[derive(Debug, Clone)]
pub struct CombinationIter<'a> {
    expander: ParameterExpander<'a>,
    position: usize,
    total: usize,
}

impl Iterator for CombinationIter<'_> {
    type Item = CombinationKey;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total {
            return None;
        }
        let key = self.expander.combination_at(self.position);
        self.position += 1;
        key
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.position;
        (remaining, Some(remaining))
    }

    fn nth(&mut self, n: usize) -> Option<Self::Item> {
        self.position = self.position.saturating_add(n).min(self.total);
        self.next()
    }
}

impl ExactSizeIterator for CombinationIter<'_> {}
