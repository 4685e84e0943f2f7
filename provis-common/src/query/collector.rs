// provis-common/src/query/collector.rs
use std::collections::btree_set;
use std::collections::BTreeSet;

/// Set-based accumulator for query results.
///
/// Duplicates collapse by value equality. A collector built with
/// [`Collector::with_limit`] reports itself full after that many distinct
/// elements, which tells producers to stop pulling input.
#[derive(Debug, Clone)]
pub struct Collector<T> {
    items: BTreeSet<T>,
    limit: Option<usize>,
}

impl<T: Ord> Collector<T> {
    pub fn new() -> Self {
        Self {
            items: BTreeSet::new(),
            limit: None,
        }
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            items: BTreeSet::new(),
            limit: Some(limit),
        }
    }

    /// Adds `item`; returns `false` when the producer should stop.
    pub fn accept(&mut self, item: T) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.insert(item);
        !self.is_full()
    }

    /// Pulls from `items` until it is exhausted or the collector is full.
    pub fn accept_while<I: Iterator<Item = T>>(&mut self, items: I) {
        if self.is_full() {
            return;
        }
        for item in items {
            if !self.accept(item) {
                break;
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.items.len() >= limit)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_result(self) -> QueryResult<T> {
        QueryResult { items: self.items }
    }
}

impl<T: Ord> Default for Collector<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a query: an ordered set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult<T> {
    items: BTreeSet<T>,
}

impl<T: Ord> QueryResult<T> {
    pub fn empty() -> Self {
        Self {
            items: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    pub fn iter(&self) -> btree_set::Iter<'_, T> {
        self.items.iter()
    }

    /// Smallest element in result order.
    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    /// Largest element in result order.
    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn into_set(self) -> BTreeSet<T> {
        self.items
    }
}

impl<T: Ord + Clone> QueryResult<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T: Ord> Default for QueryResult<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Ord> From<BTreeSet<T>> for QueryResult<T> {
    fn from(items: BTreeSet<T>) -> Self {
        Self { items }
    }
}

impl<T: Ord> FromIterator<T> for QueryResult<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for QueryResult<T> {
    type Item = T;
    type IntoIter = btree_set::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a QueryResult<T> {
    type Item = &'a T;
    type IntoIter = btree_set::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_dedups_by_value() {
        let mut collector = Collector::new();
        assert!(collector.accept(3));
        assert!(collector.accept(1));
        assert!(collector.accept(3));
        let result = collector.into_result();
        assert_eq!(result.to_vec(), vec![1, 3]);
    }

    #[test]
    fn limited_collector_signals_stop() {
        let mut collector = Collector::with_limit(2);
        assert!(collector.accept(1));
        assert!(!collector.accept(2));
        assert!(!collector.accept(3));
        assert_eq!(collector.len(), 2);
    }

    #[test]
    fn accept_while_stops_pulling_when_full() {
        let mut pulled = 0;
        let mut collector = Collector::with_limit(3);
        collector.accept_while((0..100).inspect(|_| pulled += 1));
        assert_eq!(collector.len(), 3);
        assert_eq!(pulled, 3);
    }
}
