// provis-common/src/query/compound.rs
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{Collector, ContextQuery, MatchQuery, Query, QueryResult};

/// Builds an AND/OR over `children`, choosing the match form when possible.
pub(super) fn compound<T: Ord + Clone + 'static>(children: Vec<Query<T>>, and: bool) -> Query<T> {
    if children.is_empty() {
        return Query::from_context(CompoundContextQuery { children, and });
    }
    let matches: Vec<Arc<dyn MatchQuery<T>>> = children
        .iter()
        .filter_map(|child| match child {
            Query::Match(q) => Some(Arc::clone(q)),
            Query::Context(_) => None,
        })
        .collect();
    if matches.len() == children.len() {
        Query::from_match(CompoundMatchQuery {
            children: matches,
            and,
        })
    } else {
        Query::from_context(CompoundContextQuery { children, and })
    }
}

/// AND/OR over match queries; short-circuits per element.
pub struct CompoundMatchQuery<T> {
    children: Vec<Arc<dyn MatchQuery<T>>>,
    and: bool,
}

impl<T> MatchQuery<T> for CompoundMatchQuery<T> {
    fn is_match(&self, candidate: &T) -> bool {
        if self.and {
            self.children.iter().all(|child| child.is_match(candidate))
        } else {
            self.children.iter().any(|child| child.is_match(candidate))
        }
    }

    fn pre_perform(&self) {
        for child in &self.children {
            child.pre_perform();
        }
    }

    fn post_perform(&self) {
        for child in &self.children {
            child.post_perform();
        }
    }
}

/// AND/OR where at least one child needs the whole input.
pub struct CompoundContextQuery<T> {
    children: Vec<Query<T>>,
    and: bool,
}

impl<T: Ord + Clone + 'static> ContextQuery<T> for CompoundContextQuery<T> {
    fn perform(&self, input: &mut dyn Iterator<Item = T>, collector: &mut Collector<T>) {
        if self.children.is_empty() {
            return;
        }
        let materialized: Vec<T> = input.collect();
        let mut combined: Option<BTreeSet<T>> = None;
        for child in &self.children {
            let result = child.perform(materialized.iter().cloned()).into_set();
            combined = Some(match combined {
                None => result,
                Some(acc) if self.and => acc.intersection(&result).cloned().collect(),
                Some(mut acc) => {
                    acc.extend(result);
                    acc
                }
            });
            if self.and && combined.as_ref().is_some_and(BTreeSet::is_empty) {
                break;
            }
        }
        collector.accept_while(combined.unwrap_or_default().into_iter());
    }
}

/// Output of child `i` is the input of child `i + 1`.
pub struct PipedQuery<T> {
    children: Vec<Query<T>>,
}

impl<T> PipedQuery<T> {
    pub fn new(children: Vec<Query<T>>) -> Self {
        Self { children }
    }
}

impl<T: Ord + Clone + 'static> ContextQuery<T> for PipedQuery<T> {
    fn perform(&self, input: &mut dyn Iterator<Item = T>, collector: &mut Collector<T>) {
        let Some((first, rest)) = self.children.split_first() else {
            return;
        };
        let mut current: QueryResult<T> = first.perform(input);
        for child in rest {
            if current.is_empty() {
                return;
            }
            current = child.perform(current);
        }
        collector.accept_while(current.into_iter());
    }
}

/// At most `limit` results of `inner`.
pub struct LimitQuery<T> {
    inner: Query<T>,
    limit: usize,
}

impl<T> LimitQuery<T> {
    pub fn new(inner: Query<T>, limit: usize) -> Self {
        Self { inner, limit }
    }
}

impl<T: Ord + Clone + 'static> ContextQuery<T> for LimitQuery<T> {
    fn perform(&self, input: &mut dyn Iterator<Item = T>, collector: &mut Collector<T>) {
        if self.limit == 0 {
            return;
        }
        let limited = match &self.inner {
            // Fast path: stop pulling input after `limit` matches.
            Query::Match(_) => {
                let mut bounded = Collector::with_limit(self.limit);
                self.inner.perform_into(input, &mut bounded);
                bounded.into_result()
            }
            Query::Context(_) => self
                .inner
                .perform(input)
                .into_iter()
                .take(self.limit)
                .collect(),
        };
        collector.accept_while(limited.into_iter());
    }
}
