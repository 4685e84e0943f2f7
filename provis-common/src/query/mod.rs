// provis-common/src/query/mod.rs
//! Composable queries over component collections.
//!
//! A [`Query`] is either a per-element predicate ([`MatchQuery`]) or an
//! aggregate that needs to see the whole input ([`ContextQuery`]). Compound,
//! piped and limit queries combine them; when every child of an AND/OR is a
//! match query the combination is itself a match query and short-circuits.
//!
//! Evaluation is pull-based: producers stop pulling input as soon as the
//! [`Collector`] reports it is full, and [`Queryable`] sources stop as soon as
//! the cancellation token is set. Queries never fail; an unsatisfiable query
//! yields an empty [`QueryResult`].
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::cancel::CancellationToken;

mod collector;
pub mod component;
mod compound;

pub use collector::{Collector, QueryResult};
pub use compound::{CompoundContextQuery, CompoundMatchQuery, LimitQuery, PipedQuery};

/// A predicate evaluated independently for each element.
///
/// Implementations must not depend on evaluation order. `pre_perform` and
/// `post_perform` bracket one full traversal and may be used to prime or drop
/// caches.
pub trait MatchQuery<T>: Send + Sync {
    fn is_match(&self, candidate: &T) -> bool;

    fn pre_perform(&self) {}

    fn post_perform(&self) {}
}

/// A query that needs the entire input, e.g. "latest version per id".
///
/// Implementations must consume the whole input, must not assume any element
/// order, and must be transitive: running on a superset and filtering down
/// afterwards gives the same answer as running on the filtered set.
pub trait ContextQuery<T>: Send + Sync {
    fn perform(&self, input: &mut dyn Iterator<Item = T>, collector: &mut Collector<T>);
}

/// Anything that can answer a query.
pub trait Queryable<T: Ord + Clone + 'static>: Send + Sync {
    fn query(&self, query: &Query<T>, cancel: &CancellationToken) -> QueryResult<T>;
}

pub enum Query<T> {
    Match(Arc<dyn MatchQuery<T>>),
    Context(Arc<dyn ContextQuery<T>>),
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        match self {
            Query::Match(q) => Query::Match(Arc::clone(q)),
            Query::Context(q) => Query::Context(Arc::clone(q)),
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Match(_) => f.write_str("Query::Match"),
            Query::Context(_) => f.write_str("Query::Context"),
        }
    }
}

struct FnMatch<F>(F);

impl<T, F> MatchQuery<T> for FnMatch<F>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    fn is_match(&self, candidate: &T) -> bool {
        (self.0)(candidate)
    }
}

impl<T: Ord + Clone + 'static> Query<T> {
    pub fn from_match<Q: MatchQuery<T> + 'static>(query: Q) -> Self {
        Query::Match(Arc::new(query))
    }

    pub fn from_context<Q: ContextQuery<T> + 'static>(query: Q) -> Self {
        Query::Context(Arc::new(query))
    }

    /// Adapts a closure into a match query.
    pub fn matching<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::from_match(FnMatch(predicate))
    }

    /// Matches every element.
    pub fn all() -> Self {
        Self::matching(|_: &T| true)
    }

    /// Intersection of the children.
    pub fn and(children: Vec<Query<T>>) -> Self {
        compound::compound(children, true)
    }

    /// Union of the children.
    pub fn or(children: Vec<Query<T>>) -> Self {
        compound::compound(children, false)
    }

    /// Feeds the output of each child into the next.
    pub fn pipe(children: Vec<Query<T>>) -> Self {
        Self::from_context(PipedQuery::new(children))
    }

    /// At most `limit` results of `inner`.
    pub fn limit(inner: Query<T>, limit: usize) -> Self {
        Self::from_context(LimitQuery::new(inner, limit))
    }

    pub fn is_match_query(&self) -> bool {
        matches!(self, Query::Match(_))
    }

    /// Evaluates the query over `input`.
    pub fn perform<I>(&self, input: I) -> QueryResult<T>
    where
        I: IntoIterator<Item = T>,
    {
        let mut collector = Collector::new();
        self.perform_into(&mut input.into_iter(), &mut collector);
        collector.into_result()
    }

    /// Evaluates the query, pushing results into `collector` until it is full.
    pub fn perform_into(&self, input: &mut dyn Iterator<Item = T>, collector: &mut Collector<T>) {
        match self {
            Query::Match(query) => {
                query.pre_perform();
                collector.accept_while(input.filter(|candidate| query.is_match(candidate)));
                query.post_perform();
            }
            Query::Context(query) => query.perform(input, collector),
        }
    }
}

/// Runs `query` over `items`, stopping early once `cancel` is set.
pub fn query_iter<T, I>(items: I, query: &Query<T>, cancel: &CancellationToken) -> QueryResult<T>
where
    T: Ord + Clone + 'static,
    I: IntoIterator<Item = T>,
{
    query.perform(items.into_iter().take_while(|_| !cancel.is_canceled()))
}

impl<T: Ord + Clone + Send + Sync + 'static> Queryable<T> for QueryResult<T> {
    fn query(&self, query: &Query<T>, cancel: &CancellationToken) -> QueryResult<T> {
        query_iter(self.iter().cloned(), query, cancel)
    }
}

/// The union of several queryables, queried as one.
pub struct CompoundQueryable<'a, T: Ord + Clone + 'static> {
    sources: Vec<&'a dyn Queryable<T>>,
}

impl<'a, T: Ord + Clone + 'static> CompoundQueryable<'a, T> {
    pub fn new(sources: Vec<&'a dyn Queryable<T>>) -> Self {
        Self { sources }
    }
}

impl<T: Ord + Clone + 'static> Queryable<T> for CompoundQueryable<'_, T> {
    fn query(&self, query: &Query<T>, cancel: &CancellationToken) -> QueryResult<T> {
        if query.is_match_query() {
            let mut union = BTreeSet::new();
            for source in &self.sources {
                union.extend(source.query(query, cancel));
            }
            return QueryResult::from(union);
        }
        // Context queries have to see the union at once.
        let everything = Query::all();
        let mut union = BTreeSet::new();
        for source in &self.sources {
            union.extend(source.query(&everything, cancel));
        }
        query_iter(union, query, cancel)
    }
}
