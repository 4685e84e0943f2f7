use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use provis_common::model::component::PROP_PRODUCT;
use provis_common::query::component::{self, ComponentQuery};
use provis_common::query::{Collector, ContextQuery, MatchQuery};
use provis_common::{
    CancellationToken, Catalog, Component, CompoundQueryable, Profile, Query, Queryable,
    Requirement, Version, VersionRange,
};

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn comp(id: &str, version: &str) -> Arc<Component> {
    Component::builder(id, v(version)).build()
}

fn catalog() -> Catalog {
    Catalog::new([
        comp("a", "1.0"),
        comp("a", "2.0"),
        comp("b", "1.0"),
        comp("b", "1.5"),
        Component::builder("p", v("3.0"))
            .property(PROP_PRODUCT, "true")
            .build(),
    ])
}

fn keys(result: impl IntoIterator<Item = Arc<Component>>) -> Vec<String> {
    result.into_iter().map(|c| c.key().to_string()).collect()
}

/// Match query that counts how often it was asked.
struct Counting {
    calls: Arc<AtomicUsize>,
}

impl MatchQuery<Arc<Component>> for Counting {
    fn is_match(&self, _candidate: &Arc<Component>) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Context query that counts how often it was performed.
struct CountingContext {
    runs: Arc<AtomicUsize>,
}

impl ContextQuery<Arc<Component>> for CountingContext {
    fn perform(
        &self,
        input: &mut dyn Iterator<Item = Arc<Component>>,
        collector: &mut Collector<Arc<Component>>,
    ) {
        self.runs.fetch_add(1, Ordering::SeqCst);
        collector.accept_while(input);
    }
}

#[test]
fn limit_zero_never_evaluates_inner_query() {
    let calls = Arc::new(AtomicUsize::new(0));
    let inner = Query::from_match(Counting {
        calls: Arc::clone(&calls),
    });
    let result = catalog().query(&Query::limit(inner, 0), &CancellationToken::new());
    assert!(result.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let runs = Arc::new(AtomicUsize::new(0));
    let inner = Query::from_context(CountingContext {
        runs: Arc::clone(&runs),
    });
    let result = catalog().query(&Query::limit(inner, 0), &CancellationToken::new());
    assert!(result.is_empty());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn limit_over_match_query_stops_pulling_early() {
    let calls = Arc::new(AtomicUsize::new(0));
    let inner = Query::from_match(Counting {
        calls: Arc::clone(&calls),
    });
    let result = catalog().query(&Query::limit(inner, 2), &CancellationToken::new());
    assert_eq!(result.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn limit_over_context_query_takes_first_in_result_order() {
    let result = catalog().query(
        &Query::limit(component::latest(), 2),
        &CancellationToken::new(),
    );
    assert_eq!(keys(result), vec!["a 2.0.0", "b 1.5.0"]);
}

#[test]
fn and_of_match_queries_is_a_match_query() {
    let query = Query::and(vec![component::by_id("a"), component::matching(|c| c.version().major() >= 2)]);
    assert!(query.is_match_query());
    let result = catalog().query(&query, &CancellationToken::new());
    assert_eq!(keys(result), vec!["a 2.0.0"]);
}

#[test]
fn and_short_circuits_on_first_false() {
    let calls = Arc::new(AtomicUsize::new(0));
    let query = Query::and(vec![
        component::matching(|_| false),
        Query::from_match(Counting {
            calls: Arc::clone(&calls),
        }),
    ]);
    assert!(catalog().query(&query, &CancellationToken::new()).is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn or_with_context_child_unions_results() {
    let query = Query::or(vec![component::products(), component::latest()]);
    assert!(!query.is_match_query());
    let result = catalog().query(&query, &CancellationToken::new());
    assert_eq!(keys(result), vec!["a 2.0.0", "b 1.5.0", "p 3.0.0"]);
}

#[test]
fn and_with_context_child_intersects_over_full_input() {
    // latest() sees the whole catalog, so a 1.0 is not "latest" even though it matches by_id.
    let query = Query::and(vec![
        component::by_id_in_range("a", VersionRange::parse("[1.0,2.0)").unwrap()),
        component::latest(),
    ]);
    assert!(catalog().query(&query, &CancellationToken::new()).is_empty());
}

#[test]
fn empty_compound_and_pipe_yield_nothing() {
    let cancel = CancellationToken::new();
    assert!(catalog().query(&Query::and(vec![]), &cancel).is_empty());
    assert!(catalog().query(&Query::or(vec![]), &cancel).is_empty());
    assert!(catalog().query(&Query::pipe(vec![]), &cancel).is_empty());
}

#[test]
fn pipe_feeds_output_into_next_child() {
    let query: ComponentQuery = Query::pipe(vec![
        component::by_id_in_range("b", VersionRange::any()),
        component::latest(),
    ]);
    let result = catalog().query(&query, &CancellationToken::new());
    assert_eq!(keys(result), vec!["b 1.5.0"]);
}

#[test]
fn satisfying_uses_requirement_range() {
    let requirement = Requirement::component("b", VersionRange::parse("[1.0,1.5)").unwrap());
    let result = catalog().query(&component::satisfying(requirement), &CancellationToken::new());
    assert_eq!(keys(result), vec!["b 1.0.0"]);
}

#[test]
fn compound_queryable_runs_context_queries_over_the_union() {
    let catalog = Catalog::new([comp("a", "1.0")]);
    let profile = Profile::new("p").with_installed([comp("a", "3.0"), comp("c", "1.0")]);
    let sources: Vec<&dyn Queryable<Arc<Component>>> = vec![&catalog, &profile];
    let both = CompoundQueryable::new(sources);
    let cancel = CancellationToken::new();

    let latest = both.query(&component::latest(), &cancel);
    assert_eq!(keys(latest), vec!["a 3.0.0", "c 1.0.0"]);

    let all_a = both.query(&component::by_id("a"), &cancel);
    assert_eq!(keys(all_a), vec!["a 1.0.0", "a 3.0.0"]);
}

#[test]
fn results_deduplicate_by_identity() {
    let catalog = Catalog::new([comp("a", "1.0")]);
    let profile = Profile::new("p").with_installed([comp("a", "1.0")]);
    let sources: Vec<&dyn Queryable<Arc<Component>>> = vec![&catalog, &profile];
    let both = CompoundQueryable::new(sources);
    assert_eq!(both.query(&component::all(), &CancellationToken::new()).len(), 1);
}
