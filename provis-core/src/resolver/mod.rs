// provis-core/src/resolver/mod.rs
//! Dependency closure resolution.
//!
//! The resolver runs a depth-first greedy search with chronological
//! backtracking. Work items are processed in FIFO order: strict roots, then
//! optional roots, then injected requirements, then the requirements of every
//! newly selected component. A requirement that is not yet satisfied takes its
//! most preferred viable provider and pushes a choice point onto an explicit
//! stack; a later failure pops back to the nearest point with another provider
//! to try. The state before a pick is only kept while such a retry (or the
//! fallback of an optional requirement) is still possible.
//!
//! A selection is consistent when no id appears in two versions (unless both
//! are multi-version), no negative requirement is matched, and every
//! requirement's occurrence bounds hold.

mod candidates;
mod conflict;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use provis_common::cancel::CancellationToken;
use provis_common::config::DEFAULT_MAX_SEARCH_STEPS;
use provis_common::model::{Component, ComponentKey, Requirement, RequirementMatch};
use provis_common::status::Status;
use tracing::{debug, error, warn};

use candidates::CandidateIndex;
pub use conflict::{Conflict, Rejection};

/// A component that must (or, when not strict, should) be in the closure.
#[derive(Debug, Clone)]
pub struct RootSpec {
    pub component: Arc<Component>,
    pub strict: bool,
}

impl RootSpec {
    pub fn strict(component: Arc<Component>) -> Self {
        Self {
            component,
            strict: true,
        }
    }

    pub fn optional(component: Arc<Component>) -> Self {
        Self {
            component,
            strict: false,
        }
    }
}

/// Everything one resolution looks at. The pool is the snapshot of candidate
/// components; nothing outside it can be selected except the roots themselves.
#[derive(Debug, Clone, Default)]
pub struct ResolutionInput {
    pub roots: Vec<RootSpec>,
    pub extra_requirements: Vec<Requirement>,
    pub already_installed: BTreeSet<Arc<Component>>,
    pub pool: BTreeSet<Arc<Component>>,
}

/// Something the resolver chose to leave out.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Recommendation {
    /// An optional root that could not be kept.
    DroppedRoot { root: ComponentKey, reason: String },
    /// An optional requirement nobody provides in a consistent way.
    Unsatisfied {
        requirer: Option<ComponentKey>,
        requirement: Requirement,
    },
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub status: Status,
    /// The selected closure. Empty unless the resolution succeeded.
    pub closure: BTreeSet<Arc<Component>>,
    pub recommendations: Vec<Recommendation>,
}

impl Resolution {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClosureResolver {
    max_search_steps: u64,
}

impl Default for ClosureResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEARCH_STEPS)
    }
}

impl ClosureResolver {
    pub fn new(max_search_steps: u64) -> Self {
        Self { max_search_steps }
    }

    pub fn max_search_steps(&self) -> u64 {
        self.max_search_steps
    }

    pub fn resolve(&self, input: &ResolutionInput, cancel: &CancellationToken) -> Resolution {
        debug!(
            "Resolving closure: {} roots, {} extra requirements, pool of {}",
            input.roots.len(),
            input.extra_requirements.len(),
            input.pool.len()
        );
        let mut search = Search {
            index: CandidateIndex::new(&input.pool, &input.already_installed),
            extra_requirements: &input.extra_requirements,
            cancel,
            max_attempts: self.max_search_steps,
            attempts: 0,
        };

        match search.solve(State::initial(input)) {
            Ok(state) => {
                let mut status = Status::ok_with("Resolution complete");
                for recommendation in &state.recommendations {
                    if let Recommendation::DroppedRoot { root, reason } = recommendation {
                        status.add_child(
                            Status::info(format!("Optional root {root} was left out: {reason}"))
                                .for_component(root.clone()),
                        );
                    }
                }
                debug!(
                    "Resolution succeeded with {} components after {} attempts",
                    state.selected.len(),
                    search.attempts
                );
                Resolution {
                    status,
                    closure: state.selected.into_values().collect(),
                    recommendations: state.recommendations,
                }
            }
            Err(Conflict::Canceled) => {
                debug!("Resolution canceled after {} attempts", search.attempts);
                Resolution {
                    status: Status::canceled(),
                    closure: BTreeSet::new(),
                    recommendations: Vec::new(),
                }
            }
            Err(conflict) => {
                error!("Resolution failed: {}", conflict);
                let mut status = Status::error("Cannot complete the request");
                status.add_child(conflict.to_status());
                Resolution {
                    status,
                    closure: BTreeSet::new(),
                    recommendations: Vec::new(),
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Obligation {
    Include {
        component: Arc<Component>,
        optional: bool,
    },
    Satisfy {
        requirer: Option<ComponentKey>,
        requirement: Requirement,
    },
}

#[derive(Debug, Clone, Default)]
struct State {
    selected: BTreeMap<ComponentKey, Arc<Component>>,
    by_id: BTreeMap<String, Vec<Arc<Component>>>,
    by_capability: BTreeMap<(String, String), Vec<Arc<Component>>>,
    /// Negative requirements of the selected components, with their owner.
    negatives: Vec<(ComponentKey, Requirement)>,
    queue: VecDeque<Obligation>,
    recommendations: Vec<Recommendation>,
}

impl State {
    fn initial(input: &ResolutionInput) -> Self {
        let mut state = State::default();
        let strict = input.roots.iter().filter(|r| r.strict);
        let optional = input.roots.iter().filter(|r| !r.strict);
        for root in strict.chain(optional) {
            state.queue.push_back(Obligation::Include {
                component: Arc::clone(&root.component),
                optional: !root.strict,
            });
        }
        for requirement in &input.extra_requirements {
            state.queue.push_back(Obligation::Satisfy {
                requirer: None,
                requirement: requirement.clone(),
            });
        }
        state
    }

    fn select(&mut self, component: Arc<Component>) {
        let key = component.key().clone();
        for requirement in component.requires() {
            if requirement.is_negative() {
                self.negatives.push((key.clone(), requirement.clone()));
            }
            self.queue.push_back(Obligation::Satisfy {
                requirer: Some(key.clone()),
                requirement: requirement.clone(),
            });
        }
        let buckets: BTreeSet<(&str, &str)> = component
            .provides()
            .map(|cap| (cap.namespace.as_str(), cap.name.as_str()))
            .collect();
        for (namespace, name) in buckets {
            self.by_capability
                .entry((namespace.to_string(), name.to_string()))
                .or_default()
                .push(Arc::clone(&component));
        }
        self.by_id
            .entry(component.id().to_string())
            .or_default()
            .push(Arc::clone(&component));
        self.selected.insert(key, component);
    }

    /// Selected components satisfying `requirement`, in key order.
    fn providers_of(&self, requirement: &Requirement) -> Vec<ComponentKey> {
        let mut providers: Vec<ComponentKey> = match &requirement.matcher {
            RequirementMatch::Capability {
                namespace, name, ..
            } => self
                .by_capability
                .get(&(namespace.clone(), name.clone()))
                .into_iter()
                .flatten()
                .filter(|c| requirement.is_satisfied_by(c))
                .map(|c| c.key().clone())
                .collect(),
            RequirementMatch::OneOf(keys) => keys
                .iter()
                .filter(|key| self.selected.contains_key(*key))
                .cloned()
                .collect(),
        };
        providers.sort();
        providers
    }
}

/// A decision the search can return to when a later step fails.
enum ChoicePoint {
    /// An optional root was included; falling back leaves it out.
    OptionalRoot {
        state: State,
        component: Arc<Component>,
    },
    /// A provider was picked for a requirement. `state` is the state before the
    /// pick and is only kept while something can still be retried from it.
    Provider {
        state: Option<State>,
        requirer: Option<ComponentKey>,
        requirement: Requirement,
        reselect: bool,
        current: ComponentKey,
        remaining: VecDeque<Arc<Component>>,
        attempts: Vec<(ComponentKey, Conflict)>,
    },
}

struct Search<'a> {
    index: CandidateIndex,
    extra_requirements: &'a [Requirement],
    cancel: &'a CancellationToken,
    max_attempts: u64,
    attempts: u64,
}

impl Search<'_> {
    /// Runs the search with an explicit stack of choice points, so recursion
    /// depth never grows with the size of the closure.
    fn solve(&mut self, initial: State) -> Result<State, Conflict> {
        let mut stack: Vec<ChoicePoint> = Vec::new();
        let mut state = initial;
        loop {
            match self.advance(&mut state, &mut stack) {
                Ok(()) => return Ok(state),
                Err(conflict) => state = self.backtrack(&mut stack, conflict)?,
            }
        }
    }

    /// Works through the queue until it is empty and the selection validates,
    /// or until the current branch fails.
    fn advance(&mut self, state: &mut State, stack: &mut Vec<ChoicePoint>) -> Result<(), Conflict> {
        loop {
            if self.cancel.is_canceled() {
                return Err(Conflict::Canceled);
            }
            let Some(obligation) = state.queue.pop_front() else {
                return self.validate(state);
            };
            match obligation {
                Obligation::Include {
                    component,
                    optional,
                } => {
                    if state.selected.contains_key(component.key()) {
                        continue;
                    }
                    if let Err(rejection) = self.check_viable(state, &component) {
                        let conflict = Conflict::RootConflict {
                            root: component.key().clone(),
                            rejection,
                        };
                        if optional {
                            drop_root(state, &component, &conflict);
                            continue;
                        }
                        return Err(conflict);
                    }
                    if optional {
                        self.count_attempt()?;
                        stack.push(ChoicePoint::OptionalRoot {
                            state: state.clone(),
                            component: Arc::clone(&component),
                        });
                    }
                    debug!("Selecting root {}", component.key());
                    state.select(component);
                }
                Obligation::Satisfy {
                    requirer,
                    requirement,
                } => {
                    // Negative requirements are enforced by viability checks and at the leaf.
                    if requirement.is_negative() {
                        continue;
                    }
                    let needed = requirement.min_occurs.max(1) as usize;
                    let found = state.providers_of(&requirement).len();
                    if found >= needed {
                        continue;
                    }

                    let mut viable = VecDeque::new();
                    let mut rejections = Vec::new();
                    for candidate in self.index.providers(&requirement) {
                        if state.selected.contains_key(candidate.key()) {
                            continue;
                        }
                        match self.check_viable(state, &candidate) {
                            Ok(()) => viable.push_back(candidate),
                            Err(rejection) => rejections.push(rejection),
                        }
                    }

                    let Some(first) = viable.pop_front() else {
                        if requirement.is_optional() {
                            recommend(state, requirer, requirement);
                            continue;
                        }
                        return Err(if rejections.is_empty() {
                            Conflict::NoProvider {
                                requirer,
                                requirement,
                            }
                        } else {
                            Conflict::Rejected {
                                requirer,
                                requirement,
                                rejections,
                            }
                        });
                    };

                    let reselect = found + 1 < needed;
                    let saved = (!viable.is_empty() || requirement.is_optional()).then(|| state.clone());
                    self.take(state, &first, requirer.as_ref(), &requirement, reselect)?;
                    stack.push(ChoicePoint::Provider {
                        state: saved,
                        requirer,
                        requirement,
                        reselect,
                        current: first.key().clone(),
                        remaining: viable,
                        attempts: Vec::new(),
                    });
                }
            }
        }
    }

    /// Unwinds to the most recent choice point with an alternative left and
    /// returns the state to continue from.
    fn backtrack(
        &mut self,
        stack: &mut Vec<ChoicePoint>,
        mut conflict: Conflict,
    ) -> Result<State, Conflict> {
        loop {
            if conflict.is_fatal() {
                return Err(conflict);
            }
            let Some(point) = stack.pop() else {
                return Err(conflict);
            };
            match point {
                ChoicePoint::OptionalRoot {
                    mut state,
                    component,
                } => {
                    drop_root(&mut state, &component, &conflict);
                    return Ok(state);
                }
                ChoicePoint::Provider {
                    state,
                    requirer,
                    requirement,
                    reselect,
                    current,
                    mut remaining,
                    mut attempts,
                } => {
                    debug!("Backtracking from {}: {}", current, conflict);
                    attempts.push((current, conflict.pruned(conflict::MAX_EXPLANATION_DEPTH - 1)));
                    match (remaining.pop_front(), state) {
                        (Some(next), Some(saved)) => {
                            let keep = !remaining.is_empty() || requirement.is_optional();
                            let (mut branch, state) = if keep {
                                (saved.clone(), Some(saved))
                            } else {
                                (saved, None)
                            };
                            self.take(&mut branch, &next, requirer.as_ref(), &requirement, reselect)?;
                            stack.push(ChoicePoint::Provider {
                                state,
                                requirer,
                                requirement,
                                reselect,
                                current: next.key().clone(),
                                remaining,
                                attempts,
                            });
                            return Ok(branch);
                        }
                        (_, Some(mut saved)) if requirement.is_optional() => {
                            recommend(&mut saved, requirer, requirement);
                            return Ok(saved);
                        }
                        _ => {
                            conflict = Conflict::Exhausted {
                                requirer,
                                requirement,
                                attempts,
                            };
                        }
                    }
                }
            }
        }
    }

    fn take(
        &mut self,
        state: &mut State,
        candidate: &Arc<Component>,
        requirer: Option<&ComponentKey>,
        requirement: &Requirement,
        reselect: bool,
    ) -> Result<(), Conflict> {
        self.count_attempt()?;
        debug!(
            "Trying {} for {} required by {}",
            candidate.key(),
            requirement,
            conflict::requirer_label(requirer)
        );
        if reselect {
            state.queue.push_front(Obligation::Satisfy {
                requirer: requirer.cloned(),
                requirement: requirement.clone(),
            });
        }
        state.select(Arc::clone(candidate));
        Ok(())
    }

    fn count_attempt(&mut self) -> Result<(), Conflict> {
        self.attempts += 1;
        if self.attempts > self.max_attempts {
            return Err(Conflict::BudgetExceeded(self.max_attempts));
        }
        Ok(())
    }

    fn check_viable(&self, state: &State, candidate: &Arc<Component>) -> Result<(), Rejection> {
        let same_id = state.by_id.get(candidate.id()).into_iter().flatten();
        for selected in same_id {
            if selected.key() != candidate.key()
                && (selected.is_singleton() || candidate.is_singleton())
            {
                return Err(Rejection::Singleton {
                    candidate: candidate.key().clone(),
                    selected: selected.key().clone(),
                });
            }
        }
        if let Some((owner, requirement)) = state
            .negatives
            .iter()
            .find(|(_, r)| r.is_satisfied_by(candidate))
        {
            return Err(Rejection::Excluded {
                candidate: candidate.key().clone(),
                by: Some(owner.clone()),
                requirement: requirement.clone(),
            });
        }
        if let Some(requirement) = candidate
            .requires()
            .find(|r| r.is_negative() && !state.providers_of(r).is_empty())
        {
            return Err(Rejection::Excluded {
                candidate: candidate.key().clone(),
                by: Some(candidate.key().clone()),
                requirement: requirement.clone(),
            });
        }
        if let Some(requirement) = self
            .extra_requirements
            .iter()
            .find(|r| r.is_negative() && r.is_satisfied_by(candidate))
        {
            return Err(Rejection::Excluded {
                candidate: candidate.key().clone(),
                by: None,
                requirement: requirement.clone(),
            });
        }
        Ok(())
    }

    /// Checks occurrence bounds over the finished selection.
    fn validate(&self, state: &State) -> Result<(), Conflict> {
        let owned = state.selected.values().flat_map(|component| {
            component
                .requires()
                .map(move |r| (Some(component.key().clone()), r))
        });
        let injected = self.extra_requirements.iter().map(|r| (None, r));
        for (requirer, requirement) in owned.chain(injected) {
            let providers = state.providers_of(requirement);
            if providers.len() > requirement.max_occurs as usize {
                return Err(Conflict::Cardinality {
                    requirer,
                    requirement: requirement.clone(),
                    allowed: requirement.max_occurs,
                    providers,
                });
            }
            if !requirement.is_optional() && providers.len() < requirement.min_occurs as usize {
                return Err(Conflict::TooFew {
                    requirer,
                    requirement: requirement.clone(),
                    needed: requirement.min_occurs,
                    found: providers.len(),
                });
            }
        }
        Ok(())
    }
}

fn drop_root(state: &mut State, root: &Component, conflict: &Conflict) {
    warn!("Leaving out optional root {}: {}", root.key(), conflict);
    state.recommendations.push(Recommendation::DroppedRoot {
        root: root.key().clone(),
        reason: conflict.to_string(),
    });
}

fn recommend(state: &mut State, requirer: Option<ComponentKey>, requirement: Requirement) {
    debug!(
        "Leaving optional {} of {} unsatisfied",
        requirement,
        conflict::requirer_label(requirer.as_ref())
    );
    state.recommendations.push(Recommendation::Unsatisfied {
        requirer,
        requirement,
    });
}
