mod common;

use std::sync::Arc;

use common::{builder, comp, planner, range, render};
use proptest::prelude::*;
use provis_common::{CancellationToken, Catalog, Component, Profile};

fn universe() -> Vec<Arc<Component>> {
    vec![
        builder("app", "1.0").requires_component("lib", range("[1.0,3.0)")).build(),
        comp("lib", "1.0"),
        builder("lib", "2.0").requires_component("util", range("2.0")).build(),
        comp("util", "1.0"),
        comp("util", "2.0"),
        builder("tool", "1.0").requires_component("util", range("0.0")).build(),
        builder("extra", "1.0")
            .requires_component("lib", range("0.0"))
            .requires_component("util", range("0.0"))
            .build(),
        comp("old", "1.0"),
    ]
}

fn roots(all: &[Arc<Component>]) -> Vec<Arc<Component>> {
    all.iter()
        .filter(|c| matches!(c.id(), "app" | "tool" | "extra"))
        .cloned()
        .collect()
}

fn expected() -> Vec<String> {
    let all = universe();
    let catalog: Catalog = all.iter().cloned().collect();
    let profile = Profile::new("p").with_installed([comp("old", "1.0")]);
    let plan = planner().get_install_plan(&roots(&all), &profile, &catalog, &CancellationToken::new());
    render(&plan)
}

proptest! {
    /// The plan does not depend on the order roots and catalog entries arrive in.
    #[test]
    fn plans_are_independent_of_input_order(
        catalog_order in Just(universe()).prop_shuffle(),
        root_order in Just(roots(&universe())).prop_shuffle(),
    ) {
        let catalog: Catalog = catalog_order.into_iter().collect();
        let profile = Profile::new("p").with_installed([comp("old", "1.0")]);
        let plan = planner().get_install_plan(&root_order, &profile, &catalog, &CancellationToken::new());
        prop_assert!(plan.is_success());
        prop_assert_eq!(render(&plan), expected());
    }
}

#[test]
fn expected_plan_prefers_newest_consistent_versions() {
    assert_eq!(
        expected(),
        vec![
            "+ util 2.0.0",
            "+ lib 2.0.0",
            "+ app 1.0.0",
            "+ extra 1.0.0",
            "+ tool 1.0.0",
        ]
    );
}
