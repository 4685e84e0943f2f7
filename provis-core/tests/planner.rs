mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{apply, builder, catalog, comp, key, planner, range, render, v};
use provis_common::model::profile::{INCLUSION_STRICT, PROP_INCLUSION_RULES, PROP_ROOT};
use provis_common::{
    CancellationToken, Component, Operand, Profile, PropertyOperand, Requirement, Severity,
};
use provis_core::planner::REVERT_TARGET_PREFIX;
use provis_core::{revert_target, Planner, PlannerOptions, ResolutionResult};

#[test]
fn install_picks_highest_provider_and_orders_it_first() {
    let a = builder("a", "1.0")
        .requires_component("b", range("[1.0,2.0)"))
        .build();
    let cat = catalog(&[a.clone(), comp("b", "1.0"), comp("b", "1.5"), comp("b", "2.0")]);
    let profile = Profile::new("p");

    let plan = planner().get_install_plan(&[a.clone()], &profile, &cat, &CancellationToken::new());

    assert!(plan.is_success(), "{}", plan.status().flatten());
    assert_eq!(render(&plan), vec!["+ b 1.5.0", "+ a 1.0.0"]);
    assert!(plan.property_operands().contains(&PropertyOperand::Component {
        component: a.key().clone(),
        key: PROP_ROOT.to_string(),
        old: None,
        new: Some("true".to_string()),
    }));
}

#[test]
fn uninstalling_a_required_component_is_an_error_naming_it() {
    let b = comp("b", "1.0");
    let a = builder("a", "1.0")
        .requires_component("b", range("[1.0,2.0)"))
        .build();
    let profile = Profile::new("p").with_installed([a.clone(), b.clone()]);

    let plan = planner().get_uninstall_plan(&[b.clone()], &profile, &CancellationToken::new());

    assert_eq!(plan.status().severity(), Severity::Error);
    assert!(plan.operands().is_empty());
    assert!(plan.future_state().is_empty());
    let result = ResolutionResult::from_plan(&plan);
    assert_eq!(result.conflicting_components(), vec![b.key().clone()]);
    let detail = result.detail_for(b.key()).unwrap();
    assert!(detail.contains("still required by a 1.0.0"), "{detail}");
}

#[test]
fn uninstall_removes_what_only_the_root_needed() {
    let lib = comp("lib", "1.0");
    let shared = comp("shared", "1.0");
    let app = builder("app", "1.0")
        .requires_component("lib", range("1.0"))
        .requires_component("shared", range("1.0"))
        .build();
    let tool = builder("tool", "1.0")
        .requires_component("shared", range("1.0"))
        .build();
    let profile = Profile::new("p")
        .with_installed([app.clone(), tool.clone(), lib, shared])
        .with_root(app.key(), true)
        .with_root(tool.key(), true);

    let plan = planner().get_uninstall_plan(&[app.clone()], &profile, &CancellationToken::new());

    assert!(plan.is_success(), "{}", plan.status().flatten());
    assert_eq!(render(&plan), vec!["- app 1.0.0", "- lib 1.0.0"]);
    let ids: Vec<&str> = plan.future_state().iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec!["shared", "tool"]);
}

#[test]
fn uninstalling_nothing_installed_is_ok() {
    let profile = Profile::new("p").with_installed([comp("a", "1.0")]);
    let plan = planner().get_uninstall_plan(&[comp("zzz", "1.0")], &profile, &CancellationToken::new());
    assert!(plan.status().is_ok());
    assert!(plan.is_empty());
    assert_eq!(plan.future_state(), profile.installed());
}

#[test]
fn updates_for_returns_only_newer_declared_updates() {
    let c1 = comp("c", "1.0");
    let c2 = builder("c", "2.0").update_from("c", range("[1.0,2.0)")).build();
    let c3 = builder("c", "3.0").update_from("c", range("[2.0,3.0)")).build();
    let other = builder("d", "5.0").update_from("other", range("0.0")).build();
    let cat = catalog(&[c1.clone(), c2.clone(), c3, other]);

    let updates = planner().updates_for(&c1, &cat, &CancellationToken::new());

    assert_eq!(updates, vec![c2]);
}

#[test]
fn installing_an_installed_component_is_blocked() {
    let a = comp("a", "1.0");
    let profile = Profile::new("p").with_installed([a.clone()]);
    let plan = planner().get_install_plan(&[a.clone()], &profile, &catalog(&[a.clone()]), &CancellationToken::new());

    assert_eq!(plan.status().severity(), Severity::Warning);
    assert!(!plan.is_success());
    assert!(plan.operands().is_empty());
    let detail = ResolutionResult::from_plan(&plan).detail_for(a.key()).unwrap();
    assert_eq!(detail, "WARNING: a 1.0.0 is already installed");
}

#[test]
fn replace_and_replace_back_restores_the_profile() {
    let a1 = comp("a", "1.0");
    let a2 = builder("a", "2.0").requires_component("lib", range("1.0")).build();
    let lib = comp("lib", "1.0");
    let cat = catalog(&[a1.clone(), a2.clone(), lib]);
    let cancel = CancellationToken::new();
    let original = Profile::new("p")
        .with_installed([a1.clone()])
        .with_root(a1.key(), true);

    let forward = planner().get_replace_plan(&[a1.clone()], &[a2.clone()], &original, &cat, &cancel);
    assert!(forward.is_success(), "{}", forward.status().flatten());
    assert_eq!(render(&forward), vec!["+ lib 1.0.0", "~ a 1.0.0 -> 2.0.0"]);
    let middle = apply(&original, &forward);
    assert!(middle.is_root(a2.key()));

    let back = planner().get_replace_plan(&[a2.clone()], &[a1.clone()], &middle, &cat, &cancel);
    assert!(back.is_success(), "{}", back.status().flatten());
    assert_eq!(render(&back), vec!["- lib 1.0.0", "~ a 2.0.0 -> 1.0.0"]);
    let restored = apply(&middle, &back);

    assert_eq!(restored.installed(), original.installed());
    assert_eq!(
        restored.component_properties(a1.key()),
        original.component_properties(a1.key())
    );
    assert_eq!(
        restored.component_property(a1.key(), PROP_INCLUSION_RULES),
        Some(INCLUSION_STRICT)
    );
}

#[test]
fn become_never_installs_the_target() {
    let x = comp("x", "1.0");
    let y = comp("y", "2.0");
    let z = comp("z", "1.0");
    let target = builder("target", "1.0")
        .requires_component("x", range("1.0"))
        .requires_component("y", range("1.0"))
        .build();
    let profile = Profile::new("p").with_installed([z]);

    let plan = planner().get_become_plan(&target, &profile, &catalog(&[x, y]), &CancellationToken::new());

    assert!(plan.is_success(), "{}", plan.status().flatten());
    assert_eq!(render(&plan), vec!["+ x 1.0.0", "+ y 2.0.0", "- z 1.0.0"]);
    assert!(!plan.future_state().contains(&target));
}

#[test]
fn revert_restores_components_missing_from_the_catalog() {
    let a1 = comp("a", "1.0");
    let a2 = builder("a", "2.0").update_from("a", range("[1.0,2.0)")).build();
    let revision = Profile::new("p")
        .with_timestamp(100)
        .with_installed([a1.clone()])
        .with_root(a1.key(), true)
        .with_property("env", "prod");
    let current = Profile::new("p")
        .with_timestamp(200)
        .with_installed([a2.clone()])
        .with_root(a2.key(), true)
        .with_property("env", "dev")
        .with_property("extra", "1");

    let plan = planner().get_revert_plan(&revision, &current, &catalog(&[a2]), &CancellationToken::new());

    assert!(plan.is_success(), "{}", plan.status().flatten());
    assert_eq!(render(&plan), vec!["~ a 2.0.0 -> 1.0.0"]);
    let reverted = apply(&current, &plan);
    assert_eq!(reverted.installed(), revision.installed());
    assert_eq!(reverted.property("env"), Some("prod"));
    assert_eq!(reverted.property("extra"), None);
    assert!(reverted.is_root(a1.key()));
}

#[test]
fn revert_target_pins_every_recorded_component() {
    let revision = Profile::new("p")
        .with_timestamp(42)
        .with_installed([comp("a", "1.0"), comp("b", "2.0")]);
    let target = revert_target(&revision);
    assert_eq!(target.id(), format!("{REVERT_TARGET_PREFIX}p"));
    assert_eq!(target.version(), &v("42"));
    let pins: Vec<Requirement> = target.requires().cloned().collect();
    assert_eq!(
        pins,
        vec![
            Requirement::one_of([key("a", "1.0")]),
            Requirement::one_of([key("b", "2.0")]),
        ]
    );
}

#[test]
fn canceled_plans_expose_nothing() {
    let a = builder("a", "1.0").requires_component("b", range("1.0")).build();
    let cat = catalog(&[a.clone(), comp("b", "1.0")]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let plan = planner().get_install_plan(&[a], &Profile::new("p"), &cat, &cancel);

    assert_eq!(plan.status().severity(), Severity::Canceled);
    assert!(plan.operands().is_empty());
    assert!(plan.property_operands().is_empty());
    assert!(plan.future_state().is_empty());
}

#[test]
fn operands_respect_dependency_order() {
    let base = comp("base", "1.0");
    let mid = builder("mid", "1.0").requires_component("base", range("1.0")).build();
    let top = builder("top", "1.0")
        .requires_component("mid", range("1.0"))
        .requires_component("base", range("1.0"))
        .build();
    let old = builder("old", "1.0").requires_component("legacy", range("1.0")).build();
    let legacy = comp("legacy", "1.0");
    let profile = Profile::new("p")
        .with_installed([old.clone(), legacy])
        .with_root(old.key(), true);
    let mut request = provis_common::ProfileChangeRequest::new("p");
    request.add(Arc::clone(&top));
    request.remove(old);

    let plan = planner().get_provisioning_plan(
        &request,
        &profile,
        &catalog(&[base, mid, top]),
        &CancellationToken::new(),
    );

    assert!(plan.is_success(), "{}", plan.status().flatten());
    assert_eq!(
        render(&plan),
        vec!["+ base 1.0.0", "+ mid 1.0.0", "+ top 1.0.0", "- old 1.0.0", "- legacy 1.0.0"]
    );
    let added: BTreeSet<_> = plan.operands().iter().filter_map(Operand::added).collect();
    let removed: BTreeSet<_> = plan.operands().iter().filter_map(Operand::removed).collect();
    assert!(added.is_disjoint(&removed));
}

#[test]
fn install_leaves_unrelated_installed_components_alone() {
    let a = comp("a", "1.0");
    let x = comp("x", "1.0");
    let c = comp("c", "1.0");
    let profile = Profile::new("p")
        .with_installed([a.clone(), x.clone()])
        .with_root(a.key(), true);

    let plan = planner().get_install_plan(&[c.clone()], &profile, &catalog(&[c.clone()]), &CancellationToken::new());

    assert!(plan.is_success(), "{}", plan.status().flatten());
    assert_eq!(render(&plan), vec!["+ c 1.0.0"]);
    assert!(plan.future_state().contains(&x));
    assert!(plan.future_state().contains(&a));
}

#[test]
fn replace_leaves_unrelated_installed_components_alone() {
    let a1 = builder("a", "1.0").requires_component("lib", range("1.0")).build();
    let a2 = comp("a", "2.0");
    let lib = comp("lib", "1.0");
    let x = comp("x", "1.0");
    let profile = Profile::new("p")
        .with_installed([a1.clone(), lib, x.clone()])
        .with_root(a1.key(), true);

    let plan = planner().get_replace_plan(
        &[a1.clone()],
        &[a2.clone()],
        &profile,
        &catalog(&[a1, a2]),
        &CancellationToken::new(),
    );

    assert!(plan.is_success(), "{}", plan.status().flatten());
    assert_eq!(render(&plan), vec!["- lib 1.0.0", "~ a 1.0.0 -> 2.0.0"]);
    assert!(plan.future_state().contains(&x));
}

#[test]
fn roots_needed_by_the_removed_closure_stay() {
    let tool = comp("tool", "1.0");
    let app = builder("app", "1.0").requires_component("tool", range("1.0")).build();
    let app2 = comp("app", "2.0");
    let profile = Profile::new("p")
        .with_installed([app.clone(), tool.clone()])
        .with_root(app.key(), true)
        .with_root(tool.key(), true);
    let mut request = provis_common::ProfileChangeRequest::new("p");
    request.remove(app);
    request.add(app2);

    let plan = planner().get_provisioning_plan(&request, &profile, &catalog(&[]), &CancellationToken::new());

    assert!(plan.is_success(), "{}", plan.status().flatten());
    assert_eq!(render(&plan), vec!["~ app 1.0.0 -> 2.0.0"]);
    assert!(plan.future_state().contains(&tool));
}

#[test]
fn uninstall_is_refused_while_an_unmarked_component_needs_the_root() {
    let a = comp("a", "1.0");
    let b = comp("b", "1.0");
    let x = builder("x", "1.0").requires_component("b", range("1.0")).build();
    let profile = Profile::new("p")
        .with_installed([a.clone(), b.clone(), x])
        .with_root(a.key(), true)
        .with_root(b.key(), true);

    let plan = planner().get_uninstall_plan(&[b.clone()], &profile, &CancellationToken::new());

    assert!(plan.status().is_error());
    let detail = ResolutionResult::from_plan(&plan).detail_for(b.key()).unwrap();
    assert!(detail.contains("still required by x 1.0.0"), "{detail}");
}

#[test]
fn large_products_plan_every_bundle_before_the_product() {
    let bundles: Vec<Arc<Component>> = (0..5_000)
        .map(|i| comp(&format!("bundle{i:05}"), "1.0"))
        .collect();
    let product = bundles
        .iter()
        .fold(builder("product", "1.0"), |b, bundle| {
            b.requires_component(bundle.id(), range("1.0"))
        })
        .build();
    let mut everything = bundles;
    everything.push(product.clone());

    let plan = planner().get_install_plan(
        &[product],
        &Profile::new("p"),
        &catalog(&everything),
        &CancellationToken::new(),
    );

    assert!(plan.is_success(), "{}", plan.status().flatten());
    let rendered = render(&plan);
    assert_eq!(rendered.len(), 5_001);
    assert_eq!(rendered.last().map(String::as_str), Some("+ product 1.0.0"));
}

#[test]
fn extra_requirements_and_properties_flow_into_the_plan() {
    let a = comp("a", "1.0");
    let helper1 = comp("helper", "1.0");
    let helper2 = comp("helper", "2.0");
    let profile = Profile::new("p")
        .with_installed([a.clone()])
        .with_property("old", "x");
    let mut request = provis_common::ProfileChangeRequest::new("p");
    request.add_extra_requirement(Requirement::one_of([helper1.key().clone()]));
    request.set_profile_property("mode", "fast");
    request.remove_profile_property("old");
    request.set_component_property(a.key(), "note", "kept");

    let plan = planner().get_provisioning_plan(
        &request,
        &profile,
        &catalog(&[helper1, helper2]),
        &CancellationToken::new(),
    );

    assert!(plan.is_success(), "{}", plan.status().flatten());
    assert_eq!(render(&plan), vec!["+ helper 1.0.0"]);
    let props: Vec<String> = plan.property_operands().iter().map(|p| p.to_string()).collect();
    assert_eq!(
        props,
        vec![
            "* mode: <unset> -> fast",
            "* old: x -> <unset>",
            "* [a 1.0.0] note: <unset> -> kept",
        ]
    );
}

#[test]
fn invalid_options_fail_fast() {
    assert!(Planner::new(PlannerOptions { max_search_steps: 0 }).is_err());
}

#[test]
fn plans_report_failures_without_operands() {
    let a = builder("a", "1.0").requires_component("missing", range("1.0")).build();
    let plan = planner().get_install_plan(
        &[a.clone()],
        &Profile::new("p"),
        &catalog(&[a.clone()]),
        &CancellationToken::new(),
    );
    assert!(plan.status().is_error());
    assert!(plan.operands().is_empty());
    let summary = ResolutionResult::from_plan(&plan).summary();
    assert!(summary.starts_with("ERROR: Cannot complete the request\n"), "{summary}");
    assert!(summary.contains("provis.component/missing"), "{summary}");
}
