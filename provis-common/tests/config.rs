use std::env;

use provis_common::config::DEFAULT_MAX_SEARCH_STEPS;
use provis_common::{Config, ProvisError};

// Environment variables are process-wide, so every case runs inside one test.
#[test]
fn config_reads_environment() {
    let dir = tempfile::tempdir().unwrap();
    for var in [
        "PROVIS_CATALOG",
        "PROVIS_PROFILES",
        "PROVIS_PROFILE",
        "PROVIS_MAX_SEARCH_STEPS",
    ] {
        env::remove_var(var);
    }
    env::set_var("PROVIS_ROOT", dir.path());

    let config = Config::load().unwrap();
    assert_eq!(config.provis_root(), dir.path());
    assert_eq!(config.catalog_path(), dir.path().join("catalog.json"));
    assert_eq!(config.profiles_path(), dir.path().join("profiles.json"));
    assert_eq!(config.profile_id, "_SELF_");
    assert_eq!(config.max_search_steps, DEFAULT_MAX_SEARCH_STEPS);
    assert_eq!(config.logs_dir(), dir.path().join("logs"));

    let custom = dir.path().join("elsewhere.json");
    env::set_var("PROVIS_CATALOG", &custom);
    env::set_var("PROVIS_PROFILE", "staging");
    env::set_var("PROVIS_MAX_SEARCH_STEPS", "42");
    let config = Config::load().unwrap();
    assert_eq!(config.catalog_path(), custom.as_path());
    assert_eq!(config.profile_id, "staging");
    assert_eq!(config.max_search_steps, 42);

    env::set_var("PROVIS_MAX_SEARCH_STEPS", "lots");
    assert!(matches!(Config::load(), Err(ProvisError::Config(_))));
    env::set_var("PROVIS_MAX_SEARCH_STEPS", "0");
    assert!(matches!(Config::load(), Err(ProvisError::Config(_))));
}
