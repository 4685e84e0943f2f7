// provis-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use directories::UserDirs;
use tracing::debug;

use super::error::{ProvisError, Result};
use super::model::profile::SELF_PROFILE;

const DEFAULT_ROOT_DIRNAME: &str = ".provis";
const DEFAULT_CATALOG_FILENAME: &str = "catalog.json";
const DEFAULT_PROFILES_FILENAME: &str = "profiles.json";
pub const DEFAULT_MAX_SEARCH_STEPS: u64 = 100_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub provis_root: PathBuf,
    pub catalog_path: PathBuf,
    pub profiles_path: PathBuf,
    pub profile_id: String,
    /// Upper bound on resolver branch attempts before giving up.
    pub max_search_steps: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading provis configuration");

        let provis_root = match env::var("PROVIS_ROOT").ok().filter(|s| !s.is_empty()) {
            Some(root) => PathBuf::from(root),
            None => {
                let home = UserDirs::new()
                    .map(|dirs| dirs.home_dir().to_path_buf())
                    .ok_or_else(|| {
                        ProvisError::Config(
                            "PROVIS_ROOT is not set and no home directory was found".to_string(),
                        )
                    })?;
                debug!("PROVIS_ROOT not set, falling back to ~/{DEFAULT_ROOT_DIRNAME}");
                home.join(DEFAULT_ROOT_DIRNAME)
            }
        };
        debug!("Effective PROVIS_ROOT set to: {}", provis_root.display());

        let catalog_path = env_path("PROVIS_CATALOG")
            .unwrap_or_else(|| provis_root.join(DEFAULT_CATALOG_FILENAME));
        let profiles_path = env_path("PROVIS_PROFILES")
            .unwrap_or_else(|| provis_root.join(DEFAULT_PROFILES_FILENAME));
        let profile_id = env::var("PROVIS_PROFILE")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| SELF_PROFILE.to_string());

        let max_search_steps = match env::var("PROVIS_MAX_SEARCH_STEPS") {
            Ok(raw) if !raw.is_empty() => raw.trim().parse::<u64>().map_err(|e| {
                ProvisError::Config(format!("PROVIS_MAX_SEARCH_STEPS '{raw}': {e}"))
            })?,
            _ => DEFAULT_MAX_SEARCH_STEPS,
        };
        if max_search_steps == 0 {
            return Err(ProvisError::Config(
                "PROVIS_MAX_SEARCH_STEPS must be greater than zero".to_string(),
            ));
        }

        debug!("Configuration loaded successfully.");
        Ok(Self {
            provis_root,
            catalog_path,
            profiles_path,
            profile_id,
            max_search_steps,
        })
    }

    /// Configuration rooted at `root` with default file names.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let provis_root = root.into();
        Self {
            catalog_path: provis_root.join(DEFAULT_CATALOG_FILENAME),
            profiles_path: provis_root.join(DEFAULT_PROFILES_FILENAME),
            provis_root,
            profile_id: SELF_PROFILE.to_string(),
            max_search_steps: DEFAULT_MAX_SEARCH_STEPS,
        }
    }

    pub fn provis_root(&self) -> &Path {
        &self.provis_root
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    pub fn profiles_path(&self) -> &Path {
        &self.profiles_path
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.provis_root.join("logs")
    }
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var(var).ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}
