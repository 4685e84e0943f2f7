// provis/src/cli/revert.rs
use std::time::UNIX_EPOCH;

use clap::Args;
use colored::Colorize;
use provis_common::config::Config;
use provis_common::error::{ProvisError, Result};

use crate::cli::render::print_plan;
use crate::cli::session::Session;
use crate::cli::timestamps::format_millis;

#[derive(Args, Debug)]
pub struct Revert {
    /// Revision to go back to, as milliseconds since the epoch (see
    /// `provis timestamps`) or an RFC 3339 time
    pub timestamp: String,
}

impl Revert {
    fn parse_timestamp(&self) -> Result<u64> {
        if let Ok(millis) = self.timestamp.parse::<u64>() {
            return Ok(millis);
        }
        let time = humantime::parse_rfc3339_weak(&self.timestamp).map_err(|e| {
            ProvisError::ParseError("timestamp", format!("'{}': {e}", self.timestamp))
        })?;
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ProvisError::ParseError("timestamp", e.to_string()))?;
        Ok(since_epoch.as_millis() as u64)
    }

    pub async fn run(&self, config: &Config) -> Result<()> {
        let session = Session::open(config)?;
        let timestamp = self.parse_timestamp()?;
        let revision = session
            .registry
            .profile_at(&session.profile_id, timestamp)?
            .clone();
        println!(
            "{}",
            format!("Reverting to revision {}", format_millis(revision.timestamp())).bold()
        );
        let plan = session
            .plan(move |planner, catalog, profile, cancel| {
                planner.get_revert_plan(&revision, profile, catalog, cancel)
            })
            .await?;
        print_plan(&plan);
        Ok(())
    }
}
