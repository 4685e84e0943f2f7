// provis/src/cli/timestamps.rs
use std::time::{Duration, UNIX_EPOCH};

use clap::Args;
use colored::Colorize;
use provis_common::config::Config;
use provis_common::error::Result;

use crate::cli::session::Session;

#[derive(Args, Debug)]
pub struct Timestamps {}

impl Timestamps {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let session = Session::open(config)?;
        let timestamps = session.registry.timestamps(&session.profile_id)?;
        if timestamps.is_empty() {
            println!("{}", "No revisions recorded".yellow());
            return Ok(());
        }
        let current = session.profile.timestamp();
        for timestamp in timestamps {
            let line = format!("{timestamp}  {}", format_millis(timestamp));
            if timestamp == current {
                println!("{} {}", line.bold(), "(current)".green());
            } else {
                println!("{line}");
            }
        }
        Ok(())
    }
}

pub fn format_millis(millis: u64) -> String {
    humantime::format_rfc3339_millis(UNIX_EPOCH + Duration::from_millis(millis)).to_string()
}
