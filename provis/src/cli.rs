// provis/src/cli.rs
//! Defines the command-line argument structure using clap.
use clap::{ArgAction, Parser, Subcommand};
use provis_common::config::Config;
use provis_common::error::Result;

pub mod install;
pub mod list;
pub mod render;
pub mod replace;
pub mod revert;
pub mod session;
pub mod timestamps;
pub mod uninstall;
pub mod updates;

use crate::cli::install::Install;
use crate::cli::list::List;
use crate::cli::replace::Replace;
use crate::cli::revert::Revert;
use crate::cli::timestamps::Timestamps;
use crate::cli::uninstall::Uninstall;
use crate::cli::updates::Updates;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "provis", bin_name = "provis")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Every command only plans. Nothing is ever applied to a profile.
#[derive(Subcommand, Debug)]
pub enum Command {
    Install(Install),
    Uninstall(Uninstall),
    Replace(Replace),
    List(List),
    Timestamps(Timestamps),
    Revert(Revert),
    Updates(Updates),
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Install(command) => command.run(config).await,
            Self::Uninstall(command) => command.run(config).await,
            Self::Replace(command) => command.run(config).await,
            Self::List(command) => command.run(config).await,
            Self::Timestamps(command) => command.run(config).await,
            Self::Revert(command) => command.run(config).await,
            Self::Updates(command) => command.run(config).await,
        }
    }
}
