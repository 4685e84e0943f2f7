// provis/src/cli/replace.rs
use clap::Args;
use provis_common::config::Config;
use provis_common::error::Result;

use crate::cli::render::print_plan;
use crate::cli::session::Session;

#[derive(Args, Debug)]
pub struct Replace {
    /// Installed components to remove
    #[arg(long = "remove", value_name = "COMPONENT")]
    pub to_uninstall: Vec<String>,

    /// Components to install in their place
    #[arg(long = "add", value_name = "COMPONENT", required = true)]
    pub to_install: Vec<String>,
}

impl Replace {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let session = Session::open(config)?;
        let to_uninstall = self
            .to_uninstall
            .iter()
            .map(|spec| session.installed(spec))
            .collect::<Result<Vec<_>>>()?;
        let to_install = self
            .to_install
            .iter()
            .map(|spec| session.available(spec))
            .collect::<Result<Vec<_>>>()?;
        let plan = session
            .plan(move |planner, catalog, profile, cancel| {
                planner.get_replace_plan(&to_uninstall, &to_install, profile, catalog, cancel)
            })
            .await?;
        print_plan(&plan);
        Ok(())
    }
}
