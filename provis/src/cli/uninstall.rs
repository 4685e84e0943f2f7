// provis/src/cli/uninstall.rs
use clap::Args;
use provis_common::config::Config;
use provis_common::error::Result;

use crate::cli::render::print_plan;
use crate::cli::session::Session;

#[derive(Args, Debug)]
pub struct Uninstall {
    /// Installed components to remove, as `id` or `id@version`
    #[arg(required = true)]
    pub components: Vec<String>,
}

impl Uninstall {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let session = Session::open(config)?;
        let roots = self
            .components
            .iter()
            .map(|spec| session.installed(spec))
            .collect::<Result<Vec<_>>>()?;
        let plan = session
            .plan(move |planner, _, profile, cancel| {
                planner.get_uninstall_plan(&roots, profile, cancel)
            })
            .await?;
        print_plan(&plan);
        Ok(())
    }
}
