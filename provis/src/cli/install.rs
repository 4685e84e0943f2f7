// provis/src/cli/install.rs
use clap::Args;
use colored::Colorize;
use provis_common::config::Config;
use provis_common::error::Result;
use provis_core::{FlexFlags, RequestFlexer};
use tracing::debug;

use crate::cli::render::print_plan;
use crate::cli::session::Session;

#[derive(Args, Debug)]
pub struct Install {
    /// Components to install, as `id` (newest in the catalog) or `id@version`
    #[arg(required = true)]
    pub components: Vec<String>,

    /// When the request cannot be satisfied, retry it with other versions and
    /// updates of the requested components
    #[arg(long)]
    pub flex: bool,

    /// With --flex, also allow leaving out requested components
    #[arg(long, requires = "flex")]
    pub partial: bool,

    /// With --flex, also allow updating or removing installed roots
    #[arg(long, requires = "flex")]
    pub change_installed: bool,
}

impl Install {
    fn flex_flags(&self) -> FlexFlags {
        let mut flags = FlexFlags::empty();
        if self.flex {
            flags |= FlexFlags::VERSION | FlexFlags::UPDATES;
        }
        if self.partial {
            flags |= FlexFlags::PARTIAL_INSTALL;
        }
        if self.change_installed {
            flags |= FlexFlags::INSTALLED_CHANGE | FlexFlags::INSTALLED_REMOVAL;
        }
        flags
    }

    pub async fn run(&self, config: &Config) -> Result<()> {
        let session = Session::open(config)?;
        let roots = self
            .components
            .iter()
            .map(|spec| session.available(spec))
            .collect::<Result<Vec<_>>>()?;
        let flags = self.flex_flags();

        let (plan, flexed) = session
            .plan(move |planner, catalog, profile, cancel| {
                let plan = planner.get_install_plan(&roots, profile, catalog, cancel);
                if !plan.status().is_error() || flags.is_empty() {
                    return (plan, false);
                }
                debug!("Install plan failed, retrying with {:?}", flags);
                let flexer = RequestFlexer::new(planner, flags);
                match flexer.get_changed_request(plan.request(), profile, catalog, cancel) {
                    Some(changed) => (
                        planner.get_provisioning_plan(&changed, profile, catalog, cancel),
                        true,
                    ),
                    None => (plan, false),
                }
            })
            .await?;

        if flexed {
            println!("{}", "The request was changed to find a feasible plan:".yellow());
        }
        print_plan(&plan);
        Ok(())
    }
}
