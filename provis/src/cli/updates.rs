// provis/src/cli/updates.rs
use clap::Args;
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};
use provis_common::config::Config;
use provis_common::error::Result;

use crate::cli::session::Session;

#[derive(Args, Debug)]
pub struct Updates {
    /// Installed components to check; all roots when omitted
    pub components: Vec<String>,
}

impl Updates {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let session = Session::open(config)?;
        let targets = if self.components.is_empty() {
            session.profile.roots()
        } else {
            self.components
                .iter()
                .map(|spec| session.installed(spec))
                .collect::<Result<Vec<_>>>()?
        };

        let found = session
            .plan(move |planner, catalog, _, cancel| {
                targets
                    .into_iter()
                    .map(|target| {
                        let updates = planner.updates_for(&target, catalog, cancel);
                        (target, updates)
                    })
                    .filter(|(_, updates)| !updates.is_empty())
                    .collect::<Vec<_>>()
            })
            .await?;

        if found.is_empty() {
            println!("{}", "No updates available".green());
            return Ok(());
        }
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("Id").style_spec("b"),
            Cell::new("Installed").style_spec("b"),
            Cell::new("Available").style_spec("b"),
        ]));
        for (installed, updates) in &found {
            let versions: Vec<String> = updates.iter().map(|u| u.version().to_string()).collect();
            table.add_row(Row::new(vec![
                Cell::new(installed.id()).style_spec("Fb"),
                Cell::new(&installed.version().to_string()),
                Cell::new(&versions.join(", ")).style_spec("Fg"),
            ]));
        }
        table.printstd();
        Ok(())
    }
}
