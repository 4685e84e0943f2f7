// provis/src/cli/list.rs
use clap::Args;
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};
use provis_common::config::Config;
use provis_common::error::Result;
use provis_common::model::component::PROP_PRODUCT;
use provis_common::model::profile::PROP_INCLUSION_RULES;
use provis_common::query::{component, Query, Queryable};
use provis_common::CancellationToken;

use crate::cli::session::Session;

#[derive(Args, Debug)]
pub struct List {
    /// List catalog components instead of the installed ones
    #[arg(long)]
    pub catalog: bool,

    /// With --catalog, show every version, not just the newest per id
    #[arg(long, requires = "catalog")]
    pub all: bool,
}

impl List {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let session = Session::open(config)?;
        if self.catalog {
            self.list_catalog(&session);
        } else {
            list_installed(&session);
        }
        Ok(())
    }

    fn list_catalog(&self, session: &Session) {
        let query = if self.all {
            component::all()
        } else {
            Query::pipe(vec![component::all(), component::latest()])
        };
        let components = session.catalog.query(&query, &CancellationToken::new());
        if components.is_empty() {
            println!("{}", "The catalog is empty".yellow());
            return;
        }
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("Id").style_spec("b"),
            Cell::new("Version").style_spec("b"),
            Cell::new("Product").style_spec("b"),
            Cell::new("Installed").style_spec("b"),
        ]));
        for c in &components {
            table.add_row(Row::new(vec![
                Cell::new(c.id()).style_spec("Fb"),
                Cell::new(&c.version().to_string()),
                Cell::new(if c.has_flag(PROP_PRODUCT) { "✔" } else { "" }),
                Cell::new(if session.profile.is_installed(c.key()) { "✔" } else { "" }),
            ]));
        }
        table.printstd();
        println!("{}", format!("{} catalog components", components.len()).bold());
    }
}

fn list_installed(session: &Session) {
    let profile = &session.profile;
    if profile.installed().is_empty() {
        println!(
            "{}",
            format!("0 components installed in profile '{}'", profile.id()).yellow()
        );
        return;
    }
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.add_row(Row::new(vec![
        Cell::new("Id").style_spec("b"),
        Cell::new("Version").style_spec("b"),
        Cell::new("Root").style_spec("b"),
        Cell::new("Inclusion").style_spec("b"),
    ]));
    for c in profile.installed() {
        let root = profile.is_root(c.key());
        let inclusion = if root {
            profile
                .component_property(c.key(), PROP_INCLUSION_RULES)
                .unwrap_or("STRICT")
        } else {
            ""
        };
        table.add_row(Row::new(vec![
            Cell::new(c.id()).style_spec("Fb"),
            Cell::new(&c.version().to_string()),
            Cell::new(if root { "✔" } else { "" }),
            Cell::new(inclusion),
        ]));
    }
    table.printstd();
    println!(
        "{}",
        format!(
            "{} components installed in profile '{}'",
            profile.installed().len(),
            profile.id()
        )
        .bold()
    );
}
