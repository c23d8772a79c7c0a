#![deny(
    warnings,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result};
use clap::Parser;
use setbook::storage::{self, StorageUrl};
use setbook::{WorkoutStore, cli, server::ApiServer, utils};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    utils::init_logging(cli.verbose, cli.quiet);

    let url: StorageUrl = cli.database_url.parse()?;

    match cli.cmd {
        Some(cli::Cmd::Migrate) => storage::migrate(&url),
        Some(cli::Cmd::Show { id }) => {
            let mut store = storage::connect(&url)?;
            let workout = store
                .get_workout_by_id(id)
                .with_context(|| format!("Loading workout {id}"))?;
            println!("{}", serde_json::to_string_pretty(&workout)?);
            Ok(())
        }
        None => {
            storage::migrate(&url)?;

            let addr = format!("{}:{}", cli.host, cli.port);
            let server = ApiServer::bind(&addr)?;
            tracing::info!(%addr, db = %url, "starting workout API");

            server.run(usize::from(cli.workers), move || storage::connect(&url))
        }
    }
}
