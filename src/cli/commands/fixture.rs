use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_details;
use crate::cli::OutputFormat;
use crate::database::{MemoryStore, Table};

#[derive(Subcommand)]
pub enum FixtureCommands {
    #[command(about = "Load a YAML seed file into a scratch store and report row counts")]
    Check {
        #[arg(help = "Seed file path")]
        path: PathBuf,
    },
}

pub async fn handle(cmd: FixtureCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        FixtureCommands::Check { path } => {
            // Loading runs the same column and foreign-key checks the server applies.
            let store = MemoryStore::from_yaml_file(&path).await?;

            let mut counts = BTreeMap::new();
            for table in Table::ALL {
                counts.insert(table.name(), store.len(table).await);
            }

            output_details(
                &output_format,
                &format!("Fixture {} is valid", path.display()),
                json!(counts),
            )
        }
    }
}
