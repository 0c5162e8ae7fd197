//! strata — drive the placement scheduler from the command line.
//!
//! # Usage
//!
//! ```text
//! strata place --cluster cluster.toml --request request.json
//! strata init-config --path strata.toml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use strata_core::StrataConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Strata — topology-aware volume placement",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to strata.toml (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Place one volume on a simulated cluster and print the outcome.
    ///
    /// The cluster file lists `[[nodes]]` with a name, optional capacity,
    /// online flag and `[nodes.properties]`. The request file is JSON with
    /// `volume`, `parameters` and `topology` (`preferred` / `requisite`).
    Place {
        /// Cluster description (TOML)
        #[arg(long)]
        cluster: PathBuf,
        /// Placement request (JSON)
        #[arg(long)]
        request: PathBuf,
    },
    /// Write a strata.toml scaffold
    InitConfig {
        #[arg(short, long, default_value = "strata.toml")]
        path: PathBuf,
    },
}

fn init_tracing(filter: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => StrataConfig::from_file(path)?,
        None => StrataConfig::default(),
    };
    init_tracing(&config.log.filter, cli.json)?;

    match cli.command {
        Commands::Place { cluster, request } => {
            let placed = commands::place::run(&config, &cluster, &request).await?;
            Ok(if placed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::InitConfig { path } => {
            commands::init::init_config(&path)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
