mod cmd;
mod output;

use clap::{Parser, Subcommand};
use filelauncher_core::config::DEFAULT_CONFIG_FILE;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "filelauncher",
    about = "Scan directory trees and run each rule's action on files changed since that rule last ran",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to the config file
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "FILELAUNCHER_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pass over every rule (default)
    Scan {
        /// Only run the named rule (repeatable)
        #[arg(long = "rule", value_name = "NAME")]
        rules: Vec<String>,

        /// Ignore recorded state and skip writing history
        #[arg(long)]
        no_history: bool,
    },

    /// Validate the config and report every finding
    Check,
}

fn main() {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Scan {
        rules: Vec::new(),
        no_history: false,
    });

    let default_level = match &command {
        Commands::Scan { .. } => tracing::Level::INFO,
        Commands::Check => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match command {
        Commands::Scan { rules, no_history } => {
            cmd::scan::run(&cli.config, &rules, no_history, cli.json)
        }
        Commands::Check => cmd::check::run(&cli.config, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
