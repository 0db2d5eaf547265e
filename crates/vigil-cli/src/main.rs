mod cmd_config;
mod cmd_history;
mod cmd_init;
mod cmd_run;
mod cmd_status;
mod config;

use clap::{Parser, Subcommand};
use vigil_ledger::VigilPaths;

#[derive(Parser)]
#[command(
    name = "vigil",
    version,
    about = "Periodic status aggregation and dashboard for tracked components"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new .vigil/ workspace
    Init,
    /// Execute one run: fetch, aggregate, render, persist
    Run,
    /// Show the latest run from the ledger
    Status,
    /// List recorded runs
    History {
        /// Only runs generated at or after this RFC 3339 timestamp
        #[arg(long)]
        since: Option<String>,
        /// Output as JSON lines (one run per line)
        #[arg(long)]
        json: bool,
    },
    /// Read or write workspace config (.vigil/config.json)
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let repo_root = VigilPaths::find_root(&cwd).unwrap_or(cwd);

    match cli.cmd {
        Command::Init => cmd_init::execute(&repo_root),
        Command::Run => cmd_run::execute(&repo_root),
        Command::Status => cmd_status::execute(&repo_root),
        Command::History { since, json } => {
            cmd_history::execute(&repo_root, since.as_deref(), json)
        }
        Command::Config { cmd } => cmd_config::run(cmd, &repo_root),
    }
}
