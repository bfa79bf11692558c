use crate::commands::{run_assignment, run_settings, RunArgs, SettingsCommand};
use crate::server;
use auto_priority::error::AppError;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "auto-priority",
    about = "Assign work priorities to the best-suited workers at every site",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run one supervised assignment over a CSV roster and print the result
    Run(RunArgs),
    /// Inspect or edit the persisted work settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// CSV roster to load at startup (starts empty when omitted)
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Run(args) => run_assignment(args),
        Command::Settings { command } => run_settings(command),
    }
}
