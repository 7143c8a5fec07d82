use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ebb::ContextEngine;
use ebb::config::Config;
use ebb::session::SessionId;
use ebb_cli::commands::{
    ConfigCommand, MemoryCommand, PressureCommand, PruneCommand, SessionCommand,
};
use ebb_cli::error::CliResult;
use ebb_cli::output::OutputFormat;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ebb")]
#[command(about = "ebb - Inspect and drive agent working memory and context pressure")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'd', global = true, help = "Path to data directory")]
    pub data_dir: Option<PathBuf>,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(
        long,
        short,
        global = true,
        default_value = "default",
        help = "Session to operate on"
    )]
    pub session: String,

    #[clap(long, short, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Working memory commands")]
    Memory(MemoryCommand),

    #[clap(about = "Context pressure commands")]
    Pressure(PressureCommand),

    #[clap(about = "Prune tool output read from stdin")]
    Prune(PruneCommand),

    #[clap(about = "Session lifecycle commands")]
    Session(SessionCommand),

    #[clap(about = "Configuration commands")]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }

    if let Command::Config(cmd) = &cli.command {
        return cmd.execute(&config, format);
    }

    let session: SessionId = cli.session.parse()?;
    tracing::debug!(
        session = %session,
        data_dir = %config.storage.data_dir.display(),
        "Opening engine"
    );
    let engine = ContextEngine::open(&config).await?;

    match &cli.command {
        Command::Memory(cmd) => cmd.execute(&engine, &session, format).await,
        Command::Pressure(cmd) => cmd.execute(&engine, &session, format).await,
        Command::Prune(cmd) => cmd.execute(&engine, &session, format).await,
        Command::Session(cmd) => cmd.execute(&engine, &session, format).await,
        Command::Config(cmd) => cmd.execute(&config, format),
    }
}

/// Logs go to stderr so stdout stays clean for command output
fn init_logging(verbose: bool) {
    let default = if verbose { "info,ebb=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
