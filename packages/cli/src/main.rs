mod commands;
mod config;

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use commands::{init, replay, InitArgs, ReplayArgs};
use tracing_subscriber::EnvFilter;

/// Gridline CLI - replay row editing sessions against a grid fixture
#[derive(Parser, Debug)]
#[command(name = "gridline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an example grid fixture
    Init(InitArgs),

    /// Replay a fixture's script and print the resulting rows
    Replay(ReplayArgs),
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match std::env::current_dir() {
        Ok(cwd) => {
            let cwd = cwd.display().to_string();
            match cli.command {
                Command::Init(args) => init(args, &cwd),
                Command::Replay(args) => replay(args, &cwd).await,
            }
        }
        Err(err) => Err(anyhow::anyhow!("Cannot get current directory: {}", err)),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
