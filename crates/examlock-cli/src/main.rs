use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "examlock-cli", version, about = "Exam Lock CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Drive a monitored page through a scripted sequence of signals
    Simulate(commands::simulate::SimulateArgs),
    /// Show the stored penalty record
    Status(commands::status::StatusArgs),
    /// Violation log
    Log {
        #[command(subcommand)]
        action: commands::log::LogAction,
    },
    /// Wipe all stored penalty state and the violation log
    Clear,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("EXAMLOCK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Config { action } => commands::config::run(action),
        Commands::Simulate(args) => commands::simulate::run(args),
        Commands::Status(args) => commands::status::run(args),
        Commands::Log { action } => commands::log::run(action),
        Commands::Clear => commands::clear::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
