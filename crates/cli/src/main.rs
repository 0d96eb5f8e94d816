//! Sweep CLI - sweep command

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;

use cli_lib::config::SweepConfig;
use cli_lib::report;

/// Sweep - declarative retention sweeper for local, distributed-filesystem,
/// warehouse and column-family storage
#[derive(Parser)]
#[command(name = "sweep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file describing the backends to sweep
    #[arg(short, long, global = true, default_value = "sweep.toml")]
    config: PathBuf,

    /// Override the destructive-action log prefix
    #[arg(long, global = true)]
    action_prefix: Option<String>,

    /// Write daily-rotated logs to this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the retention policy and delete expired data
    Run,
    /// Log what would be deleted without deleting anything
    Preview,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The appender guard must outlive the run so buffered lines flush
    let _guard = init_tracing(cli.log_dir.as_deref());

    match execute(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sweep.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt::init();
            None
        }
    }
}

fn execute(cli: &Cli) -> Result<bool> {
    let mut config = SweepConfig::load(&cli.config)?;
    tracing::info!("loaded configuration from {}", cli.config.display());
    if let Some(prefix) = &cli.action_prefix {
        config.action_prefix = Some(prefix.clone());
    }
    let runner = config.into_runner()?;

    let report = match &cli.command {
        Commands::Run => runner.run(),
        Commands::Preview => runner.preview(),
    };

    report::print_report(&report);
    Ok(report.all_succeeded())
}
