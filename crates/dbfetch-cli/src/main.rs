#![forbid(unsafe_code)]

mod commands;
mod console;

use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use crate::commands::{DbList, DbSync};

/// Find and fetch database backups kept in S3 under `YYYY-MM-DD/` folders.
#[derive(Parser, Debug)]
#[command(about, version)]
struct Cli {
    /// Log more, repeat for debug output. `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List buckets, or the backups in a bucket.
    DbList(DbList),
    /// Pick a backup from the newest date folders and download it.
    DbSync(DbSync),
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::DbList(args) => args.run().await,
        Command::DbSync(args) => args.run().await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(?err, "command failed");
            console::report_error(&err);
            ExitCode::FAILURE
        }
    }
}
