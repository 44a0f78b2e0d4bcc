use autotrust::autotrust::{TrustPoint, TrustPointStatus, unix_now};
use autotrust::dnssec::RingVerifier;
use autotrust::{AutotrustConfig, TrustAnchorStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// RFC 5011 trust anchor file maintenance
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load anchor files and print the state of their keys
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the state of the configured trust points
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Load an anchor file and write it back in canonical form
    Rewrite { file: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AutotrustConfig::from_file(path),
        None => AutotrustConfig::from_env().and_then(|c| c.validate().map(|_| c)),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let now = unix_now();
    let store = TrustAnchorStore::new(config, Arc::new(RingVerifier::new()));

    match args.command {
        Command::Check { files } => {
            let mut failed = false;
            for file in &files {
                match store.load_file(file, now) {
                    Ok(point) => print_table(&point.status()),
                    Err(e) => {
                        error!("{}: {}", file.display(), e);
                        failed = true;
                    }
                }
            }
            if failed {
                return ExitCode::FAILURE;
            }
        }
        Command::Status { json } => {
            store.load_configured(now);
            let statuses: Vec<TrustPointStatus> =
                store.trust_points().iter().map(|p| p.status()).collect();
            if json {
                match serde_json::to_string_pretty(&statuses) {
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        error!("Failed to encode status: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                statuses.iter().for_each(print_table);
            }
        }
        Command::Rewrite { file } => {
            let result = store
                .load_file(&file, now)
                .and_then(|point| rewrite(&point));
            if let Err(e) = result {
                error!("{}: {}", file.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn rewrite(point: &TrustPoint) -> autotrust::Result<()> {
    autotrust::autotrust::file::save(point)
}

fn print_table(status: &TrustPointStatus) {
    println!(
        "{} {}  valid={} missing={} failed={} next_probe={}{}",
        status.zone,
        status.class,
        status.valid,
        status.missing,
        status.query_failed,
        status.next_probe_time,
        if status.degraded { "  DEGRADED" } else { "" }
    );
    println!("  {:>6}  {:<6}  {:<11}  {:>5}  {}", "TAG", "TYPE", "STATE", "COUNT", "LAST CHANGE");
    for key in &status.keys {
        println!(
            "  {:>6}  {:<6}  {:<11}  {:>5}  {}",
            key.key_tag,
            format!("{:?}", key.rtype),
            key.state.to_string(),
            key.pending_count,
            key.last_change
        );
    }
}
