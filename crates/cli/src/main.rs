#![forbid(unsafe_code)]

//! `chorectl`: command line front end for the chore engine. Every command
//! prints one JSON envelope on stdout; logs go to stderr.

mod commands;
mod config;
mod support;

use cb_storage::{SqliteStore, StoreError};
use clap::Parser;
use config::Cli;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "cb_storage=info";

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    let pretty = cli.pretty;
    let clock = support::CommandClock::new(cli.now_ms);
    let now_ms = clock.now_ms;

    let outcome = SqliteStore::open_with(&cli.storage_dir, cli.store_config())
        .map_err(anyhow::Error::from)
        .and_then(|mut store| {
            debug!(storage_dir = %store.storage_dir().display(), now_ms, "store open");
            commands::execute(&mut store, cli.command, now_ms)
        });

    let (envelope, code) = match outcome {
        Ok((intent, result)) => (support::ok(intent, &clock.rfc3339(), result), ExitCode::SUCCESS),
        Err(err) => match err.downcast_ref::<StoreError>() {
            Some(store_err) if store_err.is_expected() => {
                (support::store_error(store_err), ExitCode::from(1))
            }
            Some(store_err) => {
                error!(error = %store_err, code = store_err.code(), "store failure");
                (support::store_error(store_err), ExitCode::from(2))
            }
            None => {
                error!(error = %err, "command failed");
                (
                    support::error_with("INTERNAL", &err.to_string(), None),
                    ExitCode::from(2),
                )
            }
        },
    };

    println!("{}", support::render(&envelope, pretty));
    Ok(code)
}

fn init_tracing(directive: Option<&str>) {
    let filter = match directive {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
