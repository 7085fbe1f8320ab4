//! `nsend`: reference notification sender exercised by the scenario tests.
//! Mirrors the notify-send flag surface and talks to a notimock broker over
//! `NOTIMOCK_BUS_ADDRESS`, speaking either the direct daemon protocol or
//! the sandbox portal protocol.

mod cli;
mod direct;
mod portal;
mod request;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use notimock_bus::{BUS_ADDRESS_ENV, BusClient};

use crate::cli::Cli;
use crate::request::Request;

/// Backend selection, sandbox-aware clients first check the portal.
const IGNORE_PORTAL_ENV: &str = "NOTIFY_IGNORE_PORTAL";
const FORCE_PORTAL_ENV: &str = "NOTIFY_FORCE_PORTAL";

#[tokio::main]
async fn main() {
    // stdout is reserved for --print-id output; everything else is stderr.
    let filter = EnvFilter::try_from_env("NOTIMOCK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    std::process::exit(run().await);
}

async fn run() -> i32 {
    let cli = Cli::parse();
    let request = match Request::from_cli(cli) {
        Ok(request) => request,
        Err(message) => {
            eprintln!("{message}");
            return 1;
        }
    };

    match dispatch(request).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            1
        }
    }
}

async fn dispatch(request: Request) -> Result<i32> {
    let address = std::env::var(BUS_ADDRESS_ENV)
        .with_context(|| format!("{BUS_ADDRESS_ENV} is not set"))?;
    let client = BusClient::connect(&address)
        .await
        .with_context(|| format!("failed to connect to bus at {address}"))?;

    if use_portal() {
        tracing::debug!("sending through the notification portal");
        portal::run(client, request).await
    } else {
        tracing::debug!("sending through the direct notifications service");
        direct::run(client, request).await
    }
}

fn use_portal() -> bool {
    if std::env::var_os(IGNORE_PORTAL_ENV).is_some() {
        return false;
    }
    std::env::var_os(FORCE_PORTAL_ENV).is_some()
}
