mod acceptance;
mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use droplet_lifecycle::digitalocean::DigitalOceanClient;
use droplet_lifecycle::{
    CanonicalState, DesiredSpec, LifecycleConfig, LifecycleManager, ReadOutcome,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

#[derive(Debug, thiserror::Error)]
pub enum CtlError {
    #[error(transparent)]
    Lifecycle(#[from] droplet_lifecycle::Error),

    #[error("digitalocean api error: {0}")]
    Api(#[from] do_api::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("droplet {0} not found")]
    NotFound(String),

    #[error("acceptance check failed: {0}")]
    Check(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays parseable JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CtlError> {
    let client = Arc::new(DigitalOceanClient::from_env()?);
    let config = LifecycleConfig::from_env()?;

    // Ctrl-C aborts whatever poll is in flight
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let lifecycle = LifecycleManager::new(client.clone(), config).with_cancellation(cancel);

    match cli.command {
        Command::Create(args) => {
            let state = lifecycle.create(&DesiredSpec::from(args)).await?;
            print_json(&state)?;
        }
        Command::Read { id } => match lifecycle.read(&id).await? {
            ReadOutcome::Found(state) => print_json(&state)?,
            ReadOutcome::NotFound => println!("null"),
        },
        Command::Update {
            id,
            name,
            size,
            image,
        } => {
            let ReadOutcome::Found(current) = lifecycle.read(&id).await? else {
                return Err(CtlError::NotFound(id));
            };
            let old = DesiredSpec::new(
                current.name(),
                current.size(),
                current.image(),
                current.region(),
            );
            let new = DesiredSpec {
                name: name.unwrap_or_else(|| old.name.clone()),
                size: size.unwrap_or_else(|| old.size.clone()),
                image: image.unwrap_or_else(|| old.image.clone()),
                ..old.clone()
            };
            let state = lifecycle.update(&id, &old, &new).await?;
            print_json(&state)?;
        }
        Command::Delete { id } => {
            lifecycle.delete(&id).await?;
        }
        Command::Exists { id } => {
            println!("{}", lifecycle.exists(&id).await?);
        }
        Command::Acceptance { scenario } => {
            acceptance::run(&lifecycle, client.api(), scenario).await?;
            tracing::info!("acceptance scenarios passed");
        }
    }

    Ok(())
}

fn print_json(state: &CanonicalState) -> Result<(), CtlError> {
    println!("{}", serde_json::to_string_pretty(state)?);
    Ok(())
}
