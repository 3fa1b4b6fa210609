//! power-cycle CLI - load generation by repeated VM power cycling.
//!
//! This is the entry point for the `pcycle` binary.

mod args;
mod output;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use power_cycle_client::ManagementApi;
use power_cycle_control::{CycleConfig, CycleController, CycleError};
use power_cycle_core::EntityId;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use args::{Cli, Command, RunArgs};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.debug);

    match dispatch(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "pcycle failed");
            let code = e
                .downcast_ref::<CycleError>()
                .map_or(1, CycleError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "info,power_cycle=debug"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

async fn dispatch(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Run(args) => run_cycle(&args).await,
        Command::List(connect) => {
            let config = connect.resolve()?;
            config.validate()?;
            list_entities(&config).await
        }
        Command::Status { connect, entities } => {
            let config = connect.resolve()?;
            config.validate()?;
            show_status(&config, &entities).await
        }
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupt received, stopping run");
                token.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for interrupt"),
        }
    });
}

async fn run_cycle(args: &RunArgs) -> anyhow::Result<()> {
    let config = args.resolve()?;
    let api: Arc<dyn ManagementApi> = Arc::new(config.connect()?);

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let summary = CycleController::new(api, &config, cancel).run().await?;

    output::print_summary(&summary, args.json)
}

async fn list_entities(config: &CycleConfig) -> anyhow::Result<()> {
    let client = config.connect()?;
    let session = client
        .authenticate(&config.credentials)
        .await
        .map_err(CycleError::Authentication)?;
    let entities = client
        .list_entities(&session)
        .await
        .map_err(CycleError::Listing)?;

    output::print_entities(&entities);
    Ok(())
}

async fn show_status(config: &CycleConfig, entities: &[EntityId]) -> anyhow::Result<()> {
    let client = config.connect()?;
    let session = client
        .authenticate(&config.credentials)
        .await
        .map_err(CycleError::Authentication)?;

    let mut failures = 0usize;
    for entity in entities {
        match client.get_power_state(&session, entity).await {
            Ok(state) => println!("{entity}\t{state}\t{}", state.as_wire()),
            Err(e) => {
                failures += 1;
                tracing::warn!(entity = %entity, error = %e, "Failed to read power state");
                println!("{entity}\terror: {e}");
            }
        }
    }

    if failures > 0 {
        return Err(anyhow::anyhow!("{failures} of {} lookups failed", entities.len()))
            .context("status query incomplete");
    }
    Ok(())
}
