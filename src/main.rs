mod cli;
mod config;
mod delegate;
mod error;
mod resolve;
mod target;

use crate::{
    cli::{Cli, Command},
    config::Config,
    delegate::{Input, Output, Runner},
    error::{AppResult, UserError, user_error},
    resolve::{allocate_temp_path, resolve_persistent_path},
    target::TargetRef,
};
use clap::Parser;
use console::style;
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(user_error(&e).map_or(1, UserError::exit_code));
    }
}

async fn run() -> AppResult<()> {
    let cli = Cli::parse();

    // Conditionally initialize the tracing subscriber based on the verbose flag.
    if cli.verbose > 0 {
        let filter = match cli.verbose {
            1 => "info",
            2 => "info,gitrepo=debug",
            3 => "debug,gitrepo=trace",
            _ => "trace",
        };
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
            .with_ansi(console::user_attended_stderr())
            .with_writer(std::io::stderr)
            .init();
    }

    let config = Config::from_cli(&cli)?;
    let Command::Clone { url } = &cli.command;
    let target = TargetRef::parse(url)?;

    let git = which::which(&config.git).map_err(|source| UserError::ToolNotFound {
        command: config.git.clone(),
        source,
    })?;

    let target_dir = resolve_target_dir(&config, &target)?;
    tracing::info!(path = %target_dir.display(), url = %target.raw, "Resolved clone destination");

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received");
            cancel.cancel();
        }
    });

    eprintln!(
        "{} Cloning into {}",
        style("✓").green(),
        style(target_dir.display()).cyan()
    );

    let mut runner = Runner::new(git, &target_dir, cancel)
        .env(config.env.clone())
        .stdin(Input::Inherit)
        .stdout(Output::Inherit)
        .stderr(Output::Inherit);
    runner.run(&["clone", target.raw.as_str(), "."]).await?;

    Ok(())
}

/// Picks the clone destination for the configured mode, creating it.
fn resolve_target_dir(config: &Config, target: &TargetRef) -> AppResult<PathBuf> {
    if config.temporary {
        allocate_temp_path(
            &config.temp_root,
            target,
            config.temp_attempts,
            &mut rand::thread_rng(),
        )
    } else {
        resolve_persistent_path(&config.storage_root, target)
    }
}

/// Resolves on SIGINT, or SIGTERM where the platform has it.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
