//! Callgrid demo shell.
//!
//! Drives the core session manager against a simulated engine: loads a
//! session roster, starts every session, lets remote users churn for a
//! while, then tears everything down. Notifications are rendered as log
//! lines the way a UI shell would bind them to views.

mod roster;
mod sim;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use callgrid_core::{CallConfig, SessionManager, SessionNotification, SessionObserver};

use crate::roster::Roster;
use crate::sim::SimulatedEngine;

#[derive(Parser)]
#[command(name = "callgrid")]
#[command(about = "Multi-stream call session manager demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted call against the simulated engine
    Demo {
        /// Path to a JSON session roster (defaults to the built-in
        /// dual-camera roster)
        #[arg(long)]
        roster: Option<PathBuf>,

        /// How long to stay in the call, in seconds
        #[arg(long, default_value = "5")]
        duration_secs: u64,

        /// Join deadline per session, in seconds
        #[arg(long, default_value = "15")]
        join_timeout_secs: u64,
    },
    /// Print the built-in dual-camera roster as JSON
    Roster,
}

struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_notification(&self, notification: SessionNotification) {
        match notification {
            SessionNotification::StateChanged {
                session_id,
                state,
                error,
            } => match error {
                Some(error) => tracing::warn!("[{session_id}] -> {state:?}: {error}"),
                None => tracing::info!("[{session_id}] -> {state:?}"),
            },
            SessionNotification::RemoteUserChanged {
                session_id,
                uid,
                present,
            } => {
                if present {
                    tracing::info!("[{session_id}] remote user {uid} joined");
                } else {
                    tracing::info!("[{session_id}] remote user {uid} left");
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo {
            roster,
            duration_secs,
            join_timeout_secs,
        } => {
            let roster = match roster {
                Some(path) => Roster::load(&path)?,
                None => Roster::dual_camera(),
            };
            run_demo(
                roster,
                Duration::from_secs(duration_secs),
                Duration::from_secs(join_timeout_secs),
            )
            .await
        }
        Commands::Roster => {
            println!("{}", serde_json::to_string_pretty(&Roster::dual_camera())?);
            Ok(())
        }
    }
}

async fn run_demo(
    roster: Roster,
    duration: Duration,
    join_timeout: Duration,
) -> anyhow::Result<()> {
    let engine = Arc::new(SimulatedEngine::new());
    let manager = SessionManager::new(engine, CallConfig { join_timeout });
    manager.add_observer(Arc::new(LogObserver));

    let mut ids = Vec::new();
    for config in roster.sessions {
        ids.push(manager.register(config).await?);
    }

    let outcome = manager.start_all(ids.clone()).await?;
    for (id, result) in &outcome.outcomes {
        match result {
            Ok(()) => tracing::info!("[{id}] start issued"),
            Err(err) => tracing::warn!("[{id}] start failed: {err}"),
        }
    }

    tokio::time::sleep(duration).await;

    for id in &ids {
        let users = manager.remote_users(id).await?;
        tracing::info!("[{id}] {} remote user(s) seen", users.len());
    }

    manager.end_all(ids).await?;
    manager.shutdown().await;
    Ok(())
}
