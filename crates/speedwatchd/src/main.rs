//! speedwatchd — the speedwatch daemon.
//!
//! Assembles the measurement sampler, the scrape collector and the HTTP
//! server into one process.
//!
//! # Usage
//!
//! ```text
//! speedwatchd serve --config /etc/speedwatch/speedwatch.toml
//! speedwatchd measure
//! speedwatchd config
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};

use speedwatch_api::{ApiState, build_router};
use speedwatch_core::SpeedwatchConfig;
use speedwatch_metrics::{RetryPolicy, Sampler, SpeedCollector, mailbox};
use speedwatch_probe::HttpProbe;

#[derive(Parser)]
#[command(name = "speedwatchd", about = "Network speed exporter for Prometheus")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Measure periodically and serve the results for scraping.
    Serve {
        /// Path to speedwatch.toml. Built-in defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the listen address.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
    /// Run a single measurement cycle and print the result as JSON.
    Measure {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,speedwatchd=debug,speedwatch_metrics=debug,speedwatch_probe=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, listen } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            run_serve(config).await
        }
        Command::Measure { config } => run_measure(load_config(config.as_deref())?).await,
        Command::Config { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SpeedwatchConfig> {
    match path {
        Some(path) => SpeedwatchConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(SpeedwatchConfig::default()),
    }
}

async fn run_serve(config: SpeedwatchConfig) -> anyhow::Result<()> {
    info!("speedwatch daemon starting");

    // ── Sampler → collector hand-off ───────────────────────────

    let (publisher, mailbox) = mailbox::channel();

    let probe = HttpProbe::new(config.probe.clone());
    info!(targets = ?config.probe.targets, "http probe initialized");

    let sampler = Sampler::new(probe, publisher, config.sampler.interval.get())
        .with_retry(RetryPolicy::from_config(config.sampler.retry_backoff));
    if config.sampler.retry_backoff.is_none() {
        warn!("no retry backoff configured, failed cycles are retried immediately");
    }

    let collector = Arc::new(SpeedCollector::new(
        mailbox,
        config.sampler.handoff_wait.get(),
    ));
    info!(handoff_wait = %config.sampler.handoff_wait, "collector initialized");

    // ── Background sampler ─────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sampler_handle = tokio::spawn(sampler.run(shutdown_rx));

    // ── HTTP server ────────────────────────────────────────────

    let state = ApiState {
        collector,
        exposition: config.exposition.clone(),
    };
    let router = build_router(state, &config.server.metrics_path);
    let addr = config.server.listen;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, path = %config.server.metrics_path, "metrics server listening");

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    let _ = sampler_handle.await;

    info!("speedwatch daemon stopped");
    Ok(())
}

async fn run_measure(config: SpeedwatchConfig) -> anyhow::Result<()> {
    let (publisher, _mailbox) = mailbox::channel();
    let sampler = Sampler::new(
        HttpProbe::new(config.probe),
        publisher,
        config.sampler.interval.get(),
    );

    let result = sampler.run_cycle().await.context("measurement cycle failed")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
