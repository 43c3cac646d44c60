//! dockerdns entry point.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use tokio_util::sync::CancellationToken;

use dockerdns::cli::{Cli, Mode};
use dockerdns::config::Config;
use dockerdns::runtime::DockerRuntime;
use dockerdns::{Dispatcher, HostsFile, Notifier, Reconciler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let cfg = Config::load(cli.config.as_deref(), &cli.overrides())?;

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cfg.log_level))
        .init();
    info!("Starting dockerdns with config: {:?}", cfg);

    let hosts = HostsFile::new(&cfg.hosts_file, &cfg.domain);
    let reconciler = Reconciler::new(hosts);
    let notifier = Notifier::system(cfg.notify_process.clone());

    // Init hosts file first: drop leftovers, ensure the block markers
    reconciler.prepare().await?;

    if cli.mode() == Mode::Clean {
        notifier.notify().await;
        info!("Hosts file cleaned.");
        return Ok(());
    }

    let runtime = DockerRuntime::connect(
        cfg.network_name.clone(),
        Duration::from_secs(cfg.reconnect_delay_secs),
    )?;
    let mut dispatcher = Dispatcher::new(Arc::new(runtime), reconciler, notifier, cfg.event_buffer);

    if cli.mode() == Mode::Update {
        let added = dispatcher.seed().await?;
        info!("Added {} containers.", added);
        return Ok(());
    }

    // Graceful Shutdown
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received {}, shutting down...", signal),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
        token.cancel();
    });

    dispatcher.run(shutdown).await?;

    info!("Shutdown complete.");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
