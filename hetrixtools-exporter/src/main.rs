//! Prometheus exporter for HetrixTools uptime monitors.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use hetrixtools_exporter::config::LogFormat;
use hetrixtools_exporter::{ExporterConfig, HttpServer, MonitorCollector, SharedCollector};

/// Prometheus exporter for HetrixTools uptime monitors.
#[derive(Parser, Debug)]
#[command(name = "hetrixtools-exporter")]
#[command(about = "Export HetrixTools uptime monitors as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address on which to expose metrics (overrides config).
    #[arg(long = "web.listen-address")]
    listen_address: Option<String>,

    /// Path under which to expose metrics (overrides config).
    #[arg(long = "web.telemetry-path")]
    telemetry_path: Option<String>,

    /// HetrixTools API key for authentication (overrides config).
    #[arg(long = "hetrixtools.api-key", env = "HETRIXTOOLS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error). Defaults to the config value.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Apply CLI flags on top of the file configuration.
    fn apply_overrides(self, config: &mut ExporterConfig) {
        if let Some(listen) = self.listen_address {
            config.web.listen_address = listen;
        }
        if let Some(path) = self.telemetry_path {
            config.web.telemetry_path = path;
        }
        if let Some(api_key) = self.api_key {
            config.hetrixtools.api_key = api_key;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

/// Validate the configuration, build the collector and bind the listener.
///
/// Validation runs first: a missing API key or a bad address fails before
/// any socket is bound.
async fn prepare(
    config: &ExporterConfig,
) -> anyhow::Result<(SharedCollector, HttpServer, TcpListener)> {
    config.validate()?;

    let listen_addr = config.web.socket_addr()?;
    let collector = Arc::new(MonitorCollector::new(&config.hetrixtools)?);

    let listener = TcpListener::bind(listen_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", listen_addr, e))?;

    let http_server = HttpServer::new(
        collector.clone(),
        listen_addr,
        config.web.telemetry_path.clone(),
    );

    Ok((collector, http_server, listener))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    args.apply_overrides(&mut config);

    // Initialize logging
    let log_level = config.logging.level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("hetrixtools_exporter={}", log_level).parse()?)
        .add_directive(format!("hyper={}", Level::WARN).parse()?)
        .add_directive(format!("reqwest={}", Level::WARN).parse()?);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    let (collector, http_server, listener) = match prepare(&config).await {
        Ok(parts) => parts,
        Err(e) => {
            error!(error = %e, "Failed to start exporter");
            return Err(e);
        }
    };

    info!(
        upstream = %config.hetrixtools.base_url,
        per_page = config.hetrixtools.per_page,
        max_pages = config.hetrixtools.max_pages,
        "Starting HetrixTools exporter"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut http_task =
        tokio::spawn(async move { http_server.serve(listener, shutdown_rx).await });

    // Wait for shutdown signal or a server failure
    tokio::select! {
        result = &mut http_task => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!(error = %e, "HTTP server error");
                    Err(e)
                }
                Err(e) => Err(e.into()),
            };
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(_) => std::future::pending::<()>().await,
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    let stats = collector.stats();
    info!(
        scrapes_total = stats.scrapes_total,
        scrapes_failed = stats.scrapes_failed,
        scrapes_rate_limited = stats.scrapes_rate_limited,
        last_monitor_count = stats.last_monitor_count,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}
