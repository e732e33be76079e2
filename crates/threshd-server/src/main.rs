use anyhow::Result;
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing_subscriber::EnvFilter;

use threshd_server::config::ServerConfig;
use threshd_server::pipeline::{self, Control};

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  threshd <config.toml> [samples.jsonl]    Evaluate samples (stdin when no file is given)");
    eprintln!();
    eprintln!("Events are written to stdout as JSON lines, logs go to stderr.");
    eprintln!("Send SIGHUP to reload thresholds from the config file.");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1).map(|s| s.as_str()) {
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(path) => path.to_string(),
        None => {
            print_usage();
            return Err(anyhow::anyhow!("missing <config.toml> argument"));
        }
    };

    let config = ServerConfig::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(config = %config_path, "threshd starting");

    let (controls_tx, controls) = mpsc::unbounded_channel();
    spawn_signal_handlers(config_path.clone(), controls_tx);

    let output = tokio::io::stdout();
    let summary = match args.get(2) {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to open sample file '{}': {}", path, e))?;
            pipeline::run_with_control(&config, BufReader::new(file), output, controls).await?
        }
        None => {
            let stdin = BufReader::new(tokio::io::stdin());
            pipeline::run_with_control(&config, stdin, output, controls).await?
        }
    };

    tracing::info!(
        samples = summary.samples,
        events = summary.events_written,
        rejected_thresholds = summary.rejected_thresholds,
        reloads = summary.reloads,
        interrupted = summary.interrupted,
        "threshd stopped"
    );
    Ok(())
}

/// Ctrl-C asks the pipeline to stop after flushing its events. On unix,
/// SIGHUP re-reads the config file and reloads the thresholds.
fn spawn_signal_handlers(config_path: String, controls: UnboundedSender<Control>) {
    let shutdown_tx = controls.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, shutting down");
                let _ = shutdown_tx.send(Control::Shutdown);
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGHUP handler");
                return;
            }
        };
        while hangup.recv().await.is_some() {
            match ServerConfig::load(&config_path) {
                Ok(config) => {
                    tracing::info!(config = %config_path, "Received SIGHUP, reloading thresholds");
                    if controls.send(Control::Reload(Box::new(config))).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Reload failed, keeping current thresholds")
                }
            }
        }
    });

    #[cfg(not(unix))]
    drop((config_path, controls));
}
