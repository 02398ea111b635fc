use anyhow::Result;
use edgemax_stats::client::{Client, ClientOptions};
use edgemax_stats::stream::{StatsStream, StreamOptions};
use edgemax_stats::transport::WsConnector;
use edgemax_stats::*;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries one JSON stat per line.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!(
        name = version::NAME,
        version = version::VERSION,
        device = %app_config.device.address,
        "starting"
    );

    let client = Client::new(
        &app_config.device.address,
        ClientOptions {
            timeout: Duration::from_secs(app_config.device.timeout_secs),
            insecure_skip_verify: app_config.device.insecure_skip_verify,
            ..Default::default()
        },
    )?;
    client
        .login(&app_config.device.username, &app_config.device.password)
        .await?;
    let client = Arc::new(client);

    let (stream, mut stats) = StatsStream::start(
        client,
        &WsConnector,
        StreamOptions {
            stats: app_config.stream.stat_types()?,
            keepalive_interval: Duration::from_secs(app_config.stream.keepalive_interval_secs),
        },
    )
    .await?;

    let mut stdout = std::io::stdout().lock();
    let signal = shutdown_signal();
    tokio::pin!(signal);
    loop {
        tokio::select! {
            stat = stats.recv() => {
                let Some(stat) = stat else { break };
                let line = serde_json::to_string(&stat)?;
                writeln!(stdout, "{line}")?;
            }
            _ = &mut signal => {
                tracing::info!("Received shutdown signal");
                break;
            }
        }
    }

    // Keep draining so the collector is never stuck publishing during shutdown.
    let drain = tokio::spawn(async move { while stats.recv().await.is_some() {} });
    if let Err(e) = stream.shutdown().await {
        tracing::warn!(error = %e, operation = "shutdown", "stats stream shutdown reported an error");
    }
    let _ = drain.await;

    Ok(())
}
