use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;

use duckt_client::config::Settings;
use duckt_client::metrics::encode_metrics;
use duckt_client::telemetry::init_telemetry;
use duckt_client::{DucktClient, Record};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings.telemetry)?;
    tracing::info!("Configuration loaded");

    let client = DucktClient::new(settings.client_config())?;

    tokio::select! {
        result = forward_stdin(&client) => {
            let forwarded = result?;
            tracing::info!(forwarded = forwarded, "Reached end of input");
        }
        _ = shutdown_signal() => {}
    }

    let timeout = settings.shutdown_timeout();
    tracing::info!(
        outstanding = client.outstanding(),
        timeout_secs = timeout.as_secs(),
        "Flushing outstanding records"
    );

    let flushed = client.flush(timeout).await;
    let stats = client.stats();
    client.shutdown(Duration::ZERO).await;

    tracing::info!(
        flushed = flushed,
        enqueued = stats.enqueued,
        delivered = stats.delivered,
        dropped = stats.dropped,
        abandoned = stats.outstanding,
        "Forwarder shutdown complete"
    );

    match encode_metrics() {
        Ok(text) => tracing::debug!(metrics = %text, "Final metrics"),
        Err(e) => tracing::warn!(error = %e, "Failed to encode metrics"),
    }

    Ok(())
}

/// Forward every JSON object read from stdin. Returns how many were queued.
async fn forward_stdin(client: &DucktClient) -> Result<usize> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut forwarded = 0;
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record = match serde_json::from_str::<serde_json::Value>(line).map(Record::from_value) {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!(line = line_no, "Skipping line that is not a JSON object");
                continue;
            }
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "Skipping malformed JSON line");
                continue;
            }
        };

        client.send_request(record);
        forwarded += 1;
    }

    Ok(forwarded)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping input");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, stopping input");
        }
    }
}
