use anyhow::{Context, Result};
use std::sync::Arc;
use telemetry_feed::{create_router, FeedState, FeedValues};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "telemetry_feed=info".into()),
        )
        .init();

    let port: u16 = std::env::var("TELEMETRY_FEED_PORT")
        .unwrap_or_else(|_| "5000".to_string())
        .parse()
        .context("TELEMETRY_FEED_PORT must be a valid port number")?;

    let router = create_router(Arc::new(FeedState::new(FeedValues::default())));
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .context("Failed to bind telemetry feed port")?;
    info!(port = port, "Telemetry feed listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Telemetry feed server error")?;

    info!("Telemetry feed stopped");
    Ok(())
}
