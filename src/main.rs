use anyhow::{Context, Result};
use sensorsim::config::load_config_or_default;
use sensorsim::notify::{NotificationHub, ResourcesChanged};
use sensorsim::objects::{build_objects, Direction, Location};
use sensorsim::security::resolve;
use sensorsim::telemetry::{HttpTelemetry, TelemetrySource};
use std::io::BufRead;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensorsim=info".into()),
        )
        .init();

    info!("Sensor simulator starting...");

    let config_path =
        std::env::var("SENSORSIM_CONFIG").unwrap_or_else(|_| "sensorsim.toml".to_string());
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let endpoint = config.endpoint.resolve_name();
    info!(
        config_path = %config_path,
        endpoint = %endpoint,
        local_address = config.endpoint.local_address.as_deref().unwrap_or("*"),
        local_port = config.endpoint.local_port,
        "Configuration loaded"
    );

    // Credentials are resolved before any object exists
    let inputs = config
        .security
        .load(config.server.address.clone(), config.server.bootstrap)
        .context("Failed to load credentials")?;
    let security = resolve(&inputs).context("Invalid security configuration")?;
    security.log_summary();

    let telemetry: Option<Arc<dyn TelemetrySource>> = match &config.telemetry.url {
        Some(url) => {
            let timeout = Duration::from_millis(config.telemetry.timeout_ms);
            let client = HttpTelemetry::new(url.as_str(), timeout)?;
            info!(url = %client.base_url(), "Using external telemetry source");
            Some(Arc::new(client))
        }
        None => {
            info!("No telemetry source configured, values follow a random walk");
            None
        }
    };

    let (hub, events) = NotificationHub::channel(config.notifications.channel_capacity);
    let observer_handle = tokio::spawn(observe(events));

    let mut objects =
        build_objects(&config, &hub, telemetry).context("Failed to initialize objects")?;
    info!(
        objects = ?objects.registry.object_ids(),
        samplers = objects.registry.sampler_count(),
        "Objects initialized"
    );

    // Stdin reads cannot be cancelled, so keys are read on a detached thread
    if let Some(location) = &objects.location {
        info!("Press w/a/s/d then Enter to move the location");
        let location = Arc::downgrade(location);
        std::thread::spawn(move || read_moves(location));
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    // Samplers stop before the observation channel goes away
    objects.registry.shutdown().await;
    drop(objects);
    drop(hub);
    match tokio::time::timeout(Duration::from_secs(1), observer_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Observer task failed"),
        Err(_) => warn!("Observer did not drain in time"),
    }
    info!("Sensor simulator stopped");

    Ok(())
}

/// Drain change events until every sender is gone.
async fn observe(mut events: mpsc::Receiver<ResourcesChanged>) {
    while let Some(event) = events.recv().await {
        info!(
            object_id = event.object_id,
            instance_id = event.instance_id,
            resource_ids = ?event.resource_ids,
            "Resources changed"
        );
        if let Ok(json) = serde_json::to_string(&event) {
            debug!(event = %json, "Notification payload");
        }
    }
    debug!("Observation channel closed");
}

/// Move the location for each w/a/s/d key read from stdin.
fn read_moves(location: Weak<Location>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                break;
            }
        };
        let location = match location.upgrade() {
            Some(l) => l,
            None => break,
        };
        for key in line.chars() {
            match Direction::from_key(key) {
                Some(direction) => {
                    location.move_towards(direction);
                    let position = location.position();
                    info!(
                        latitude = position.latitude,
                        longitude = position.longitude,
                        "Location moved"
                    );
                }
                None if key.is_whitespace() => {}
                None => debug!(key = %key, "Ignoring key"),
            }
        }
    }
}
