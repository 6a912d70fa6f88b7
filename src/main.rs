//! sitepulse - HTTP endpoint availability monitor
//!
//! Probes a set of HTTP endpoints on fixed intervals, keeps exact rolling
//! window statistics per endpoint and raises availability alarms with
//! hysteresis around a configurable threshold.

mod alarm;
mod config;
mod events;
mod monitor;
mod probe;
mod scheduler;
mod sink;
mod stats;
mod window;

use config::{MonitorConfig, TargetConfig, TargetId};
use monitor::Engine;
use scheduler::Scheduler;

use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("sitepulse=info".parse()?))
        .init();

    // Load configuration
    let mut cfg = MonitorConfig::load()?;
    tracing::info!(
        "Starting sitepulse: {} display windows, alarm threshold {}%",
        cfg.display_windows.len(),
        cfg.alarm_threshold
    );

    // Add a sample target if none are configured
    if cfg.targets.is_empty() {
        tracing::info!("No targets configured, adding sample target: example.com");
        cfg.targets.push(TargetConfig {
            id: TargetId::parse("https://example.com")?,
            interval_ms: cfg.polling_interval_ms,
        });
    }

    // Event bus for presentation sinks
    let (events_tx, _) = broadcast::channel(256);

    // Start the monitor engine
    let engine = Engine::new(cfg.clone(), events_tx.clone());
    let cmd_tx = engine.handle();
    tokio::spawn(engine.run());

    // Start the console sink
    sink::spawn(events_tx.subscribe());

    // Start probing
    let scheduler = Scheduler::new(cmd_tx, cfg.clone());
    for target in &cfg.targets {
        scheduler.add_target(target.clone()).await?;
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    for target in &cfg.targets {
        scheduler.remove_target(&target.id).await;
    }

    Ok(())
}
