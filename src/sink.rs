//! Console presentation sink.
//!
//! Subscribes to the monitor's broadcast bus and renders snapshots and
//! alarm transitions as log lines. Pure presentation: nothing here feeds
//! back into the monitoring state.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::events::MonitorEvent;

/// Spawn a sink task rendering events until the bus closes.
pub fn spawn(mut rx: broadcast::Receiver<MonitorEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => render(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Sink lagged, dropped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn render(event: &MonitorEvent) {
    match event {
        MonitorEvent::Statistics(snap) => {
            let availability = match snap.availability {
                Some(a) => format!("{:.1}%", a),
                None => "no data".to_string(),
            };
            let codes = snap
                .class_hits
                .iter()
                .map(|(class, count)| format!("{}={}", class, count))
                .collect::<Vec<_>>()
                .join(" ");

            tracing::info!(
                "[{}] last {}s: min={}ms max={}ms avg={}ms availability={} {}",
                snap.target,
                snap.window_ms / 1000,
                snap.min_latency_ms,
                snap.max_latency_ms,
                snap.avg_latency_ms,
                availability,
                codes
            );
        }
        MonitorEvent::AlarmRaised {
            target,
            availability,
            at,
        } => {
            tracing::warn!(
                "ALERT: {} is down. availability={:.1}%, time={}",
                target,
                availability,
                at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        MonitorEvent::AlarmCleared {
            target,
            availability,
            at,
        } => {
            tracing::info!(
                "RESOLVED: {} recovered. availability={:.1}%, time={}",
                target,
                availability,
                at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }
}
