//! Scheduler module: one probe loop per monitored target.
//!
//! Each target gets an independent timer-driven loop; probes are spawned
//! per tick and may complete out of order. Completions are funneled into
//! the engine's command queue, which serializes them per target.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, RwLock};

use crate::config::{ConfigError, MonitorConfig, TargetConfig, TargetId};
use crate::events::ProbeReport;
use crate::monitor::EngineCommand;
use crate::probe::{run_probe, ProbeError};

/// Orchestrates probe execution for all targets.
pub struct Scheduler {
    cmd_tx: mpsc::Sender<EngineCommand>,
    cfg: MonitorConfig,
    stop_chans: Arc<RwLock<HashMap<TargetId, broadcast::Sender<()>>>>,
}

impl Scheduler {
    pub fn new(cmd_tx: mpsc::Sender<EngineCommand>, cfg: MonitorConfig) -> Self {
        Self {
            cmd_tx,
            cfg,
            stop_chans: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a target with the engine and start its probe loop.
    ///
    /// A target whose interval does not fit the configured windows is
    /// rejected here, before anything is spawned: no probe loop runs for
    /// a target the engine would never admit.
    pub async fn add_target(&self, target: TargetConfig) -> Result<(), ConfigError> {
        self.cfg.validate_interval(target.interval_ms)?;

        let mut stop_chans = self.stop_chans.write().await;

        if stop_chans.contains_key(&target.id) {
            return Ok(()); // Already running
        }

        let (stop_tx, _) = broadcast::channel(1);
        stop_chans.insert(target.id.clone(), stop_tx.clone());
        drop(stop_chans);

        tracing::info!("Scheduler: adding target {}", target.id);

        let _ = self
            .cmd_tx
            .send(EngineCommand::Start {
                target: target.id.clone(),
                interval_ms: target.interval_ms,
            })
            .await;

        let cmd_tx = self.cmd_tx.clone();
        let probe_timeout = Duration::from_millis(self.cfg.probe_timeout_ms);
        let stop_chans = self.stop_chans.clone();
        let target_id = target.id.clone();

        tokio::spawn(async move {
            run_probe_loop(target, probe_timeout, cmd_tx, stop_tx.subscribe()).await;

            // Clean up when done
            let mut chans = stop_chans.write().await;
            chans.remove(&target_id);
        });

        Ok(())
    }

    /// Stop probing a target and drop its monitoring state.
    pub async fn remove_target(&self, id: &TargetId) {
        let mut stop_chans = self.stop_chans.write().await;

        if let Some(stop_tx) = stop_chans.remove(id) {
            let _ = stop_tx.send(());
            let _ = self
                .cmd_tx
                .send(EngineCommand::Stop { target: id.clone() })
                .await;
            tracing::info!("Scheduler: removed target {}", id);
        }
    }

    /// Whether a probe loop is currently running for this target.
    pub async fn is_monitoring(&self, id: &TargetId) -> bool {
        self.stop_chans.read().await.contains_key(id)
    }
}

/// Run the probe loop for a single target.
async fn run_probe_loop(
    target: TargetConfig,
    probe_timeout: Duration,
    cmd_tx: mpsc::Sender<EngineCommand>,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(target.interval_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    // Limit concurrent in-flight probes for this target
    let semaphore = Arc::new(tokio::sync::Semaphore::new(5));

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = interval.tick() => {
                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(p) => p,
                    Err(_) => {
                        tracing::warn!("Skipping probe for {} due to overlap limit", target.id);
                        continue;
                    }
                };

                let cmd_tx = cmd_tx.clone();
                let target_id = target.id.clone();

                tokio::spawn(async move {
                    let _permit = permit; // Hold permit until done

                    let report = match run_probe(target_id.as_str(), probe_timeout).await {
                        Ok(outcome) => ProbeReport::Up {
                            target: target_id.clone(),
                            latency_ms: outcome.latency_ms,
                            status_code: outcome.status_code,
                        },
                        // A timed-out or failed completion is a down
                        // observation, never an error to the engine.
                        Err(ProbeError::Timeout(_)) | Err(ProbeError::Network(_)) => {
                            ProbeReport::Down {
                                target: target_id.clone(),
                            }
                        }
                        Err(e) => {
                            tracing::error!("Probe failed for {}: {}", target_id, e);
                            return;
                        }
                    };

                    if cmd_tx.send(EngineCommand::Report(report)).await.is_err() {
                        tracing::error!("Failed to send result for {}", target_id);
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowSpec;

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            polling_interval_ms: 1_000,
            probe_timeout_ms: 500,
            display_windows: vec![WindowSpec {
                duration_ms: 600_000,
                emit_period_ms: 3_600_000,
            }],
            alarm_window_ms: 120_000,
            alarm_threshold: 80.0,
            targets: Vec::new(),
        }
    }

    fn test_target(url: &str, interval_ms: u64) -> TargetConfig {
        TargetConfig {
            id: TargetId::parse(url).unwrap(),
            interval_ms,
        }
    }

    #[test]
    fn test_add_and_remove_target() {
        tokio_test::block_on(async {
            let (cmd_tx, mut cmd_rx) = mpsc::channel(64);
            let scheduler = Scheduler::new(cmd_tx, test_config());

            let target = test_target("http://127.0.0.1:9/never", 60_000);
            scheduler.add_target(target.clone()).await.unwrap();
            assert!(scheduler.is_monitoring(&target.id).await);

            // The engine is told to admit the target first.
            match cmd_rx.recv().await {
                Some(EngineCommand::Start {
                    target: id,
                    interval_ms,
                }) => {
                    assert_eq!(id, target.id);
                    assert_eq!(interval_ms, 60_000);
                }
                other => panic!("expected Start, got {:?}", other),
            }

            scheduler.remove_target(&target.id).await;
            assert!(!scheduler.is_monitoring(&target.id).await);
        });
    }

    #[test]
    fn test_rejected_target_spawns_no_probe_loop() {
        tokio_test::block_on(async {
            let (cmd_tx, mut cmd_rx) = mpsc::channel(64);
            let scheduler = Scheduler::new(cmd_tx, test_config());

            // Interval longer than the 10-minute display window: the
            // engine would reject this, so the scheduler must too.
            let target = test_target("http://127.0.0.1:9/never", 900_000);
            let res = scheduler.add_target(target.clone()).await;

            assert!(matches!(res, Err(ConfigError::WindowTooShort { .. })));
            assert!(!scheduler.is_monitoring(&target.id).await);

            // Nothing was sent to the engine either.
            assert!(matches!(
                cmd_rx.try_recv(),
                Err(mpsc::error::TryRecvError::Empty)
            ));

            // A zero interval is rejected the same way, before the probe
            // timer (which panics on a zero period) could ever start.
            let target = test_target("http://127.0.0.1:9/never", 0);
            let res = scheduler.add_target(target.clone()).await;
            assert!(matches!(res, Err(ConfigError::InvalidInterval)));
            assert!(!scheduler.is_monitoring(&target.id).await);
        });
    }

    #[tokio::test]
    async fn test_unreachable_target_reports_down() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(64);
        let scheduler = Scheduler::new(cmd_tx, test_config());

        // Nothing listens on the discard port; the probe fails fast.
        let target = test_target("http://127.0.0.1:9/", 100);
        scheduler.add_target(target.clone()).await.unwrap();

        let report = loop {
            let cmd = tokio::time::timeout(Duration::from_secs(5), cmd_rx.recv())
                .await
                .expect("timed out waiting for a report")
                .expect("command channel closed");
            match cmd {
                EngineCommand::Report(report) => break report,
                _ => continue,
            }
        };

        assert!(matches!(report, ProbeReport::Down { .. }));
        assert_eq!(report.target(), &target.id);

        scheduler.remove_target(&target.id).await;
    }
}
