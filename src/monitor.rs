//! Monitor engine: the single dispatcher that owns all per-target state.
//!
//! Probe reports, snapshot timer ticks and lifecycle commands all arrive
//! on one mpsc queue and are applied one at a time, so no two mutations
//! of the same target's windows can ever interleave. Probes for distinct
//! targets still run concurrently; only delivery into the engine is
//! serialized.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};

use crate::alarm::{AlarmLatch, AlarmTransition};
use crate::config::{ConfigError, MonitorConfig, TargetId};
use crate::events::{MonitorEvent, ProbeReport};
use crate::stats::WindowStats;

/// Commands drained by the engine task.
#[derive(Debug)]
pub enum EngineCommand {
    /// Admit a target and start its snapshot tickers.
    Start { target: TargetId, interval_ms: u64 },
    /// Stop a target: cancel its tickers and drop its state.
    Stop { target: TargetId },
    /// One probe outcome.
    Report(ProbeReport),
    /// Periodic pull-and-publish for one display window.
    SnapshotTick { target: TargetId, window: usize },
}

/// All monitoring state for one admitted target.
struct TargetState {
    /// Display windows, index-aligned with `MonitorConfig::display_windows`.
    display: Vec<WindowStats>,
    /// Dedicated short window used only for alarm evaluation.
    alarm_window: WindowStats,
    latch: AlarmLatch,
    /// Closing this cancels the target's snapshot tickers.
    stop_tx: broadcast::Sender<()>,
}

impl TargetState {
    fn new(cfg: &MonitorConfig, interval_ms: u64) -> Result<Self, ConfigError> {
        let display = cfg
            .display_windows
            .iter()
            .map(|w| WindowStats::new(w.duration_ms, interval_ms, cfg.probe_timeout_ms))
            .collect::<Result<Vec<_>, _>>()?;
        let alarm_window = WindowStats::new(cfg.alarm_window_ms, interval_ms, cfg.probe_timeout_ms)?;

        let (stop_tx, _) = broadcast::channel(1);

        Ok(Self {
            display,
            alarm_window,
            latch: AlarmLatch::new(cfg.alarm_threshold),
            stop_tx,
        })
    }
}

/// The engine task. Create it, grab a command handle, then spawn
/// [`Engine::run`].
pub struct Engine {
    cfg: MonitorConfig,
    states: HashMap<TargetId, TargetState>,
    cmd_tx: mpsc::Sender<EngineCommand>,
    cmd_rx: mpsc::Receiver<EngineCommand>,
    events_tx: broadcast::Sender<MonitorEvent>,
}

impl Engine {
    pub fn new(cfg: MonitorConfig, events_tx: broadcast::Sender<MonitorEvent>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(1024);

        Self {
            cfg,
            states: HashMap::new(),
            cmd_tx,
            cmd_rx,
            events_tx,
        }
    }

    /// Handle for submitting commands to the running engine.
    pub fn handle(&self) -> mpsc::Sender<EngineCommand> {
        self.cmd_tx.clone()
    }

    /// Drain the command queue until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                EngineCommand::Start {
                    target,
                    interval_ms,
                } => self.start_target(target, interval_ms),
                EngineCommand::Stop { target } => self.stop_target(&target),
                EngineCommand::Report(report) => self.apply_report(report),
                EngineCommand::SnapshotTick { target, window } => {
                    self.emit_snapshot(&target, window)
                }
            }
        }
    }

    fn start_target(&mut self, target: TargetId, interval_ms: u64) {
        if self.states.contains_key(&target) {
            return; // Already monitored
        }

        let state = match TargetState::new(&self.cfg, interval_ms) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Rejecting target {}: {}", target, e);
                return;
            }
        };

        tracing::info!("Monitoring {} every {}ms", target, interval_ms);

        for (window, spec) in self.cfg.display_windows.iter().enumerate() {
            spawn_snapshot_ticker(
                target.clone(),
                window,
                Duration::from_millis(spec.emit_period_ms),
                self.cmd_tx.clone(),
                state.stop_tx.subscribe(),
            );
        }

        self.states.insert(target, state);
    }

    fn stop_target(&mut self, target: &TargetId) {
        if let Some(state) = self.states.remove(target) {
            let _ = state.stop_tx.send(());
            tracing::info!("Stopped monitoring {}", target);
        }
    }

    fn apply_report(&mut self, report: ProbeReport) {
        let Some(state) = self.states.get_mut(report.target()) else {
            // A probe completing after Stop lands here; nothing to update.
            return;
        };

        match &report {
            ProbeReport::Up {
                latency_ms,
                status_code,
                ..
            } => {
                for window in &mut state.display {
                    window.record_up(*latency_ms, *status_code);
                }
                state.alarm_window.record_up(*latency_ms, *status_code);
            }
            ProbeReport::Down { .. } => {
                for window in &mut state.display {
                    window.record_down();
                }
                state.alarm_window.record_down();
            }
        }

        let target = report.target();
        match state.latch.evaluate(state.alarm_window.availability()) {
            Some(AlarmTransition::Raised(availability)) => {
                tracing::warn!(
                    "Alarm raised for {}: availability {:.1}%",
                    target,
                    availability
                );
                let _ = self.events_tx.send(MonitorEvent::AlarmRaised {
                    target: target.clone(),
                    availability,
                    at: Utc::now(),
                });
            }
            Some(AlarmTransition::Cleared(availability)) => {
                tracing::info!(
                    "Alarm cleared for {}: availability {:.1}%",
                    target,
                    availability
                );
                let _ = self.events_tx.send(MonitorEvent::AlarmCleared {
                    target: target.clone(),
                    availability,
                    at: Utc::now(),
                });
            }
            None => {}
        }
    }

    fn emit_snapshot(&self, target: &TargetId, window: usize) {
        let Some(state) = self.states.get(target) else {
            return; // Tick raced with Stop
        };

        let Some(stats) = state.display.get(window) else {
            tracing::error!("No window {} for target {}", window, target);
            return;
        };

        let _ = self
            .events_tx
            .send(MonitorEvent::Statistics(stats.snapshot(target)));
    }
}

/// Periodically request a snapshot for one (target, window) pair until
/// the target's stop channel fires.
fn spawn_snapshot_ticker(
    target: TargetId,
    window: usize,
    period: Duration,
    cmd_tx: mpsc::Sender<EngineCommand>,
    mut stop_rx: broadcast::Receiver<()>,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop_rx.recv() => break,
                _ = interval.tick() => {
                    let cmd = EngineCommand::SnapshotTick {
                        target: target.clone(),
                        window,
                    };
                    if cmd_tx.send(cmd).await.is_err() {
                        break; // Engine is gone
                    }
                }
            }
        }
    });
}
