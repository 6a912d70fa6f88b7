//! Event types flowing between the probes, the monitor engine and the
//! presentation sinks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::TargetId;

/// Outcome of one probe, reported by the scheduler to the engine.
#[derive(Debug, Clone)]
pub enum ProbeReport {
    Up {
        target: TargetId,
        latency_ms: u64,
        status_code: u16,
    },
    Down {
        target: TargetId,
    },
}

impl ProbeReport {
    pub fn target(&self) -> &TargetId {
        match self {
            Self::Up { target, .. } | Self::Down { target } => target,
        }
    }
}

/// A point-in-time readout of one window's aggregates.
///
/// `availability` is `None` while the window holds no observations;
/// sinks render that as "no data" rather than a percentage.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsSnapshot {
    pub target: TargetId,
    pub at: DateTime<Utc>,
    pub window_ms: u64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub avg_latency_ms: u64,
    pub availability: Option<f64>,
    /// Hits per response-code class ("2xx".."5xx") plus a "down" bucket.
    pub class_hits: BTreeMap<String, u64>,
}

/// Events published on the broadcast bus for presentation sinks.
#[derive(Debug, Clone, Serialize)]
pub enum MonitorEvent {
    Statistics(StatisticsSnapshot),
    AlarmRaised {
        target: TargetId,
        availability: f64,
        at: DateTime<Utc>,
    },
    AlarmCleared {
        target: TargetId,
        availability: f64,
        at: DateTime<Utc>,
    },
}
