//! Bounded metrics window.
//!
//! One [`MetricSample`] per published snapshot, held in a fixed-capacity
//! ring.  Readers get an owned, oldest-first copy of the whole window.

use heapless::HistoryBuffer;
use serde::{Deserialize, Serialize};

use crate::machine::MachineState;

/// Samples retained.
pub const METRICS_WINDOW: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// ms since the UNIX epoch.
    pub timestamp: u64,
    pub power: f64,
    pub speed: f64,
    pub temperature: f64,
}

impl MetricSample {
    pub fn from_state(state: &MachineState, timestamp: u64) -> Self {
        Self {
            timestamp,
            power: state.power_consumption,
            speed: state.cutting_speed,
            temperature: state.temperature,
        }
    }
}

/// current / average / min / max of one quantity over the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    pub current: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl Stat {
    fn over(values: impl Iterator<Item = f64>) -> Self {
        let mut n = 0usize;
        let mut stat = Stat { min: f64::INFINITY, max: f64::NEG_INFINITY, ..Default::default() };
        let mut sum = 0.0;
        for v in values {
            n += 1;
            sum += v;
            stat.current = v;
            stat.min = stat.min.min(v);
            stat.max = stat.max.max(v);
        }
        if n == 0 {
            return Stat::default();
        }
        stat.avg = sum / n as f64;
        stat
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub power: Stat,
    pub speed: Stat,
    pub temperature: Stat,
    pub pieces_cut: u32,
    pub samples: usize,
}

pub struct MetricsBuffer {
    window: HistoryBuffer<MetricSample, METRICS_WINDOW>,
}

impl Default for MetricsBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsBuffer {
    pub fn new() -> Self {
        Self { window: HistoryBuffer::new() }
    }

    /// Append, evicting the oldest sample once full.
    pub fn push(&mut self, sample: MetricSample) {
        self.window.write(sample);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.len() == 0
    }

    /// Oldest-first copy of the window.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        self.window.oldest_ordered().copied().collect()
    }

    pub fn summary(&self, pieces_cut: u32) -> MetricsSummary {
        let samples = || self.window.oldest_ordered();
        MetricsSummary {
            power: Stat::over(samples().map(|s| s.power)),
            speed: Stat::over(samples().map(|s| s.speed)),
            temperature: Stat::over(samples().map(|s| s.temperature)),
            pieces_cut,
            samples: self.window.len(),
        }
    }
}
