//! Gateway configuration parameters
//!
//! All tunable parameters for the edge gateway: endpoint addressing, alarm
//! thresholds, interlock policy and timing.  Loaded from a JSON document;
//! every field has a default so a partial document is valid.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::protocol::tags::TagMap;

/// Raise/clear thresholds for one measured quantity.
///
/// `warn ≤ x < critical` raises the warning rule, `x ≥ critical` raises the
/// critical rule, and both clear only once `x < clear`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub warn: f64,
    pub critical: f64,
    pub clear: f64,
}

impl ThresholdBand {
    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if !(self.warn.is_finite() && self.critical.is_finite() && self.clear.is_finite()) {
            return Err(ConfigError::ValidationFailed(field));
        }
        if self.clear > self.warn || self.warn >= self.critical {
            return Err(ConfigError::ValidationFailed(field));
        }
        Ok(())
    }
}

/// Alarm thresholds for every paired rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmThresholds {
    /// Power consumption (kW).
    pub power: ThresholdBand,
    /// Temperature (°C).
    pub temperature: ThresholdBand,
    /// Blade wear (%).
    pub blade_wear: ThresholdBand,
}

impl Default for AlarmThresholds {
    fn default() -> Self {
        Self {
            power: ThresholdBand { warn: 8.0, critical: 10.0, clear: 8.0 },
            temperature: ThresholdBand { warn: 40.0, critical: 50.0, clear: 40.0 },
            blade_wear: ThresholdBand { warn: 70.0, critical: 90.0, clear: 70.0 },
        }
    }
}

/// Optional stricter interlocks for commands the transition table allows
/// while the machine is cutting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterlockPolicy {
    /// Refuse `toggle_barrier` while running.
    pub block_barrier_while_running: bool,
    /// Refuse `set_material` while running.
    pub block_material_while_running: bool,
}

/// Core gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    // --- Endpoint ---
    /// Machine endpoint URL (informational for the endpoint adapter).
    pub endpoint_url: String,
    /// Address of every tag on the endpoint.
    pub tags: TagMap,

    // --- Safety ---
    pub thresholds: AlarmThresholds,
    pub interlocks: InterlockPolicy,

    // --- Timing ---
    /// Interval between change polls on a live session (milliseconds)
    pub poll_interval_ms: u32,
    /// Bound on command validation plus write (milliseconds)
    pub command_timeout_ms: u32,
    /// First reconnect delay after a session loss (milliseconds)
    pub reconnect_initial_ms: u32,
    /// Reconnect delay cap (milliseconds)
    pub reconnect_max_ms: u32,

    // --- Bus ---
    /// Topic prefix for published change events
    pub bus_topic_prefix: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint_url: "opc.tcp://simulator:4840/saw/".into(),
            tags: TagMap::default(),

            thresholds: AlarmThresholds::default(),
            interlocks: InterlockPolicy::default(),

            poll_interval_ms: 100,       // 10 Hz
            command_timeout_ms: 2_000,
            reconnect_initial_ms: 500,
            reconnect_max_ms: 30_000,

            bus_topic_prefix: "saw/".into(),
        }
    }
}

impl GatewayConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Corrupted(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading gateway config {}", path.display()))?;
        let config = Self::from_json(&text)
            .with_context(|| format!("parsing gateway config {}", path.display()))?;
        Ok(config)
    }

    /// Reject values that would make the gateway unsafe or unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.power.validate("thresholds.power: need clear <= warn < critical")?;
        self.thresholds
            .temperature
            .validate("thresholds.temperature: need clear <= warn < critical")?;
        self.thresholds
            .blade_wear
            .validate("thresholds.blade_wear: need clear <= warn < critical")?;
        self.tags.validate().map_err(ConfigError::ValidationFailed)?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("poll_interval_ms must be > 0"));
        }
        if self.command_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("command_timeout_ms must be > 0"));
        }
        if self.reconnect_initial_ms == 0 || self.reconnect_initial_ms > self.reconnect_max_ms {
            return Err(ConfigError::ValidationFailed(
                "reconnect delays need 0 < initial <= max",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.command_timeout_ms))
    }
}
