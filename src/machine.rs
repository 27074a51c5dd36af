//! Canonical machine vocabulary.
//!
//! [`MachineState`] is the single snapshot every consumer reads.  It is
//! `Copy`: the aggregator replaces it wholesale on each change and readers
//! always hold their own copy, never a reference into live state.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// What the machine is doing.  `Alarm` and `Error` are only ever published
/// by the alarm engine's latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Inactive,
    Running,
    Paused,
    Alarm,
    Error,
}

impl MachineStatus {
    pub const COUNT: usize = 5;

    pub const ALL: [MachineStatus; Self::COUNT] = [
        Self::Inactive,
        Self::Running,
        Self::Paused,
        Self::Alarm,
        Self::Error,
    ];

    /// Wire name, as the machine and consumers spell it.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Alarm => "alarm",
            Self::Error => "error",
        }
    }

    /// Parse the machine's run-state tag.  Case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(raw))
    }

    /// True for the two states only reset can leave.
    pub fn is_latched(self) -> bool {
        matches!(self, Self::Alarm | Self::Error)
    }
}

// ---------------------------------------------------------------------------
// Material
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    Steel,
    Aluminum,
    Wood,
}

impl Material {
    pub const ALL: [Material; 3] = [Self::Steel, Self::Aluminum, Self::Wood];

    /// Capitalised name written to the machine's material tag.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Self::Steel => "Steel",
            Self::Aluminum => "Aluminum",
            Self::Wood => "Wood",
        }
    }

    /// Case-insensitive lookup ("steel", "Steel", "STEEL").
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.canonical_name().eq_ignore_ascii_case(raw))
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A point-in-time snapshot of the machine in domain units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineState {
    pub state: MachineStatus,
    /// Blade speed (m/min).
    pub cutting_speed: f64,
    /// Pieces completed since the machine's counter was last reset.
    pub pieces_cut: u32,
    /// Electrical draw (kW).
    pub power_consumption: f64,
    /// Blade housing temperature (°C).
    pub temperature: f64,
    /// `true` = barrier closed (safe).
    pub safety_barrier: bool,
    /// Blade wear, 0–100 %.
    pub blade_wear: f64,
    pub current_material: Material,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            state: MachineStatus::Inactive,
            cutting_speed: 0.0,
            pieces_cut: 0,
            power_consumption: 0.0,
            temperature: 0.0,
            safety_barrier: true,
            blade_wear: 0.0,
            current_material: Material::Steel,
        }
    }
}

impl MachineState {
    /// The same snapshot with a different run state.
    pub fn with_status(self, state: MachineStatus) -> Self {
        Self { state, ..self }
    }
}
