//! Raw tag model.
//!
//! Tags are the protocol-level vocabulary: a fixed set of named, typed
//! values addressed through the configured [`TagMap`].  Nothing outside
//! the protocol adapter and the state aggregator looks at these.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tag identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    State = 0,
    CuttingSpeed = 1,
    PiecesCut = 2,
    PowerConsumption = 3,
    Temperature = 4,
    SafetyBarrier = 5,
    BladeWear = 6,
    CurrentMaterial = 7,
    /// Command tag: true = run, false = stop.
    Run = 8,
    /// Command tag: true = pause.
    Pause = 9,
    /// Command tag: true = reset the machine's alarm/error latch.
    Reset = 10,
}

impl Tag {
    pub const COUNT: usize = 11;

    /// Tags the adapter subscribes to and reads on (re)connect.
    pub const SUBSCRIBED: [Tag; 8] = [
        Self::State,
        Self::CuttingSpeed,
        Self::PiecesCut,
        Self::PowerConsumption,
        Self::Temperature,
        Self::SafetyBarrier,
        Self::BladeWear,
        Self::CurrentMaterial,
    ];

    pub const ALL: [Tag; Self::COUNT] = [
        Self::State,
        Self::CuttingSpeed,
        Self::PiecesCut,
        Self::PowerConsumption,
        Self::Temperature,
        Self::SafetyBarrier,
        Self::BladeWear,
        Self::CurrentMaterial,
        Self::Run,
        Self::Pause,
        Self::Reset,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::State => "State",
            Self::CuttingSpeed => "CuttingSpeed",
            Self::PiecesCut => "PiecesCut",
            Self::PowerConsumption => "PowerConsumption",
            Self::Temperature => "Temperature",
            Self::SafetyBarrier => "SafetyBarrier",
            Self::BladeWear => "BladeWear",
            Self::CurrentMaterial => "CurrentMaterial",
            Self::Run => "Run",
            Self::Pause => "Pause",
            Self::Reset => "Reset",
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Self::Run | Self::Pause | Self::Reset | Self::SafetyBarrier | Self::CurrentMaterial
        )
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    UInt(u32),
    Float(f64),
    Text(String),
}

impl TagValue {
    /// Numeric view.  Integers widen; booleans and text do not coerce.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::UInt(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Float(v) if v.is_finite() && *v >= 0.0 => Some(*v as u32),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// A change pushed by the endpoint for one address.
#[derive(Debug, Clone, PartialEq)]
pub struct TagChange {
    pub address: String,
    pub value: TagValue,
}

impl TagChange {
    pub fn new(address: impl Into<String>, value: TagValue) -> Self {
        Self { address: address.into(), value }
    }
}

// ---------------------------------------------------------------------------
// Raw snapshot
// ---------------------------------------------------------------------------

/// Latest known value of every tag.  `None` until first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSnapshot {
    values: [Option<TagValue>; Tag::COUNT],
}

impl RawSnapshot {
    pub fn get(&self, tag: Tag) -> Option<&TagValue> {
        self.values[tag.index()].as_ref()
    }

    /// Store `value`; returns `true` if it differs from what was held.
    pub fn set(&mut self, tag: Tag, value: TagValue) -> bool {
        let slot = &mut self.values[tag.index()];
        if slot.as_ref() == Some(&value) {
            return false;
        }
        *slot = Some(value);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tag, &TagValue)> {
        Tag::ALL
            .into_iter()
            .filter_map(|t| self.get(t).map(|v| (t, v)))
    }
}

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

/// Endpoint address of every tag.  Defaults follow the machine's
/// `IndustrialSaw` object layout in namespace 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagMap {
    pub state: String,
    pub cutting_speed: String,
    pub pieces_cut: String,
    pub power_consumption: String,
    pub temperature: String,
    pub safety_barrier: String,
    pub blade_wear: String,
    pub current_material: String,
    pub run: String,
    pub pause: String,
    pub reset: String,
}

impl Default for TagMap {
    fn default() -> Self {
        let addr = |name: &str| format!("ns=2;s=IndustrialSaw.{name}");
        Self {
            state: addr("State"),
            cutting_speed: addr("CuttingSpeed"),
            pieces_cut: addr("PiecesCut"),
            power_consumption: addr("PowerConsumption"),
            temperature: addr("Temperature"),
            safety_barrier: addr("SafetyBarrier"),
            blade_wear: addr("BladeWear"),
            current_material: addr("CurrentMaterial"),
            run: addr("Run"),
            pause: addr("Pause"),
            reset: addr("Reset"),
        }
    }
}

impl TagMap {
    pub fn address(&self, tag: Tag) -> &str {
        match tag {
            Tag::State => &self.state,
            Tag::CuttingSpeed => &self.cutting_speed,
            Tag::PiecesCut => &self.pieces_cut,
            Tag::PowerConsumption => &self.power_consumption,
            Tag::Temperature => &self.temperature,
            Tag::SafetyBarrier => &self.safety_barrier,
            Tag::BladeWear => &self.blade_wear,
            Tag::CurrentMaterial => &self.current_material,
            Tag::Run => &self.run,
            Tag::Pause => &self.pause,
            Tag::Reset => &self.reset,
        }
    }

    /// Reverse lookup for pushed changes.
    pub fn resolve(&self, address: &str) -> Option<Tag> {
        Tag::ALL.into_iter().find(|t| self.address(*t) == address)
    }

    /// Every address must be non-empty and unique.
    pub fn validate(&self) -> Result<(), &'static str> {
        for (i, a) in Tag::ALL.iter().enumerate() {
            let addr = self.address(*a);
            if addr.trim().is_empty() {
                return Err("tag address must not be empty");
            }
            if Tag::ALL[i + 1..].iter().any(|b| self.address(*b) == addr) {
                return Err("tag addresses must be unique");
            }
        }
        Ok(())
    }
}
