//! State aggregator.
//!
//! The only place raw tag values become domain types.  Every change is
//! folded into the latest [`RawSnapshot`] and a fresh [`MachineState`] is
//! derived; callers get `Some(snapshot)` only when a field actually moved.

use log::{debug, warn};

use crate::alarms::AlarmInput;
use crate::error::ProtocolError;
use crate::machine::{MachineState, MachineStatus, Material};
use crate::protocol::tags::{RawSnapshot, Tag, TagValue};

pub struct StateAggregator {
    raw: RawSnapshot,
    /// Snapshot as the machine reports it (no alarm latch applied).
    current: MachineState,
    seen: bool,
}

impl Default for StateAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StateAggregator {
    pub fn new() -> Self {
        Self { raw: RawSnapshot::default(), current: MachineState::default(), seen: false }
    }

    /// Fold one tag change in.  Returns the new snapshot if any field
    /// changed.  Values of the wrong type are logged and dropped.
    pub fn apply(&mut self, tag: Tag, value: &TagValue) -> Option<MachineState> {
        let mut next = self.current;
        if let Err(e) = decode_into(&mut next, tag, value) {
            warn!("STATE | dropping {}: {e}", tag.name());
            return None;
        }
        self.raw.set(tag, value.clone());
        self.seen = true;

        if next.pieces_cut < self.current.pieces_cut {
            warn!(
                "STATE | piece counter went backwards ({} -> {}), keeping {}",
                self.current.pieces_cut, next.pieces_cut, self.current.pieces_cut
            );
            next.pieces_cut = self.current.pieces_cut;
        }

        if next == self.current {
            return None;
        }
        debug!("STATE | {} -> {:?}", tag.name(), value);
        self.current = next;
        Some(next)
    }

    pub fn current(&self) -> MachineState {
        self.current
    }

    pub fn raw(&self) -> &RawSnapshot {
        &self.raw
    }

    /// True once at least one tag value has been accepted.
    pub fn has_snapshot(&self) -> bool {
        self.seen
    }

    pub fn alarm_input(&self) -> AlarmInput {
        let s = &self.current;
        AlarmInput {
            power: s.power_consumption,
            temperature: s.temperature,
            blade_wear: s.blade_wear,
            barrier_closed: s.safety_barrier,
            running: s.state == MachineStatus::Running,
            fault_line: s.state == MachineStatus::Error,
            alarm_line: s.state == MachineStatus::Alarm,
        }
    }
}

fn decode_into(state: &mut MachineState, tag: Tag, value: &TagValue) -> Result<(), ProtocolError> {
    let mismatch = |expected| ProtocolError::TypeMismatch { tag, expected };
    match tag {
        Tag::State => {
            let raw = value.as_str().ok_or(mismatch("text"))?;
            match MachineStatus::parse(raw) {
                Some(status) => state.state = status,
                None => {
                    warn!("STATE | unknown run state {raw:?}, keeping {}", state.state.as_str());
                }
            }
        }
        Tag::CuttingSpeed => state.cutting_speed = finite(value).ok_or(mismatch("number"))?,
        Tag::PiecesCut => state.pieces_cut = value.as_u32().ok_or(mismatch("unsigned"))?,
        Tag::PowerConsumption => {
            state.power_consumption = finite(value).ok_or(mismatch("number"))?;
        }
        Tag::Temperature => state.temperature = finite(value).ok_or(mismatch("number"))?,
        Tag::SafetyBarrier => state.safety_barrier = value.as_bool().ok_or(mismatch("bool"))?,
        Tag::BladeWear => {
            state.blade_wear = finite(value).ok_or(mismatch("number"))?.clamp(0.0, 100.0);
        }
        Tag::CurrentMaterial => {
            let raw = value.as_str().ok_or(mismatch("text"))?;
            match Material::parse(raw) {
                Some(m) => state.current_material = m,
                None => warn!("STATE | unknown material {raw:?}, ignoring"),
            }
        }
        // Command tags echo back what was written; they carry no state.
        Tag::Run | Tag::Pause | Tag::Reset => {}
    }
    Ok(())
}

fn finite(value: &TagValue) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}
