//! Concrete command rules and table builder.
//!
//! Each command is defined by its legal source states, an optional guard
//! and an effect, all plain `fn` pointers.
//!
//! ```text
//!  INACTIVE ──start──▶ RUNNING ──pause──▶ PAUSED
//!     ▲                  │  ▲               │
//!     │                 stop └────start─────┤
//!     └──────────────────┴──────stop────────┘
//!
//!  critical alert ──▶ ALARM / ERROR ──reset──▶ INACTIVE
//! ```

use super::{Effect, TransitionRule};
use crate::app::commands::{Command, CommandName};
use crate::config::InterlockPolicy;
use crate::error::InterlockReason;
use crate::machine::{MachineState, MachineStatus};
use crate::protocol::tags::{Tag, TagValue};

use MachineStatus::{Alarm, Error, Inactive, Paused, Running};

const NOT_LATCHED: &[MachineStatus] = &[Inactive, Running, Paused];

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static transition table, indexed by `CommandName as usize`.
pub fn build_transition_table() -> [TransitionRule; CommandName::COUNT] {
    [
        // Index 0: start
        TransitionRule {
            command: CommandName::Start,
            legal_from: &[Inactive, Paused],
            guard: Some(start_guard),
            effect: start_effect,
        },
        // Index 1: stop
        TransitionRule {
            command: CommandName::Stop,
            legal_from: &[Running, Paused],
            guard: None,
            effect: stop_effect,
        },
        // Index 2: pause
        TransitionRule {
            command: CommandName::Pause,
            legal_from: &[Running],
            guard: None,
            effect: pause_effect,
        },
        // Index 3: reset
        TransitionRule {
            command: CommandName::Reset,
            legal_from: &[Alarm, Error],
            guard: None,
            effect: reset_effect,
        },
        // Index 4: toggle_barrier
        TransitionRule {
            command: CommandName::ToggleBarrier,
            legal_from: NOT_LATCHED,
            guard: Some(barrier_guard),
            effect: barrier_effect,
        },
        // Index 5: set_material
        TransitionRule {
            command: CommandName::SetMaterial,
            legal_from: NOT_LATCHED,
            guard: Some(material_guard),
            effect: material_effect,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Guards
// ═══════════════════════════════════════════════════════════════════════════

fn start_guard(state: &MachineState, _policy: &InterlockPolicy) -> Option<InterlockReason> {
    (!state.safety_barrier).then_some(InterlockReason::BarrierOpen)
}

fn barrier_guard(state: &MachineState, policy: &InterlockPolicy) -> Option<InterlockReason> {
    (policy.block_barrier_while_running && state.state == Running)
        .then_some(InterlockReason::BlockedWhileRunning)
}

fn material_guard(state: &MachineState, policy: &InterlockPolicy) -> Option<InterlockReason> {
    (policy.block_material_while_running && state.state == Running)
        .then_some(InterlockReason::BlockedWhileRunning)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Effects
// ═══════════════════════════════════════════════════════════════════════════

fn start_effect(_cmd: &Command, _state: &MachineState) -> Effect {
    Effect::Write(Tag::Run, TagValue::Bool(true))
}

fn stop_effect(_cmd: &Command, _state: &MachineState) -> Effect {
    Effect::Write(Tag::Run, TagValue::Bool(false))
}

fn pause_effect(_cmd: &Command, _state: &MachineState) -> Effect {
    Effect::Write(Tag::Pause, TagValue::Bool(true))
}

fn reset_effect(_cmd: &Command, _state: &MachineState) -> Effect {
    Effect::Reset
}

fn barrier_effect(_cmd: &Command, state: &MachineState) -> Effect {
    Effect::Write(Tag::SafetyBarrier, TagValue::Bool(!state.safety_barrier))
}

fn material_effect(cmd: &Command, state: &MachineState) -> Effect {
    let material = match cmd {
        Command::SetMaterial(m) => *m,
        _ => state.current_material,
    };
    Effect::Write(Tag::CurrentMaterial, TagValue::Text(material.canonical_name().into()))
}
