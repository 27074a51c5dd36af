//! Command dispatcher: one explicit transition table.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  TransitionTable                                             │
//! │  ┌────────────────┬──────────────────┬─────────┬──────────┐  │
//! │  │ CommandName    │ legal_from       │ guard   │ effect   │  │
//! │  ├────────────────┼──────────────────┼─────────┼──────────┤  │
//! │  │ start          │ inactive, paused │ barrier │ run=1    │  │
//! │  │ stop           │ running, paused  │ -       │ run=0    │  │
//! │  │ pause          │ running          │ -       │ pause=1  │  │
//! │  │ reset          │ alarm, error     │ -       │ Reset    │  │
//! │  │ toggle_barrier │ not latched      │ policy  │ !barrier │  │
//! │  │ set_material   │ not latched      │ policy  │ material │  │
//! │  └────────────────┴──────────────────┴─────────┴──────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Dispatcher::validate`] checks the command against the **current
//! published snapshot** and returns the effect to perform.  It never
//! writes: a refused command leaves the machine untouched.

pub mod table;

use log::{info, warn};

use crate::app::commands::{Command, CommandName};
use crate::config::InterlockPolicy;
use crate::error::{InterlockReason, InterlockViolation};
use crate::machine::{MachineState, MachineStatus};
use crate::protocol::tags::{Tag, TagValue};

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Extra interlock beyond the legal-state check.  `Some(reason)` refuses.
pub type GuardFn = fn(&MachineState, &InterlockPolicy) -> Option<InterlockReason>;

/// What a legal command does.
pub type EffectFn = fn(&Command, &MachineState) -> Effect;

/// The protocol action for an accepted command.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// One acknowledged tag write.
    Write(Tag, TagValue),
    /// Alarm reset: validated against the alarm engine, then `reset=true`.
    Reset,
}

// ---------------------------------------------------------------------------
// Rule descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct TransitionRule {
    pub command: CommandName,
    pub legal_from: &'static [MachineStatus],
    pub guard: Option<GuardFn>,
    pub effect: EffectFn,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    /// Fixed-size table indexed by `CommandName as usize`.
    table: [TransitionRule; CommandName::COUNT],
    policy: InterlockPolicy,
}

impl Dispatcher {
    pub fn new(policy: InterlockPolicy) -> Self {
        Self { table: table::build_transition_table(), policy }
    }

    pub fn rule(&self, command: CommandName) -> &TransitionRule {
        &self.table[command.index()]
    }

    /// Whether `command` may be issued from `status`, ignoring guards.
    pub fn is_legal(&self, command: CommandName, status: MachineStatus) -> bool {
        self.rule(command).legal_from.contains(&status)
    }

    /// Validate `command` against `current`; returns the effect to apply.
    pub fn validate(
        &self,
        command: &Command,
        current: &MachineState,
    ) -> Result<Effect, InterlockViolation> {
        let name = command.name();
        let rule = self.rule(name);
        let refuse = |reason: InterlockReason| {
            warn!(
                "DISPATCH: {} refused in {}: {:?}",
                name.as_str(),
                current.state.as_str(),
                reason
            );
            InterlockViolation { command: name, state: current.state, reason }
        };

        if !rule.legal_from.contains(&current.state) {
            return Err(refuse(InterlockReason::IllegalTransition));
        }
        if let Some(reason) = rule.guard.and_then(|g| g(current, &self.policy)) {
            return Err(refuse(reason));
        }

        if name == CommandName::ToggleBarrier && current.state == MachineStatus::Running {
            warn!("DISPATCH: toggling safety barrier while cutting");
        }
        info!("DISPATCH: {} accepted in {}", name.as_str(), current.state.as_str());
        Ok((rule.effect)(command, current))
    }
}
