//! Outbound change events.
//!
//! The [`Orchestrator`](super::service::Orchestrator) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log them, publish them on the bus,
//! record them in a test.

use serde::Serialize;

use crate::alarms::Alert;
use crate::app::commands::CommandName;
use crate::machine::{MachineState, MachineStatus};
use crate::metrics::MetricSample;
use crate::protocol::session::SessionState;

/// Structured events emitted by the gateway core.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A new snapshot was published.
    StateChanged(MachineState),

    /// An alert was raised or cleared.
    AlertChanged(Alert),

    /// A sample was appended to the metrics window.
    MetricsUpdated(MetricSample),

    /// The machine accepted an operator command.
    CommandExecuted { command: CommandName, state: MachineStatus },

    /// The protocol session changed state.
    SessionChanged(SessionState),
}

impl ChangeEvent {
    /// Bus topic suffix, appended to the configured prefix.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::StateChanged(_) | Self::CommandExecuted { .. } => "state",
            Self::AlertChanged(_) => "alerts",
            Self::MetricsUpdated(_) => "metrics",
            Self::SessionChanged(_) => "session",
        }
    }
}
