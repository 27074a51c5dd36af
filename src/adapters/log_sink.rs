//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every change event to the `log`
//! facade.  Useful on its own during commissioning and as the fallback
//! when no bus is configured.

use log::{info, warn};

use crate::alarms::Severity;
use crate::app::events::ChangeEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`ChangeEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &ChangeEvent) {
        match event {
            ChangeEvent::StateChanged(s) => {
                info!(
                    "STATE | {} | speed={:.1}m/min | pieces={} | P={:.1}kW | \
                     T={:.1}\u{00b0}C | wear={:.0}% | barrier={} | material={}",
                    s.state.as_str(),
                    s.cutting_speed,
                    s.pieces_cut,
                    s.power_consumption,
                    s.temperature,
                    s.blade_wear,
                    if s.safety_barrier { "closed" } else { "OPEN" },
                    s.current_material.canonical_name(),
                );
            }
            ChangeEvent::AlertChanged(a) if a.active => match a.severity {
                Severity::Critical => warn!("ALERT | {} raised: {}", a.rule, a.message),
                _ => info!("ALERT | {} raised: {}", a.rule, a.message),
            },
            ChangeEvent::AlertChanged(a) => info!("ALERT | {} cleared", a.rule),
            ChangeEvent::MetricsUpdated(m) => {
                log::debug!(
                    "METRIC | P={:.1}kW speed={:.1} T={:.1}",
                    m.power,
                    m.speed,
                    m.temperature
                );
            }
            ChangeEvent::CommandExecuted { command, state } => {
                info!("CMD | {} executed in {}", command.as_str(), state.as_str());
            }
            ChangeEvent::SessionChanged(s) => info!("SESSION | {:?}", s),
        }
    }
}
