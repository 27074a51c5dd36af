//! Alarm engine.
//!
//! Runs on **every published snapshot** and keeps a bitmask of active
//! rules plus one [`Alert`] entry per rule.  Any active critical rule
//! latches the engine into `alarm` (`error` for a hardware fault); the
//! orchestrator overrides the published run state with the latch.
//!
//! ## Alert lifecycle
//!
//! 1. A rule's raise condition holds: its bit is set, the alert goes
//!    active and a copy lands in the history.
//! 2. While **unlatched**, a warning clears itself once its clear
//!    condition holds (hysteresis: clear < raise).
//! 3. While **latched**, nothing clears on its own.  Only
//!    [`AlarmEngine::reset`] releases the latch, and it is refused while a
//!    critical condition is still live: a threshold past its clear level,
//!    or the barrier open on a running machine.
//!
//! A reset-clearable rule (a fault the machine latches itself) does not
//! block the reset, since the forwarded reset is what clears it.  `reset`
//! takes the input re-read after that write: a fault the machine still
//! reports stays active and latches again at once.

use core::fmt;

use heapless::HistoryBuffer;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::commands::CommandName;
use crate::config::{AlarmThresholds, ThresholdBand};
use crate::error::{InterlockReason, InterlockViolation};
use crate::machine::MachineStatus;

/// Transitions kept for history queries.
pub const ALERT_HISTORY_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u16)]
pub enum AlarmRule {
    PowerHigh = 0b0_0000_0001,
    PowerWarn = 0b0_0000_0010,
    TempHigh = 0b0_0000_0100,
    TempWarn = 0b0_0000_1000,
    BladeWearHigh = 0b0_0001_0000,
    BladeWearWarn = 0b0_0010_0000,
    HardwareFault = 0b0_0100_0000,
    BarrierOpen = 0b0_1000_0000,
    MachineAlarm = 0b1_0000_0000,
}

impl AlarmRule {
    pub const COUNT: usize = 9;

    pub const ALL: [AlarmRule; Self::COUNT] = [
        Self::PowerHigh,
        Self::PowerWarn,
        Self::TempHigh,
        Self::TempWarn,
        Self::BladeWearHigh,
        Self::BladeWearWarn,
        Self::HardwareFault,
        Self::BarrierOpen,
        Self::MachineAlarm,
    ];

    /// Return the bitmask for this rule.
    pub const fn mask(self) -> u16 {
        self as u16
    }

    fn index(self) -> usize {
        self.mask().trailing_zeros() as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PowerHigh => "power-high",
            Self::PowerWarn => "power-warn",
            Self::TempHigh => "temp-high",
            Self::TempWarn => "temp-warn",
            Self::BladeWearHigh => "blade-wear-high",
            Self::BladeWearWarn => "blade-wear-warn",
            Self::HardwareFault => "hardware-fault",
            Self::BarrierOpen => "barrier-open",
            Self::MachineAlarm => "machine-alarm",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::PowerWarn | Self::TempWarn | Self::BladeWearWarn => Severity::Warning,
            _ => Severity::Critical,
        }
    }

    /// Faults the machine latches itself; a forwarded reset clears them.
    pub fn reset_clearable(self) -> bool {
        matches!(self, Self::HardwareFault | Self::MachineAlarm | Self::BarrierOpen)
    }
}

impl fmt::Display for AlarmRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

// ---------------------------------------------------------------------------
// Alert
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub rule: AlarmRule,
    pub severity: Severity,
    pub message: String,
    /// Time of the last raise or clear (ms since the UNIX epoch).
    pub timestamp: u64,
    pub active: bool,
}

/// What the engine looks at.  Built by the state aggregator from raw tags.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlarmInput {
    pub power: f64,
    pub temperature: f64,
    pub blade_wear: f64,
    pub barrier_closed: bool,
    /// Machine reports `running`.
    pub running: bool,
    /// Machine reports `error`.
    pub fault_line: bool,
    /// Machine reports `alarm`.
    pub alarm_line: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct AlarmEngine {
    thresholds: AlarmThresholds,
    /// Active rule bitmask.
    active: u16,
    /// Last entry per rule; `None` until first raised.
    alerts: [Option<Alert>; AlarmRule::COUNT],
    latch: Option<MachineStatus>,
    history: HistoryBuffer<Alert, ALERT_HISTORY_LEN>,
}

impl AlarmEngine {
    pub fn new(thresholds: AlarmThresholds) -> Self {
        Self {
            thresholds,
            active: 0,
            alerts: Default::default(),
            latch: None,
            history: HistoryBuffer::new(),
        }
    }

    /// Evaluate every rule against `input`.  Returns the alerts whose
    /// `active` flag changed, in rule order.
    pub fn evaluate(&mut self, input: &AlarmInput, now_ms: u64) -> Vec<Alert> {
        let mut changed = Vec::new();
        let t = self.thresholds;

        for rule in AlarmRule::ALL {
            let raise = raise_condition(rule, input, &t);
            if raise {
                if !self.is_active(rule) {
                    changed.push(self.set(rule, input, now_ms));
                }
            } else if self.is_active(rule)
                && self.latch.is_none()
                && rule.severity() != Severity::Critical
                && clear_condition(rule, input, &t)
            {
                changed.push(self.clear(rule, now_ms));
            }
        }

        self.update_latch();
        changed
    }

    /// Refuse reset while an active critical rule's condition is still
    /// live.
    pub fn check_reset(&self, input: &AlarmInput) -> Result<(), InterlockViolation> {
        let state = self.latch.unwrap_or(MachineStatus::Inactive);
        let blocking: Vec<&'static str> = AlarmRule::ALL
            .into_iter()
            .filter(|r| r.severity() == Severity::Critical && self.is_active(*r))
            .filter(|r| blocks_reset(*r, input, &self.thresholds))
            .map(AlarmRule::as_str)
            .collect();

        if blocking.is_empty() {
            Ok(())
        } else {
            Err(InterlockViolation {
                command: CommandName::Reset,
                state,
                reason: InterlockReason::ConditionActive(blocking),
            })
        }
    }

    /// Clear every alert whose condition no longer holds, then release the
    /// latch.  Call only after [`check_reset`](Self::check_reset) passed
    /// and the machine accepted the reset write, with `input` re-read from
    /// the machine after it.  Whatever stays critical latches again.
    pub fn reset(&mut self, input: &AlarmInput, now_ms: u64) -> Vec<Alert> {
        let t = self.thresholds;
        let mut changed = Vec::new();
        for rule in AlarmRule::ALL {
            let gone = if rule.reset_clearable() {
                !raise_condition(rule, input, &t)
            } else {
                clear_condition(rule, input, &t)
            };
            if self.is_active(rule) && gone {
                changed.push(self.clear(rule, now_ms));
            }
        }
        if let Some(latched) = self.latch.take() {
            info!("ALARM LATCH RELEASED: was {}", latched.as_str());
        }
        self.update_latch();
        changed
    }

    /// `Some(Alarm | Error)` while latched.
    pub fn latch(&self) -> Option<MachineStatus> {
        self.latch
    }

    /// Active rule bitmask.
    pub fn active_mask(&self) -> u16 {
        self.active
    }

    pub fn is_active(&self, rule: AlarmRule) -> bool {
        self.active & rule.mask() != 0
    }

    /// Every rule that has ever been raised, one entry each.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.iter().flatten().cloned().collect()
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alerts.iter().flatten().filter(|a| a.active).cloned().collect()
    }

    /// Raise/clear transitions at or after `since_ms`, oldest first.
    pub fn history_since(&self, since_ms: u64) -> Vec<Alert> {
        self.history
            .oldest_ordered()
            .filter(|a| a.timestamp >= since_ms)
            .cloned()
            .collect()
    }

    // ── Internal ──────────────────────────────────────────────────

    fn set(&mut self, rule: AlarmRule, input: &AlarmInput, now_ms: u64) -> Alert {
        let alert = Alert {
            rule,
            severity: rule.severity(),
            message: message(rule, input),
            timestamp: now_ms,
            active: true,
        };
        match alert.severity {
            Severity::Critical => error!("ALARM SET: {rule} ({})", alert.message),
            _ => warn!("ALARM SET: {rule} ({})", alert.message),
        }
        self.active |= rule.mask();
        self.record(alert)
    }

    fn clear(&mut self, rule: AlarmRule, now_ms: u64) -> Alert {
        info!("ALARM CLEARED: {rule}");
        self.active &= !rule.mask();
        let alert = match self.alerts[rule.index()].take() {
            Some(prev) => Alert { timestamp: now_ms, active: false, ..prev },
            None => Alert {
                rule,
                severity: rule.severity(),
                message: String::new(),
                timestamp: now_ms,
                active: false,
            },
        };
        self.record(alert)
    }

    fn record(&mut self, alert: Alert) -> Alert {
        self.history.write(alert.clone());
        self.alerts[alert.rule.index()] = Some(alert.clone());
        alert
    }

    /// The latch only ever escalates between resets.
    fn update_latch(&mut self) {
        let critical = AlarmRule::ALL
            .into_iter()
            .any(|r| r.severity() == Severity::Critical && self.is_active(r));
        if !critical {
            return;
        }
        let target = if self.is_active(AlarmRule::HardwareFault) {
            MachineStatus::Error
        } else {
            MachineStatus::Alarm
        };
        if self.latch != Some(target) && self.latch != Some(MachineStatus::Error) {
            error!("ALARM LATCHED: {}", target.as_str());
            self.latch = Some(target);
        }
    }
}

fn raise_condition(rule: AlarmRule, input: &AlarmInput, t: &AlarmThresholds) -> bool {
    let critical = |v: f64, b: &ThresholdBand| v >= b.critical;
    let warning = |v: f64, b: &ThresholdBand| v >= b.warn && v < b.critical;
    match rule {
        AlarmRule::PowerHigh => critical(input.power, &t.power),
        AlarmRule::PowerWarn => warning(input.power, &t.power),
        AlarmRule::TempHigh => critical(input.temperature, &t.temperature),
        AlarmRule::TempWarn => warning(input.temperature, &t.temperature),
        AlarmRule::BladeWearHigh => critical(input.blade_wear, &t.blade_wear),
        AlarmRule::BladeWearWarn => warning(input.blade_wear, &t.blade_wear),
        AlarmRule::HardwareFault => input.fault_line,
        AlarmRule::BarrierOpen => !input.barrier_closed && (input.running || input.alarm_line),
        AlarmRule::MachineAlarm => input.alarm_line,
    }
}

fn clear_condition(rule: AlarmRule, input: &AlarmInput, t: &AlarmThresholds) -> bool {
    match rule {
        AlarmRule::PowerHigh | AlarmRule::PowerWarn => input.power < t.power.clear,
        AlarmRule::TempHigh | AlarmRule::TempWarn => input.temperature < t.temperature.clear,
        AlarmRule::BladeWearHigh | AlarmRule::BladeWearWarn => {
            input.blade_wear < t.blade_wear.clear
        }
        AlarmRule::HardwareFault => !input.fault_line,
        AlarmRule::BarrierOpen => input.barrier_closed,
        AlarmRule::MachineAlarm => !input.alarm_line,
    }
}

/// A machine-latched fault is cleared by the reset write itself, except an
/// open barrier on a machine that is still cutting.
fn blocks_reset(rule: AlarmRule, input: &AlarmInput, t: &AlarmThresholds) -> bool {
    match rule {
        AlarmRule::HardwareFault | AlarmRule::MachineAlarm => false,
        AlarmRule::BarrierOpen => !input.barrier_closed && input.running,
        _ => !clear_condition(rule, input, t),
    }
}

fn message(rule: AlarmRule, input: &AlarmInput) -> String {
    match rule {
        AlarmRule::PowerHigh => format!("Critical power consumption: {:.1} kW", input.power),
        AlarmRule::PowerWarn => format!("High power consumption: {:.1} kW", input.power),
        AlarmRule::TempHigh => format!("Temperature critically high: {:.1}°C", input.temperature),
        AlarmRule::TempWarn => format!("Temperature elevated: {:.1}°C", input.temperature),
        AlarmRule::BladeWearHigh => {
            format!("Blade wear critical at {:.0}%, replacement needed", input.blade_wear)
        }
        AlarmRule::BladeWearWarn => {
            format!("Blade wear high at {:.0}%, plan replacement", input.blade_wear)
        }
        AlarmRule::HardwareFault => "Machine reports a hardware fault".into(),
        AlarmRule::BarrierOpen => "Machine running with safety barrier open".into(),
        AlarmRule::MachineAlarm => "Machine reports an alarm condition".into(),
    }
}
