//! Orchestrator, the hexagonal core.
//!
//! [`Orchestrator`] owns the state aggregator, alarm engine, metrics
//! window and command dispatcher.  It is driven entirely by calls: tag
//! values and session changes from the protocol adapter, commands from the
//! dispatch task.  All I/O flows through port traits, so the whole core is
//! testable with a fake writer and a manual clock.
//!
//! ```text
//!  ProtocolAdapter ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!   (AdapterEvent)     │         Orchestrator         │
//!        TagWriter ◀── │ Aggregator · Alarms · Metrics│ ──▶ Views
//!                      │          Dispatcher          │
//!                      └──────────────────────────────┘
//! ```
//!
//! The published snapshot is the aggregator's view of the machine with the
//! run state overridden by the alarm latch.  That override is the only way
//! `alarm` or `error` reaches a reader.

use std::sync::Arc;

use log::{info, warn};

use crate::alarms::{AlarmEngine, Alert, ALERT_HISTORY_LEN};
use crate::config::GatewayConfig;
use crate::dispatch::{Dispatcher, Effect};
use crate::error::{GatewayError, ProtocolError};
use crate::machine::{MachineState, MachineStatus};
use crate::metrics::{MetricSample, MetricsBuffer};
use crate::protocol::session::{AdapterEvent, SessionState};
use crate::protocol::tags::{Tag, TagValue};

use super::commands::{Command, CommandAck};
use super::events::ChangeEvent;
use super::ports::{Clock, EventSink, TagWriter};
use super::views::Views;

// ───────────────────────────────────────────────────────────────
// Orchestrator
// ───────────────────────────────────────────────────────────────

pub struct Orchestrator {
    aggregator: crate::state::StateAggregator,
    alarms: AlarmEngine,
    metrics: MetricsBuffer,
    dispatcher: Dispatcher,
    views: Arc<Views>,
    sink: Box<dyn EventSink + Send>,
    clock: Box<dyn Clock + Send>,
    /// Last snapshot handed to readers.
    published: Option<MachineState>,
    session: SessionState,
}

impl Orchestrator {
    pub fn new(
        config: &GatewayConfig,
        views: Arc<Views>,
        sink: Box<dyn EventSink + Send>,
        clock: Box<dyn Clock + Send>,
    ) -> Self {
        Self {
            aggregator: crate::state::StateAggregator::new(),
            alarms: AlarmEngine::new(config.thresholds),
            metrics: MetricsBuffer::new(),
            dispatcher: Dispatcher::new(config.interlocks),
            views,
            sink,
            clock,
            published: None,
            session: SessionState::Disconnected,
        }
    }

    // ── Read path ─────────────────────────────────────────────

    /// Subscriber entry point for the protocol adapter.
    pub fn on_adapter_event(&mut self, event: &AdapterEvent) {
        match event {
            AdapterEvent::Tag(tag, value) => self.on_tag(*tag, value),
            AdapterEvent::Session(state) => self.on_session(*state),
        }
    }

    /// Fold one tag value in and republish if anything moved.
    pub fn on_tag(&mut self, tag: Tag, value: &TagValue) {
        if self.aggregator.apply(tag, value).is_some() {
            let now = self.clock.now_ms();
            let input = self.aggregator.alarm_input();
            let changed = self.alarms.evaluate(&input, now);
            self.publish(changed, now);
        }
    }

    pub fn on_session(&mut self, state: SessionState) {
        if self.session == state {
            return;
        }
        match state {
            SessionState::Connected => info!("CORE: session live"),
            SessionState::Degraded { attempt } => {
                warn!("CORE: session degraded (attempt {attempt}), reads of state unavailable");
            }
            _ => {}
        }
        self.session = state;
        self.views.update(|p| p.session = state);
        self.sink.emit(&ChangeEvent::SessionChanged(state));
    }

    // ── Write path ────────────────────────────────────────────

    /// Validate `command` against the current snapshot and, only if legal,
    /// perform its write.  Refusals never touch `writer`.
    pub fn handle_command(
        &mut self,
        command: Command,
        writer: &mut impl TagWriter,
    ) -> Result<CommandAck, GatewayError> {
        if !writer.is_connected() {
            return Err(GatewayError::ServiceUnavailable);
        }
        let current = self.published.ok_or(GatewayError::ServiceUnavailable)?;
        let effect = self.dispatcher.validate(&command, &current)?;

        let state = match effect {
            Effect::Write(tag, value) => {
                self.write(writer, tag, value)?;
                current.state
            }
            Effect::Reset => {
                self.alarms.check_reset(&self.aggregator.alarm_input())?;
                self.write(writer, Tag::Reset, TagValue::Bool(true))?;

                // Judge the reset on what the machine reports after it.
                self.read_back(writer, &[Tag::State, Tag::SafetyBarrier]);
                let now = self.clock.now_ms();
                let input = self.aggregator.alarm_input();
                let mut changed = self.alarms.reset(&input, now);
                changed.extend(self.alarms.evaluate(&input, now));
                self.publish(changed, now);
                self.published.map_or(MachineStatus::Inactive, |s| s.state)
            }
        };

        let ack = CommandAck { command: command.name(), state };
        info!("CORE: {} executed, state {}", ack.command.as_str(), ack.state.as_str());
        self.sink.emit(&ChangeEvent::CommandExecuted { command: ack.command, state: ack.state });
        Ok(ack)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn published(&self) -> Option<MachineState> {
        self.published
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn alarms(&self) -> &AlarmEngine {
        &self.alarms
    }

    pub fn metrics(&self) -> &MetricsBuffer {
        &self.metrics
    }

    // ── Internal ──────────────────────────────────────────────

    fn write(
        &mut self,
        writer: &mut impl TagWriter,
        tag: Tag,
        value: TagValue,
    ) -> Result<(), GatewayError> {
        writer.write(tag, value).map_err(|e| {
            if e.is_session_loss() {
                self.on_session(SessionState::Degraded { attempt: 0 });
            }
            match e {
                ProtocolError::Unavailable => GatewayError::ServiceUnavailable,
                other => GatewayError::Protocol(other),
            }
        })
    }

    /// Fold fresh machine values in without publishing.  A failed read
    /// keeps the last known value.
    fn read_back(&mut self, writer: &mut impl TagWriter, tags: &[Tag]) {
        for &tag in tags {
            match writer.read_back(tag) {
                Ok(value) => {
                    self.aggregator.apply(tag, &value);
                }
                Err(e) => {
                    warn!("CORE: read-back of {} failed: {e}", tag.name());
                    if e.is_session_loss() {
                        self.on_session(SessionState::Degraded { attempt: 0 });
                    }
                }
            }
        }
    }

    /// Apply the latch and hand the result to the sink and the views.
    fn publish(&mut self, changed: Vec<Alert>, now: u64) {
        let raw = self.aggregator.current();
        let status = match self.alarms.latch() {
            Some(latched) => latched,
            None if raw.state.is_latched() => MachineStatus::Inactive,
            None => raw.state,
        };
        let snapshot = raw.with_status(status);

        for alert in &changed {
            self.sink.emit(&ChangeEvent::AlertChanged(alert.clone()));
        }

        let state_changed = self.published != Some(snapshot);
        if state_changed {
            self.published = Some(snapshot);
            let sample = MetricSample::from_state(&snapshot, now);
            self.metrics.push(sample);
            self.sink.emit(&ChangeEvent::StateChanged(snapshot));
            self.sink.emit(&ChangeEvent::MetricsUpdated(sample));
        }

        if !state_changed && changed.is_empty() {
            return;
        }
        let alerts = self.alarms.alerts();
        let history = self.alarms.history_since(0);
        debug_assert!(history.len() <= ALERT_HISTORY_LEN);
        let metrics = self.metrics.snapshot();
        let summary = self.metrics.summary(snapshot.pieces_cut);
        self.views.update(|p| {
            p.state = Some(snapshot);
            p.alerts = alerts;
            p.history = history;
            p.metrics = metrics;
            p.summary = summary;
        });
    }
}
