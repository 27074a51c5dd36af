//! Mock machine endpoint for integration tests.
//!
//! The endpoint handed to the gateway and the [`MachineHandle`] kept by the
//! test share one [`MockMachine`], so a test can push tag changes, drop the
//! session and inspect every write from outside the I/O thread.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use sawgate::alarms::Alert;
use sawgate::app::events::ChangeEvent;
use sawgate::app::ports::{Clock, EventSink, TagEndpoint};
use sawgate::error::ProtocolError;
use sawgate::protocol::tags::{Tag, TagChange, TagMap, TagValue};
use sawgate::GatewayConfig;

// ── Machine model ─────────────────────────────────────────────

pub struct MockMachine {
    pub online: bool,
    pub values: HashMap<String, TagValue>,
    pub pending: VecDeque<TagChange>,
    pub writes: Vec<(String, TagValue)>,
    pub write_delay: Duration,
    pub reject_writes: bool,
    /// Keep reporting `error` through a reset.
    pub persistent_fault: bool,
    pub connects: u32,
    reset_address: String,
    state_address: String,
}

impl MockMachine {
    fn new(tags: &TagMap) -> Self {
        let mut values = HashMap::new();
        let defaults = [
            (Tag::State, TagValue::Text("inactive".into())),
            (Tag::CuttingSpeed, TagValue::Float(0.0)),
            (Tag::PiecesCut, TagValue::UInt(0)),
            (Tag::PowerConsumption, TagValue::Float(0.0)),
            (Tag::Temperature, TagValue::Float(22.0)),
            (Tag::SafetyBarrier, TagValue::Bool(true)),
            (Tag::BladeWear, TagValue::Float(5.0)),
            (Tag::CurrentMaterial, TagValue::Text("Steel".into())),
        ];
        for (tag, value) in defaults {
            values.insert(tags.address(tag).to_string(), value);
        }
        Self {
            online: true,
            values,
            pending: VecDeque::new(),
            writes: Vec::new(),
            write_delay: Duration::ZERO,
            reject_writes: false,
            persistent_fault: false,
            connects: 0,
            reset_address: tags.address(Tag::Reset).to_string(),
            state_address: tags.address(Tag::State).to_string(),
        }
    }

    /// A reset stops the machine and clears its fault line, unless the
    /// fault persists.
    fn apply_reset(&mut self) {
        if self.persistent_fault {
            return;
        }
        let inactive = TagValue::Text("inactive".into());
        if self.values.get(&self.state_address) != Some(&inactive) {
            self.values.insert(self.state_address.clone(), inactive.clone());
            let change = TagChange::new(self.state_address.clone(), inactive);
            self.pending.push_back(change);
        }
    }
}

// ── Endpoint (moved into the gateway) ─────────────────────────

pub struct MockEndpoint {
    machine: Arc<Mutex<MockMachine>>,
    connected: bool,
}

impl TagEndpoint for MockEndpoint {
    fn connect(&mut self) -> Result<(), ProtocolError> {
        let mut m = self.machine.lock().unwrap();
        if !m.online {
            return Err(ProtocolError::SessionLost("connection refused".into()));
        }
        m.connects += 1;
        m.pending.clear();
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn read(&mut self, address: &str) -> Result<TagValue, ProtocolError> {
        let m = self.machine.lock().unwrap();
        if !m.online || !self.connected {
            return Err(ProtocolError::SessionLost("not connected".into()));
        }
        m.values
            .get(address)
            .cloned()
            .ok_or_else(|| ProtocolError::UnknownAddress(address.to_string()))
    }

    fn poll_changes(&mut self) -> Result<Vec<TagChange>, ProtocolError> {
        let mut m = self.machine.lock().unwrap();
        if !m.online || !self.connected {
            return Err(ProtocolError::SessionLost("connection reset".into()));
        }
        Ok(m.pending.drain(..).collect())
    }

    fn write(&mut self, address: &str, value: &TagValue) -> Result<(), ProtocolError> {
        let delay = self.machine.lock().unwrap().write_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut m = self.machine.lock().unwrap();
        if !m.online || !self.connected {
            return Err(ProtocolError::SessionLost("connection reset".into()));
        }
        if m.reject_writes {
            return Err(ProtocolError::Rejected {
                address: address.to_string(),
                reason: "BadUserAccessDenied".into(),
            });
        }
        m.writes.push((address.to_string(), value.clone()));
        if address == m.reset_address && *value == TagValue::Bool(true) {
            m.apply_reset();
        }
        Ok(())
    }
}

// ── Test-side handle ──────────────────────────────────────────

#[derive(Clone)]
pub struct MachineHandle {
    machine: Arc<Mutex<MockMachine>>,
    tags: TagMap,
}

#[allow(dead_code)]
impl MachineHandle {
    /// Update the machine's value and push it as a change.
    pub fn push(&self, tag: Tag, value: TagValue) {
        let address = self.tags.address(tag).to_string();
        let mut m = self.machine.lock().unwrap();
        m.values.insert(address.clone(), value.clone());
        m.pending.push_back(TagChange::new(address, value));
    }

    pub fn set_online(&self, online: bool) {
        self.machine.lock().unwrap().online = online;
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.machine.lock().unwrap().write_delay = delay;
    }

    pub fn set_reject_writes(&self, reject: bool) {
        self.machine.lock().unwrap().reject_writes = reject;
    }

    pub fn set_persistent_fault(&self, persistent: bool) {
        self.machine.lock().unwrap().persistent_fault = persistent;
    }

    /// Writes as `(tag, value)`, oldest first.
    pub fn writes(&self) -> Vec<(Tag, TagValue)> {
        let m = self.machine.lock().unwrap();
        m.writes
            .iter()
            .filter_map(|(addr, v)| self.tags.resolve(addr).map(|t| (t, v.clone())))
            .collect()
    }

    pub fn connects(&self) -> u32 {
        self.machine.lock().unwrap().connects
    }
}

pub fn mock_machine(tags: &TagMap) -> (MockEndpoint, MachineHandle) {
    let machine = Arc::new(Mutex::new(MockMachine::new(tags)));
    let endpoint = MockEndpoint { machine: machine.clone(), connected: false };
    (endpoint, MachineHandle { machine, tags: tags.clone() })
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingSink(pub Arc<Mutex<Vec<ChangeEvent>>>);

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn alert_changes(&self) -> Vec<Alert> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ChangeEvent::AlertChanged(a) => Some(a),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &ChangeEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

// ── Clock ─────────────────────────────────────────────────────

/// Clock that advances by one second on every read.
#[derive(Clone, Default)]
pub struct SteppingClock(pub Arc<Mutex<u64>>);

impl Clock for SteppingClock {
    fn now_ms(&self) -> u64 {
        let mut t = self.0.lock().unwrap();
        *t += 1_000;
        *t
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Fast timings so tests finish quickly.
pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        poll_interval_ms: 5,
        command_timeout_ms: 1_000,
        reconnect_initial_ms: 10,
        reconnect_max_ms: 40,
        ..GatewayConfig::default()
    }
}

/// Poll `cond` until it holds or two seconds pass.
pub fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for {what}");
}
