//! Message-bus adapter.
//!
//! Implements [`EventSink`] by rendering each change event as a
//! `(topic, json)` pair and handing it to a publisher closure, which owns
//! the actual client (MQTT, NATS, an in-process channel).  Topics follow
//! the `<prefix>state`, `<prefix>alerts`, `<prefix>metrics`,
//! `<prefix>session` layout; with `per_field` enabled every snapshot field
//! is also published on `<prefix>state/<field>`.
//!
//! Inbound commands arrive on `<prefix>commands/<name>`; see
//! [`command_from_topic`].

use log::warn;
use serde::Serialize;
use serde_json::{Value, json};

use crate::adapters::time::SystemClock;
use crate::app::commands::{Command, CommandParameters, CommandRequest};
use crate::app::events::ChangeEvent;
use crate::app::ports::{Clock, EventSink};
use crate::error::ValidationError;

pub struct JsonEventSink<P> {
    prefix: String,
    publish: P,
    per_field: bool,
    clock: Box<dyn Clock + Send>,
}

impl<P> JsonEventSink<P>
where
    P: FnMut(&str, &str),
{
    pub fn new(prefix: impl Into<String>, publish: P) -> Self {
        Self { prefix: prefix.into(), publish, per_field: false, clock: Box::new(SystemClock) }
    }

    /// Also publish each snapshot field on its own topic.
    pub fn per_field(mut self, enabled: bool) -> Self {
        self.per_field = enabled;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    fn send(&mut self, topic: &str, payload: &Value) {
        let topic = format!("{}{}", self.prefix, topic);
        match serde_json::to_string(payload) {
            Ok(body) => (self.publish)(&topic, &body),
            Err(e) => warn!("BUS | could not encode {topic}: {e}"),
        }
    }

    fn envelope(&self, data: &impl Serialize) -> Value {
        json!({ "timestamp": self.clock.now_ms(), "data": data })
    }
}

impl<P> EventSink for JsonEventSink<P>
where
    P: FnMut(&str, &str),
{
    fn emit(&mut self, event: &ChangeEvent) {
        let topic = event.topic();
        match event {
            ChangeEvent::StateChanged(state) => {
                let payload = self.envelope(state);
                self.send(topic, &payload);
                if self.per_field {
                    let now = self.clock.now_ms();
                    if let Some(fields) = payload["data"].as_object() {
                        for (key, value) in fields {
                            let body = json!({ "timestamp": now, "value": value });
                            self.send(&format!("state/{key}"), &body);
                        }
                    }
                }
            }
            ChangeEvent::AlertChanged(alert) => {
                let payload = json!(alert);
                self.send(topic, &payload);
            }
            ChangeEvent::MetricsUpdated(sample) => {
                let payload = self.envelope(sample);
                self.send(topic, &payload);
            }
            ChangeEvent::CommandExecuted { .. } | ChangeEvent::SessionChanged(_) => {
                let payload = self.envelope(event);
                self.send(topic, &payload);
            }
        }
    }
}

/// Parse an inbound `<prefix>commands/<name>` message.  The payload is the
/// parameter object and may be empty.
pub fn command_from_topic(
    prefix: &str,
    topic: &str,
    payload: &[u8],
) -> Result<Command, ValidationError> {
    let name = topic
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix("commands/"))
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .ok_or_else(|| ValidationError::UnknownCommand(topic.to_string()))?;

    let parameters = if payload.iter().all(u8::is_ascii_whitespace) {
        CommandParameters::default()
    } else {
        serde_json::from_slice(payload).map_err(|e| ValidationError::Malformed(e.to_string()))?
    };

    Command::try_from(CommandRequest { command: name.to_string(), parameters })
}
