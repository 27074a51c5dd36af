//! Protocol adapter: the one live session to the machine endpoint.
//!
//! Wraps a [`TagEndpoint`] and owns everything about the session:
//! connect, full re-read on (re)connect, change polling, acknowledged
//! writes and the reconnect policy.  Subscribers are told about every tag
//! value it sees and every session state change.
//!
//! ## Reconnection policy
//!
//! On loss the adapter goes `Degraded { attempt: 0 }`.  Each failed
//! reconnect bumps `attempt` and the caller waits [`Backoff::next_delay`]
//! (initial → 2× … capped) before the next try.  A successful connect
//! resets the backoff.  Writes while not connected fail immediately with
//! [`ProtocolError::Unavailable`].

use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{TagEndpoint, TagWriter};
use crate::error::ProtocolError;
use crate::protocol::tags::{RawSnapshot, Tag, TagMap, TagValue};

// ───────────────────────────────────────────────────────────────
// Session state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// Session lost; `attempt` reconnects have failed since.
    Degraded { attempt: u32 },
}

impl SessionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

/// What subscribers receive.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    Tag(Tag, TagValue),
    Session(SessionState),
}

pub type Subscriber = Box<dyn FnMut(&AdapterEvent)>;

// ───────────────────────────────────────────────────────────────
// Backoff
// ───────────────────────────────────────────────────────────────

/// Doubling reconnect delay with a cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max, current: initial }
    }

    /// The delay to wait now; doubles the one after it.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct ProtocolAdapter<E> {
    endpoint: E,
    tags: TagMap,
    state: SessionState,
    backoff: Backoff,
    subscribers: Vec<Subscriber>,
    /// A loss seen by `write`/`read_back` that subscribers have not been
    /// told about yet.
    unannounced: bool,
}

impl<E: TagEndpoint> ProtocolAdapter<E> {
    pub fn new(endpoint: E, tags: TagMap, backoff: Backoff) -> Self {
        Self {
            endpoint,
            tags,
            state: SessionState::Disconnected,
            backoff,
            subscribers: Vec::new(),
            unannounced: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Register a callback for every tag value and session change.
    pub fn subscribe(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    /// Open the session and rebuild state from a full read.
    ///
    /// Subscribers see every tag value first, then `Connected`.  On
    /// failure the session is `Degraded` with `attempt` bumped.  On a live
    /// session this only re-reads.
    pub fn connect(&mut self) -> Result<RawSnapshot, ProtocolError> {
        self.announce_pending();
        let attempt = match self.state {
            SessionState::Connected => {
                debug!("SESSION | already connected, refreshing");
                return self.read_all();
            }
            SessionState::Degraded { attempt } => attempt,
            _ => 0,
        };

        info!("SESSION | connecting (attempt {})", attempt + 1);
        self.state = SessionState::Connecting;

        let result = self.endpoint.connect().and_then(|()| self.read_all());
        match result {
            Ok(raw) => {
                self.backoff.reset();
                self.set_state(SessionState::Connected);
                info!("SESSION | connected, {} tags read", raw.iter().count());
                Ok(raw)
            }
            Err(e) => {
                error!("SESSION | connect failed: {e}");
                self.endpoint.disconnect();
                self.set_state(SessionState::Degraded { attempt: attempt + 1 });
                Err(e)
            }
        }
    }

    /// Read every subscribed tag and hand each value to subscribers.
    /// A tag that fails on a healthy session is skipped with a warning.
    pub fn read_all(&mut self) -> Result<RawSnapshot, ProtocolError> {
        let mut raw = RawSnapshot::default();
        for tag in Tag::SUBSCRIBED {
            match self.endpoint.read(self.tags.address(tag)) {
                Ok(value) => {
                    raw.set(tag, value.clone());
                    self.notify(&AdapterEvent::Tag(tag, value));
                }
                Err(e) if e.is_session_loss() => return Err(e),
                Err(e) => warn!("SESSION | read {} failed: {e}", tag.name()),
            }
        }
        Ok(raw)
    }

    /// Drain pushed changes in arrival order.  Returns how many were
    /// dispatched.  A session loss degrades the adapter.
    pub fn poll(&mut self) -> Result<usize, ProtocolError> {
        self.announce_pending();
        if !self.state.is_connected() {
            return Err(ProtocolError::Unavailable);
        }
        let changes = match self.endpoint.poll_changes() {
            Ok(changes) => changes,
            Err(e) => {
                if e.is_session_loss() {
                    self.mark_degraded(&e);
                }
                return Err(e);
            }
        };

        let mut dispatched = 0;
        for change in changes {
            match self.tags.resolve(&change.address) {
                Some(tag) => {
                    self.notify(&AdapterEvent::Tag(tag, change.value));
                    dispatched += 1;
                }
                None => warn!("SESSION | ignoring change for unknown address {}", change.address),
            }
        }
        Ok(dispatched)
    }

    /// Drop the session and tell subscribers.
    pub fn mark_degraded(&mut self, cause: &ProtocolError) {
        if matches!(self.state, SessionState::Degraded { .. }) {
            return;
        }
        warn!("SESSION | lost: {cause}, entering reconnect");
        self.endpoint.disconnect();
        self.set_state(SessionState::Degraded { attempt: 0 });
    }

    /// Delay before the next reconnect attempt.
    pub fn next_retry_delay(&mut self) -> Duration {
        self.backoff.next_delay()
    }

    pub fn disconnect(&mut self) {
        self.endpoint.disconnect();
        self.set_state(SessionState::Disconnected);
        info!("SESSION | disconnected");
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Record a loss without notifying; see [`TagWriter`].
    fn degrade_quietly(&mut self, cause: &ProtocolError) {
        warn!("SESSION | lost during command: {cause}");
        self.endpoint.disconnect();
        self.state = SessionState::Degraded { attempt: 0 };
        self.unannounced = true;
    }

    fn announce_pending(&mut self) {
        if std::mem::take(&mut self.unannounced) {
            let state = self.state;
            self.notify(&AdapterEvent::Session(state));
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            self.state = next;
            self.notify(&AdapterEvent::Session(next));
        }
    }

    fn notify(&mut self, event: &AdapterEvent) {
        for subscriber in self.subscribers.iter_mut() {
            subscriber(event);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// TagWriter
// ───────────────────────────────────────────────────────────────

impl<E: TagEndpoint> TagWriter for ProtocolAdapter<E> {
    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// On session loss the state moves to `Degraded` without notifying;
    /// subscribers hear about it on the next `poll` or `connect`.
    fn write(&mut self, tag: Tag, value: TagValue) -> Result<(), ProtocolError> {
        if !self.state.is_connected() {
            return Err(ProtocolError::Unavailable);
        }
        if !tag.is_writable() {
            return Err(ProtocolError::NotWritable(tag));
        }
        let address = self.tags.address(tag);
        info!("SESSION | write {} = {:?}", tag.name(), value);
        self.endpoint.write(address, &value).inspect_err(|e| {
            if e.is_session_loss() {
                self.degrade_quietly(e);
            }
        })
    }

    fn read_back(&mut self, tag: Tag) -> Result<TagValue, ProtocolError> {
        if !self.state.is_connected() {
            return Err(ProtocolError::Unavailable);
        }
        let address = self.tags.address(tag);
        self.endpoint.read(address).inspect_err(|e| {
            if e.is_session_loss() {
                self.degrade_quietly(e);
            }
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
