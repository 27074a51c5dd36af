//! Port traits: the hexagonal boundary between the gateway core and the
//! outside world.
//!
//! ```text
//!   TagEndpoint ──▶ ProtocolAdapter ──▶ Orchestrator ──▶ EventSink
//!                        ▲                   │
//!                        └──── TagWriter ◀───┘
//! ```
//!
//! Driven adapters (the machine endpoint, the bus, the clock) implement
//! these traits.  The core consumes them via generics or boxed trait
//! objects, so it never touches a socket directly.

use crate::error::ProtocolError;
use crate::protocol::tags::{Tag, TagChange, TagValue};

// ───────────────────────────────────────────────────────────────
// Machine endpoint (driven adapter: machine ↔ protocol adapter)
// ───────────────────────────────────────────────────────────────

/// One protocol session to the machine.
///
/// Implementations report a dropped session as
/// [`ProtocolError::SessionLost`]; any other error is taken to mean the
/// session is still usable.
pub trait TagEndpoint {
    /// Open the session.  Called again after every loss.
    fn connect(&mut self) -> Result<(), ProtocolError>;

    /// Close the session.  Must be safe to call when already closed.
    fn disconnect(&mut self);

    /// Read the current value at `address`.
    fn read(&mut self, address: &str) -> Result<TagValue, ProtocolError>;

    /// Drain changes the machine pushed since the last call, oldest first.
    fn poll_changes(&mut self) -> Result<Vec<TagChange>, ProtocolError>;

    /// Write `value` to `address` and wait for the machine's acknowledgement.
    fn write(&mut self, address: &str, value: &TagValue) -> Result<(), ProtocolError>;
}

// ───────────────────────────────────────────────────────────────
// Write side seen by the dispatcher
// ───────────────────────────────────────────────────────────────

/// The subset of the protocol adapter the command path needs.
///
/// Neither call notifies adapter subscribers: the caller is the core
/// itself, mid-command, and records any session loss on its own.  The
/// adapter announces that loss on its next poll or connect.
pub trait TagWriter {
    /// Whether a live session exists right now.
    fn is_connected(&self) -> bool;

    /// Issue one acknowledged write.
    fn write(&mut self, tag: Tag, value: TagValue) -> Result<(), ProtocolError>;

    /// Read `tag` straight from the machine, used to confirm what a write
    /// left behind.
    fn read_back(&mut self, tag: Tag) -> Result<TagValue, ProtocolError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink (driven adapter: core → bus / logging)
// ───────────────────────────────────────────────────────────────

/// The core emits [`ChangeEvent`](super::events::ChangeEvent)s through
/// this port.  Adapters decide where they go (log, message bus, test
/// recorder).  Delivery is at-most-once.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::ChangeEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Wall-clock source for alert and sample timestamps.
pub trait Clock {
    /// Milliseconds since the UNIX epoch.
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from configuration parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The document is not valid JSON for [`GatewayConfig`](crate::config::GatewayConfig).
    Corrupted(String),
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted(msg) => write!(f, "config corrupted: {}", msg),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
