//! Unified error types for the gateway core.
//!
//! A single [`GatewayError`] enum that every subsystem converts into, so the
//! facade sees one taxonomy regardless of which layer failed.  Alarm and
//! error machine states are *not* errors: they are ordinary values of
//! [`MachineStatus`](crate::machine::MachineStatus).

use core::fmt;

use crate::app::commands::CommandName;
use crate::machine::MachineStatus;
use crate::protocol::tags::Tag;

// ---------------------------------------------------------------------------
// Top-level gateway error
// ---------------------------------------------------------------------------

/// Every fallible facade operation funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The protocol session failed or the machine rejected a write.
    Protocol(ProtocolError),
    /// The command is illegal in the current machine state.
    InterlockViolation(InterlockViolation),
    /// The command or its parameters are malformed.
    Validation(ValidationError),
    /// There is no live protocol session.
    ServiceUnavailable,
    /// Command validation or the resulting write exceeded its bound.
    Timeout,
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::InterlockViolation(e) => write!(f, "interlock violation: {e}"),
            Self::Validation(e) => write!(f, "validation: {e}"),
            Self::ServiceUnavailable => write!(f, "service unavailable: no live machine session"),
            Self::Timeout => write!(f, "command timed out"),
        }
    }
}

impl std::error::Error for GatewayError {}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// No session: the adapter is degraded or has not connected yet.
    Unavailable,
    /// The session dropped while talking to the endpoint.
    SessionLost(String),
    /// The machine refused a write.
    Rejected { address: String, reason: String },
    /// An address is not part of the configured tag map.
    UnknownAddress(String),
    /// A value arrived with a type the tag cannot carry.
    TypeMismatch { tag: Tag, expected: &'static str },
    /// The tag is read-only.
    NotWritable(Tag),
}

impl ProtocolError {
    /// True when the error means the session itself is gone (as opposed to
    /// a single operation failing on a healthy session).
    pub fn is_session_loss(&self) -> bool {
        matches!(self, Self::SessionLost(_))
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "unavailable"),
            Self::SessionLost(reason) => write!(f, "session lost: {reason}"),
            Self::Rejected { address, reason } => {
                write!(f, "write to {address} rejected: {reason}")
            }
            Self::UnknownAddress(address) => write!(f, "unknown tag address {address}"),
            Self::TypeMismatch { tag, expected } => {
                write!(f, "tag {} expects a {expected} value", tag.name())
            }
            Self::NotWritable(tag) => write!(f, "tag {} is read-only", tag.name()),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<ProtocolError> for GatewayError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Interlock violations
// ---------------------------------------------------------------------------

/// A command was refused by the transition table or a safety interlock.
/// No protocol write is ever issued when this is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterlockViolation {
    pub command: CommandName,
    pub state: MachineStatus,
    pub reason: InterlockReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterlockReason {
    /// The command is not legal from the current state.
    IllegalTransition,
    /// `start` requested with the safety barrier open.
    BarrierOpen,
    /// Blocked by the configured running-state policy.
    BlockedWhileRunning,
    /// `reset` requested while these alarm conditions still hold.
    ConditionActive(Vec<&'static str>),
}

impl fmt::Display for InterlockViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} refused in state {}: ", self.command.as_str(), self.state.as_str())?;
        match &self.reason {
            InterlockReason::IllegalTransition => write!(f, "illegal transition"),
            InterlockReason::BarrierOpen => write!(f, "safety barrier is open"),
            InterlockReason::BlockedWhileRunning => write!(f, "blocked while running"),
            InterlockReason::ConditionActive(rules) => {
                write!(f, "conditions still active: {}", rules.join(", "))
            }
        }
    }
}

impl From<InterlockViolation> for GatewayError {
    fn from(e: InterlockViolation) -> Self {
        Self::InterlockViolation(e)
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The command name is not one the gateway knows.
    UnknownCommand(String),
    /// A required parameter is absent.
    MissingParameter(&'static str),
    /// The `material` parameter names no known material.
    InvalidMaterial(String),
    /// The request body could not be parsed.
    Malformed(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand(name) => write!(f, "unknown command: {name}"),
            Self::MissingParameter(name) => write!(f, "missing parameter: {name}"),
            Self::InvalidMaterial(name) => {
                write!(f, "invalid material {name}, must be one of: Steel, Aluminum, Wood")
            }
            Self::Malformed(msg) => write!(f, "malformed request: {msg}"),
        }
    }
}

impl From<ValidationError> for GatewayError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Gateway-wide `Result` alias.
pub type Result<T> = core::result::Result<T, GatewayError>;
