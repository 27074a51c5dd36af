//! Inter-thread command channels.
//!
//! Uses `embassy-sync` bounded channels to bridge callers on any thread
//! with the protocol I/O thread, which is the only place the endpoint is
//! touched.  Each request carries its own reply [`Signal`].
//!
//! ```text
//! ┌──────────────┐  DispatchRequest  ┌──────────────┐
//! │   Gateway    │──────────────────▶│  I/O Thread  │
//! │  (callers)   │◀──────────────────│  (dispatch)  │
//! └──────────────┘   reply Signal    └──────────────┘
//! ```

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use crate::app::commands::{Command, CommandAck};
use crate::error::GatewayError;

/// Channel depth for queued commands.  A full queue is reported as
/// `ServiceUnavailable` rather than blocking the caller.
pub const CMD_DEPTH: usize = 8;

pub type CommandReply = Signal<CriticalSectionRawMutex, Result<CommandAck, GatewayError>>;

/// One queued command and where to send its outcome.
pub struct DispatchRequest {
    pub command: Command,
    pub reply: Arc<CommandReply>,
}

/// Callers → I/O thread.
pub type CommandQueue = Channel<CriticalSectionRawMutex, DispatchRequest, CMD_DEPTH>;

/// Raised once to stop the I/O thread.
pub type ShutdownSignal = Signal<CriticalSectionRawMutex, ()>;
