//! Saw edge gateway library.
//!
//! Supervises an industrial saw exposed through a tag-based control
//! protocol: reduces raw tags into one [`MachineState`], evaluates alarm
//! rules, interlocks operator commands and republishes state, alerts and
//! metrics.  Transport framing (HTTP, WebSocket, MQTT) stays outside; the
//! [`Gateway`] facade only exchanges domain types.

#![deny(unused_must_use)]

pub mod adapters;
pub mod alarms;
pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod machine;
pub mod metrics;
pub mod protocol;
pub mod state;

pub use app::commands::{Command, CommandAck, CommandName};
pub use app::gateway::Gateway;
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use machine::{MachineState, MachineStatus, Material};
