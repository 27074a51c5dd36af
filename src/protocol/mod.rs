//! Machine protocol side of the gateway.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                   protocol-io thread                   │
//! │                                                        │
//! │  TagEndpoint ──▶ ProtocolAdapter ──▶ Orchestrator      │
//! │   (port)          (session.rs)        (app::service)   │
//! │       ▲                                    │           │
//! │       └──────── write ◀── dispatch ◀───────┘           │
//! │                            ▲                           │
//! └────────────────────────────┼───────────────────────────┘
//!                              │ CommandQueue (channels.rs)
//!                           Gateway
//! ```

pub mod channels;
pub mod io_task;
pub mod session;
pub mod tags;
