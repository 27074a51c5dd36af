//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements | Connects to                      |
//! |------------|------------|----------------------------------|
//! | `bus`      | EventSink  | Any pub/sub client via a closure |
//! | `log_sink` | EventSink  | `log` facade                     |
//! | `time`     | Clock      | System wall clock                |
//!
//! The machine endpoint ([`TagEndpoint`](crate::app::ports::TagEndpoint))
//! is implemented outside this crate by the protocol client in use.

pub mod bus;
pub mod log_sink;
pub mod time;
