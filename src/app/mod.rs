//! Application core: domain orchestration, zero direct I/O.
//!
//! The orchestrator drives the aggregator, alarm engine, metrics window
//! and dispatcher.  All interaction with the machine and the bus happens
//! through **port traits** defined in [`ports`]; [`gateway`] is the facade
//! that runs the core on the protocol I/O thread.

pub mod commands;
pub mod events;
pub mod gateway;
pub mod ports;
pub mod service;
pub mod views;
