//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that drives the full gateway (I/O
//! thread, queue, views) against a mock machine endpoint.  No protocol
//! server is required.

mod gateway_tests;
mod mock_endpoint;
