// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! CONTEXT: chandevd daemon: serves one exclusive-access channel at a named endpoint
//!
//! OWNERS: @runtime
//!
//! STATUS: Functional
//!
//! API_STABILITY: Unstable
//!
//! TEST_COVERAGE:
//!   - Unit tests: registry, transport, dispatch (`server.rs`)
//!   - Protocol tests: `source/services/chandevd/tests/protocol.rs`
//!   - E2E tests: `tests/chandev_e2e/tests/session_roundtrip.rs`
//!
//! PUBLIC API:
//!   - `protocol`: v1 byte-frame codec
//!   - `registry`: endpoint name -> id allocation
//!   - `transport`: `Transport` seam + in-process loopback
//!   - `client`: `ChannelClient`, `run_session()`
//!   - `service_main_loop()` / `spawn()`: daemon entry points (private registry)
//!   - `serve_registered()` / `spawn_in()`: same, publishing the name in a shared registry
//!   - `preflight()`: config + endpoint check used by the host binary

pub mod client;
pub mod protocol;
pub mod registry;
mod server;
pub mod transport;

pub use client::{run_session, ChannelClient, ClientError};
pub use server::*;
