//! CONTEXT: chandev end-to-end test harness library
//! INTENT: Exclusive-access channel integration testing through chandevd
//! IDL (target): OPEN(), WRITE(declared_len,payload), READ(capacity), CLOSE(), STATS()
//! DEPS: chandev (channel core), chandevd (service integration)
//! READINESS: Host backend ready; loopback transport established
//! TESTS: Session roundtrip, exclusivity under contention, overflow, holder checks, shutdown
// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
