// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Exclusive-access message channel (single holder, single bounded buffer)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests per module + `tests/lifecycle.rs` (sessions, concurrency, properties)
//!
//! PUBLIC API:
//!   - ExclusiveChannel: open/write/read/close lifecycle around one shared buffer
//!   - Session: guard that closes the channel when dropped
//!   - ChannelConfig: endpoint name + buffer capacity (TOML)
//!   - SenderId: identity of the caller that owns a session
//!
//! INVARIANTS:
//!   - At most one holder at any time; open never waits for a release
//!   - Only the holder mutates the buffer; failed writes leave it untouched
//!   - Message bytes are never logged, only their lengths
//!
//! KNOWN GAPS:
//!   - A holder that never closes keeps the channel locked; there is no lease reclamation

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod buffer;
mod channel;
pub mod config;
mod lock;
mod session;

use std::fmt;

pub use buffer::format_message;
pub use channel::{ChannelStats, ExclusiveChannel};
pub use config::{ChannelConfig, DEFAULT_CAPACITY, DEFAULT_NAME, MAX_CAPACITY, MAX_NAME_LEN};
pub use session::Session;

/// Result alias for channel operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors produced by the channel.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Another session currently holds the channel.
    #[error("channel busy")]
    Busy,
    /// Bytes could not be moved across the caller boundary.
    #[error("transfer fault")]
    TransferFault,
    /// The formatted message does not fit the buffer.
    #[error("buffer overflow: {needed} bytes needed, capacity {capacity}")]
    BufferOverflow {
        /// Length of the formatted message.
        needed: usize,
        /// Configured buffer capacity.
        capacity: usize,
    },
    /// The caller does not hold the channel.
    #[error("caller does not hold the channel")]
    NotHolder,
    /// Configuration was rejected; no channel was constructed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Identity of a caller, as assigned by whatever serves the endpoint.
///
/// `u64::MAX` marks the vacant lock slot and is never a valid sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SenderId(u64);

impl SenderId {
    /// Wraps a raw identity, rejecting the reserved vacant value.
    pub const fn new(raw: u64) -> Option<Self> {
        if raw == u64::MAX {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Returns the raw identity.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl From<u32> for SenderId {
    fn from(value: u32) -> Self {
        Self(u64::from(value))
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sender#{}", self.0)
    }
}
