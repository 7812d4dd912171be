// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Endpoint registry: hands out numeric endpoint ids for channel names.
//!
//! Ids are allocated dynamically starting at 1 and are not reused while the
//! registry lives. Services started through `spawn_in`/`serve_registered`
//! share one registry, so their names resolve while they run.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use thiserror::Error;

/// Errors produced by the registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An endpoint with the name already exists.
    #[error("endpoint already registered")]
    Duplicate,
    /// The endpoint does not exist.
    #[error("endpoint not found")]
    NotFound,
    /// No endpoint ids are left.
    #[error("endpoint ids exhausted")]
    Exhausted,
}

/// Numeric endpoint identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(u32);

impl EndpointId {
    /// Raw numeric value.
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct RegistryState {
    endpoints: HashMap<String, EndpointId>,
    next: u32,
    limit: u32,
}

/// Name to endpoint id table shared by every service in the process.
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_limit(u32::MAX)
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that allocates at most `limit` ids over its lifetime.
    pub fn with_limit(limit: u32) -> Self {
        Self { state: Mutex::new(RegistryState { endpoints: HashMap::new(), next: 1, limit }) }
    }

    /// Allocates an id for `name`.
    pub fn register(&self, name: &str) -> Result<EndpointId, RegistryError> {
        let mut state = self.state.lock();
        if state.endpoints.contains_key(name) {
            return Err(RegistryError::Duplicate);
        }
        if state.next == 0 || state.next > state.limit {
            return Err(RegistryError::Exhausted);
        }
        let id = EndpointId(state.next);
        state.next = state.next.wrapping_add(1);
        state.endpoints.insert(name.to_string(), id);
        Ok(id)
    }

    /// Returns the id registered for `name`.
    pub fn resolve(&self, name: &str) -> Result<EndpointId, RegistryError> {
        self.state.lock().endpoints.get(name).copied().ok_or(RegistryError::NotFound)
    }

    /// Removes `name` if it is registered under `id`.
    pub fn unregister(&self, name: &str, id: EndpointId) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        match state.endpoints.get(name) {
            Some(current) if *current == id => {
                state.endpoints.remove(name);
                Ok(())
            }
            _ => Err(RegistryError::NotFound),
        }
    }
}
