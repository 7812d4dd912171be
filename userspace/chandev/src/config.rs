// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Channel configuration: endpoint name and buffer capacity.
//!
//! Loaded from TOML. The file path comes from the caller or from the
//! `CHANDEV_CONFIG` environment variable; missing keys take the defaults.
//!
//! ```toml
//! name = "chandev"
//! capacity = 256
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Environment variable naming a TOML configuration file.
pub const CONFIG_ENV: &str = "CHANDEV_CONFIG";

/// Endpoint name used when none is configured.
pub const DEFAULT_NAME: &str = "chandev";

/// Message buffer capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 256;

/// Largest capacity accepted; reads are framed with a 16-bit length.
pub const MAX_CAPACITY: usize = u16::MAX as usize;

/// Longest endpoint name accepted.
pub const MAX_NAME_LEN: usize = 48;

/// Settings fixed when a channel is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelConfig {
    /// Name under which the endpoint is exposed.
    pub name: String,
    /// Maximum size of the stored message, annotation included.
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { name: DEFAULT_NAME.to_string(), capacity: DEFAULT_CAPACITY }
    }
}

impl ChannelConfig {
    /// Checks the bounds a channel relies on.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.len() > MAX_NAME_LEN {
            return Err(Error::InvalidConfig(format!(
                "name must be 1..={MAX_NAME_LEN} bytes, got {}",
                self.name.len()
            )));
        }
        if !self.name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            return Err(Error::InvalidConfig(format!("name {:?} has invalid characters", self.name)));
        }
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "capacity must be 1..={MAX_CAPACITY}, got {}",
                self.capacity
            )));
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| Error::InvalidConfig(format!("parse: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| Error::InvalidConfig(format!("read {}: {err}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Loads the file named by [`CONFIG_ENV`], or returns the defaults when it is unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| Error::InvalidConfig(format!("encode: {err}")))
    }
}
