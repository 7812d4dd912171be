// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
#![forbid(unsafe_code)]

//! CONTEXT: chandevd daemon entrypoint: host mode validates the config and exits
//!
//! OWNERS: @runtime
//!
//! STATUS: Functional
//!
//! API_STABILITY: Unstable
//!
//! TEST_COVERAGE: See lib.rs

use chandev::ChannelConfig;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = match ChannelConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("chandevd: {err}");
            std::process::exit(1);
        }
    };
    match chandevd::preflight(&config) {
        Ok(endpoint) => {
            println!(
                "chandevd: host mode - {} (endpoint {endpoint}) validated; use library API for testing",
                config.name
            );
        }
        Err(err) => {
            eprintln!("chandevd: {err}");
            std::process::exit(1);
        }
    }
}
