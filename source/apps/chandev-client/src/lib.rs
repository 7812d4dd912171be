// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! CONTEXT: Test client for the chandevd channel: one open/write/read/close session
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below + `tests/cli.rs`
//!
//! PUBLIC API:
//!   - help()/execute(): non-interactive front end (`--message`, `--config`)
//!   - interactive(): prompt-driven session over any reader/writer pair
//!   - run(): process entry used by main.rs

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chandev::ChannelConfig;
use chandevd::{run_session, ChannelClient, ClientError, ServerError};
use log::debug;
use thiserror::Error;

/// Errors reported by the client front end.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("usage: {0}")]
    Usage(String),
    #[error("config: {0}")]
    Config(#[from] chandev::Error),
    #[error("service: {0}")]
    Server(#[from] ServerError),
    #[error("device: {0}")]
    Client(#[from] ClientError),
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

pub fn help() -> &'static str {
    "chandev-client exercises the exclusive-access channel. \
     Usage: chandev-client [--help] [--config <file>] [--message <text>]"
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    help: bool,
    config: Option<PathBuf>,
    message: Option<String>,
}

fn parse_args(args: &[&str]) -> Result<Options, CliError> {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match *arg {
            "--help" | "-h" => options.help = true,
            "--config" => {
                let path = iter.next().ok_or_else(|| CliError::Usage("--config needs a path".into()))?;
                options.config = Some(PathBuf::from(*path));
            }
            "--message" => {
                let text = iter.next().ok_or_else(|| CliError::Usage("--message needs text".into()))?;
                options.message = Some((*text).to_string());
            }
            other => return Err(CliError::Usage(format!("unknown argument {other:?}"))),
        }
    }
    Ok(options)
}

fn load_config(path: Option<&Path>) -> Result<ChannelConfig, CliError> {
    Ok(match path {
        Some(path) => ChannelConfig::load(path)?,
        None => ChannelConfig::from_env()?,
    })
}

/// Starts a private chandevd, hands `f` a connected client and shuts the service down.
pub fn with_service<T>(
    config: ChannelConfig,
    f: impl FnOnce(&ChannelClient) -> Result<T, CliError>,
) -> Result<T, CliError> {
    let service = chandevd::spawn(config)?;
    let client = match ChannelClient::connect(service.connector()) {
        Ok(client) => client,
        Err(err) => {
            service.shutdown()?;
            return Err(err.into());
        }
    };
    debug!("chandev-client: connected as {}", client.id());
    let outcome = f(&client);
    // The service loop only ends once every client is gone.
    drop(client);
    let stopped = service.shutdown();
    let value = outcome?;
    stopped?;
    Ok(value)
}

/// Sends `message` through one full session and returns the formatted reply.
pub fn send_once(config: ChannelConfig, message: &str) -> Result<String, CliError> {
    with_service(config, |client| {
        let bytes = run_session(client, message.as_bytes(), || {})?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    })
}

pub fn execute(args: &[&str]) -> String {
    let options = match parse_args(args) {
        Ok(options) => options,
        Err(err) => return format!("chandev-client: {err}"),
    };
    if options.help {
        return help().to_string();
    }
    let Some(message) = options.message else {
        return "chandev-client awaiting --message".to_string();
    };
    match load_config(options.config.as_deref()).and_then(|config| send_once(config, &message)) {
        Ok(reply) => format!("The received message is: [{reply}]"),
        Err(err) => format!("chandev-client: {err}"),
    }
}

/// Runs the prompt-driven session: read a line, send it, wait for ENTER, read back.
pub fn interactive<R: BufRead, W: Write>(
    client: &ChannelClient,
    mut input: R,
    mut out: W,
) -> Result<String, CliError> {
    writeln!(out, "Starting device test code example ...")?;
    writeln!(out, "Type in a short string to send to the device:")?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let text = line.trim_end_matches(&['\r', '\n'][..]);
    writeln!(out, "Writing message to the device [{text}].")?;

    let mut paused = Ok(());
    let bytes = run_session(client, text.as_bytes(), || {
        paused = wait_for_enter(&mut input, &mut out);
    });
    paused?;
    let bytes = bytes?;

    let reply = String::from_utf8_lossy(&bytes).into_owned();
    writeln!(out, "Reading from the device...")?;
    writeln!(out, "The received message is: [{reply}]")?;
    writeln!(out, "End of program")?;
    out.flush()?;
    Ok(reply)
}

fn wait_for_enter<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<()> {
    writeln!(out, "Press ENTER to read back from the device...")?;
    out.flush()?;
    let mut discard = String::new();
    input.read_line(&mut discard).map(|_| ())
}

/// Process entry: `--help`/`--message` print a single line, otherwise prompt on stdio.
pub fn run() -> Result<(), CliError> {
    let owned: Vec<String> = std::env::args().skip(1).collect();
    let refs: Vec<&str> = owned.iter().map(|s| s.as_str()).collect();
    let options = parse_args(&refs)?;
    if options.help || options.message.is_some() {
        println!("{}", execute(&refs));
        return Ok(());
    }
    let config = load_config(options.config.as_deref())?;
    with_service(config, |client| {
        let stdin = io::stdin();
        let stdout = io::stdout();
        interactive(client, stdin.lock(), stdout.lock()).map(|_| ())
    })
}
