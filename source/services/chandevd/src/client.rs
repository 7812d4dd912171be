// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Client side of the chandevd protocol.
//!
//! [`ChannelClient`] issues one request per call and maps wire statuses back to
//! [`ClientError`]. [`run_session`] drives a full open/write/read/close cycle.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::{
    decode_response, encode_close_request, encode_open_request, encode_read_request,
    encode_stats_request, encode_write_request, Response, WireStats, MAX_PAYLOAD_LEN,
    STATUS_BUSY, STATUS_FAULT, STATUS_NOT_HOLDER, STATUS_OK, STATUS_OVERFLOW,
};
use crate::transport::{LoopbackClient, LoopbackConnector, TransportError};
use chandev::SenderId;

/// Destination size used by [`run_session`].
pub const DEFAULT_READ_CAPACITY: usize = 256;

/// Errors seen by a channel client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Another session holds the channel.
    #[error("device busy")]
    Busy,
    /// The server could not move the bytes.
    #[error("transfer fault")]
    TransferFault,
    /// The formatted message did not fit the device buffer.
    #[error("message too long for the device buffer")]
    BufferOverflow,
    /// The client does not hold the channel.
    #[error("device not open by this client")]
    NotHolder,
    /// The payload cannot be framed.
    #[error("payload of {0} bytes cannot be sent")]
    PayloadTooLarge(usize),
    /// The server refused the request with the given status.
    #[error("request rejected with status {0}")]
    Rejected(u8),
    /// The reply could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Transport level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

fn check_status(status: u8) -> Result<(), ClientError> {
    match status {
        STATUS_OK => Ok(()),
        STATUS_BUSY => Err(ClientError::Busy),
        STATUS_FAULT => Err(ClientError::TransferFault),
        STATUS_OVERFLOW => Err(ClientError::BufferOverflow),
        STATUS_NOT_HOLDER => Err(ClientError::NotHolder),
        other => Err(ClientError::Rejected(other)),
    }
}

/// One connection to the channel endpoint.
pub struct ChannelClient {
    conn: LoopbackClient,
    timeout: Option<Duration>,
}

impl ChannelClient {
    /// Connects with a fresh identity.
    pub fn connect(connector: &LoopbackConnector) -> Result<Self, ClientError> {
        Ok(Self { conn: connector.connect()?, timeout: None })
    }

    /// Bounds how long each call waits for its reply.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Identity the server sees.
    pub fn id(&self) -> SenderId {
        self.conn.id()
    }

    /// Opens the channel; returns the server's open count.
    pub fn open(&self) -> Result<u64, ClientError> {
        match self.call(&encode_open_request())? {
            Response::Open { status, open_count } => check_status(status).map(|()| open_count),
            other => Err(unexpected(other)),
        }
    }

    /// Writes `payload` claiming `declared_len`; returns the acknowledged length.
    pub fn write(&self, payload: &[u8], declared_len: usize) -> Result<usize, ClientError> {
        let declared =
            u32::try_from(declared_len).map_err(|_| ClientError::PayloadTooLarge(declared_len))?;
        let frame = encode_write_request(declared, payload)
            .ok_or(ClientError::PayloadTooLarge(payload.len()))?;
        match self.call(&frame)? {
            Response::Write { status, accepted } => {
                check_status(status).map(|()| accepted as usize)
            }
            other => Err(unexpected(other)),
        }
    }

    /// Reads the current message into a destination of `capacity` bytes.
    pub fn read(&self, capacity: usize) -> Result<Vec<u8>, ClientError> {
        let capacity = u32::try_from(capacity).unwrap_or(u32::MAX);
        match self.call(&encode_read_request(capacity))? {
            Response::Read { status, bytes } => check_status(status).map(|()| bytes),
            other => Err(unexpected(other)),
        }
    }

    /// Releases the channel.
    pub fn close(&self) -> Result<(), ClientError> {
        match self.call(&encode_close_request())? {
            Response::Close { status } => check_status(status),
            other => Err(unexpected(other)),
        }
    }

    /// Fetches the channel's diagnostic counters.
    pub fn stats(&self) -> Result<WireStats, ClientError> {
        match self.call(&encode_stats_request())? {
            Response::Stats { status, stats } => check_status(status).map(|()| stats),
            other => Err(unexpected(other)),
        }
    }

    fn call(&self, frame: &[u8]) -> Result<Response, ClientError> {
        let reply = self.conn.call(frame, self.timeout)?;
        let response = decode_response(&reply)
            .map_err(|err| ClientError::Protocol(format!("undecodable reply: {err:?}")))?;
        if let Response::Rejected { status, .. } = response {
            check_status(status)?;
        }
        Ok(response)
    }
}

fn unexpected(response: Response) -> ClientError {
    ClientError::Protocol(format!("unexpected reply: {response:?}"))
}

/// Runs one full session: open, write `payload` with its own length, `pause`,
/// read back, close.
///
/// The channel is closed even when the write or read fails; the first error wins.
pub fn run_session(
    client: &ChannelClient,
    payload: &[u8],
    pause: impl FnOnce(),
) -> Result<Vec<u8>, ClientError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ClientError::PayloadTooLarge(payload.len()));
    }
    client.open()?;
    let outcome = write_then_read(client, payload, pause);
    let closed = client.close();
    let message = outcome?;
    closed?;
    Ok(message)
}

fn write_then_read(
    client: &ChannelClient,
    payload: &[u8],
    pause: impl FnOnce(),
) -> Result<Vec<u8>, ClientError> {
    client.write(payload, payload.len())?;
    pause();
    client.read(DEFAULT_READ_CAPACITY)
}
