// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! CONTEXT: chandevd wire protocol v1 (versioned byte frames; bounded inputs)
//!
//! OWNERS: @runtime
//!
//! STATUS: Experimental
//!
//! API_STABILITY: Unstable
//!
//! TEST_COVERAGE: Tests in `source/services/chandevd/tests/protocol.rs`
//!   - Decode: all five requests, malformed/unsupported/truncated inputs
//!   - Responses: decode of every response shape plus reject frames
//!   - Property tests for panic-freedom on arbitrary input

use chandev::{ChannelStats, Error};

pub const MAGIC0: u8 = b'C';
pub const MAGIC1: u8 = b'D';
pub const VERSION: u8 = 1;

pub const OP_OPEN: u8 = 1;
pub const OP_WRITE: u8 = 2;
pub const OP_READ: u8 = 3;
pub const OP_CLOSE: u8 = 4;
pub const OP_STATS: u8 = 5;

/// Set on the opcode of every response.
pub const OP_RESPONSE: u8 = 0x80;

pub const STATUS_OK: u8 = 0;
pub const STATUS_BUSY: u8 = 1;
pub const STATUS_FAULT: u8 = 2;
pub const STATUS_OVERFLOW: u8 = 3;
pub const STATUS_NOT_HOLDER: u8 = 4;
pub const STATUS_MALFORMED: u8 = 5;
pub const STATUS_UNSUPPORTED: u8 = 6;

/// MAGIC0 + MAGIC1 + VERSION + OP
pub const HEADER_LEN: usize = 4;

/// Header + declared_len:u32le + payload_len:u16le
pub const WRITE_HEADER_LEN: usize = 10;

/// Header + capacity:u32le
pub const READ_REQ_LEN: usize = 8;

/// Largest payload a single WRITE frame can carry.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

const OPEN_RSP_LEN: usize = HEADER_LEN + 1 + 8;
const WRITE_RSP_LEN: usize = HEADER_LEN + 1 + 4;
const READ_RSP_HEADER_LEN: usize = HEADER_LEN + 1 + 2;
const STATS_RSP_LEN: usize = HEADER_LEN + 1 + 8 + 8 + 4 + 4 + 1;
const REJECT_RSP_LEN: usize = HEADER_LEN + 1;

/// A decoded v1 request.
#[derive(Debug, PartialEq, Eq)]
pub enum Request {
    Open,
    Write(WriteRequest),
    Read(ReadRequest),
    Close,
    Stats,
}

#[derive(Debug, PartialEq, Eq)]
pub struct WriteRequest {
    /// Length the writer claims to have sent; trusted as-is.
    pub declared_len: u32,
    pub payload: Vec<u8>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ReadRequest {
    /// Room available at the reader.
    pub capacity: u32,
}

/// Decode errors for v1 frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "decode errors must be handled"]
pub enum DecodeError {
    Malformed,
    Unsupported,
    /// Payload length disagrees with the frame; the source was not fully readable.
    Fault,
}

impl DecodeError {
    pub fn status(self) -> u8 {
        match self {
            Self::Malformed => STATUS_MALFORMED,
            Self::Unsupported => STATUS_UNSUPPORTED,
            Self::Fault => STATUS_FAULT,
        }
    }
}

pub fn decode_request(frame: &[u8]) -> Result<Request, DecodeError> {
    if frame.len() < HEADER_LEN || frame[0] != MAGIC0 || frame[1] != MAGIC1 {
        return Err(DecodeError::Malformed);
    }
    if frame[2] != VERSION {
        return Err(DecodeError::Unsupported);
    }
    match frame[3] {
        OP_OPEN => decode_bare(frame, Request::Open),
        OP_WRITE => decode_write(frame),
        OP_READ => decode_read(frame),
        OP_CLOSE => decode_bare(frame, Request::Close),
        OP_STATS => decode_bare(frame, Request::Stats),
        _ => Err(DecodeError::Unsupported),
    }
}

fn decode_bare(frame: &[u8], request: Request) -> Result<Request, DecodeError> {
    // [C,D,ver,OP]
    if frame.len() != HEADER_LEN {
        return Err(DecodeError::Malformed);
    }
    Ok(request)
}

fn decode_write(frame: &[u8]) -> Result<Request, DecodeError> {
    // [C,D,ver,OP, declared_len:u32le, payload_len:u16le, payload]
    if frame.len() < WRITE_HEADER_LEN {
        return Err(DecodeError::Malformed);
    }
    let declared_len = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
    let payload_len = u16::from_le_bytes([frame[8], frame[9]]) as usize;
    if frame.len() != WRITE_HEADER_LEN + payload_len {
        return Err(DecodeError::Fault);
    }
    Ok(Request::Write(WriteRequest { declared_len, payload: frame[WRITE_HEADER_LEN..].to_vec() }))
}

fn decode_read(frame: &[u8]) -> Result<Request, DecodeError> {
    // [C,D,ver,OP, capacity:u32le]
    if frame.len() != READ_REQ_LEN {
        return Err(DecodeError::Malformed);
    }
    let capacity = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
    Ok(Request::Read(ReadRequest { capacity }))
}

fn header(op: u8) -> [u8; HEADER_LEN] {
    [MAGIC0, MAGIC1, VERSION, op]
}

pub fn encode_open_request() -> Vec<u8> {
    header(OP_OPEN).to_vec()
}

/// Returns `None` when `payload` exceeds [`MAX_PAYLOAD_LEN`].
pub fn encode_write_request(declared_len: u32, payload: &[u8]) -> Option<Vec<u8>> {
    let payload_len = u16::try_from(payload.len()).ok()?;
    let mut frame = Vec::with_capacity(WRITE_HEADER_LEN + payload.len());
    frame.extend_from_slice(&header(OP_WRITE));
    frame.extend_from_slice(&declared_len.to_le_bytes());
    frame.extend_from_slice(&payload_len.to_le_bytes());
    frame.extend_from_slice(payload);
    Some(frame)
}

pub fn encode_read_request(capacity: u32) -> Vec<u8> {
    let mut frame = Vec::with_capacity(READ_REQ_LEN);
    frame.extend_from_slice(&header(OP_READ));
    frame.extend_from_slice(&capacity.to_le_bytes());
    frame
}

pub fn encode_close_request() -> Vec<u8> {
    header(OP_CLOSE).to_vec()
}

pub fn encode_stats_request() -> Vec<u8> {
    header(OP_STATS).to_vec()
}

/// Maps a channel error onto its wire status.
pub fn status_for_error(err: &Error) -> u8 {
    match err {
        Error::Busy => STATUS_BUSY,
        Error::TransferFault => STATUS_FAULT,
        Error::BufferOverflow { .. } => STATUS_OVERFLOW,
        Error::NotHolder => STATUS_NOT_HOLDER,
        Error::InvalidConfig(_) => STATUS_UNSUPPORTED,
    }
}

/// Channel statistics as carried on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WireStats {
    pub open_count: u64,
    pub busy_rejections: u64,
    pub message_len: u32,
    pub capacity: u32,
    pub locked: bool,
}

impl From<ChannelStats> for WireStats {
    fn from(stats: ChannelStats) -> Self {
        Self {
            open_count: stats.open_count,
            busy_rejections: stats.busy_rejections,
            message_len: u32::try_from(stats.message_len).unwrap_or(u32::MAX),
            capacity: u32::try_from(stats.capacity).unwrap_or(u32::MAX),
            locked: stats.locked,
        }
    }
}

pub fn encode_open_response(status: u8, open_count: u64) -> Vec<u8> {
    // [C,D,ver,OP|0x80, status, open_count:u64le]
    let mut out = Vec::with_capacity(OPEN_RSP_LEN);
    out.extend_from_slice(&header(OP_OPEN | OP_RESPONSE));
    out.push(status);
    out.extend_from_slice(&open_count.to_le_bytes());
    out
}

pub fn encode_write_response(status: u8, accepted: u32) -> Vec<u8> {
    // [C,D,ver,OP|0x80, status, accepted:u32le]
    let mut out = Vec::with_capacity(WRITE_RSP_LEN);
    out.extend_from_slice(&header(OP_WRITE | OP_RESPONSE));
    out.push(status);
    out.extend_from_slice(&accepted.to_le_bytes());
    out
}

pub fn encode_read_response(status: u8, bytes: &[u8]) -> Vec<u8> {
    // [C,D,ver,OP|0x80, status, len:u16le, bytes]
    let len = core::cmp::min(bytes.len(), MAX_PAYLOAD_LEN);
    let mut out = Vec::with_capacity(READ_RSP_HEADER_LEN + len);
    out.extend_from_slice(&header(OP_READ | OP_RESPONSE));
    out.push(status);
    out.extend_from_slice(&(len as u16).to_le_bytes());
    out.extend_from_slice(&bytes[..len]);
    out
}

pub fn encode_close_response(status: u8) -> Vec<u8> {
    encode_reject(OP_CLOSE, status)
}

pub fn encode_stats_response(status: u8, stats: WireStats) -> Vec<u8> {
    // [C,D,ver,OP|0x80, status, open_count:u64, busy:u64, message_len:u32, capacity:u32, locked:u8]
    let mut out = Vec::with_capacity(STATS_RSP_LEN);
    out.extend_from_slice(&header(OP_STATS | OP_RESPONSE));
    out.push(status);
    out.extend_from_slice(&stats.open_count.to_le_bytes());
    out.extend_from_slice(&stats.busy_rejections.to_le_bytes());
    out.extend_from_slice(&stats.message_len.to_le_bytes());
    out.extend_from_slice(&stats.capacity.to_le_bytes());
    out.push(u8::from(stats.locked));
    out
}

/// Status-only reply for frames that could not be decoded.
pub fn encode_reject(op: u8, status: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(REJECT_RSP_LEN);
    out.extend_from_slice(&header(op | OP_RESPONSE));
    out.push(status);
    out
}

/// A decoded v1 response.
#[derive(Debug, PartialEq, Eq)]
pub enum Response {
    Open { status: u8, open_count: u64 },
    Write { status: u8, accepted: u32 },
    Read { status: u8, bytes: Vec<u8> },
    Close { status: u8 },
    Stats { status: u8, stats: WireStats },
    /// Status-only reply to a request the server could not decode.
    Rejected { op: u8, status: u8 },
}

pub fn decode_response(frame: &[u8]) -> Result<Response, DecodeError> {
    if frame.len() < REJECT_RSP_LEN || frame[0] != MAGIC0 || frame[1] != MAGIC1 {
        return Err(DecodeError::Malformed);
    }
    if frame[2] != VERSION {
        return Err(DecodeError::Unsupported);
    }
    if frame[3] & OP_RESPONSE == 0 {
        return Err(DecodeError::Malformed);
    }
    let op = frame[3] & !OP_RESPONSE;
    let status = frame[4];
    if op == OP_CLOSE && frame.len() == REJECT_RSP_LEN {
        return Ok(Response::Close { status });
    }
    if frame.len() == REJECT_RSP_LEN && status != STATUS_OK {
        return Ok(Response::Rejected { op, status });
    }
    match op {
        OP_OPEN if frame.len() == OPEN_RSP_LEN => {
            Ok(Response::Open { status, open_count: read_u64(&frame[5..13]) })
        }
        OP_WRITE if frame.len() == WRITE_RSP_LEN => {
            Ok(Response::Write { status, accepted: read_u32(&frame[5..9]) })
        }
        OP_READ if frame.len() >= READ_RSP_HEADER_LEN => {
            let len = u16::from_le_bytes([frame[5], frame[6]]) as usize;
            if frame.len() != READ_RSP_HEADER_LEN + len {
                return Err(DecodeError::Fault);
            }
            Ok(Response::Read { status, bytes: frame[READ_RSP_HEADER_LEN..].to_vec() })
        }
        OP_STATS if frame.len() == STATS_RSP_LEN => Ok(Response::Stats {
            status,
            stats: WireStats {
                open_count: read_u64(&frame[5..13]),
                busy_rejections: read_u64(&frame[13..21]),
                message_len: read_u32(&frame[21..25]),
                capacity: read_u32(&frame[25..29]),
                locked: frame[29] != 0,
            },
        }),
        OP_OPEN | OP_WRITE | OP_READ | OP_STATS => Err(DecodeError::Malformed),
        _ => Err(DecodeError::Unsupported),
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(raw)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}
