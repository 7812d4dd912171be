// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Host tests for chandevd protocol bounds/decoding
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 9 unit tests + 2 property tests

use chandevd::protocol::{
    decode_request, decode_response, encode_close_response, encode_open_response,
    encode_read_response, encode_reject, encode_stats_response, encode_write_request,
    encode_write_response, DecodeError, ReadRequest, Request, Response, WireStats, WriteRequest,
    MAGIC0, MAGIC1, MAX_PAYLOAD_LEN, OP_CLOSE, OP_OPEN, OP_READ, OP_STATS, OP_WRITE,
    STATUS_BUSY, STATUS_MALFORMED, STATUS_NOT_HOLDER, STATUS_OK, STATUS_UNSUPPORTED, VERSION,
};
use proptest::prelude::*;

#[test]
fn decode_bare_requests() {
    assert_eq!(decode_request(&[MAGIC0, MAGIC1, VERSION, OP_OPEN]), Ok(Request::Open));
    assert_eq!(decode_request(&[MAGIC0, MAGIC1, VERSION, OP_CLOSE]), Ok(Request::Close));
    assert_eq!(decode_request(&[MAGIC0, MAGIC1, VERSION, OP_STATS]), Ok(Request::Stats));
    assert_eq!(
        decode_request(&[MAGIC0, MAGIC1, VERSION, OP_OPEN, 0]),
        Err(DecodeError::Malformed)
    );
}

#[test]
fn decode_write_smoke() {
    let mut frame = vec![MAGIC0, MAGIC1, VERSION, OP_WRITE];
    frame.extend_from_slice(&99u32.to_le_bytes()); // declared_len
    frame.extend_from_slice(&2u16.to_le_bytes()); // payload_len
    frame.extend_from_slice(b"ab");
    assert_eq!(
        decode_request(&frame),
        Ok(Request::Write(WriteRequest { declared_len: 99, payload: b"ab".to_vec() }))
    );
}

#[test]
fn write_length_mismatch_is_fault() {
    let mut frame = encode_write_request(4, b"test").expect("frame");
    frame.push(b'!');
    assert_eq!(decode_request(&frame), Err(DecodeError::Fault));
    frame.truncate(9);
    assert_eq!(decode_request(&frame), Err(DecodeError::Malformed));
}

#[test]
fn decode_read_smoke() {
    let mut frame = vec![MAGIC0, MAGIC1, VERSION, OP_READ];
    frame.extend_from_slice(&256u32.to_le_bytes());
    assert_eq!(decode_request(&frame), Ok(Request::Read(ReadRequest { capacity: 256 })));
    frame.pop();
    assert_eq!(decode_request(&frame), Err(DecodeError::Malformed));
}

#[test]
fn wrong_magic_version_and_opcode() {
    assert_eq!(decode_request(&[b'X', MAGIC1, VERSION, OP_OPEN]), Err(DecodeError::Malformed));
    assert_eq!(decode_request(&[MAGIC0, MAGIC1, 9, OP_OPEN]), Err(DecodeError::Unsupported));
    assert_eq!(decode_request(&[MAGIC0, MAGIC1, VERSION, 0x42]), Err(DecodeError::Unsupported));
    assert_eq!(decode_request(&[MAGIC0, MAGIC1]), Err(DecodeError::Malformed));
}

#[test]
fn oversized_payload_cannot_be_framed() {
    assert!(encode_write_request(1, &vec![0u8; MAX_PAYLOAD_LEN]).is_some());
    assert!(encode_write_request(1, &vec![0u8; MAX_PAYLOAD_LEN + 1]).is_none());
}

#[test]
fn response_shapes_decode() {
    assert_eq!(
        decode_response(&encode_open_response(STATUS_BUSY, 0)),
        Ok(Response::Open { status: STATUS_BUSY, open_count: 0 })
    );
    assert_eq!(
        decode_response(&encode_write_response(STATUS_OK, 17)),
        Ok(Response::Write { status: STATUS_OK, accepted: 17 })
    );
    assert_eq!(
        decode_response(&encode_read_response(STATUS_OK, b"test(4 letters)")),
        Ok(Response::Read { status: STATUS_OK, bytes: b"test(4 letters)".to_vec() })
    );
    assert_eq!(
        decode_response(&encode_close_response(STATUS_NOT_HOLDER)),
        Ok(Response::Close { status: STATUS_NOT_HOLDER })
    );
    let stats = WireStats {
        open_count: 3,
        busy_rejections: 1,
        message_len: 15,
        capacity: 256,
        locked: true,
    };
    assert_eq!(
        decode_response(&encode_stats_response(STATUS_OK, stats)),
        Ok(Response::Stats { status: STATUS_OK, stats })
    );
}

#[test]
fn reject_frames_decode() {
    assert_eq!(
        decode_response(&encode_reject(OP_READ, STATUS_MALFORMED)),
        Ok(Response::Rejected { op: OP_READ, status: STATUS_MALFORMED })
    );
    assert_eq!(
        decode_response(&encode_reject(0x33, STATUS_UNSUPPORTED)),
        Ok(Response::Rejected { op: 0x33, status: STATUS_UNSUPPORTED })
    );
}

#[test]
fn response_without_flag_or_with_bad_length() {
    assert_eq!(decode_response(&[MAGIC0, MAGIC1, VERSION, OP_OPEN, 0]), Err(DecodeError::Malformed));
    let mut read = encode_read_response(STATUS_OK, b"abc");
    read.pop();
    assert_eq!(decode_response(&read), Err(DecodeError::Fault));
}

proptest! {
    #[test]
    fn decode_request_never_panics(frame in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = decode_request(&frame);
    }

    #[test]
    fn decode_response_never_panics(frame in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = decode_response(&frame);
    }
}
