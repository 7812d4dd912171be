//! CONTEXT: chandev end-to-end integration tests
//! INTENT: Session roundtrip, exclusivity, overflow, holder checks through chandevd
//! IDL (target): OPEN → WRITE → READ → CLOSE → STATS
//! DEPS: chandev, chandevd (service integration)
//! READINESS: chandevd ready; loopback transport established
//! TESTS: two-session roundtrip, contended opens, overflow, non-holder refusal, custom transport, abandoned holder
// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use chandev::{ChannelConfig, SenderId};
use chandevd::protocol::{
    decode_response, encode_close_request, encode_open_request, encode_read_request,
    encode_stats_request, encode_write_request, Response, STATUS_BUSY, STATUS_MALFORMED,
    STATUS_OK,
};
use chandevd::registry::Registry;
use chandevd::transport::{Transport, TransportError};
use chandevd::{run_session, run_with_transport, spawn, ChannelClient, ChannelService, ClientError};
use chandevd::{RunningService, ServerError};

const WAIT: Duration = Duration::from_secs(5);

fn start(capacity: usize) -> RunningService {
    spawn(ChannelConfig { capacity, ..ChannelConfig::default() }).expect("spawn chandevd")
}

fn client(service: &RunningService) -> ChannelClient {
    ChannelClient::connect(service.connector()).expect("connect").with_timeout(WAIT)
}

#[test]
fn message_survives_across_sessions() {
    let service = start(256);
    let first = client(&service);
    let second = client(&service);

    assert_eq!(first.open(), Ok(1));
    assert_eq!(first.write(b"test", 4), Ok(4));
    assert_eq!(first.read(256).expect("read"), b"test(4 letters)");
    first.close().expect("close");

    assert_eq!(second.open(), Ok(2));
    assert_eq!(second.read(256).expect("read"), b"test(4 letters)");
    second.close().expect("close");

    drop(first);
    drop(second);
    service.shutdown().expect("shutdown");
}

#[test]
fn contended_opens_have_one_winner() {
    const CLIENTS: usize = 8;
    let service = start(256);
    let barrier = Arc::new(Barrier::new(CLIENTS));
    let handles: Vec<_> = (0..CLIENTS)
        .map(|_| {
            let client = client(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let outcome = client.open();
                (client, outcome)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().expect("join")).collect();

    let winners: Vec<_> = results.iter().filter(|(_, outcome)| outcome.is_ok()).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].1, Ok(1));
    let busy = results.iter().filter(|(_, outcome)| *outcome == Err(ClientError::Busy)).count();
    assert_eq!(busy, CLIENTS - 1);

    let stats = winners[0].0.stats().expect("stats");
    assert_eq!(stats.open_count, 1);
    assert_eq!(stats.busy_rejections, (CLIENTS - 1) as u64);
    assert!(stats.locked);
    winners[0].0.close().expect("close");

    drop(results);
    service.shutdown().expect("shutdown");
}

#[test]
fn overflow_keeps_previous_message() {
    let service = start(16);
    let writer = client(&service);
    writer.open().expect("open");
    assert_eq!(writer.write(b"hello", 5), Ok(5));
    assert_eq!(writer.write(b"hello!", 6), Err(ClientError::BufferOverflow));
    assert_eq!(writer.read(256).expect("read"), b"hello(5 letters)");
    assert_eq!(writer.stats().expect("stats").message_len, 16);
    writer.close().expect("close");
    drop(writer);
    service.shutdown().expect("shutdown");
}

#[test]
fn non_holder_is_refused() {
    let service = start(256);
    let holder = client(&service);
    let intruder = client(&service);
    holder.open().expect("open");
    holder.write(b"mine", 4).expect("write");

    assert_eq!(intruder.write(b"theirs", 6), Err(ClientError::NotHolder));
    assert_eq!(intruder.read(256), Err(ClientError::NotHolder));
    assert_eq!(intruder.close(), Err(ClientError::NotHolder));
    assert_eq!(intruder.open(), Err(ClientError::Busy));

    assert_eq!(holder.read(256).expect("read"), b"mine(4 letters)");
    holder.close().expect("close");
    drop(holder);
    drop(intruder);
    service.shutdown().expect("shutdown");
}

#[test]
fn short_destination_is_a_fault() {
    let service = start(256);
    let reader = client(&service);
    reader.open().expect("open");
    reader.write(b"test", 4).expect("write");
    assert_eq!(reader.read(4), Err(ClientError::TransferFault));
    assert_eq!(reader.read(15).expect("exact fit"), b"test(4 letters)");
    reader.close().expect("close");
    drop(reader);
    service.shutdown().expect("shutdown");
}

#[test]
fn failed_session_still_releases_the_channel() {
    let service = start(8);
    let first = client(&service);
    assert_eq!(run_session(&first, b"hello", || {}), Err(ClientError::BufferOverflow));
    let second = client(&service);
    assert_eq!(second.open(), Ok(2));
    second.close().expect("close");
    drop(first);
    drop(second);
    service.shutdown().expect("shutdown");
}

#[test]
fn invalid_config_never_serves() {
    let config = ChannelConfig { name: String::new(), ..ChannelConfig::default() };
    let err = spawn(config).err().expect("refused");
    assert!(matches!(err, ServerError::Channel(chandev::Error::InvalidConfig(_))), "{err}");
}

/// Feeds a fixed list of frames and records every reply.
struct ScriptedTransport {
    inbound: VecDeque<(SenderId, Vec<u8>)>,
    replies: Vec<(SenderId, Vec<u8>)>,
}

impl Transport for ScriptedTransport {
    type Error = TransportError;

    fn recv(&mut self) -> Result<Option<(SenderId, Vec<u8>)>, Self::Error> {
        Ok(self.inbound.pop_front())
    }

    fn send(&mut self, to: SenderId, frame: &[u8]) -> Result<(), Self::Error> {
        self.replies.push((to, frame.to_vec()));
        Ok(())
    }
}

#[test]
fn custom_transport_answers_every_frame() {
    let a = SenderId::from(7);
    let b = SenderId::from(9);
    let mut transport = ScriptedTransport {
        inbound: VecDeque::from(vec![
            (a, encode_open_request()),
            (b, encode_open_request()),
            (a, encode_write_request(2, b"hi").expect("frame")),
            (a, encode_read_request(64)),
            (b, b"junk".to_vec()),
            (a, encode_close_request()),
            (b, encode_stats_request()),
        ]),
        replies: Vec::new(),
    };
    let registry = Arc::new(Registry::new());
    let service = ChannelService::start(&ChannelConfig::default(), Arc::clone(&registry))
        .expect("start");
    run_with_transport(&mut transport, &service).expect("serve");

    let replies: Vec<_> = transport
        .replies
        .iter()
        .map(|(to, frame)| (*to, decode_response(frame).expect("decodable")))
        .collect();
    assert_eq!(replies.len(), 7);
    assert_eq!(replies[0], (a, Response::Open { status: STATUS_OK, open_count: 1 }));
    assert_eq!(replies[1], (b, Response::Open { status: STATUS_BUSY, open_count: 0 }));
    assert_eq!(replies[2], (a, Response::Write { status: STATUS_OK, accepted: 2 }));
    assert_eq!(
        replies[3],
        (a, Response::Read { status: STATUS_OK, bytes: b"hi(2 letters)".to_vec() })
    );
    assert!(matches!(replies[4], (to, Response::Rejected { status: STATUS_MALFORMED, .. }) if to == b));
    assert_eq!(replies[5], (a, Response::Close { status: STATUS_OK }));
    match &replies[6] {
        (to, Response::Stats { status, stats }) => {
            assert_eq!(*to, b);
            assert_eq!(*status, STATUS_OK);
            assert_eq!(stats.open_count, 1);
            assert_eq!(stats.busy_rejections, 1);
            assert_eq!(stats.message_len, 13);
            assert!(!stats.locked);
        }
        other => panic!("unexpected reply {other:?}"),
    }
    assert!(registry.resolve("chandev").is_ok());
    drop(service);
    assert!(registry.resolve("chandev").is_err());
}

#[test]
fn abandoned_holder_does_not_block_shutdown() {
    let service = start(256);
    let quitter = client(&service);
    assert_eq!(quitter.open(), Ok(1));
    let other = client(&service);
    assert_eq!(other.open(), Err(ClientError::Busy));
    assert!(other.stats().expect("stats").locked);
    drop(quitter);
    assert_eq!(other.open(), Err(ClientError::Busy));
    drop(other);
    service.shutdown().expect("shutdown");
}
