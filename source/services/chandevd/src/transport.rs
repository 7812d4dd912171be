// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: chandevd transports: the server-side seam plus an in-process loopback
//!
//! OWNERS: @runtime
//!
//! PUBLIC API:
//!   - trait Transport: sender-tagged frame receive + addressed reply
//!   - loopback(): connector/server pair backed by in-memory channels
//!   - LoopbackConnector::connect(): new client with a fresh SenderId
//!
//! INVARIANTS:
//!   - Every connected client gets a distinct SenderId; ids are never reused
//!   - Frame boundaries are preserved
//!
//! ERROR CONDITIONS:
//!   - TransportError::Closed: peer or server went away
//!   - TransportError::Timeout: no reply within the requested wait
//!   - TransportError::Exhausted: every SenderId has been handed out

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use chandev::SenderId;
use parking_lot::Mutex;
use thiserror::Error;

/// Transport level failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection closed by the peer.
    #[error("transport closed")]
    Closed,
    /// No reply arrived in time.
    #[error("transport timed out")]
    Timeout,
    /// No sender identities are left.
    #[error("sender ids exhausted")]
    Exhausted,
    /// Any other failure category.
    #[error("transport error: {0}")]
    Other(String),
}

/// Transport abstraction used by the service loop.
pub trait Transport {
    /// Error surfaced by the transport implementation.
    type Error: Into<TransportError>;

    /// Receives the next frame and the identity that sent it. `None` once all peers are gone.
    fn recv(&mut self) -> Result<Option<(SenderId, Vec<u8>)>, Self::Error>;

    /// Sends a response frame back to `to`.
    fn send(&mut self, to: SenderId, frame: &[u8]) -> Result<(), Self::Error>;
}

type ReplyTable = Arc<Mutex<HashMap<SenderId, Sender<Vec<u8>>>>>;

/// Creates a loopback connector/server pair backed by in-memory channels.
pub fn loopback() -> (LoopbackConnector, LoopbackServer) {
    let (request_tx, request_rx) = mpsc::channel::<(SenderId, Vec<u8>)>();
    let replies: ReplyTable = Arc::new(Mutex::new(HashMap::new()));
    (
        LoopbackConnector {
            request_tx,
            replies: Arc::clone(&replies),
            next_id: Arc::new(AtomicU64::new(1)),
        },
        LoopbackServer { request_rx, replies },
    )
}

/// Hands out loopback clients, each with its own identity.
#[derive(Clone)]
pub struct LoopbackConnector {
    request_tx: Sender<(SenderId, Vec<u8>)>,
    replies: ReplyTable,
    next_id: Arc<AtomicU64>,
}

impl LoopbackConnector {
    /// Connects a new client.
    ///
    /// Fails with [`TransportError::Exhausted`] once the id space runs out.
    pub fn connect(&self) -> Result<LoopbackClient, TransportError> {
        // The counter stops at the reserved vacant value instead of wrapping.
        let raw = self
            .next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
                SenderId::new(next).map(|_| next + 1)
            })
            .map_err(|_| TransportError::Exhausted)?;
        let id = SenderId::new(raw).ok_or(TransportError::Exhausted)?;
        let (reply_tx, reply_rx) = mpsc::channel();
        self.replies.lock().insert(id, reply_tx);
        Ok(LoopbackClient {
            id,
            request_tx: self.request_tx.clone(),
            reply_rx,
            replies: Arc::clone(&self.replies),
        })
    }
}

/// Client end of a loopback connection.
pub struct LoopbackClient {
    id: SenderId,
    request_tx: Sender<(SenderId, Vec<u8>)>,
    reply_rx: Receiver<Vec<u8>>,
    replies: ReplyTable,
}

impl LoopbackClient {
    /// Identity the server sees for this client.
    pub fn id(&self) -> SenderId {
        self.id
    }

    /// Sends `frame` and waits for the reply, for at most `timeout` if given.
    pub fn call(&self, frame: &[u8], timeout: Option<Duration>) -> Result<Vec<u8>, TransportError> {
        self.request_tx.send((self.id, frame.to_vec())).map_err(|_| TransportError::Closed)?;
        match timeout {
            None => self.reply_rx.recv().map_err(|_| TransportError::Closed),
            Some(timeout) => self.reply_rx.recv_timeout(timeout).map_err(|err| match err {
                RecvTimeoutError::Timeout => TransportError::Timeout,
                RecvTimeoutError::Disconnected => TransportError::Closed,
            }),
        }
    }
}

impl Drop for LoopbackClient {
    fn drop(&mut self) {
        self.replies.lock().remove(&self.id);
    }
}

/// Server end of the loopback.
pub struct LoopbackServer {
    request_rx: Receiver<(SenderId, Vec<u8>)>,
    replies: ReplyTable,
}

impl Transport for LoopbackServer {
    type Error = TransportError;

    fn recv(&mut self) -> Result<Option<(SenderId, Vec<u8>)>, Self::Error> {
        // Disconnected means every connector and client has been dropped.
        Ok(self.request_rx.recv().ok())
    }

    fn send(&mut self, to: SenderId, frame: &[u8]) -> Result<(), Self::Error> {
        let replies = self.replies.lock();
        let reply_tx = replies.get(&to).ok_or(TransportError::Closed)?;
        reply_tx.send(frame.to_vec()).map_err(|_| TransportError::Closed)
    }
}
