// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! The exclusive channel: one holder, one bounded message buffer.
//!
//! State machine: `UNLOCKED -> on_open -> LOCKED -> on_close -> UNLOCKED`.
//! Opening a locked channel returns [`Error::Busy`] immediately; there is no
//! waiter queue and no ordering among competing openers.

use core::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::buffer::MessageBuffer;
use crate::lock::HolderSlot;
use crate::session::Session;
use crate::{ChannelConfig, Error, Result, SenderId};

/// Diagnostic snapshot. Counters are read without synchronisation and may lag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelStats {
    /// Successful opens since creation.
    pub open_count: u64,
    /// Opens refused because the channel was held.
    pub busy_rejections: u64,
    /// Length of the stored message.
    pub message_len: usize,
    /// Configured buffer capacity.
    pub capacity: usize,
    /// Whether a session is active.
    pub locked: bool,
}

/// Shared buffer mediated by a non-blocking exclusivity lock.
pub struct ExclusiveChannel {
    name: String,
    slot: HolderSlot,
    buffer: Mutex<MessageBuffer>,
    open_count: AtomicU64,
    busy_rejections: AtomicU64,
}

impl ExclusiveChannel {
    /// Creates an unlocked channel with a zeroed buffer.
    ///
    /// Fails without constructing anything if `config` does not validate.
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        config.validate()?;
        info!("{}: initialising channel (capacity {})", config.name, config.capacity);
        Ok(Self {
            name: config.name.clone(),
            slot: HolderSlot::new(),
            buffer: Mutex::new(MessageBuffer::new(config.capacity)),
            open_count: AtomicU64::new(0),
            busy_rejections: AtomicU64::new(0),
        })
    }

    /// Endpoint name the channel was configured with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum stored message size.
    pub fn capacity(&self) -> usize {
        self.buffer.lock().capacity()
    }

    /// Tries to make `sender` the holder. Returns the updated open count.
    pub fn on_open(&self, sender: SenderId) -> Result<u64> {
        if !self.slot.try_acquire(sender) {
            self.busy_rejections.fetch_add(1, Ordering::Relaxed);
            warn!("{}: device in use by another process ({sender} refused)", self.name);
            return Err(Error::Busy);
        }
        Ok(self.record_open(sender))
    }

    /// Like [`Self::on_open`], but keeps retrying for up to `timeout`.
    ///
    /// Callers that use this trade the immediate `Busy` for a bounded spin.
    pub fn open_timeout(&self, sender: SenderId, timeout: Duration) -> Result<u64> {
        let deadline = Instant::now() + timeout;
        if !self.slot.acquire_until(sender, deadline) {
            self.busy_rejections.fetch_add(1, Ordering::Relaxed);
            warn!("{}: device still in use after {timeout:?} ({sender} refused)", self.name);
            return Err(Error::Busy);
        }
        Ok(self.record_open(sender))
    }

    fn record_open(&self, sender: SenderId) -> u64 {
        let count = self.open_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!("{}: device has been opened {count} times ({sender})", self.name);
        count
    }

    /// Opens the channel and wraps the session in a guard that closes on drop.
    pub fn session(&self, sender: SenderId) -> Result<Session<'_>> {
        self.on_open(sender)?;
        Ok(Session::new(self, sender))
    }

    /// Stores `input` annotated with `declared_len` and returns `declared_len`.
    ///
    /// The return value acknowledges what the caller sent, not what was stored.
    pub fn on_write(&self, sender: SenderId, input: &[u8], declared_len: usize) -> Result<usize> {
        self.ensure_holder(sender)?;
        let stored = self.buffer.lock().store(input, declared_len).map_err(|err| {
            warn!("{}: write of {declared_len} chars rejected: {err}", self.name);
            err
        })?;
        info!("{}: received {declared_len} chars from the user", self.name);
        debug!("{}: stored message is {stored} bytes", self.name);
        Ok(declared_len)
    }

    /// Copies the whole current message into `dest` and returns its length.
    ///
    /// Reads never consume the message. If `dest` cannot take all of it, nothing
    /// is copied and [`Error::TransferFault`] is returned.
    pub fn on_read(&self, sender: SenderId, dest: &mut [u8]) -> Result<usize> {
        self.ensure_holder(sender)?;
        let staged = self.buffer.lock().as_slice().to_vec();
        if dest.len() < staged.len() {
            warn!(
                "{}: failed to send {} chars to the user (room for {})",
                self.name,
                staged.len(),
                dest.len()
            );
            return Err(Error::TransferFault);
        }
        dest[..staged.len()].copy_from_slice(&staged);
        info!("{}: sent {} chars to the user", self.name, staged.len());
        Ok(staged.len())
    }

    /// Owned variant of [`Self::on_read`] for a destination of `capacity` bytes.
    pub fn read_message(&self, sender: SenderId, capacity: usize) -> Result<Vec<u8>> {
        self.ensure_holder(sender)?;
        let staged = self.buffer.lock().as_slice().to_vec();
        if capacity < staged.len() {
            warn!(
                "{}: failed to send {} chars to the user (room for {capacity})",
                self.name,
                staged.len()
            );
            return Err(Error::TransferFault);
        }
        info!("{}: sent {} chars to the user", self.name, staged.len());
        Ok(staged)
    }

    /// Releases the channel. The stored message is kept for the next session.
    pub fn on_close(&self, sender: SenderId) -> Result<()> {
        if !self.slot.release(sender) {
            warn!("{}: close from {sender}, which does not hold the device", self.name);
            return Err(Error::NotHolder);
        }
        info!("{}: device successfully closed", self.name);
        Ok(())
    }

    /// Current holder, if any.
    pub fn holder(&self) -> Option<SenderId> {
        self.slot.holder()
    }

    /// Successful opens so far. Approximate under concurrency.
    pub fn open_count(&self) -> u64 {
        self.open_count.load(Ordering::Relaxed)
    }

    /// Returns a diagnostic snapshot.
    pub fn stats(&self) -> ChannelStats {
        let (message_len, capacity) = {
            let buffer = self.buffer.lock();
            (buffer.len(), buffer.capacity())
        };
        ChannelStats {
            open_count: self.open_count(),
            busy_rejections: self.busy_rejections.load(Ordering::Relaxed),
            message_len,
            capacity,
            locked: self.slot.holder().is_some(),
        }
    }

    fn ensure_holder(&self, sender: SenderId) -> Result<()> {
        if self.slot.is_held_by(sender) {
            Ok(())
        } else {
            warn!("{}: {sender} used the device without holding it", self.name);
            Err(Error::NotHolder)
        }
    }
}

impl Drop for ExclusiveChannel {
    fn drop(&mut self) {
        if let Some(holder) = self.slot.holder() {
            warn!("{}: torn down while {holder} still holds it", self.name);
        }
        info!("{}: exit", self.name);
    }
}
