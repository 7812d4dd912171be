// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scoped session: holds the channel until closed or dropped.

use log::warn;

use crate::{ExclusiveChannel, Result, SenderId};

/// Active session on an [`ExclusiveChannel`]. Dropping it closes the channel.
pub struct Session<'a> {
    channel: &'a ExclusiveChannel,
    sender: SenderId,
    open: bool,
}

impl<'a> Session<'a> {
    pub(crate) fn new(channel: &'a ExclusiveChannel, sender: SenderId) -> Self {
        Self { channel, sender, open: true }
    }

    /// Identity holding the channel.
    pub fn sender(&self) -> SenderId {
        self.sender
    }

    /// See [`ExclusiveChannel::on_write`].
    pub fn write(&self, input: &[u8], declared_len: usize) -> Result<usize> {
        self.channel.on_write(self.sender, input, declared_len)
    }

    /// See [`ExclusiveChannel::on_read`].
    pub fn read(&self, dest: &mut [u8]) -> Result<usize> {
        self.channel.on_read(self.sender, dest)
    }

    /// See [`ExclusiveChannel::read_message`].
    pub fn read_message(&self, capacity: usize) -> Result<Vec<u8>> {
        self.channel.read_message(self.sender, capacity)
    }

    /// Closes the session and reports the outcome.
    pub fn close(mut self) -> Result<()> {
        self.open = false;
        self.channel.on_close(self.sender)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.channel.on_close(self.sender) {
                warn!("{}: dropping session of {}: {err}", self.channel.name(), self.sender);
            }
        }
    }
}
