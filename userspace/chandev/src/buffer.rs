// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity message storage with a bounds-checked formatted write.

use crate::{Error, Result};

/// Builds the stored form of a write: `input` up to its first NUL, then `(<n> letters)`.
///
/// `declared_len` is taken as supplied by the writer; it is not compared with `input`.
pub fn format_message(input: &[u8], declared_len: usize) -> Vec<u8> {
    let text = match input.iter().position(|byte| *byte == 0) {
        Some(end) => &input[..end],
        None => input,
    };
    let mut staged = Vec::with_capacity(text.len() + 24);
    staged.extend_from_slice(text);
    staged.extend_from_slice(format!("({declared_len} letters)").as_bytes());
    staged
}

/// Zero-initialised bytes plus the length of the current message.
pub(crate) struct MessageBuffer {
    bytes: Box<[u8]>,
    len: usize,
}

impl MessageBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { bytes: vec![0u8; capacity].into_boxed_slice(), len: 0 }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Replaces the message with the formatted write. On overflow nothing changes.
    pub(crate) fn store(&mut self, input: &[u8], declared_len: usize) -> Result<usize> {
        let staged = format_message(input, declared_len);
        if staged.len() > self.capacity() {
            return Err(Error::BufferOverflow { needed: staged.len(), capacity: self.capacity() });
        }
        self.bytes[..staged.len()].copy_from_slice(&staged);
        self.bytes[staged.len()..].fill(0);
        self.len = staged.len();
        Ok(self.len)
    }
}
