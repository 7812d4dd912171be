// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Holder slot: a try-acquire exclusivity flag that remembers who owns it.

use core::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::SenderId;

const VACANT: u64 = u64::MAX;

/// Binary semaphore with try-acquire only; the stored value is the holder.
pub(crate) struct HolderSlot {
    holder: AtomicU64,
}

impl HolderSlot {
    pub(crate) const fn new() -> Self {
        Self { holder: AtomicU64::new(VACANT) }
    }

    /// Claims the slot for `sender` if it is vacant. Never waits.
    pub(crate) fn try_acquire(&self, sender: SenderId) -> bool {
        self.holder
            .compare_exchange(VACANT, sender.value(), Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Retries [`Self::try_acquire`] until `deadline` passes.
    pub(crate) fn acquire_until(&self, sender: SenderId, deadline: Instant) -> bool {
        loop {
            if self.try_acquire(sender) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            core::hint::spin_loop();
            std::thread::yield_now();
        }
    }

    /// Vacates the slot if `sender` holds it.
    pub(crate) fn release(&self, sender: SenderId) -> bool {
        self.holder
            .compare_exchange(sender.value(), VACANT, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }

    pub(crate) fn is_held_by(&self, sender: SenderId) -> bool {
        self.holder.load(Ordering::Acquire) == sender.value()
    }

    pub(crate) fn holder(&self) -> Option<SenderId> {
        SenderId::new(self.holder.load(Ordering::Acquire))
    }
}
