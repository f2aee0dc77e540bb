// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-task notification slot: a single-producer single-consumer, one-deep
//! mailbox. Overwriting an unread value is always a hard failure; there is
//! no queueing.

use helios_abi::{HelioError, NotificationValue};

use crate::port::Platform;
use crate::task::TaskDescriptor;

/// Snapshot returned by `notify_take`.
#[derive(Debug, Clone, Copy)]
pub struct NotificationSnapshot {
    pub bytes: usize,
    pub value: NotificationValue,
}

impl<P: Platform> TaskDescriptor<P> {
    /// Fails if `bytes` is zero, exceeds the configured width, or the slot
    /// already holds an unread value. On success, copies the full-width
    /// buffer (not just the first `bytes` bytes — see `notify_take` for why
    /// the excess must stay meaningful bytes-and-all) and records how many
    /// of those bytes are significant.
    pub fn notify_give(
        &mut self,
        bytes: usize,
        value: NotificationValue,
    ) -> Result<(), HelioError> {
        if bytes == 0 || bytes > NotificationValue::WIDTH {
            return Err(HelioError::InvalidArgument);
        }
        if self.notification_bytes != 0 {
            return Err(HelioError::SlotFull);
        }
        self.notification_value = value;
        self.notification_bytes = bytes;
        Ok(())
    }

    /// Returns `None` if the slot is empty. Otherwise snapshots the slot and
    /// zeroes it (clearing both the byte count and the value buffer — the
    /// trailing bytes beyond the previous `bytes` are implementation state
    /// and must not leak into the next occupant of the slot).
    pub fn notify_take(&mut self) -> Option<NotificationSnapshot> {
        if self.notification_bytes == 0 {
            return None;
        }
        let snapshot = NotificationSnapshot {
            bytes: self.notification_bytes,
            value: self.notification_value,
        };
        self.notify_state_clear();
        Some(snapshot)
    }

    pub fn notify_is_waiting(&self) -> bool {
        self.notification_bytes > 0
    }

    pub fn notify_state_clear(&mut self) {
        self.notification_bytes = 0;
        self.notification_value.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_give_then_take() {
        let mut registry = crate::task::TaskRegistry::<crate::port::StdPlatform>::new();
        let handle = registry
            .create_task(Default::default(), |_, _, _| {}, core::ptr::null_mut())
            .unwrap();
        let d = registry.resolve_mut(handle).unwrap();
        assert!(!d.notify_is_waiting());
        d.notify_give(7, NotificationValue::from_array(*b"MESSAGE\0"))
            .unwrap();
        assert!(d.notify_is_waiting());
        assert_eq!(
            d.notify_give(3, NotificationValue::from_array(*b"xxxxxxxx")),
            Err(HelioError::SlotFull)
        );
        let snap = d.notify_take().unwrap();
        assert_eq!(snap.bytes, 7);
        assert_eq!(&snap.value.as_slice()[..7], b"MESSAGE");
        assert!(d.notify_take().is_none());
    }
}
