// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

/// The failure kinds a kernel operation can return.
///
/// Every public operation in `helios_kernel` returns `Result<T, HelioError>`.
/// `CorruptHeap` is latched: once a region reports it, every later
/// allocation against that region fails the same way. `SchedulerRunning` is
/// returned by `create_task`/`delete_task` while the scheduler loop is
/// active; it is not an error a task needs to recover from so much as a
/// reminder that task set mutation is a setup-time-only operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelioError {
    /// A null pointer, zero size, or out-of-range limit was passed.
    InvalidArgument,
    /// A handle, id, name, or address did not resolve to a live object.
    NotFound,
    /// `create_task`/`delete_task` called while the scheduler is running.
    SchedulerRunning,
    /// The notification slot already holds an unread value.
    SlotFull,
    /// The message queue is at its configured limit.
    QueueFull,
    /// No free run large enough to satisfy the request.
    OutOfMemory,
    /// The region's integrity check failed; the region is now unusable.
    CorruptHeap,
    /// A task's last dispatch exceeded its watchdog period.
    WatchdogExpired,
}

impl fmt::Display for HelioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            HelioError::InvalidArgument => "invalid argument",
            HelioError::NotFound => "not found",
            HelioError::SchedulerRunning => "scheduler running",
            HelioError::SlotFull => "notification slot full",
            HelioError::QueueFull => "queue full",
            HelioError::OutOfMemory => "out of memory",
            HelioError::CorruptHeap => "corrupt heap",
            HelioError::WatchdogExpired => "watchdog expired",
        };
        f.write_str(msg)
    }
}
