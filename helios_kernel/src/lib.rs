// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HelioKern: a cooperative, runtime-balanced scheduler, a two-region
//! fixed-block allocator, and the task-local event primitives (notification
//! slot, software timer, watchdog) and bounded message queue built on top
//! of it.
//!
//! Everything lives off a single owned [`Kernel`] value built by
//! [`Kernel::init`]; there is no global kernel state for this crate to hide
//! behind a lock or a `static`.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod assert_hook {
    pub use helios_abi::assert_hook::*;
}

pub mod api;
mod config;
mod diag;
mod mem;
mod notify;
mod port;
mod queue;
mod sched;
mod task;
mod timer;

pub use config::HelioKernelConfig;
pub use diag::{DiagEvent, DispatchKind};
pub use mem::{HeapAddress, RegionKind, RegionStats};
pub use notify::NotificationSnapshot;
pub use port::{Platform, StdPlatform};
pub use queue::{MessageSnapshot, QueueHandle, QUEUE_MINIMUM_LIMIT};
pub use sched::Kernel;
pub use task::{TaskCallback, TaskInfo, TaskRuntimeStats};

pub use helios_abi::{
    HelioError, MessageValue, NotificationValue, SystemFlags, SystemInfo, TaskHandle, TaskName,
    TaskState, Ticks, MESSAGE_VALUE_BYTES, NOTIFICATION_VALUE_BYTES, TASK_NAME_BYTES,
};

// Declared at the crate root, not in `diag`, so that every module in this
// crate (all of them descend from here) can reach it as `crate::KERNEL_RINGBUF`.
ringbuf::ringbuf!(KERNEL_RINGBUF, DiagEvent, 64, DiagEvent::Init);
