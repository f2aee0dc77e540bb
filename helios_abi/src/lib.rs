// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types shared between the kernel and task code: task handles and state,
//! the error kind returned by every fallible kernel operation, fixed-width
//! byte buffers used for notification values and message payloads, and the
//! system-wide flag register.
//!
//! This crate is deliberately small and has no dependency on `helios_kernel`
//! so that task-side code can depend on it without pulling in the scheduler,
//! the allocator, or any of the kernel's internal state.

#![cfg_attr(not(test), no_std)]

pub mod assert_hook;
mod buf;
mod error;
mod flags;
mod handle;
mod info;
mod state;

pub use buf::ByteBuf;
pub use error::HelioError;
pub use flags::SystemFlags;
pub use handle::TaskHandle;
pub use info::SystemInfo;
pub use state::TaskState;

/// Width, in bytes, of a task name. Names shorter than this are padded with
/// zero bytes; comparison is byte-for-byte over the full width, not
/// null-terminated.
pub const TASK_NAME_BYTES: usize = 8;

/// Width, in bytes, of a notification value.
pub const NOTIFICATION_VALUE_BYTES: usize = 8;

/// Width, in bytes, of a message payload.
pub const MESSAGE_VALUE_BYTES: usize = 8;

/// A task name: a fixed-width, non-null-terminated byte string.
pub type TaskName = ByteBuf<TASK_NAME_BYTES>;

/// A notification value.
pub type NotificationValue = ByteBuf<NOTIFICATION_VALUE_BYTES>;

/// A message payload.
pub type MessageValue = ByteBuf<MESSAGE_VALUE_BYTES>;

/// Monotonic tick type supplied by the portability layer. May wrap.
pub type Ticks = u32;
