// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Optional hook for internal precondition failures.
//!
//! Assertions never alter control flow: `kassert!` calls the hook, if one is
//! registered, and then falls through. This mirrors the original kernel's
//! build-time-optional assert mechanism rather than Rust's `assert!`, which
//! unwinds or aborts; a kernel precondition failing is evidence of heap or
//! registry corruption already handled by the caller's own error path
//! (`CorruptHeap`, `NotFound`, ...), not a reason to panic on top of it.

use core::sync::atomic::{AtomicUsize, Ordering};

/// Signature of an application-provided assert hook: file, then line.
pub type AssertHook = fn(&'static str, u32);

static HOOK: AtomicUsize = AtomicUsize::new(0);

/// Registers the hook called by `kassert!` on a failed precondition.
pub fn set_assert_hook(hook: AssertHook) {
    HOOK.store(hook as usize, Ordering::Release);
}

/// Invokes the registered hook, if any, with the given location.
///
/// Called by the `kassert!` macro; not normally called directly.
pub fn fire(file: &'static str, line: u32) {
    let raw = HOOK.load(Ordering::Acquire);
    if raw != 0 {
        // Safety: the only value ever stored is a `fn(&'static str, u32)`
        // cast to `usize` by `set_assert_hook`.
        let hook: AssertHook = unsafe { core::mem::transmute(raw) };
        hook(file, line);
    }
}

/// Checks a condition; on failure, calls the registered assert hook with the
/// call site and continues executing.
#[macro_export]
macro_rules! kassert {
    ($cond:expr) => {
        if !($cond) {
            $crate::assert_hook::fire(file!(), line!());
        }
    };
}
