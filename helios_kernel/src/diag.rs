// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Zero-allocation diagnostic trail.
//!
//! There is no console and no heap to print to by default, so observability
//! works the way it does in the rest of this code base: a fixed-capacity
//! ring buffer of the most recent kernel events, inspectable post-mortem
//! with a debugger. Record a new variant here, then call
//! `ringbuf::ringbuf_entry!(crate::KERNEL_RINGBUF, ...)` at the site that
//! observes it. The ring buffer itself is declared at the crate root (see
//! `lib.rs`), not in this module: `ringbuf!`'s generated `static` has
//! whatever visibility the declaring module has, and every other module in
//! this crate needs to reach it, so it has to live somewhere all of them
//! descend from.

use crate::mem::RegionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    /// Dispatched because the task was `Waiting` on a notification or timer.
    Event,
    /// Dispatched as the pass's single runtime-balanced `Running` candidate.
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagEvent {
    Init,
    HeapCorrupt {
        region: RegionKind,
    },
    OutOfMemory {
        region: RegionKind,
        request_size: usize,
    },
    TaskDispatched {
        id: u32,
        kind: DispatchKind,
        last_run_time: u32,
    },
    WatchdogTripped {
        id: u32,
        last_run_time: u32,
        wd_timer_period: u32,
    },
    OverflowCompressed,
}
