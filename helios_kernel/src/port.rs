// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The portability layer as a capability set.
//!
//! The tick source and interrupt primitives are an external collaborator
//! per the core's scope, not part of it; here they're a trait so the kernel
//! can be built and exercised without a target, the same role
//! `kern::arch::fake` plays for the teacher's own test builds.

use helios_abi::Ticks;

/// Everything the kernel needs from the platform: a monotonic tick count,
/// and a way to keep an interrupt-driven tick update from tearing a read.
/// Nesting of `disable_interrupts`/`enable_interrupts` is not required.
pub trait Platform {
    fn now(&self) -> Ticks;
    fn disable_interrupts(&self);
    fn enable_interrupts(&self);
}

/// Host/test implementation backed by a plain counter. There is no real
/// interrupt source to disable on the host, so those calls are no-ops.
#[derive(Debug, Default)]
pub struct StdPlatform {
    ticks: core::cell::Cell<Ticks>,
}

impl StdPlatform {
    pub const fn new() -> Self {
        StdPlatform {
            ticks: core::cell::Cell::new(0),
        }
    }

    /// Test hook: advances the simulated tick counter, wrapping as real
    /// hardware counters do.
    pub fn advance(&self, by: Ticks) {
        self.ticks.set(self.ticks.get().wrapping_add(by));
    }

    pub fn set(&self, at: Ticks) {
        self.ticks.set(at);
    }
}

impl Platform for StdPlatform {
    fn now(&self) -> Ticks {
        self.ticks.get()
    }

    fn disable_interrupts(&self) {}

    fn enable_interrupts(&self) {}
}
