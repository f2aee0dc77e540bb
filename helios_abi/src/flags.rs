// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

bitflags::bitflags! {
    /// The kernel's process-wide flag register.
    ///
    /// `CORRUPT` is an aggregate: each memory region latches its own
    /// integrity failure independently (see `helios_kernel::mem`), and this
    /// bit is set the moment either one does, so a caller can check "is
    /// anything broken" without asking both regions by hand.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SystemFlags: u8 {
        /// The scheduler loop is active.
        const RUNNING = 1 << 0;
        /// A task's `total_run_time` wrapped during the last dispatch.
        const OVERFLOW = 1 << 1;
        /// At least one memory region has failed its integrity check.
        const CORRUPT = 1 << 2;
        /// The current call is executing in privileged (kernel) mode.
        const PRIVILEGED = 1 << 3;
    }
}

impl Default for SystemFlags {
    fn default() -> Self {
        SystemFlags::empty()
    }
}
