// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-task software timer and watchdog.
//!
//! Both are deadline checks against the portability layer's tick source; a
//! period of zero disables the corresponding check. Nothing here is
//! interrupt-driven: the scheduler polls these at loop-top and at
//! dispatch-end respectively.

use helios_abi::Ticks;

use crate::port::Platform;
use crate::task::TaskDescriptor;

impl<P: Platform> TaskDescriptor<P> {
    /// Sets the task's timer period. Zero disables it.
    pub fn change_period(&mut self, period: Ticks) {
        self.timer_period = period;
    }

    /// Re-arms the timer against the current tick count, without touching
    /// `timer_period`.
    pub fn reset_timer(&mut self, now: Ticks) {
        self.timer_start_time = now;
    }

    /// Sets the task's watchdog period. Zero disables the watchdog.
    pub fn change_wd_period(&mut self, period: Ticks) {
        self.wd_timer_period = period;
    }

    /// True once `timer_period` ticks have elapsed since the timer was last
    /// armed. Always false while the timer is disabled.
    pub(crate) fn timer_elapsed(&self, now: Ticks) -> bool {
        self.timer_period > 0 && now.wrapping_sub(self.timer_start_time) > self.timer_period
    }

    /// True if the watchdog is enabled and the given dispatch duration
    /// overran it.
    pub(crate) fn watchdog_tripped(&self, last_run_time: Ticks) -> bool {
        self.wd_timer_period > 0 && last_run_time > self.wd_timer_period
    }
}
