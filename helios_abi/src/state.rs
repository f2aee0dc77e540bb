// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// A task's place in the scheduler's lifecycle.
///
/// `Running` is eligibility for the runtime balancer, not a claim that the
/// task is presently executing a callback: the scheduler is single-threaded,
/// so at most one task is ever actually on the call stack. `Error` is never
/// stored in a task descriptor; it is returned only by queries (`get_state`
/// and friends) when the handle they were given doesn't resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Suspended,
    Running,
    Waiting,
    Error,
}

impl Default for TaskState {
    fn default() -> Self {
        TaskState::Suspended
    }
}
