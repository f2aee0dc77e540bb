// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// A non-owning reference to a task descriptor held by the registry.
///
/// Combines the descriptor's slot index with its `id`. The registry never
/// reuses a slot index once assigned, but carrying `id` as well lets a
/// lookup reject a handle from a task that has since been deleted even if
/// some future registry implementation ever did reuse slots. Callers never
/// construct one of these directly; they come back from `create_task` and
/// the various `get_handle_by_*` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    index: u32,
    id: u32,
}

impl TaskHandle {
    /// Builds a handle for a known slot index and task id.
    ///
    /// This is a registry-internal operation exposed publicly only because
    /// `helios_kernel` lives in a separate crate from this one; task code
    /// has no legitimate reason to call it.
    pub const fn for_index_and_id(index: u32, id: u32) -> Self {
        TaskHandle { index, id }
    }

    pub const fn index(&self) -> u32 {
        self.index
    }

    pub const fn id(&self) -> u32 {
        self.id
    }
}
