// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Read-only snapshot returned by `Kernel::system_info()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemInfo {
    pub product_name: &'static str,
    /// (major, minor, patch)
    pub version: (u8, u8, u8),
    pub kernel_region_bytes: usize,
    pub heap_region_bytes: usize,
}
