// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kernel configuration.
//!
//! Replaces the original's preprocessor `#define`s with a plain struct: a
//! `const DEFAULT` for the common case, and a validating constructor for
//! integrators who compute region sizing from board-specific data that
//! isn't always a literal.

use helios_abi::HelioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelioKernelConfig {
    pub block_size: usize,
    pub kernel_region_blocks: usize,
    pub heap_region_blocks: usize,
    pub message_value_bytes: usize,
    pub notification_value_bytes: usize,
    pub task_name_bytes: usize,
    pub queue_minimum_limit: usize,
}

impl HelioKernelConfig {
    /// The defaults named in the original's `config.h`: an 8-byte message,
    /// notification, and task-name width, a 32-byte block, and a 5-message
    /// queue floor. Region sizes here match the 128-block mid-range
    /// platform default; smaller (32) and larger (512) platforms are
    /// expected to build their own `HelioKernelConfig` value.
    pub const DEFAULT: HelioKernelConfig = HelioKernelConfig {
        block_size: 32,
        kernel_region_blocks: 128,
        heap_region_blocks: 128,
        message_value_bytes: 8,
        notification_value_bytes: 8,
        task_name_bytes: 8,
        queue_minimum_limit: 5,
    };

    /// Validates a configuration, rejecting region sizes too small to hold
    /// even one entry descriptor plus a single block of payload, and a
    /// queue floor of zero.
    pub fn validated(self) -> Result<Self, HelioError> {
        let header_blocks = entry_size_in_blocks(self.block_size);
        if self.block_size == 0
            || self.kernel_region_blocks < header_blocks + 1
            || self.heap_region_blocks < header_blocks + 1
            || self.queue_minimum_limit < 1
            || self.message_value_bytes == 0
            || self.notification_value_bytes == 0
            || self.task_name_bytes == 0
        {
            return Err(HelioError::InvalidArgument);
        }
        Ok(self)
    }
}

impl Default for HelioKernelConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn entry_size_in_blocks(block_size: usize) -> usize {
    let header_size = crate::mem::entry_header_size();
    (header_size + block_size - 1) / block_size
}
