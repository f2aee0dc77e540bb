// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use zerocopy::{Immutable, IntoBytes, KnownLayout};

/// A fixed-width byte buffer used for task names, notification values, and
/// message payloads.
///
/// Copies into and out of a `ByteBuf` are always the full `N` bytes, never
/// just the "significant" prefix a caller claims is meaningful: the bytes
/// past that prefix are implementation-visible state (an unread
/// notification's trailing bytes, a queue message's padding) and must be
/// zeroed whenever the buffer is cleared rather than left holding whatever
/// the previous occupant wrote there.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct ByteBuf<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> ByteBuf<N> {
    pub const WIDTH: usize = N;

    /// A zero-filled buffer.
    pub const fn zeroed() -> Self {
        ByteBuf { bytes: [0u8; N] }
    }

    /// Wraps a caller-supplied full-width buffer.
    pub const fn from_array(bytes: [u8; N]) -> Self {
        ByteBuf { bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_array(&self) -> &[u8; N] {
        &self.bytes
    }

    pub fn clear(&mut self) {
        self.bytes = [0u8; N];
    }
}

impl<const N: usize> Default for ByteBuf<N> {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<const N: usize> From<[u8; N]> for ByteBuf<N> {
    fn from(bytes: [u8; N]) -> Self {
        ByteBuf { bytes }
    }
}
