// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-region, fixed-block, first-fit memory manager.
//!
//! A [`MemoryRegion`] is a contiguous array of fixed-size blocks. Every
//! allocation consumes one in-band [`EntryHeader`] followed by its payload,
//! both rounded up to a whole number of blocks; the chain of entries, walked
//! by `next`, always covers the region exactly. There is no left-merge on
//! free: an entry only ever absorbs its immediate right neighbor.
//!
//! `helios_kernel` keeps two of these: one "kernel" region for descriptors
//! the application must not free directly (task descriptors, the registry's
//! own bookkeeping), and one "heap" region for everything handed back to
//! callers (snapshots, queues, messages). Both run the same machinery; only
//! the `protected` bit on each allocation and which region a call targets
//! differ.

use alloc::vec;
use alloc::vec::Vec;
use helios_abi::{kassert, HelioError};
use unwrap_lite::UnwrapLite;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::diag::DiagEvent;

const NIL: u32 = u32::MAX;

#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct EntryHeader {
    free: u8,
    protected: u8,
    _pad: u16,
    blocks: u32,
    next: u32,
}

/// Byte size of one entry header, for callers (namely [`crate::config`]) that
/// need to reason about how many blocks an allocation's bookkeeping costs
/// without duplicating the layout here.
pub(crate) const fn entry_header_size() -> usize {
    core::mem::size_of::<EntryHeader>()
}

/// The address of a live allocation's payload, as returned by
/// [`MemoryRegion::allocate`]. Opaque outside the kernel crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapAddress(pub(crate) u32);

impl HeapAddress {
    pub(crate) const NIL: u32 = u32::MAX;

    pub(crate) fn raw(&self) -> u32 {
        self.0
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        (raw != Self::NIL).then_some(HeapAddress(raw))
    }
}

/// Which of the two regions an allocation lives in. Used by higher-level
/// modules to remember where to free something without threading a
/// `&MemoryRegion` reference through every data structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Kernel,
    Heap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionStats {
    pub entries_in_use: usize,
    pub largest_free_run_blocks: usize,
    pub smallest_free_run_blocks: usize,
    pub entries_in_use_high_water: usize,
}

pub struct MemoryRegion {
    kind: RegionKind,
    storage: Vec<u8>,
    block_size: usize,
    block_count: usize,
    entry_size_in_blocks: usize,
    corrupt: bool,
    entries_in_use_high_water: usize,
}

impl MemoryRegion {
    pub fn new(kind: RegionKind, block_size: usize, block_count: usize) -> Self {
        let header_size = core::mem::size_of::<EntryHeader>();
        let entry_size_in_blocks = (header_size + block_size - 1) / block_size;
        let mut storage = vec![0u8; block_size * block_count];
        {
            let header = EntryHeader::mut_from_bytes(&mut storage[..header_size]).unwrap_lite();
            header.free = 1;
            header.protected = 0;
            header.blocks = block_count as u32;
            header.next = NIL;
        }
        MemoryRegion {
            kind,
            storage,
            block_size,
            block_count,
            entry_size_in_blocks,
            corrupt: false,
            entries_in_use_high_water: 0,
        }
    }

    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    pub fn is_corrupt(&self) -> bool {
        self.corrupt
    }

    pub fn region_size_bytes(&self) -> usize {
        self.block_size * self.block_count
    }

    fn header_bytes(&self, block: u32) -> core::ops::Range<usize> {
        let header_size = core::mem::size_of::<EntryHeader>();
        let off = block as usize * self.block_size;
        off..off + header_size
    }

    fn header_at(&self, block: u32) -> &EntryHeader {
        EntryHeader::ref_from_bytes(&self.storage[self.header_bytes(block)]).unwrap_lite()
    }

    fn header_at_mut(&mut self, block: u32) -> &mut EntryHeader {
        let range = self.header_bytes(block);
        EntryHeader::mut_from_bytes(&mut self.storage[range]).unwrap_lite()
    }

    fn payload_range(&self, block: u32, blocks: u32) -> core::ops::Range<usize> {
        let start = (block as usize + self.entry_size_in_blocks) * self.block_size;
        let end = (block as usize + blocks as usize) * self.block_size;
        start..end
    }

    /// Walks the entry chain from the head, verifying it covers exactly
    /// `block_count` blocks with every `next` pointer in range. If `addr` is
    /// given, also verifies it is the payload address of some entry in the
    /// chain. Any failure latches [`MemoryRegion::is_corrupt`].
    fn check_integrity(&mut self, addr: Option<HeapAddress>) -> Result<(), HelioError> {
        if self.corrupt {
            return Err(HelioError::CorruptHeap);
        }
        let mut covered = 0u64;
        let mut block = 0u32;
        let mut found_addr = addr.is_none();
        loop {
            if block as usize >= self.block_count {
                self.latch_corrupt();
                return Err(HelioError::CorruptHeap);
            }
            let header = *self.header_at(block);
            if header.blocks == 0 {
                self.latch_corrupt();
                return Err(HelioError::CorruptHeap);
            }
            if let Some(a) = addr {
                let range = self.payload_range(block, header.blocks);
                if range.start as u32 == a.0 {
                    found_addr = true;
                }
            }
            covered += header.blocks as u64;
            if header.next == NIL {
                break;
            }
            if header.next as usize >= self.block_count || header.next <= block {
                self.latch_corrupt();
                return Err(HelioError::CorruptHeap);
            }
            block = header.next;
        }
        if covered != self.block_count as u64 || !found_addr {
            self.latch_corrupt();
            return Err(HelioError::CorruptHeap);
        }
        Ok(())
    }

    /// Test-only hook to simulate a detected corruption without having to
    /// hand-forge a broken entry chain.
    #[cfg(test)]
    pub(crate) fn force_corrupt_for_test(&mut self) {
        self.corrupt = true;
    }

    fn latch_corrupt(&mut self) {
        self.corrupt = true;
        ringbuf::ringbuf_entry!(crate::KERNEL_RINGBUF, DiagEvent::HeapCorrupt { region: self.kind });
    }

    /// Locates the entry whose payload begins at `addr`, without running the
    /// full chain-coverage check and without latching corruption on a miss.
    /// Used by `free`, where an unrecognized address is ordinary caller
    /// error rather than evidence of heap corruption.
    fn resolve(&self, addr: HeapAddress) -> Option<u32> {
        let mut block = 0u32;
        loop {
            let header = *self.header_at(block);
            let range = self.payload_range(block, header.blocks);
            if range.start as u32 == addr.0 {
                return Some(block);
            }
            if header.next == NIL {
                return None;
            }
            block = header.next;
        }
    }

    pub fn allocate(&mut self, request_size: usize, privileged: bool) -> Result<HeapAddress, HelioError> {
        if request_size == 0 {
            return Err(HelioError::InvalidArgument);
        }
        self.check_integrity(None)?;
        let payload_blocks = (request_size + self.block_size - 1) / self.block_size;
        let requested_blocks = self.entry_size_in_blocks + payload_blocks;

        let mut block = 0u32;
        let found = loop {
            let header = *self.header_at(block);
            if header.free != 0 && header.blocks >= requested_blocks as u32 {
                break block;
            }
            if header.next == NIL {
                ringbuf::ringbuf_entry!(
                    crate::KERNEL_RINGBUF,
                    DiagEvent::OutOfMemory {
                        region: self.kind,
                        request_size,
                    }
                );
                return Err(HelioError::OutOfMemory);
            }
            block = header.next;
        };

        let found_header = *self.header_at(found);
        if found_header.blocks > requested_blocks as u32 {
            let new_block = found + requested_blocks as u32;
            let remainder = found_header.blocks - requested_blocks as u32;
            {
                let new_header = self.header_at_mut(new_block);
                new_header.free = 1;
                new_header.protected = 0;
                new_header.blocks = remainder;
                new_header.next = found_header.next;
            }
            let header = self.header_at_mut(found);
            header.blocks = requested_blocks as u32;
            header.next = new_block;
        }
        {
            let header = self.header_at_mut(found);
            header.free = 0;
            header.protected = privileged as u8;
        }

        let header = *self.header_at(found);
        let range = self.payload_range(found, header.blocks);
        let payload_addr = range.start as u32;
        self.storage[range].fill(0);

        self.entries_in_use_high_water =
            self.entries_in_use_high_water.max(self.count_entries_in_use());
        Ok(HeapAddress(payload_addr))
    }

    pub fn free(&mut self, addr: HeapAddress, privileged: bool) -> Result<(), HelioError> {
        self.check_integrity(Some(addr))?;
        let block = self.resolve(addr).unwrap_lite();
        let header = *self.header_at(block);
        if header.free != 0 {
            return Err(HelioError::InvalidArgument);
        }
        if (header.protected != 0) != privileged {
            return Err(HelioError::InvalidArgument);
        }
        {
            let header = self.header_at_mut(block);
            header.free = 1;
            header.protected = 0;
        }
        let next = self.header_at(block).next;
        if next != NIL {
            kassert!((next as usize) < self.block_count && next > block);
            let next_header = *self.header_at(next);
            if next_header.free != 0 {
                let merged_blocks = self.header_at(block).blocks + next_header.blocks;
                let header = self.header_at_mut(block);
                header.blocks = merged_blocks;
                header.next = next_header.next;
            }
        }
        Ok(())
    }

    /// Reads the payload of a live allocation. Fails if `addr` does not
    /// resolve to a currently-allocated entry.
    pub fn read(&self, addr: HeapAddress) -> Result<&[u8], HelioError> {
        let block = self.resolve(addr).ok_or(HelioError::NotFound)?;
        let header = *self.header_at(block);
        if header.free != 0 {
            return Err(HelioError::NotFound);
        }
        Ok(&self.storage[self.payload_range(block, header.blocks)])
    }

    pub fn write(&mut self, addr: HeapAddress, data: &[u8]) -> Result<(), HelioError> {
        let block = self.resolve(addr).ok_or(HelioError::NotFound)?;
        let header = *self.header_at(block);
        if header.free != 0 {
            return Err(HelioError::NotFound);
        }
        let range = self.payload_range(block, header.blocks);
        if data.len() > range.len() {
            return Err(HelioError::InvalidArgument);
        }
        self.storage[range.start..range.start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn count_entries_in_use(&self) -> usize {
        let mut block = 0u32;
        let mut count = 0;
        loop {
            let header = *self.header_at(block);
            if header.free == 0 {
                count += 1;
            }
            if header.next == NIL {
                break;
            }
            block = header.next;
        }
        count
    }

    /// Sum of `blocks` across the entry chain. Used by the P3 coverage test
    /// and available for debug inspection.
    pub fn blocks_covered(&self) -> u64 {
        let mut block = 0u32;
        let mut total = 0u64;
        loop {
            let header = *self.header_at(block);
            total += header.blocks as u64;
            if header.next == NIL {
                break;
            }
            block = header.next;
        }
        total
    }

    pub fn region_used_bytes(&mut self) -> Result<usize, HelioError> {
        self.check_integrity(None)?;
        let mut block = 0u32;
        let mut used = 0usize;
        loop {
            let header = *self.header_at(block);
            if header.free == 0 {
                used += header.blocks as usize * self.block_size;
            }
            if header.next == NIL {
                break;
            }
            block = header.next;
        }
        Ok(used)
    }

    pub fn stats(&mut self) -> Result<RegionStats, HelioError> {
        self.check_integrity(None)?;
        let mut block = 0u32;
        let mut entries_in_use = 0usize;
        let mut largest_free = 0usize;
        let mut smallest_free = usize::MAX;
        loop {
            let header = *self.header_at(block);
            if header.free == 0 {
                entries_in_use += 1;
            } else {
                largest_free = largest_free.max(header.blocks as usize);
                smallest_free = smallest_free.min(header.blocks as usize);
            }
            if header.next == NIL {
                break;
            }
            block = header.next;
        }
        if smallest_free == usize::MAX {
            smallest_free = 0;
        }
        Ok(RegionStats {
            entries_in_use,
            largest_free_run_blocks: largest_free,
            smallest_free_run_blocks: smallest_free,
            entries_in_use_high_water: self.entries_in_use_high_water,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> MemoryRegion {
        MemoryRegion::new(RegionKind::Heap, 32, 64)
    }

    #[test]
    fn allocate_zero_size_fails() {
        let mut r = region();
        assert_eq!(r.allocate(0, false), Err(HelioError::InvalidArgument));
    }

    #[test]
    fn allocate_is_zeroed() {
        let mut r = region();
        let addr = r.allocate(64, false).unwrap();
        assert!(r.read(addr).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn free_then_coalesce_covers_region() {
        let mut r = region();
        let a = r.allocate(32, false).unwrap();
        let b = r.allocate(32, false).unwrap();
        assert_eq!(r.blocks_covered(), 64);
        r.free(a, false).unwrap();
        r.free(b, false).unwrap();
        assert_eq!(r.blocks_covered(), 64);
        let stats = r.stats().unwrap();
        assert_eq!(stats.entries_in_use, 0);
    }

    #[test]
    fn protected_allocation_resists_unprivileged_free() {
        let mut r = region();
        let addr = r.allocate(32, true).unwrap();
        assert_eq!(r.free(addr, false), Err(HelioError::InvalidArgument));
        assert!(r.read(addr).is_ok());
    }

    #[test]
    fn out_of_memory_when_no_fit() {
        let mut r = MemoryRegion::new(RegionKind::Heap, 32, 4);
        assert_eq!(r.allocate(1024, false), Err(HelioError::OutOfMemory));
    }
}
