// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded FIFO message queue.
//!
//! Both the queue header and every message in it are allocations in the
//! user [`MemoryRegion`](crate::mem::MemoryRegion): this is the one place
//! besides the allocator's own tests where the allocator's invariants (a
//! fit exists, a freed run coalesces, a corrupt region refuses further
//! work) are exercised by another subsystem rather than by a test calling
//! `allocate`/`free` directly.

use helios_abi::{HelioError, MessageValue};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::mem::{HeapAddress, MemoryRegion};

const NIL: u32 = u32::MAX;

#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct QueueHeader {
    limit: u32,
    length: u32,
    head: u32,
    tail: u32,
}

#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct MessageHeader {
    bytes: u32,
    next: u32,
}

/// Opaque handle to a live queue: the address of its header in the user
/// region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueHandle(HeapAddress);

/// Snapshot returned by `peek`/`receive`.
#[derive(Debug, Clone, Copy)]
pub struct MessageSnapshot {
    pub bytes: usize,
    pub value: MessageValue,
}

/// Minimum `limit` accepted by `create`.
pub const QUEUE_MINIMUM_LIMIT: usize = 5;

fn read_header(region: &MemoryRegion, addr: HeapAddress) -> Result<QueueHeader, HelioError> {
    let bytes = region.read(addr)?;
    QueueHeader::read_from_bytes(&bytes[..core::mem::size_of::<QueueHeader>()])
        .map_err(|_| HelioError::CorruptHeap)
}

fn write_header(
    region: &mut MemoryRegion,
    addr: HeapAddress,
    header: QueueHeader,
) -> Result<(), HelioError> {
    region.write(addr, header.as_bytes())
}

fn read_message(region: &MemoryRegion, addr: HeapAddress) -> Result<MessageHeader, HelioError> {
    let bytes = region.read(addr)?;
    MessageHeader::read_from_bytes(&bytes[..core::mem::size_of::<MessageHeader>()])
        .map_err(|_| HelioError::CorruptHeap)
}

fn message_payload(region: &MemoryRegion, addr: HeapAddress) -> Result<&[u8], HelioError> {
    let bytes = region.read(addr)?;
    Ok(&bytes[core::mem::size_of::<MessageHeader>()..])
}

pub fn create(
    region: &mut MemoryRegion,
    limit: usize,
    minimum_limit: usize,
) -> Result<QueueHandle, HelioError> {
    if limit < minimum_limit {
        return Err(HelioError::InvalidArgument);
    }
    let addr = region.allocate(core::mem::size_of::<QueueHeader>(), false)?;
    write_header(
        region,
        addr,
        QueueHeader {
            limit: limit as u32,
            length: 0,
            head: NIL,
            tail: NIL,
        },
    )?;
    Ok(QueueHandle(addr))
}

pub fn delete(region: &mut MemoryRegion, q: QueueHandle) -> Result<(), HelioError> {
    let header = read_header(region, q.0)?;
    let mut cursor = HeapAddress::from_raw(header.head);
    while let Some(addr) = cursor {
        let msg = read_message(region, addr)?;
        cursor = HeapAddress::from_raw(msg.next);
        region.free(addr, false)?;
    }
    region.free(q.0, false)
}

pub fn send(
    region: &mut MemoryRegion,
    q: QueueHandle,
    bytes: usize,
    value: MessageValue,
) -> Result<(), HelioError> {
    if bytes == 0 || bytes > MessageValue::WIDTH {
        return Err(HelioError::InvalidArgument);
    }
    let mut header = read_header(region, q.0)?;
    if header.length >= header.limit {
        return Err(HelioError::QueueFull);
    }
    let msg_addr = region.allocate(
        core::mem::size_of::<MessageHeader>() + MessageValue::WIDTH,
        false,
    )?;
    let mut record = alloc::vec::Vec::with_capacity(core::mem::size_of::<MessageHeader>() + MessageValue::WIDTH);
    record.extend_from_slice(
        MessageHeader {
            bytes: bytes as u32,
            next: NIL,
        }
        .as_bytes(),
    );
    record.extend_from_slice(value.as_slice());
    region.write(msg_addr, &record)?;

    if let Some(tail) = HeapAddress::from_raw(header.tail) {
        let mut tail_msg = read_message(region, tail)?;
        tail_msg.next = msg_addr.raw();
        region.write(tail, tail_msg.as_bytes())?;
    } else {
        header.head = msg_addr.raw();
    }
    header.tail = msg_addr.raw();
    header.length += 1;
    write_header(region, q.0, header)
}

fn chain_len(region: &MemoryRegion, header: &QueueHeader) -> Result<usize, HelioError> {
    let mut count = 0usize;
    let mut cursor = HeapAddress::from_raw(header.head);
    while let Some(addr) = cursor {
        let msg = read_message(region, addr)?;
        count += 1;
        cursor = HeapAddress::from_raw(msg.next);
    }
    Ok(count)
}

/// Runs the chain-length cross-check every query performs: a mismatch
/// between the tallied chain length and `length` is reported as a plain
/// query failure, not an integrity-check panic, since by this point it is
/// evidence of corruption in a layer below us, not something this module
/// can repair.
fn verified_header(region: &MemoryRegion, q: QueueHandle) -> Result<QueueHeader, HelioError> {
    let header = read_header(region, q.0)?;
    if chain_len(region, &header)? != header.length as usize {
        return Err(HelioError::CorruptHeap);
    }
    Ok(header)
}

pub fn peek(region: &MemoryRegion, q: QueueHandle) -> Result<Option<MessageSnapshot>, HelioError> {
    let header = verified_header(region, q)?;
    let Some(head) = HeapAddress::from_raw(header.head) else {
        return Ok(None);
    };
    let msg = read_message(region, head)?;
    let payload = message_payload(region, head)?;
    let mut array = [0u8; 8];
    array.copy_from_slice(&payload[..MessageValue::WIDTH]);
    let value = MessageValue::from_array(array);
    Ok(Some(MessageSnapshot {
        bytes: msg.bytes as usize,
        value,
    }))
}

pub fn drop_front(region: &mut MemoryRegion, q: QueueHandle) -> Result<(), HelioError> {
    let mut header = verified_header(region, q)?;
    let Some(head) = HeapAddress::from_raw(header.head) else {
        return Ok(());
    };
    let msg = read_message(region, head)?;
    header.head = msg.next;
    if header.head == NIL {
        header.tail = NIL;
    }
    header.length -= 1;
    region.free(head, false)?;
    write_header(region, q.0, header)
}

pub fn receive(
    region: &mut MemoryRegion,
    q: QueueHandle,
) -> Result<Option<MessageSnapshot>, HelioError> {
    let snapshot = peek(region, q)?;
    if snapshot.is_some() {
        drop_front(region, q)?;
    }
    Ok(snapshot)
}

pub fn is_empty(region: &MemoryRegion, q: QueueHandle) -> Result<bool, HelioError> {
    Ok(verified_header(region, q)?.length == 0)
}

pub fn is_full(region: &MemoryRegion, q: QueueHandle) -> Result<bool, HelioError> {
    let header = verified_header(region, q)?;
    Ok(header.length >= header.limit)
}

pub fn messages_waiting(region: &MemoryRegion, q: QueueHandle) -> Result<usize, HelioError> {
    Ok(verified_header(region, q)?.length as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::RegionKind;

    fn region() -> MemoryRegion {
        MemoryRegion::new(RegionKind::Heap, 32, 64)
    }

    #[test]
    fn fifo_order_is_preserved_across_interleaved_send_and_receive() {
        let mut region = region();
        let q = create(&mut region, QUEUE_MINIMUM_LIMIT, QUEUE_MINIMUM_LIMIT).unwrap();

        send(&mut region, q, 1, MessageValue::from_array(*b"1\0\0\0\0\0\0\0")).unwrap();
        send(&mut region, q, 1, MessageValue::from_array(*b"2\0\0\0\0\0\0\0")).unwrap();
        let first = receive(&mut region, q).unwrap().unwrap();
        assert_eq!(first.value.as_slice()[0], b'1');

        send(&mut region, q, 1, MessageValue::from_array(*b"3\0\0\0\0\0\0\0")).unwrap();
        let second = receive(&mut region, q).unwrap().unwrap();
        assert_eq!(second.value.as_slice()[0], b'2');
        let third = receive(&mut region, q).unwrap().unwrap();
        assert_eq!(third.value.as_slice()[0], b'3');
        assert!(is_empty(&region, q).unwrap());
    }

    #[test]
    fn is_full_tracks_limit_exactly() {
        let mut region = region();
        let q = create(&mut region, QUEUE_MINIMUM_LIMIT, QUEUE_MINIMUM_LIMIT).unwrap();
        for _ in 0..QUEUE_MINIMUM_LIMIT {
            send(&mut region, q, 1, MessageValue::zeroed()).unwrap();
        }
        assert!(is_full(&region, q).unwrap());
        assert_eq!(
            send(&mut region, q, 1, MessageValue::zeroed()),
            Err(HelioError::QueueFull)
        );
        receive(&mut region, q).unwrap();
        assert!(!is_full(&region, q).unwrap());
    }

    #[test]
    fn create_below_minimum_limit_fails() {
        let mut region = region();
        assert_eq!(
            create(&mut region, QUEUE_MINIMUM_LIMIT - 1, QUEUE_MINIMUM_LIMIT),
            Err(HelioError::InvalidArgument)
        );
    }
}
