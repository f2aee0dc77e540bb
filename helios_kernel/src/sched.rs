// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The kernel: owns both memory regions and the task registry, and runs the
//! cooperative scheduler loop over them.
//!
//! There is exactly one of these per system, but it is a plain value rather
//! than a global: `Kernel::init` builds it, and every operation is a method
//! taking `&mut self`. A task's callback receives `&mut Kernel<P>` as the
//! only way back into kernel state, which is how it reaches `notify_give`,
//! `suspend_all`, and the rest without a singleton to reach through.

use alloc::vec::Vec;
use helios_abi::{
    HelioError, MessageValue, NotificationValue, SystemFlags, SystemInfo, TaskHandle, TaskName,
    TaskState, Ticks,
};

use crate::config::HelioKernelConfig;
use crate::diag::{DiagEvent, DispatchKind};
use crate::mem::{HeapAddress, MemoryRegion, RegionKind};
use crate::notify::NotificationSnapshot;
use crate::port::Platform;
use crate::queue::{self, MessageSnapshot, QueueHandle};
use crate::task::{TaskCallback, TaskInfo, TaskRegistry, TaskRuntimeStats};

pub struct Kernel<P: Platform> {
    platform: P,
    flags: SystemFlags,
    config: HelioKernelConfig,
    kernel_region: MemoryRegion,
    heap_region: MemoryRegion,
    registry: TaskRegistry<P>,
}

impl<P: Platform> Kernel<P> {
    /// Builds a fresh kernel from a validated configuration and a platform
    /// implementation. Both memory regions start out as one large free run;
    /// the registry starts empty.
    pub fn init(config: HelioKernelConfig, platform: P) -> Result<Self, HelioError> {
        let config = config.validated()?;
        ringbuf::ringbuf_entry!(crate::KERNEL_RINGBUF, DiagEvent::Init);
        Ok(Kernel {
            platform,
            flags: SystemFlags::empty(),
            kernel_region: MemoryRegion::new(
                RegionKind::Kernel,
                config.block_size,
                config.kernel_region_blocks,
            ),
            heap_region: MemoryRegion::new(
                RegionKind::Heap,
                config.block_size,
                config.heap_region_blocks,
            ),
            config,
            registry: TaskRegistry::new(),
        })
    }

    pub fn system_info(&self) -> SystemInfo {
        SystemInfo {
            product_name: "HelioKern",
            version: (0, 1, 0),
            kernel_region_bytes: self.kernel_region.region_size_bytes(),
            heap_region_bytes: self.heap_region.region_size_bytes(),
        }
    }

    pub fn config(&self) -> HelioKernelConfig {
        self.config
    }

    /// Gives a task's callback (or a test) access to the tick source and
    /// interrupt primitives without exposing kernel state through it.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    fn running(&self) -> bool {
        self.flags.contains(SystemFlags::RUNNING)
    }

    /// The process-wide flag register. `CORRUPT` is derived rather than
    /// stored: it is set the moment either region's own latch is set,
    /// computed here instead of mirrored into `self.flags` on every
    /// allocator call.
    pub fn system_flags(&self) -> SystemFlags {
        let mut flags = self.flags;
        if self.kernel_region.is_corrupt() || self.heap_region.is_corrupt() {
            flags.insert(SystemFlags::CORRUPT);
        }
        flags
    }

    // -- task lifecycle ---------------------------------------------------

    /// Fails with `SchedulerRunning` while the scheduler loop is active, and
    /// with `CorruptHeap` once the kernel region has latched corrupt: a
    /// descriptor registered on top of a region the allocator no longer
    /// trusts would just be more state to lose.
    pub fn create_task(
        &mut self,
        name: TaskName,
        callback: TaskCallback<P>,
        task_parameter: *mut (),
    ) -> Result<TaskHandle, HelioError> {
        if self.running() {
            return Err(HelioError::SchedulerRunning);
        }
        if self.kernel_region.is_corrupt() {
            return Err(HelioError::CorruptHeap);
        }
        self.registry.create_task(name, callback, task_parameter)
    }

    pub fn delete_task(&mut self, handle: TaskHandle) -> Result<(), HelioError> {
        if self.running() {
            return Err(HelioError::SchedulerRunning);
        }
        self.registry.delete_task(handle)
    }

    pub fn get_handle_by_name(&self, name: TaskName) -> Option<TaskHandle> {
        self.registry.get_handle_by_name(name)
    }

    pub fn get_handle_by_id(&self, id: u32) -> Option<TaskHandle> {
        self.registry.get_handle_by_id(id)
    }

    pub fn get_state(&self, handle: TaskHandle) -> TaskState {
        self.registry.get_state(handle)
    }

    pub fn get_name(&self, handle: TaskHandle) -> Option<TaskName> {
        self.registry.get_name(handle)
    }

    pub fn get_id(&self, handle: TaskHandle) -> Option<u32> {
        self.registry.get_id(handle)
    }

    pub fn number_of_tasks(&self) -> usize {
        self.registry.number_of_tasks()
    }

    pub fn get_task_info(&self, handle: TaskHandle) -> Option<TaskInfo> {
        self.registry.get_task_info(handle)
    }

    pub fn get_all_info(&self) -> Vec<TaskInfo> {
        self.registry.get_all_info()
    }

    pub fn get_task_runtime_stats(&self, handle: TaskHandle) -> Option<TaskRuntimeStats> {
        self.registry.get_task_runtime_stats(handle)
    }

    pub fn get_all_runtime_stats(&self) -> Vec<(u32, TaskRuntimeStats)> {
        self.registry.get_all_runtime_stats()
    }

    pub fn resume(&mut self, handle: TaskHandle) -> Result<(), HelioError> {
        self.registry.resume(handle)
    }

    pub fn suspend(&mut self, handle: TaskHandle) -> Result<(), HelioError> {
        self.registry.suspend(handle)
    }

    pub fn wait(&mut self, handle: TaskHandle) -> Result<(), HelioError> {
        self.registry.wait(handle)
    }

    // -- notification -------------------------------------------------------

    pub fn notify_give(
        &mut self,
        handle: TaskHandle,
        bytes: usize,
        value: NotificationValue,
    ) -> Result<(), HelioError> {
        let d = self.registry.resolve_mut(handle).ok_or(HelioError::NotFound)?;
        d.notify_give(bytes, value)
    }

    pub fn notify_take(&mut self, handle: TaskHandle) -> Result<Option<NotificationSnapshot>, HelioError> {
        let d = self.registry.resolve_mut(handle).ok_or(HelioError::NotFound)?;
        Ok(d.notify_take())
    }

    pub fn notify_is_waiting(&self, handle: TaskHandle) -> Result<bool, HelioError> {
        let d = self.resolve(handle)?;
        Ok(d.notify_is_waiting())
    }

    pub fn notify_state_clear(&mut self, handle: TaskHandle) -> Result<(), HelioError> {
        let d = self.registry.resolve_mut(handle).ok_or(HelioError::NotFound)?;
        d.notify_state_clear();
        Ok(())
    }

    // -- timers and watchdog --------------------------------------------

    pub fn change_period(&mut self, handle: TaskHandle, period: Ticks) -> Result<(), HelioError> {
        let d = self.registry.resolve_mut(handle).ok_or(HelioError::NotFound)?;
        d.change_period(period);
        Ok(())
    }

    pub fn reset_timer(&mut self, handle: TaskHandle) -> Result<(), HelioError> {
        let now = self.platform.now();
        let d = self.registry.resolve_mut(handle).ok_or(HelioError::NotFound)?;
        d.reset_timer(now);
        Ok(())
    }

    pub fn change_wd_period(&mut self, handle: TaskHandle, period: Ticks) -> Result<(), HelioError> {
        let d = self.registry.resolve_mut(handle).ok_or(HelioError::NotFound)?;
        d.change_wd_period(period);
        Ok(())
    }

    fn resolve(&self, handle: TaskHandle) -> Result<&crate::task::TaskDescriptor<P>, HelioError> {
        self.registry.resolve(handle).ok_or(HelioError::NotFound)
    }

    // -- queues -------------------------------------------------------------

    pub fn create_queue(&mut self, limit: usize) -> Result<QueueHandle, HelioError> {
        queue::create(&mut self.heap_region, limit, self.config.queue_minimum_limit)
    }

    pub fn delete_queue(&mut self, q: QueueHandle) -> Result<(), HelioError> {
        queue::delete(&mut self.heap_region, q)
    }

    pub fn queue_send(
        &mut self,
        q: QueueHandle,
        bytes: usize,
        value: MessageValue,
    ) -> Result<(), HelioError> {
        queue::send(&mut self.heap_region, q, bytes, value)
    }

    pub fn queue_peek(&self, q: QueueHandle) -> Result<Option<MessageSnapshot>, HelioError> {
        queue::peek(&self.heap_region, q)
    }

    pub fn queue_receive(&mut self, q: QueueHandle) -> Result<Option<MessageSnapshot>, HelioError> {
        queue::receive(&mut self.heap_region, q)
    }

    pub fn queue_drop_front(&mut self, q: QueueHandle) -> Result<(), HelioError> {
        queue::drop_front(&mut self.heap_region, q)
    }

    pub fn queue_is_empty(&self, q: QueueHandle) -> Result<bool, HelioError> {
        queue::is_empty(&self.heap_region, q)
    }

    pub fn queue_is_full(&self, q: QueueHandle) -> Result<bool, HelioError> {
        queue::is_full(&self.heap_region, q)
    }

    pub fn queue_messages_waiting(&self, q: QueueHandle) -> Result<usize, HelioError> {
        queue::messages_waiting(&self.heap_region, q)
    }

    // -- raw memory -----------------------------------------------------

    pub fn mem_alloc(&mut self, size: usize) -> Result<HeapAddress, HelioError> {
        self.heap_region.allocate(size, false)
    }

    pub fn mem_free(&mut self, addr: HeapAddress) -> Result<(), HelioError> {
        self.heap_region.free(addr, false)
    }

    pub fn mem_get_heap_stats(&mut self) -> Result<crate::mem::RegionStats, HelioError> {
        self.heap_region.stats()
    }

    pub fn mem_get_kernel_stats(&mut self) -> Result<crate::mem::RegionStats, HelioError> {
        self.kernel_region.stats()
    }

    // -- scheduler --------------------------------------------------------

    /// Runs the cooperative main loop until a task calls `suspend_all`
    /// (indirectly, through its `&mut Kernel` parameter) or there is
    /// nothing left to run. Returns immediately if the scheduler is already
    /// running or there are no tasks at all.
    pub fn start_scheduler(&mut self) {
        if self.running() || self.registry.number_of_tasks() == 0 {
            return;
        }
        self.flags.insert(SystemFlags::RUNNING);
        while self.running() {
            self.pass();
        }
    }

    /// Stops the scheduler loop after the current pass. Called by a task's
    /// own callback, or by surrounding test/host code.
    pub fn suspend_all(&mut self) {
        self.flags.remove(SystemFlags::RUNNING);
    }

    pub fn is_running(&self) -> bool {
        self.running()
    }

    /// One trip through every registered task, in registration order.
    fn pass(&mut self) {
        if self.flags.contains(SystemFlags::OVERFLOW) {
            self.compress_overflow();
        }

        let now = self.platform.now();
        let handles: Vec<TaskHandle> = self.registry.iter_handles().map(|(h, _)| h).collect();

        enum Decision {
            None,
            Event,
            EventTimer,
            Candidate(Ticks),
        }

        let mut candidate: Option<TaskHandle> = None;
        let mut least = Ticks::MAX;

        for handle in handles {
            let decision = match self.resolve(handle) {
                Ok(d) => {
                    if d.state() == TaskState::Waiting && d.notify_is_waiting() {
                        Decision::Event
                    } else if d.state() == TaskState::Waiting && d.timer_elapsed(now) {
                        Decision::EventTimer
                    } else if d.state() == TaskState::Running && d.total_run_time() < least {
                        Decision::Candidate(d.total_run_time())
                    } else {
                        Decision::None
                    }
                }
                Err(_) => continue,
            };

            match decision {
                Decision::Event => self.dispatch(handle, DispatchKind::Event),
                Decision::EventTimer => {
                    self.dispatch(handle, DispatchKind::Event);
                    if let Some(d) = self.registry.resolve_mut(handle) {
                        d.reset_timer(now);
                    }
                }
                Decision::Candidate(total) => {
                    least = total;
                    candidate = Some(handle);
                }
                Decision::None => {}
            }
        }

        if let Some(handle) = candidate {
            self.dispatch(handle, DispatchKind::Balanced);
        }
    }

    /// Resets every task's `total_run_time` to its `last_run_time`. Run once,
    /// the pass after any dispatch causes a wraparound, so the runtime
    /// balancer resumes comparing numbers on the same scale instead of a
    /// wrapped total against ones that haven't wrapped yet.
    fn compress_overflow(&mut self) {
        let handles: Vec<TaskHandle> = self.registry.iter_handles().map(|(h, _)| h).collect();
        for handle in handles {
            if let Some(d) = self.registry.resolve_mut(handle) {
                d.total_run_time = d.last_run_time;
            }
        }
        self.flags.remove(SystemFlags::OVERFLOW);
        ringbuf::ringbuf_entry!(crate::KERNEL_RINGBUF, DiagEvent::OverflowCompressed);
    }

    /// Invokes one task's callback and folds the result back into its
    /// descriptor: elapsed time, watchdog check, and overflow detection.
    fn dispatch(&mut self, handle: TaskHandle, kind: DispatchKind) {
        let (callback, param, previous_total, id) = match self.resolve(handle) {
            Ok(d) => (d.callback(), d.task_parameter(), d.total_run_time(), d.id()),
            Err(_) => return,
        };

        let start = self.platform.now();
        callback(self, handle, param);
        let end = self.platform.now();
        let last_run_time = end.wrapping_sub(start);

        let Some(d) = self.registry.resolve_mut(handle) else {
            return;
        };
        d.last_run_time = last_run_time;
        let new_total = d.total_run_time.wrapping_add(last_run_time);
        let overflowed = new_total < previous_total;
        d.total_run_time = new_total;
        let tripped = d.watchdog_tripped(last_run_time);
        let wd_timer_period = d.wd_timer_period;
        if tripped {
            d.state = TaskState::Suspended;
        }

        if overflowed {
            self.flags.insert(SystemFlags::OVERFLOW);
        }
        if tripped {
            ringbuf::ringbuf_entry!(
                crate::KERNEL_RINGBUF,
                DiagEvent::WatchdogTripped {
                    id,
                    last_run_time,
                    wd_timer_period,
                }
            );
        }
        ringbuf::ringbuf_entry!(
            crate::KERNEL_RINGBUF,
            DiagEvent::TaskDispatched {
                id,
                kind,
                last_run_time,
            }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HelioKernelConfig;
    use crate::port::StdPlatform;
    use alloc::boxed::Box;
    use core::cell::Cell;
    use helios_abi::{MessageValue, NotificationValue, TaskName};

    fn kernel() -> Kernel<StdPlatform> {
        Kernel::init(HelioKernelConfig::DEFAULT, StdPlatform::new()).unwrap()
    }

    fn name(bytes: &[u8]) -> TaskName {
        let mut array = [0u8; 8];
        array[..bytes.len()].copy_from_slice(bytes);
        TaskName::from_array(array)
    }

    fn noop(_kernel: &mut Kernel<StdPlatform>, _handle: TaskHandle, _param: *mut ()) {}

    /// Increments the `Cell<u32>` counter `param` points at, then advances
    /// the fake clock by one tick so the runtime balancer has something to
    /// balance on.
    fn count_and_tick(kernel: &mut Kernel<StdPlatform>, _handle: TaskHandle, param: *mut ()) {
        let counter = unsafe { &*(param as *const Cell<u32>) };
        counter.set(counter.get() + 1);
        kernel.platform().advance(1);
    }

    fn leaked_counter() -> &'static Cell<u32> {
        Box::leak(Box::new(Cell::new(0)))
    }

    #[test]
    fn p1_task_ids_are_strictly_increasing_and_unique() {
        let mut k = kernel();
        let mut ids = alloc::vec::Vec::new();
        for i in 0..5u8 {
            let h = k
                .create_task(name(&[b'A' + i]), noop, core::ptr::null_mut())
                .unwrap();
            ids.push(k.get_id(h).unwrap());
        }
        for pair in ids.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn p2_registry_closure_round_trips_handle_lookups() {
        let mut k = kernel();
        let h = k
            .create_task(name(b"TASK01"), noop, core::ptr::null_mut())
            .unwrap();
        let id = k.get_id(h).unwrap();
        let nm = k.get_name(h).unwrap();
        assert_eq!(k.get_handle_by_id(id), Some(h));
        assert_eq!(k.get_handle_by_name(nm), Some(h));
    }

    #[test]
    fn p8_balancer_fairness_over_k_passes() {
        let mut k = kernel();
        let counters: alloc::vec::Vec<&'static Cell<u32>> =
            (0..3).map(|_| leaked_counter()).collect();
        for (i, counter) in counters.iter().enumerate() {
            let h = k
                .create_task(
                    name(&[b'A' + i as u8]),
                    count_and_tick,
                    *counter as *const Cell<u32> as *mut (),
                )
                .unwrap();
            k.resume(h).unwrap();
        }
        for _ in 0..9 {
            k.pass();
        }
        let counts: alloc::vec::Vec<u32> = counters.iter().map(|c| c.get()).collect();
        let max = *counts.iter().max().unwrap();
        let min = *counts.iter().min().unwrap();
        assert!(max - min <= 1, "dispatch counts not balanced: {:?}", counts);
    }

    #[test]
    fn p9_compress_overflow_resets_to_last_run_time() {
        let mut k = kernel();
        let h = k
            .create_task(name(b"TASK01"), noop, core::ptr::null_mut())
            .unwrap();
        {
            let d = k.registry.resolve_mut(h).unwrap();
            d.total_run_time = 0xffff_fffa;
            d.last_run_time = 7;
        }
        k.flags.insert(SystemFlags::OVERFLOW);
        k.compress_overflow();
        let stats = k.get_task_runtime_stats(h).unwrap();
        assert_eq!(stats.total_run_time, stats.last_run_time);
        assert!(!k.flags.contains(SystemFlags::OVERFLOW));
    }

    #[test]
    fn p10_watchdog_enforcement_suspends_on_next_loop_top() {
        fn sleepy(kernel: &mut Kernel<StdPlatform>, _handle: TaskHandle, _param: *mut ()) {
            kernel.platform().advance(5);
        }
        let mut k = kernel();
        let h = k
            .create_task(name(b"TASK12"), sleepy, core::ptr::null_mut())
            .unwrap();
        k.change_wd_period(h, 2).unwrap();
        k.resume(h).unwrap();
        k.pass();
        assert_eq!(k.get_state(h), TaskState::Suspended);
    }

    #[test]
    fn scenario_create_query_delete() {
        let mut k = kernel();
        let h = k
            .create_task(name(b"TASK01"), noop, core::ptr::null_mut())
            .unwrap();
        assert_eq!(k.get_id(h), Some(1));
        assert_eq!(k.get_state(h), TaskState::Suspended);
        assert_eq!(k.number_of_tasks(), 1);
        let infos = k.get_all_info();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].name.as_array(), b"TASK01\0\0");
        k.delete_task(h).unwrap();
        assert_eq!(k.number_of_tasks(), 0);
    }

    #[test]
    fn scenario_notification_round_trip() {
        let mut k = kernel();
        let h = k
            .create_task(name(b"TASK01"), noop, core::ptr::null_mut())
            .unwrap();
        k.notify_give(h, 7, NotificationValue::from_array(*b"MESSAGE\0"))
            .unwrap();
        assert!(k.notify_is_waiting(h).unwrap());
        let snap = k.notify_take(h).unwrap().unwrap();
        assert_eq!(snap.bytes, 7);
        assert_eq!(&snap.value.as_slice()[..7], b"MESSAGE");
        assert!(k.notify_take(h).unwrap().is_none());
    }

    #[test]
    fn scenario_timer_driven_dispatch() {
        fn stop(kernel: &mut Kernel<StdPlatform>, _handle: TaskHandle, param: *mut ()) {
            let counter = unsafe { &*(param as *const Cell<u32>) };
            counter.set(counter.get() + 1);
            kernel.suspend_all();
        }
        let mut k = kernel();
        let counter = leaked_counter();
        let h = k
            .create_task(name(b"TASK10"), stop, counter as *const Cell<u32> as *mut ())
            .unwrap();
        k.change_period(h, 3000).unwrap();
        k.wait(h).unwrap();
        k.reset_timer(h).unwrap();
        k.platform().advance(3001);
        k.start_scheduler();
        assert_eq!(counter.get(), 1);
        assert!(!k.is_running());
    }

    #[test]
    fn scenario_watchdog_trip() {
        fn sleep_then_stop(kernel: &mut Kernel<StdPlatform>, _handle: TaskHandle, _param: *mut ()) {
            kernel.platform().advance(3);
            kernel.suspend_all();
        }
        let mut k = kernel();
        let h = k
            .create_task(name(b"TASK12"), sleep_then_stop, core::ptr::null_mut())
            .unwrap();
        k.change_wd_period(h, 2).unwrap();
        k.resume(h).unwrap();
        k.start_scheduler();
        assert_eq!(k.get_state(h), TaskState::Suspended);
    }

    #[test]
    fn scenario_queue_capacity() {
        let mut k = kernel();
        let q = k.create_queue(5).unwrap();
        for i in 0..5u8 {
            let mut payload = [0u8; 8];
            payload[0] = i;
            k.queue_send(q, 1, MessageValue::from_array(payload))
                .unwrap();
        }
        assert!(k.queue_is_full(q).unwrap());
        assert_eq!(
            k.queue_send(q, 1, MessageValue::zeroed()),
            Err(HelioError::QueueFull)
        );
        let first = k.queue_receive(q).unwrap().unwrap();
        assert_eq!(first.value.as_slice()[0], 0);
        assert!(!k.queue_is_full(q).unwrap());
        for i in 1..5u8 {
            let msg = k.queue_receive(q).unwrap().unwrap();
            assert_eq!(msg.value.as_slice()[0], i);
        }
    }

    #[test]
    fn scenario_runtime_balancer_after_overflow() {
        let mut k = kernel();
        let counters: alloc::vec::Vec<&'static Cell<u32>> =
            (0..3).map(|_| leaked_counter()).collect();
        let handles: alloc::vec::Vec<TaskHandle> = counters
            .iter()
            .enumerate()
            .map(|(i, counter)| {
                let h = k
                    .create_task(
                        name(&[b'A' + i as u8]),
                        count_and_tick,
                        *counter as *const Cell<u32> as *mut (),
                    )
                    .unwrap();
                k.resume(h).unwrap();
                h
            })
            .collect();

        {
            let d = k.registry.resolve_mut(handles[0]).unwrap();
            d.total_run_time = u32::MAX;
        }
        k.dispatch(handles[0], DispatchKind::Balanced);
        assert!(k.flags.contains(SystemFlags::OVERFLOW));

        k.pass();
        assert!(!k.flags.contains(SystemFlags::OVERFLOW));
        for h in handles {
            let stats = k.get_task_runtime_stats(h).unwrap();
            assert_eq!(stats.total_run_time, stats.last_run_time);
        }
    }

    #[test]
    fn system_flags_reports_corrupt_once_a_region_latches() {
        let mut k = kernel();
        assert!(!k.system_flags().contains(SystemFlags::CORRUPT));
        k.heap_region.force_corrupt_for_test();
        assert!(k.system_flags().contains(SystemFlags::CORRUPT));
    }
}
