// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Task descriptors and the registry that owns them.
//!
//! The original links task control blocks together with raw pointers. Here
//! the registry owns every descriptor in a plain `Vec`, never reusing a
//! slot index once assigned, so a slot index and the task's `id` move in
//! lockstep; [`TaskHandle`] carries both purely so a caller presenting a
//! handle for a task that has since been deleted gets rejected rather than
//! silently addressing whatever now occupies that `id`.

use alloc::vec::Vec;
use helios_abi::{HelioError, TaskHandle, TaskName, TaskState, Ticks};

use crate::port::Platform;
use crate::sched::Kernel;

/// Receives the kernel it was scheduled by, its own handle, and the opaque
/// parameter it was created with. The kernel reference is how a running
/// callback reaches public operations (`notify_give`, `suspend_all`, and so
/// on) without a global singleton to call through. The parameter is untyped
/// on purpose: the kernel never interprets it, only threads it through to
/// the callback on every dispatch.
pub type TaskCallback<P> = fn(&mut Kernel<P>, TaskHandle, *mut ());

pub struct TaskDescriptor<P: Platform> {
    id: u32,
    name: TaskName,
    pub(crate) state: TaskState,
    callback: TaskCallback<P>,
    task_parameter: *mut (),
    pub(crate) timer_period: Ticks,
    pub(crate) timer_start_time: Ticks,
    pub(crate) wd_timer_period: Ticks,
    pub(crate) last_run_time: Ticks,
    pub(crate) total_run_time: Ticks,
    pub(crate) notification_bytes: usize,
    pub(crate) notification_value: helios_abi::NotificationValue,
}

impl<P: Platform> TaskDescriptor<P> {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> TaskName {
        self.name
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn callback(&self) -> TaskCallback<P> {
        self.callback
    }

    pub fn task_parameter(&self) -> *mut () {
        self.task_parameter
    }

    pub fn last_run_time(&self) -> Ticks {
        self.last_run_time
    }

    pub fn total_run_time(&self) -> Ticks {
        self.total_run_time
    }
}

/// Snapshot returned by `get_all_info`/`get_task_info`: everything about a
/// task that is safe to hand back to a caller without exposing the raw
/// descriptor.
#[derive(Debug, Clone, Copy)]
pub struct TaskInfo {
    pub id: u32,
    pub name: TaskName,
    pub state: TaskState,
}

/// Snapshot returned by `get_all_runtime_stats`/`get_task_runtime_stats`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskRuntimeStats {
    pub last_run_time: Ticks,
    pub total_run_time: Ticks,
}

pub struct TaskRegistry<P: Platform> {
    descriptors: Vec<Option<TaskDescriptor<P>>>,
    next_id: u32,
}

impl<P: Platform> Default for TaskRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform> TaskRegistry<P> {
    pub fn new() -> Self {
        TaskRegistry {
            descriptors: Vec::new(),
            next_id: 1,
        }
    }

    /// `create_task` and `delete_task` both refuse this while the scheduler
    /// is running; callers check that before calling in.
    pub fn create_task(
        &mut self,
        name: TaskName,
        callback: TaskCallback<P>,
        task_parameter: *mut (),
    ) -> Result<TaskHandle, HelioError> {
        if self.find_by_name(name).is_some() {
            return Err(HelioError::InvalidArgument);
        }
        let id = self.next_id;
        self.next_id += 1;
        let index = self.descriptors.len() as u32;
        self.descriptors.push(Some(TaskDescriptor {
            id,
            name,
            state: TaskState::Suspended,
            callback,
            task_parameter,
            timer_period: 0,
            timer_start_time: 0,
            wd_timer_period: 0,
            last_run_time: 0,
            total_run_time: 0,
            notification_bytes: 0,
            notification_value: helios_abi::NotificationValue::zeroed(),
        }));
        Ok(TaskHandle::for_index_and_id(index, id))
    }

    pub fn delete_task(&mut self, handle: TaskHandle) -> Result<(), HelioError> {
        let slot = self
            .descriptors
            .get_mut(handle.index() as usize)
            .ok_or(HelioError::NotFound)?;
        if slot.as_ref().is_some_and(|d| d.id == handle.id()) {
            *slot = None;
            Ok(())
        } else {
            Err(HelioError::NotFound)
        }
    }

    pub(crate) fn resolve(&self, handle: TaskHandle) -> Option<&TaskDescriptor<P>> {
        self.descriptors
            .get(handle.index() as usize)?
            .as_ref()
            .filter(|d| d.id == handle.id())
    }

    pub(crate) fn resolve_mut(&mut self, handle: TaskHandle) -> Option<&mut TaskDescriptor<P>> {
        let slot = self.descriptors.get_mut(handle.index() as usize)?;
        if slot.as_ref().is_some_and(|d| d.id == handle.id()) {
            slot.as_mut()
        } else {
            None
        }
    }

    fn find_by_name(&self, name: TaskName) -> Option<TaskHandle> {
        self.descriptors.iter().enumerate().find_map(|(i, d)| {
            let d = d.as_ref()?;
            (d.name.as_array() == name.as_array())
                .then(|| TaskHandle::for_index_and_id(i as u32, d.id))
        })
    }

    pub fn get_handle_by_name(&self, name: TaskName) -> Option<TaskHandle> {
        self.find_by_name(name)
    }

    pub fn get_handle_by_id(&self, id: u32) -> Option<TaskHandle> {
        self.descriptors.iter().enumerate().find_map(|(i, d)| {
            let d = d.as_ref()?;
            (d.id == id).then(|| TaskHandle::for_index_and_id(i as u32, d.id))
        })
    }

    pub fn get_state(&self, handle: TaskHandle) -> TaskState {
        self.resolve(handle)
            .map(|d| d.state)
            .unwrap_or(TaskState::Error)
    }

    pub fn get_name(&self, handle: TaskHandle) -> Option<TaskName> {
        self.resolve(handle).map(|d| d.name)
    }

    pub fn get_id(&self, handle: TaskHandle) -> Option<u32> {
        self.resolve(handle).map(|d| d.id)
    }

    pub fn number_of_tasks(&self) -> usize {
        self.descriptors.iter().filter(|d| d.is_some()).count()
    }

    pub fn get_task_info(&self, handle: TaskHandle) -> Option<TaskInfo> {
        self.resolve(handle).map(|d| TaskInfo {
            id: d.id,
            name: d.name,
            state: d.state,
        })
    }

    pub fn get_all_info(&self) -> Vec<TaskInfo> {
        self.descriptors
            .iter()
            .filter_map(|d| {
                d.as_ref().map(|d| TaskInfo {
                    id: d.id,
                    name: d.name,
                    state: d.state,
                })
            })
            .collect()
    }

    pub fn get_task_runtime_stats(&self, handle: TaskHandle) -> Option<TaskRuntimeStats> {
        self.resolve(handle).map(|d| TaskRuntimeStats {
            last_run_time: d.last_run_time,
            total_run_time: d.total_run_time,
        })
    }

    pub fn get_all_runtime_stats(&self) -> Vec<(u32, TaskRuntimeStats)> {
        self.descriptors
            .iter()
            .filter_map(|d| {
                d.as_ref().map(|d| {
                    (
                        d.id,
                        TaskRuntimeStats {
                            last_run_time: d.last_run_time,
                            total_run_time: d.total_run_time,
                        },
                    )
                })
            })
            .collect()
    }

    pub fn resume(&mut self, handle: TaskHandle) -> Result<(), HelioError> {
        let d = self.resolve_mut(handle).ok_or(HelioError::NotFound)?;
        d.state = TaskState::Running;
        Ok(())
    }

    pub fn suspend(&mut self, handle: TaskHandle) -> Result<(), HelioError> {
        let d = self.resolve_mut(handle).ok_or(HelioError::NotFound)?;
        d.state = TaskState::Suspended;
        Ok(())
    }

    pub fn wait(&mut self, handle: TaskHandle) -> Result<(), HelioError> {
        let d = self.resolve_mut(handle).ok_or(HelioError::NotFound)?;
        d.state = TaskState::Waiting;
        Ok(())
    }

    /// Iterates live descriptors in insertion (registration) order, paired
    /// with the handle that addresses each one. Used by the scheduler pass.
    pub(crate) fn iter_handles(&self) -> impl Iterator<Item = (TaskHandle, &TaskDescriptor<P>)> {
        self.descriptors.iter().enumerate().filter_map(|(i, d)| {
            d.as_ref()
                .map(|d| (TaskHandle::for_index_and_id(i as u32, d.id), d))
        })
    }
}
