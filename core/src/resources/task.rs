//! Tasks. A task's handle doubles as the `creator` stamped on every other
//! resource's common record.

use std::sync::Arc;

use crate::adapter::{NativeTask, PlatformAdapter};
use crate::config::Config;
use crate::error::{OsalError, Result};
use crate::global::{GlobalState, LifecycleEvent};
use crate::id::{ObjectId, ResourceType};
use crate::table::TypeTable;

#[derive(Default, Clone)]
pub(crate) struct TaskRecord {
    pub native: NativeTask,
    pub priority: u8,
    pub stack_size: usize,
}

pub struct TaskApi<A: PlatformAdapter> {
    table: TypeTable<TaskRecord>,
    adapter: Arc<A>,
    global: Arc<GlobalState>,
}

impl<A: PlatformAdapter> TaskApi<A> {
    pub(crate) fn new(cfg: &Config, adapter: Arc<A>, global: Arc<GlobalState>) -> TaskApi<A> {
        TaskApi {
            table: TypeTable::new(ResourceType::Task, cfg.max_tasks),
            adapter,
            global,
        }
    }

    pub fn create(&self, name: &str, max_name: usize, priority: u8, stack_size: usize, entry: fn()) -> Result<ObjectId> {
        if name.len() >= max_name {
            return Err(OsalError::NameTooLong { max: max_name });
        }
        self.global.notify(LifecycleEvent::CreateBegin);
        let creator = self.current_task();
        let mut held = self.table.allocate_new(name, creator)?;
        let outcome = self
            .adapter
            .task_create(name, priority, stack_size, entry)
            .map(|native| {
                let rec = held.internal_mut();
                rec.native = native;
                rec.priority = priority;
                rec.stack_size = stack_size;
            });
        let result = self.table.finalize_new(held, outcome);
        self.global.notify(LifecycleEvent::CreateEnd);
        result
    }

    /// Delete is best-effort per the legacy cancellation contract: if the
    /// adapter reports the task already exited, that still counts as a
    /// successful delete rather than an error.
    pub fn delete(&self, id: ObjectId) -> Result<()> {
        self.global.notify(LifecycleEvent::DeleteBegin);
        let held = self.table.get_locked(id, true)?;
        let native = held.internal().native;
        let outcome = match self.adapter.task_delete(native) {
            Ok(()) => Ok(()),
            Err(OsalError::InvalidId) => Ok(()),
            Err(e) => Err(e),
        };
        let result = self.table.finalize_delete(held, outcome);
        self.global.notify(LifecycleEvent::DeleteEnd);
        result
    }

    pub fn get_id_by_name(&self, name: &str) -> Result<ObjectId> {
        self.table.find_by_name(name)
    }

    pub fn get_info(&self, id: ObjectId) -> Result<(String, u8, usize, ObjectId)> {
        self.table.get_snapshot(id, |s| {
            (
                s.common.name.clone(),
                s.internal.priority,
                s.internal.stack_size,
                s.common.creator,
            )
        })
    }

    pub fn current_task(&self) -> ObjectId {
        let native = self.adapter.current_task();
        self.table
            .find_by(|_common, internal| internal.native == native)
            .unwrap_or(ObjectId::UNDEFINED)
    }

    pub(crate) fn delete_all(&self) {
        let adapter = &self.adapter;
        self.table.delete_all(|id| {
            let held = self.table.get_locked(id, true)?;
            let native = held.internal().native;
            let outcome = adapter.task_delete(native);
            self.table.finalize_delete(held, outcome)
        });
    }

    pub(crate) fn for_each(&self, f: &mut dyn FnMut(ObjectId, &str, ObjectId)) {
        self.table.for_each(|id, common, _internal| f(id, &common.name, common.creator));
    }
}
