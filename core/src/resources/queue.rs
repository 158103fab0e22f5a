//! Message queues: bounded depth, bounded per-message size.

use std::sync::Arc;
use std::time::Duration;

use crate::adapter::{NativeQueue, PlatformAdapter};
use crate::config::Config;
use crate::error::{OsalError, Result};
use crate::global::{GlobalState, LifecycleEvent};
use crate::id::{ObjectId, ResourceType};
use crate::resources::task::TaskApi;
use crate::table::TypeTable;

#[derive(Default, Clone)]
pub(crate) struct QueueRecord {
    pub native: NativeQueue,
    pub max_depth: usize,
    pub max_size: usize,
}

pub struct QueueApi<A: PlatformAdapter> {
    table: TypeTable<QueueRecord>,
    adapter: Arc<A>,
    global: Arc<GlobalState>,
    tasks: Arc<TaskApi<A>>,
}

impl<A: PlatformAdapter> QueueApi<A> {
    pub(crate) fn new(cfg: &Config, adapter: Arc<A>, global: Arc<GlobalState>, tasks: Arc<TaskApi<A>>) -> QueueApi<A> {
        QueueApi {
            table: TypeTable::new(ResourceType::Queue, cfg.max_queues),
            adapter,
            global,
            tasks,
        }
    }

    pub fn create(&self, name: &str, max_name: usize, depth: usize, max_size: usize, queue_max_depth: usize) -> Result<ObjectId> {
        if name.len() >= max_name {
            return Err(OsalError::NameTooLong { max: max_name });
        }
        if depth == 0 || depth > queue_max_depth || max_size == 0 {
            return Err(OsalError::QueueInvalidSize);
        }
        self.global.notify(LifecycleEvent::CreateBegin);
        let creator = self.tasks.current_task();
        let mut held = self.table.allocate_new(name, creator)?;
        let outcome = self.adapter.queue_create(name, depth, max_size).map(|native| {
            let rec = held.internal_mut();
            rec.native = native;
            rec.max_depth = depth;
            rec.max_size = max_size;
        });
        let result = self.table.finalize_new(held, outcome);
        self.global.notify(LifecycleEvent::CreateEnd);
        result
    }

    pub fn delete(&self, id: ObjectId) -> Result<()> {
        self.global.notify(LifecycleEvent::DeleteBegin);
        let held = self.table.get_locked(id, true)?;
        let native = held.internal().native;
        let outcome = self.adapter.queue_delete(native);
        let result = self.table.finalize_delete(held, outcome);
        self.global.notify(LifecycleEvent::DeleteEnd);
        result
    }

    pub fn get_id_by_name(&self, name: &str) -> Result<ObjectId> {
        self.table.find_by_name(name)
    }

    pub fn get_info(&self, id: ObjectId) -> Result<(String, usize, usize)> {
        self.table
            .get_snapshot(id, |s| (s.common.name.clone(), s.internal.max_depth, s.internal.max_size))
    }

    pub fn put(&self, id: ObjectId, data: &[u8]) -> Result<()> {
        let (native, max_size) = self.table.get_snapshot(id, |s| (s.internal.native, s.internal.max_size))?;
        if data.len() > max_size {
            return Err(OsalError::QueueInvalidSize);
        }
        self.adapter.queue_put(native, data, None)
    }

    pub fn timed_put(&self, id: ObjectId, data: &[u8], timeout: Duration) -> Result<()> {
        let (native, max_size) = self.table.get_snapshot(id, |s| (s.internal.native, s.internal.max_size))?;
        if data.len() > max_size {
            return Err(OsalError::QueueInvalidSize);
        }
        self.adapter.queue_put(native, data, Some(timeout))
    }

    pub fn get(&self, id: ObjectId) -> Result<Vec<u8>> {
        let native = self.table.get_snapshot(id, |s| s.internal.native)?;
        self.adapter.queue_get(native, None)
    }

    pub fn timed_get(&self, id: ObjectId, timeout: Duration) -> Result<Vec<u8>> {
        let native = self.table.get_snapshot(id, |s| s.internal.native)?;
        self.adapter.queue_get(native, Some(timeout))
    }

    pub(crate) fn delete_all(&self) {
        let adapter = &self.adapter;
        self.table.delete_all(|id| {
            let held = self.table.get_locked(id, true)?;
            let native = held.internal().native;
            let outcome = adapter.queue_delete(native);
            self.table.finalize_delete(held, outcome)
        });
    }

    pub(crate) fn for_each(&self, f: &mut dyn FnMut(ObjectId, &str, ObjectId)) {
        self.table.for_each(|id, common, _internal| f(id, &common.name, common.creator));
    }
}
