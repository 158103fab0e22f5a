//! Counting semaphores: value bounded by `max_value` set at create time.

use std::sync::Arc;
use std::time::Duration;

use crate::adapter::{NativeSem, PlatformAdapter, SemKind};
use crate::config::Config;
use crate::error::{OsalError, Result};
use crate::global::{GlobalState, LifecycleEvent};
use crate::id::{ObjectId, ResourceType};
use crate::resources::task::TaskApi;
use crate::table::TypeTable;

#[derive(Default, Clone)]
pub(crate) struct CountSemRecord {
    pub native: NativeSem,
}

pub struct CountSemApi<A: PlatformAdapter> {
    table: TypeTable<CountSemRecord>,
    adapter: Arc<A>,
    global: Arc<GlobalState>,
    tasks: Arc<TaskApi<A>>,
}

impl<A: PlatformAdapter> CountSemApi<A> {
    pub(crate) fn new(cfg: &Config, adapter: Arc<A>, global: Arc<GlobalState>, tasks: Arc<TaskApi<A>>) -> CountSemApi<A> {
        CountSemApi {
            table: TypeTable::new(ResourceType::CountSem, cfg.max_count_semaphores),
            adapter,
            global,
            tasks,
        }
    }

    pub fn create(&self, name: &str, max_name: usize, initial_value: u32, max_value: u32) -> Result<ObjectId> {
        if name.len() >= max_name {
            return Err(OsalError::NameTooLong { max: max_name });
        }
        self.global.notify(LifecycleEvent::CreateBegin);
        let creator = self.tasks.current_task();
        let mut held = self.table.allocate_new(name, creator)?;
        let outcome = self
            .adapter
            .sem_create(name, SemKind::Counting { max_value }, initial_value)
            .map(|native| {
                held.internal_mut().native = native;
            });
        let result = self.table.finalize_new(held, outcome);
        self.global.notify(LifecycleEvent::CreateEnd);
        result
    }

    pub fn delete(&self, id: ObjectId) -> Result<()> {
        self.global.notify(LifecycleEvent::DeleteBegin);
        let held = self.table.get_locked(id, true)?;
        let native = held.internal().native;
        let outcome = self.adapter.sem_delete(native);
        let result = self.table.finalize_delete(held, outcome);
        self.global.notify(LifecycleEvent::DeleteEnd);
        result
    }

    pub fn get_id_by_name(&self, name: &str) -> Result<ObjectId> {
        self.table.find_by_name(name)
    }

    pub fn get_info(&self, id: ObjectId) -> Result<(String, ObjectId)> {
        self.table
            .get_snapshot(id, |s| (s.common.name.clone(), s.common.creator))
    }

    pub fn take(&self, id: ObjectId) -> Result<()> {
        let native = self.table.get_snapshot(id, |s| s.internal.native)?;
        self.adapter.sem_take(native, None)
    }

    pub fn timed_take(&self, id: ObjectId, timeout: Duration) -> Result<()> {
        let native = self.table.get_snapshot(id, |s| s.internal.native)?;
        self.adapter.sem_take(native, Some(timeout))
    }

    pub fn give(&self, id: ObjectId) -> Result<()> {
        let native = self.table.get_snapshot(id, |s| s.internal.native)?;
        self.adapter.sem_give(native)
    }

    pub(crate) fn delete_all(&self) {
        let adapter = &self.adapter;
        self.table.delete_all(|id| {
            let held = self.table.get_locked(id, true)?;
            let native = held.internal().native;
            let outcome = adapter.sem_delete(native);
            self.table.finalize_delete(held, outcome)
        });
    }

    pub(crate) fn for_each(&self, f: &mut dyn FnMut(ObjectId, &str, ObjectId)) {
        self.table.for_each(|id, common, _internal| f(id, &common.name, common.creator));
    }
}
