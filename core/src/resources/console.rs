//! Console. Formatting itself is out of scope; this wrapper manages the
//! handle lifecycle and a raw text write.

use std::sync::Arc;

use crate::adapter::{NativeConsole, PlatformAdapter};
use crate::config::Config;
use crate::error::{OsalError, Result};
use crate::global::{GlobalState, LifecycleEvent};
use crate::id::{ObjectId, ResourceType};
use crate::resources::task::TaskApi;
use crate::table::TypeTable;

#[derive(Default, Clone)]
pub(crate) struct ConsoleRecord {
    pub native: NativeConsole,
}

pub struct ConsoleApi<A: PlatformAdapter> {
    table: TypeTable<ConsoleRecord>,
    adapter: Arc<A>,
    global: Arc<GlobalState>,
    tasks: Arc<TaskApi<A>>,
}

impl<A: PlatformAdapter> ConsoleApi<A> {
    pub(crate) fn new(cfg: &Config, adapter: Arc<A>, global: Arc<GlobalState>, tasks: Arc<TaskApi<A>>) -> ConsoleApi<A> {
        ConsoleApi {
            table: TypeTable::new(ResourceType::Console, cfg.max_consoles),
            adapter,
            global,
            tasks,
        }
    }

    pub fn create(&self, name: &str, max_name: usize, device: &str) -> Result<ObjectId> {
        if name.len() >= max_name {
            return Err(OsalError::NameTooLong { max: max_name });
        }
        self.global.notify(LifecycleEvent::CreateBegin);
        let creator = self.tasks.current_task();
        let mut held = self.table.allocate_new(name, creator)?;
        let outcome = self.adapter.console_create(device).map(|native| {
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
        let outcome = self.adapter.console_delete(native);
        let result = self.table.finalize_delete(held, outcome);
        self.global.notify(LifecycleEvent::DeleteEnd);
        result
    }

    pub fn write(&self, id: ObjectId, text: &str) -> Result<()> {
        let native = self.table.get_snapshot(id, |s| s.internal.native)?;
        self.adapter.console_write(native, text)
    }

    pub(crate) fn delete_all(&self) {
        let adapter = &self.adapter;
        self.table.delete_all(|id| {
            let held = self.table.get_locked(id, true)?;
            let native = held.internal().native;
            let outcome = adapter.console_delete(native);
            self.table.finalize_delete(held, outcome)
        });
    }

    pub(crate) fn for_each(&self, f: &mut dyn FnMut(ObjectId, &str, ObjectId)) {
        self.table.for_each(|id, common, _internal| f(id, &common.name, common.creator));
    }
}
