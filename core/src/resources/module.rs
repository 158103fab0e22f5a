//! Loadable modules. The actual load mechanism (dlopen-equivalent) is
//! entirely the adapter's concern; this wrapper only manages the
//! handle/refcount/name-uniqueness bookkeeping and enforces that a module
//! cannot be unloaded while anything else holds a reference.

use std::sync::Arc;

use crate::adapter::{NativeModule, PlatformAdapter};
use crate::config::Config;
use crate::error::{OsalError, Result};
use crate::global::{GlobalState, LifecycleEvent};
use crate::id::{ObjectId, ResourceType};
use crate::resources::task::TaskApi;
use crate::table::TypeTable;

#[derive(Default, Clone)]
pub(crate) struct ModuleRecord {
    pub native: NativeModule,
    pub path: String,
}

pub struct ModuleApi<A: PlatformAdapter> {
    table: TypeTable<ModuleRecord>,
    adapter: Arc<A>,
    global: Arc<GlobalState>,
    tasks: Arc<TaskApi<A>>,
}

impl<A: PlatformAdapter> ModuleApi<A> {
    pub(crate) fn new(cfg: &Config, adapter: Arc<A>, global: Arc<GlobalState>, tasks: Arc<TaskApi<A>>) -> ModuleApi<A> {
        ModuleApi {
            table: TypeTable::new(ResourceType::Module, cfg.max_modules),
            adapter,
            global,
            tasks,
        }
    }

    pub fn load(&self, name: &str, max_name: usize, path: &str, max_path: usize) -> Result<ObjectId> {
        if name.len() >= max_name {
            return Err(OsalError::NameTooLong { max: max_name });
        }
        if path.len() >= max_path {
            return Err(OsalError::FsPathTooLong);
        }
        self.global.notify(LifecycleEvent::CreateBegin);
        let creator = self.tasks.current_task();
        let mut held = self.table.allocate_new(name, creator)?;
        let outcome = self.adapter.module_load(path).map(|native| {
            let rec = held.internal_mut();
            rec.native = native;
            rec.path = path.to_string();
        });
        let result = self.table.finalize_new(held, outcome.map_err(|_| OsalError::ModuleLoadError));
        self.global.notify(LifecycleEvent::CreateEnd);
        result
    }

    pub fn unload(&self, id: ObjectId) -> Result<()> {
        self.global.notify(LifecycleEvent::DeleteBegin);
        let held = self.table.get_locked(id, true)?;
        let native = held.internal().native;
        let outcome = self.adapter.module_unload(native);
        let result = self.table.finalize_delete(held, outcome);
        self.global.notify(LifecycleEvent::DeleteEnd);
        result
    }

    pub fn get_id_by_name(&self, name: &str) -> Result<ObjectId> {
        self.table.find_by_name(name)
    }

    pub fn get_info(&self, id: ObjectId) -> Result<(String, String)> {
        self.table
            .get_snapshot(id, |s| (s.common.name.clone(), s.internal.path.clone()))
    }

    pub(crate) fn delete_all(&self) {
        let adapter = &self.adapter;
        self.table.delete_all(|id| {
            let held = self.table.get_locked(id, true)?;
            let native = held.internal().native;
            let outcome = adapter.module_unload(native);
            self.table.finalize_delete(held, outcome)
        });
    }

    pub(crate) fn for_each(&self, f: &mut dyn FnMut(ObjectId, &str, ObjectId)) {
        self.table.for_each(|id, common, _internal| f(id, &common.name, common.creator));
    }
}
