//! Directory iteration handles.

use std::sync::Arc;

use crate::adapter::{NativeDir, PlatformAdapter};
use crate::config::Config;
use crate::error::{OsalError, Result};
use crate::global::{GlobalState, LifecycleEvent};
use crate::id::{ObjectId, ResourceType};
use crate::resources::task::TaskApi;
use crate::table::TypeTable;

#[derive(Default, Clone)]
pub(crate) struct DirRecord {
    pub native: NativeDir,
}

pub struct DirApi<A: PlatformAdapter> {
    table: TypeTable<DirRecord>,
    adapter: Arc<A>,
    global: Arc<GlobalState>,
    tasks: Arc<TaskApi<A>>,
}

impl<A: PlatformAdapter> DirApi<A> {
    pub(crate) fn new(cfg: &Config, adapter: Arc<A>, global: Arc<GlobalState>, tasks: Arc<TaskApi<A>>) -> DirApi<A> {
        DirApi {
            table: TypeTable::new(ResourceType::Dir, cfg.max_dirs),
            adapter,
            global,
            tasks,
        }
    }

    pub fn open(&self, name: &str, max_name: usize, path: &str, max_path: usize) -> Result<ObjectId> {
        if name.len() >= max_name {
            return Err(OsalError::NameTooLong { max: max_name });
        }
        if path.len() >= max_path {
            return Err(OsalError::FsPathTooLong);
        }
        self.global.notify(LifecycleEvent::CreateBegin);
        let creator = self.tasks.current_task();
        let mut held = self.table.allocate_new(name, creator)?;
        let outcome = self.adapter.dir_open(path).map(|native| {
            held.internal_mut().native = native;
        });
        let result = self.table.finalize_new(held, outcome);
        self.global.notify(LifecycleEvent::CreateEnd);
        result
    }

    pub fn close(&self, id: ObjectId) -> Result<()> {
        self.global.notify(LifecycleEvent::DeleteBegin);
        let held = self.table.get_locked(id, true)?;
        let native = held.internal().native;
        let outcome = self.adapter.dir_close(native);
        let result = self.table.finalize_delete(held, outcome);
        self.global.notify(LifecycleEvent::DeleteEnd);
        result
    }

    pub fn read(&self, id: ObjectId) -> Result<Option<String>> {
        let native = self.table.get_snapshot(id, |s| s.internal.native)?;
        self.adapter.dir_read(native)
    }

    pub fn rewind(&self, id: ObjectId) -> Result<()> {
        let native = self.table.get_snapshot(id, |s| s.internal.native)?;
        self.adapter.dir_rewind(native)
    }

    pub(crate) fn delete_all(&self) {
        let adapter = &self.adapter;
        self.table.delete_all(|id| {
            let held = self.table.get_locked(id, true)?;
            let native = held.internal().native;
            let outcome = adapter.dir_close(native);
            self.table.finalize_delete(held, outcome)
        });
    }

    pub(crate) fn for_each(&self, f: &mut dyn FnMut(ObjectId, &str, ObjectId)) {
        self.table.for_each(|id, common, _internal| f(id, &common.name, common.creator));
    }
}
