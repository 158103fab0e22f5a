//! Streams: files and sockets share one handle space. Protocol semantics
//! above the handle (socket framing, etc.) are out of scope; this wrapper
//! only manages the handle lifecycle and the byte-level read/write/seek
//! operations the adapter provides.

use std::sync::Arc;

use crate::adapter::{NativeStream, PlatformAdapter};
use crate::config::Config;
use crate::error::{OsalError, Result};
use crate::global::{GlobalState, LifecycleEvent};
use crate::id::{ObjectId, ResourceType};
use crate::resources::task::TaskApi;
use crate::table::TypeTable;

#[derive(Default, Clone)]
pub(crate) struct StreamRecord {
    pub native: NativeStream,
}

pub struct StreamApi<A: PlatformAdapter> {
    table: TypeTable<StreamRecord>,
    adapter: Arc<A>,
    global: Arc<GlobalState>,
    tasks: Arc<TaskApi<A>>,
}

impl<A: PlatformAdapter> StreamApi<A> {
    pub(crate) fn new(cfg: &Config, adapter: Arc<A>, global: Arc<GlobalState>, tasks: Arc<TaskApi<A>>) -> StreamApi<A> {
        StreamApi {
            table: TypeTable::new(ResourceType::Stream, cfg.max_streams),
            adapter,
            global,
            tasks,
        }
    }

    pub fn open(&self, name: &str, max_name: usize, path: &str, max_path: usize, create: bool) -> Result<ObjectId> {
        if name.len() >= max_name {
            return Err(OsalError::NameTooLong { max: max_name });
        }
        if path.len() >= max_path {
            return Err(OsalError::FsPathTooLong);
        }
        self.global.notify(LifecycleEvent::CreateBegin);
        let creator = self.tasks.current_task();
        let mut held = self.table.allocate_new(name, creator)?;
        let outcome = self.adapter.stream_open(path, create).map(|native| {
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
        let outcome = self.adapter.stream_close(native);
        let result = self.table.finalize_delete(held, outcome);
        self.global.notify(LifecycleEvent::DeleteEnd);
        result
    }

    pub fn get_id_by_name(&self, name: &str) -> Result<ObjectId> {
        self.table.find_by_name(name)
    }

    pub fn get_info(&self, id: ObjectId) -> Result<String> {
        self.table.get_snapshot(id, |s| s.common.name.clone())
    }

    pub fn read(&self, id: ObjectId, buf: &mut [u8]) -> Result<usize> {
        let native = self.table.get_snapshot(id, |s| s.internal.native)?;
        self.adapter.stream_read(native, buf)
    }

    pub fn write(&self, id: ObjectId, buf: &[u8]) -> Result<usize> {
        let native = self.table.get_snapshot(id, |s| s.internal.native)?;
        self.adapter.stream_write(native, buf)
    }

    pub fn seek(&self, id: ObjectId, offset: i64) -> Result<u64> {
        let native = self.table.get_snapshot(id, |s| s.internal.native)?;
        self.adapter.stream_seek(native, offset)
    }

    pub(crate) fn delete_all(&self) {
        let adapter = &self.adapter;
        self.table.delete_all(|id| {
            let held = self.table.get_locked(id, true)?;
            let native = held.internal().native;
            let outcome = adapter.stream_close(native);
            self.table.finalize_delete(held, outcome)
        });
    }

    pub(crate) fn for_each(&self, f: &mut dyn FnMut(ObjectId, &str, ObjectId)) {
        self.table.for_each(|id, common, _internal| f(id, &common.name, common.creator));
    }
}
