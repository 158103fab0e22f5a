//! Shared object-handle and resource-management core for a portable
//! operating-system abstraction layer.
//!
//! This crate does not talk to any kernel directly. It owns the opaque
//! handle encoding ([`id`]), the per-resource-type slot tables and their
//! locking discipline ([`table`]), and one thin wrapper per resource kind
//! ([`resources`]) that threads those two things together with whatever a
//! [`adapter::PlatformAdapter`] implementation supplies. [`Osal`] is the
//! single entry point applications hold.

pub mod adapter;
pub mod config;
pub mod error;
pub mod global;
pub mod id;
pub mod resources;
pub mod table;
pub mod timebase;

#[cfg(feature = "mock-adapter")]
pub mod host_adapter;

use std::sync::Arc;

pub use adapter::PlatformAdapter;
pub use config::Config;
pub use error::{OsalError, Result};
pub use global::LifecycleEvent;
pub use id::{ObjectId, ResourceType};

use global::GlobalState;
use resources::{
    binsem::BinSemApi, console::ConsoleApi, countsem::CountSemApi, dir::DirApi, filesys::FilesysApi,
    module::ModuleApi, mutex::MutexApi, queue::QueueApi, stream::StreamApi, task::TaskApi, timebase::TimeBaseApi,
};

/// The library's single entry point: owns every resource table and the
/// process-wide shared state, generic over the platform adapter that
/// supplies kernel-specific primitives. `tasks` and the process-wide
/// `GlobalState` are shared (via `Arc`) with every other wrapper below, so
/// each can stamp the calling task as `creator` and fire lifecycle events
/// through the same handler.
pub struct Osal<A: PlatformAdapter> {
    cfg: Config,
    global: Arc<GlobalState>,
    pub tasks: Arc<TaskApi<A>>,
    pub queues: QueueApi<A>,
    pub bin_semaphores: BinSemApi<A>,
    pub count_semaphores: CountSemApi<A>,
    pub mutexes: MutexApi<A>,
    pub streams: StreamApi<A>,
    pub dirs: DirApi<A>,
    pub timebases: TimeBaseApi<A>,
    pub modules: ModuleApi<A>,
    pub filesystems: FilesysApi<A>,
    pub consoles: ConsoleApi<A>,
}

impl<A: PlatformAdapter> Osal<A> {
    /// Validate `cfg`, build every per-type table at its configured
    /// capacity, and record the adapter's tick/clock relation. Corresponds
    /// to the legacy `OS_API_Init`.
    pub fn init(cfg: Config, adapter: A) -> Result<Osal<A>> {
        cfg.validate()?;
        let adapter = Arc::new(adapter);
        let global = Arc::new(GlobalState::new());
        global.mark_initialized(adapter.us_per_tick(), 1_000_000 / adapter.us_per_tick().max(1));
        log::debug!("osal init: {:?}", cfg);

        let tasks = Arc::new(TaskApi::new(&cfg, adapter.clone(), global.clone()));

        Ok(Osal {
            queues: QueueApi::new(&cfg, adapter.clone(), global.clone(), tasks.clone()),
            bin_semaphores: BinSemApi::new(&cfg, adapter.clone(), global.clone(), tasks.clone()),
            count_semaphores: CountSemApi::new(&cfg, adapter.clone(), global.clone(), tasks.clone()),
            mutexes: MutexApi::new(&cfg, adapter.clone(), global.clone(), tasks.clone()),
            streams: StreamApi::new(&cfg, adapter.clone(), global.clone(), tasks.clone()),
            dirs: DirApi::new(&cfg, adapter.clone(), global.clone(), tasks.clone()),
            timebases: TimeBaseApi::new(&cfg, adapter.clone(), global.clone(), tasks.clone()),
            modules: ModuleApi::new(&cfg, adapter.clone(), global.clone(), tasks.clone()),
            filesystems: FilesysApi::new(&cfg, adapter.clone(), global.clone(), tasks.clone()),
            consoles: ConsoleApi::new(&cfg, adapter, global.clone(), tasks.clone()),
            tasks,
            cfg,
            global,
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn set_debug_level(&self, level: u32) {
        self.global.set_debug_level(level);
    }

    pub fn set_event_handler(&self, handler: Option<global::EventHandler>) {
        self.global.set_event_handler(handler);
    }

    /// Invoke `f` once per active object across every resource table,
    /// restricted to those whose `creator` matches `creator_filter` when
    /// given. Corresponds to the legacy `OS_ForEachObject` (§4.D.7).
    pub fn for_each_object(&self, creator_filter: Option<ObjectId>, mut f: impl FnMut(ObjectId, &str, ObjectId)) {
        let mut visit = |id: ObjectId, name: &str, creator: ObjectId| {
            if creator_filter.map_or(true, |c| c == creator) {
                f(id, name, creator);
            }
        };
        self.tasks.for_each(&mut visit);
        self.queues.for_each(&mut visit);
        self.bin_semaphores.for_each(&mut visit);
        self.count_semaphores.for_each(&mut visit);
        self.mutexes.for_each(&mut visit);
        self.streams.for_each(&mut visit);
        self.dirs.for_each(&mut visit);
        self.timebases.for_each(&mut visit);
        self.modules.for_each(&mut visit);
        self.filesystems.for_each(&mut visit);
        self.consoles.for_each(&mut visit);
    }

    /// Corresponds to the legacy `OS_ApplicationShutdown`: bulk-deletes
    /// every object across every table and marks the instance shut down.
    /// Each table's own multi-pass delete-all absorbs inter-object
    /// dependencies (e.g. a timer callback referencing a timebase).
    pub fn shutdown(&self) {
        log::debug!("osal shutdown: deleting all objects");
        self.timebases.delete_all();
        self.queues.delete_all();
        self.bin_semaphores.delete_all();
        self.count_semaphores.delete_all();
        self.mutexes.delete_all();
        self.streams.delete_all();
        self.dirs.delete_all();
        self.modules.delete_all();
        self.filesystems.delete_all();
        self.consoles.delete_all();
        self.tasks.delete_all();
        self.global.mark_shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        self.global.is_shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_adapter::HostAdapter;

    fn osal() -> Osal<HostAdapter> {
        Osal::init(Config::default(), HostAdapter::new()).unwrap()
    }

    #[test]
    fn binsem_create_delete_lifecycle() {
        let o = osal();
        let id = o.bin_semaphores.create("s1", o.config().max_api_name, 1).unwrap();
        assert_eq!(o.bin_semaphores.get_id_by_name("s1").unwrap(), id);
        o.bin_semaphores.take(id).unwrap();
        o.bin_semaphores.give(id).unwrap();
        o.bin_semaphores.delete(id).unwrap();
        assert_eq!(o.bin_semaphores.get_id_by_name("s1"), Err(OsalError::NameNotFound));
    }

    #[test]
    fn queue_full_end_to_end() {
        let o = osal();
        let id = o.queues.create("q1", 32, 2, 16, o.config().queue_max_depth).unwrap();
        o.queues.put(id, b"hi").unwrap();
        assert_eq!(o.queues.get(id).unwrap(), b"hi");
    }

    #[test]
    fn filesys_mount_unmount_roundtrip() {
        let o = osal();
        o.filesystems.initialize("dev0", "vol0", 512, 1024, 32, None, false).unwrap();
        o.filesystems.mount("dev0", "/mnt/a", 64).unwrap();
        assert_eq!(
            o.filesystems
                .translate_path("/mnt/a/file.txt", o.config().max_file_name, o.config().max_local_path_len)
                .unwrap(),
            "/file.txt"
        );
        o.filesystems.unmount("/mnt/a").unwrap();
        o.filesystems.remove("dev0").unwrap();
    }

    #[test]
    fn shutdown_clears_every_table() {
        let o = osal();
        o.mutexes.create("m1", 32).unwrap();
        o.queues.create("q1", 32, 2, 16, 256).unwrap();
        o.shutdown();
        assert!(o.is_shutdown());
        assert_eq!(o.mutexes.get_id_by_name("m1"), Err(OsalError::NameNotFound));
    }

    #[test]
    fn countsem_respects_max_value() {
        let o = osal();
        let id = o.count_semaphores.create("c1", 32, 0, 2).unwrap();
        o.count_semaphores.give(id).unwrap();
        o.count_semaphores.give(id).unwrap();
        o.count_semaphores.give(id).unwrap(); // beyond max_value: adapter clamps, does not error
        o.count_semaphores.take(id).unwrap();
        o.count_semaphores.take(id).unwrap();
        assert_eq!(
            o.count_semaphores.timed_take(id, std::time::Duration::from_millis(10)),
            Err(OsalError::SemTimeout)
        );
    }

    #[test]
    fn mutex_lock_unlock_roundtrip() {
        let o = osal();
        let id = o.mutexes.create("m1", 32).unwrap();
        o.mutexes.lock(id).unwrap();
        o.mutexes.unlock(id).unwrap();
    }
}
