//! The platform-adapter boundary.
//!
//! `PlatformAdapter` is the capability a host kernel integration implements
//! to supply the actual primitives (native semaphore, native task, file
//! descriptor, ...) behind each resource wrapper. The core never touches a
//! kernel syscall directly; every kernel-specific action funnels through
//! this trait so the same resource-management logic works unmodified on
//! any host.

use std::time::Duration;

use crate::error::Result;

/// A native semaphore handle as returned by the adapter. Opaque to the
/// core; only the adapter interprets it.
pub type NativeSem = u64;
pub type NativeTask = u64;
pub type NativeQueue = u64;
pub type NativeStream = u64;
pub type NativeDir = u64;
pub type NativeModule = u64;
pub type NativeFs = u64;
pub type NativeConsole = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemKind {
    Binary,
    Counting { max_value: u32 },
    Mutex,
}

/// Capability boundary implemented once per host kernel. Methods return
/// `OsalError` on adapter-level failure; the resource wrapper is
/// responsible for rolling back the handle allocation when they do.
pub trait PlatformAdapter: Send + Sync + 'static {
    // -- tasks --
    fn task_create(&self, name: &str, priority: u8, stack_size: usize, entry: fn()) -> Result<NativeTask>;
    fn task_delete(&self, native: NativeTask) -> Result<()>;
    fn current_task(&self) -> NativeTask;

    // -- semaphores (binary, counting, mutex share one native concept) --
    fn sem_create(&self, name: &str, kind: SemKind, initial_value: u32) -> Result<NativeSem>;
    fn sem_delete(&self, native: NativeSem) -> Result<()>;
    fn sem_take(&self, native: NativeSem, timeout: Option<Duration>) -> Result<()>;
    fn sem_give(&self, native: NativeSem) -> Result<()>;

    // -- message queues --
    fn queue_create(&self, name: &str, depth: usize, max_size: usize) -> Result<NativeQueue>;
    fn queue_delete(&self, native: NativeQueue) -> Result<()>;
    fn queue_put(&self, native: NativeQueue, data: &[u8], timeout: Option<Duration>) -> Result<()>;
    fn queue_get(&self, native: NativeQueue, timeout: Option<Duration>) -> Result<Vec<u8>>;

    // -- streams (files/sockets as one handle space) --
    fn stream_open(&self, path: &str, create: bool) -> Result<NativeStream>;
    fn stream_close(&self, native: NativeStream) -> Result<()>;
    fn stream_read(&self, native: NativeStream, buf: &mut [u8]) -> Result<usize>;
    fn stream_write(&self, native: NativeStream, buf: &[u8]) -> Result<usize>;
    fn stream_seek(&self, native: NativeStream, offset: i64) -> Result<u64>;

    // -- directories --
    fn dir_open(&self, path: &str) -> Result<NativeDir>;
    fn dir_close(&self, native: NativeDir) -> Result<()>;
    fn dir_read(&self, native: NativeDir) -> Result<Option<String>>;
    fn dir_rewind(&self, native: NativeDir) -> Result<()>;

    // -- loadable modules --
    fn module_load(&self, path: &str) -> Result<NativeModule>;
    fn module_unload(&self, native: NativeModule) -> Result<()>;

    // -- filesystems --
    fn fs_mount(&self, device: &str, mount_point: &str) -> Result<NativeFs>;
    fn fs_unmount(&self, native: NativeFs) -> Result<()>;
    /// Register `device` against `volume` at the given geometry and bring
    /// the volume online. Does not format it.
    fn fs_start(&self, device: &str, volume: &str, block_size: usize, block_count: usize) -> Result<()>;
    /// Format an already-started volume.
    fn fs_format(&self, device: &str) -> Result<()>;
    /// Take a started volume back offline, e.g. to roll back a failed format.
    fn fs_stop(&self, device: &str) -> Result<()>;

    // -- console --
    fn console_create(&self, device: &str) -> Result<NativeConsole>;
    fn console_delete(&self, native: NativeConsole) -> Result<()>;
    fn console_write(&self, native: NativeConsole, text: &str) -> Result<()>;

    // -- timebase --
    /// Microseconds between adapter-level clock ticks, reported once at init.
    fn us_per_tick(&self) -> u32;
    /// Block until the next tick (or `interval` elapses, whichever the
    /// adapter's clock source supports), returning elapsed microseconds.
    /// The core spawns one dedicated thread per timebase that calls this
    /// in a loop; the adapter only supplies the wait primitive.
    fn timebase_wait(&self, interval: Duration) -> u32;

    fn short_sleep(&self, d: Duration);
}
