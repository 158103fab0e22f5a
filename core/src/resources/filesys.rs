//! Filesystems and volume mounting.
//!
//! A filesys record represents one volume: its device name, its current
//! physical and virtual mount points, and a state bitmap. `mkfs`/`initfs`
//! bring a volume to `READY`; `mount` transitions a ready, unmounted
//! volume to mounted (both system and virtual, matching the legacy model
//! where the two mount kinds are set together); `unmount` reverses that.
//! `AddFixedMap` registers a volume that is always mounted (no separate
//! mount/unmount calls ever apply to it).

use std::sync::Arc;

use bitflags::bitflags;

use crate::adapter::PlatformAdapter;
use crate::config::Config;
use crate::error::{OsalError, Result};
use crate::global::{GlobalState, LifecycleEvent};
use crate::id::{ObjectId, ResourceType};
use crate::resources::task::TaskApi;
use crate::table::TypeTable;

/// The kind of store backing a volume, per §4.E: volume names starting
/// with `RAM` (or carrying an explicit RAM address) default to a volatile
/// disk; anything else is left for the adapter to identify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FsType {
    #[default]
    Unknown,
    VolatileDisk,
}

/// Whether `mount_point` is a path-prefix of `virt`: `virt` starts with
/// `mount_point` and the next character (if any) is a `/`, so a mount
/// point never matches a longer sibling path component by accident
/// (`/cf` matches `/cf/x` and `/cf` itself, not `/cfoo`).
fn path_is_prefix(mount_point: &str, virt: &str) -> bool {
    virt.starts_with(mount_point) && matches!(virt.as_bytes().get(mount_point.len()), None | Some(b'/'))
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FsFlags: u16 {
        const READY = 0x0001;
        const FIXED = 0x0002;
        const MOUNTED_SYSTEM = 0x0004;
        const MOUNTED_VIRTUAL = 0x0008;
    }
}

#[derive(Default, Clone)]
pub(crate) struct FilesysRecord {
    pub device_name: String,
    pub volume_name: String,
    pub phys_path: String,
    pub virt_path: String,
    pub block_size: usize,
    pub block_count: usize,
    pub ram_address: Option<u64>,
    pub fstype: FsType,
    pub flags: FsFlags,
}

pub struct FilesysApi<A: PlatformAdapter> {
    table: TypeTable<FilesysRecord>,
    adapter: Arc<A>,
    global: Arc<GlobalState>,
    tasks: Arc<TaskApi<A>>,
}

impl<A: PlatformAdapter> FilesysApi<A> {
    pub(crate) fn new(cfg: &Config, adapter: Arc<A>, global: Arc<GlobalState>, tasks: Arc<TaskApi<A>>) -> FilesysApi<A> {
        FilesysApi {
            table: TypeTable::new(ResourceType::FileSys, cfg.max_file_systems),
            adapter,
            global,
            tasks,
        }
    }

    /// `OS_mkfs`/`OS_initfs` equivalent: register `device_name` against
    /// `volume_name` at the given geometry, start the volume, and
    /// optionally format it. `ram_address` is an explicit RAM-backed
    /// address for the volume, if any; a volume is tagged `VolatileDisk`
    /// when it carries one or when `volume_name` starts with `"RAM"`, and
    /// `Unknown` otherwise (left for the adapter to identify). On format
    /// failure the volume is stopped again rather than left half
    /// initialized, and `READY` is set only once every step succeeds.
    /// Fails with `FsDeviceNotFree` if the device name is already
    /// registered.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &self,
        device_name: &str,
        volume_name: &str,
        block_size: usize,
        block_count: usize,
        dev_name_len: usize,
        ram_address: Option<u64>,
        should_format: bool,
    ) -> Result<ObjectId> {
        if device_name.len() >= dev_name_len {
            return Err(OsalError::FsNameTooLong);
        }
        self.global.notify(LifecycleEvent::CreateBegin);
        let creator = self.tasks.current_task();
        let mut held = self.table.allocate_new(device_name, creator).map_err(|e| match e {
            OsalError::NameTaken => OsalError::FsDeviceNotFree,
            other => other,
        })?;
        let fstype = if ram_address.is_some() || volume_name.starts_with("RAM") {
            FsType::VolatileDisk
        } else {
            FsType::Unknown
        };
        let outcome = self
            .adapter
            .fs_start(device_name, volume_name, block_size, block_count)
            .and_then(|()| {
                if should_format {
                    if let Err(e) = self.adapter.fs_format(device_name) {
                        let _ = self.adapter.fs_stop(device_name);
                        return Err(e);
                    }
                }
                Ok(())
            })
            .map(|()| {
                let rec = held.internal_mut();
                rec.device_name = device_name.to_string();
                rec.volume_name = volume_name.to_string();
                rec.block_size = block_size;
                rec.block_count = block_count;
                rec.ram_address = ram_address;
                rec.fstype = fstype;
                rec.flags = FsFlags::READY;
            });
        let result = self.table.finalize_new(held, outcome);
        self.global.notify(LifecycleEvent::CreateEnd);
        result
    }

    /// `OS_FileSysAddFixedMap` equivalent: register a volume that is
    /// always mounted and never unmounted through this API.
    pub fn add_fixed_map(&self, device_name: &str, phys_path: &str, virt_path: &str, max_path: usize) -> Result<ObjectId> {
        if phys_path.len() >= max_path || virt_path.len() >= max_path {
            return Err(OsalError::FsPathTooLong);
        }
        self.global.notify(LifecycleEvent::CreateBegin);
        let creator = self.tasks.current_task();
        let mut held = self.table.allocate_new(device_name, creator)?;
        {
            let rec = held.internal_mut();
            rec.device_name = device_name.to_string();
            rec.phys_path = phys_path.to_string();
            rec.virt_path = virt_path.to_string();
            rec.flags = FsFlags::FIXED | FsFlags::READY | FsFlags::MOUNTED_SYSTEM | FsFlags::MOUNTED_VIRTUAL;
        }
        let result = self.table.finalize_new(held, Ok(()));
        self.global.notify(LifecycleEvent::CreateEnd);
        result
    }

    /// `OS_rmfs` equivalent. Per design decision, a mounted volume must be
    /// unmounted first; the permissive legacy behavior (stopping the
    /// volume without checking mount state) is not preserved here.
    pub fn remove(&self, device_name: &str) -> Result<()> {
        self.global.notify(LifecycleEvent::DeleteBegin);
        let id = self.table.find_by_name(device_name)?;
        let held = self.table.get_locked(id, true)?;
        let result = if held
            .internal()
            .flags
            .intersects(FsFlags::MOUNTED_SYSTEM | FsFlags::MOUNTED_VIRTUAL)
        {
            self.table.finalize_delete(held, Err(OsalError::IncorrectObjState))
        } else {
            self.table.finalize_delete(held, Ok(()))
        };
        self.global.notify(LifecycleEvent::DeleteEnd);
        result
    }

    /// `OS_mount` equivalent: requires the volume be `READY` and not
    /// already mounted. On failure from the adapter, the specific error
    /// code is preserved rather than masked with `NameNotFound` (resolves
    /// the legacy ambiguity where a failed lookup and a failed mount both
    /// surfaced as the same code).
    pub fn mount(&self, device_name: &str, mount_point: &str, max_path: usize) -> Result<()> {
        if mount_point.len() >= max_path {
            return Err(OsalError::FsPathTooLong);
        }
        let id = self.table.find_by_name(device_name)?;
        let mut held = self.table.get_locked(id, false)?;
        let flags = held.internal().flags;
        if (flags & !FsFlags::FIXED) != FsFlags::READY {
            return Err(OsalError::IncorrectObjState);
        }
        self.adapter.fs_mount(device_name, mount_point)?;
        let rec = held.internal_mut();
        rec.virt_path = mount_point.to_string();
        rec.flags |= FsFlags::MOUNTED_SYSTEM | FsFlags::MOUNTED_VIRTUAL;
        Ok(())
    }

    /// `OS_unmount` equivalent, by virtual mount point.
    pub fn unmount(&self, mount_point: &str) -> Result<()> {
        let id = self
            .table
            .find_by(|_common, internal| {
                internal.flags.contains(FsFlags::MOUNTED_VIRTUAL) && internal.virt_path == mount_point
            })
            .ok_or(OsalError::NameNotFound)?;
        let mut held = self.table.get_locked(id, true)?;
        let required = FsFlags::READY | FsFlags::MOUNTED_SYSTEM | FsFlags::MOUNTED_VIRTUAL;
        if (held.internal().flags & !FsFlags::FIXED) != required {
            return Err(OsalError::IncorrectObjState);
        }
        held.internal_mut().flags &= !(FsFlags::MOUNTED_SYSTEM | FsFlags::MOUNTED_VIRTUAL);
        Ok(())
    }

    /// `OS_TranslatePath` equivalent: resolve a virtual path to the
    /// physical path rooted at the matching volume's mount point.
    ///
    /// `virtual_path` must start with `/` and name a file (a non-empty
    /// component after the last `/`); the matching volume is the one whose
    /// virtual mount point is a path-prefix of `virtual_path` (the prefix
    /// must end exactly at a `/` or at the end of the string, so `/cf`
    /// matches `/cf/x` but not `/cfoo/x`).
    pub fn translate_path(&self, virtual_path: &str, max_file_name: usize, max_local_path_len: usize) -> Result<String> {
        if !virtual_path.starts_with('/') {
            return Err(OsalError::FsPathInvalid);
        }
        let file_name = &virtual_path[virtual_path.rfind('/').unwrap() + 1..];
        if file_name.is_empty() {
            return Err(OsalError::FsPathInvalid);
        }
        if file_name.len() >= max_file_name {
            return Err(OsalError::FsNameTooLong);
        }
        let id = self
            .table
            .find_by(|_common, internal| {
                internal.flags.contains(FsFlags::MOUNTED_VIRTUAL) && path_is_prefix(&internal.virt_path, virtual_path)
            })
            .ok_or(OsalError::FsPathInvalid)?;
        let (phys_path, virt_len) = self
            .table
            .get_snapshot(id, |s| (s.internal.phys_path.clone(), s.internal.virt_path.len()))?;
        let combined = format!("{}{}", phys_path, &virtual_path[virt_len..]);
        if combined.len() >= max_local_path_len {
            return Err(OsalError::FsPathTooLong);
        }
        Ok(combined)
    }

    pub fn get_id_by_name(&self, name: &str) -> Result<ObjectId> {
        self.table.find_by_name(name)
    }

    pub(crate) fn delete_all(&self) {
        self.table.delete_all(|id| {
            let held = self.table.get_locked(id, true)?;
            self.table.finalize_delete(held, Ok(()))
        });
    }

    pub(crate) fn for_each(&self, f: &mut dyn FnMut(ObjectId, &str, ObjectId)) {
        self.table.for_each(|id, common, _internal| f(id, &common.name, common.creator));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::global::GlobalState;
    use crate::host_adapter::HostAdapter;
    use crate::resources::task::TaskApi;
    use std::sync::Arc;

    fn api() -> FilesysApi<HostAdapter> {
        let cfg = Config::default();
        let adapter = Arc::new(HostAdapter::new());
        let global = Arc::new(GlobalState::new());
        let tasks = Arc::new(TaskApi::new(&cfg, adapter.clone(), global.clone()));
        FilesysApi::new(&cfg, adapter, global, tasks)
    }

    #[test]
    fn translate_path_rejects_missing_leading_slash() {
        let f = api();
        f.initialize("ram0", "RAM0", 512, 200, 32, None, false).unwrap();
        f.mount("ram0", "/cf", 64).unwrap();
        assert_eq!(f.translate_path("cf/x", 32, 64), Err(OsalError::FsPathInvalid));
    }

    #[test]
    fn translate_path_rejects_missing_filename() {
        let f = api();
        f.initialize("ram0", "RAM0", 512, 200, 32, None, false).unwrap();
        f.mount("ram0", "/cf", 64).unwrap();
        assert_eq!(f.translate_path("/cf/", 32, 64), Err(OsalError::FsPathInvalid));
    }

    #[test]
    fn translate_path_does_not_match_sibling_prefix() {
        let f = api();
        f.initialize("ram0", "RAM0", 512, 200, 32, None, false).unwrap();
        f.mount("ram0", "/cf", 64).unwrap();
        assert_eq!(f.translate_path("/cfoo/x", 32, 64), Err(OsalError::FsPathInvalid));
    }

    #[test]
    fn translate_path_succeeds_for_mounted_volume() {
        let f = api();
        f.initialize("ram0", "RAM0", 512, 200, 32, None, false).unwrap();
        f.mount("ram0", "/cf", 64).unwrap();
        let out = f.translate_path("/cf/data/x.bin", 32, 64).unwrap();
        assert_eq!(out, "/data/x.bin");
    }

    #[test]
    fn initialize_tags_ram_volumes_as_volatile_disk() {
        let f = api();
        let id = f.initialize("ram0", "RAM0", 512, 200, 32, None, false).unwrap();
        assert_eq!(f.table.get_snapshot(id, |s| s.internal.fstype).unwrap(), FsType::VolatileDisk);
    }

    #[test]
    fn initialize_tags_non_ram_volumes_as_unknown() {
        let f = api();
        let id = f.initialize("sd0", "DATA", 512, 200, 32, None, false).unwrap();
        assert_eq!(f.table.get_snapshot(id, |s| s.internal.fstype).unwrap(), FsType::Unknown);
    }

    #[test]
    fn initialize_with_format_marks_ready() {
        let f = api();
        let id = f.initialize("sd1", "DATA", 512, 200, 32, None, true).unwrap();
        assert!(f
            .table
            .get_snapshot(id, |s| s.internal.flags.contains(FsFlags::READY))
            .unwrap());
    }
}
