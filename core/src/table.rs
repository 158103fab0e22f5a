//! Per-resource-type slot tables and the ID manager operating on them.
//!
//! Each resource type owns one `TypeTable<I>`: a fixed-capacity array of
//! slots, each holding a `CommonRecord` (name/state/creator/refcount/flags)
//! paired with a type-specific internal record of type `I`. The whole array
//! sits behind one `spin::Mutex`, which doubles as the "global lock" the
//! wider design calls for per resource type: holding the guard across a
//! lookup-and-mutate sequence is what makes `LockMode::Global` and
//! `LockMode::Exclusive` coherent.

use std::time::Duration;

use bitflags::bitflags;
use spin::Mutex;

use crate::error::{OsalError, Result};
use crate::id::{self, ObjectId, ResourceType};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RecordFlags: u16 {
        const EXCLUSIVE_REQUEST = 0x0001;
    }
}

/// How many times `get` with `LockMode::Exclusive` retries a busy slot
/// before giving up with `ObjInUse`.
const EXCLUSIVE_RETRY_LIMIT: u32 = 4;
const EXCLUSIVE_RETRY_DELAY: Duration = Duration::from_millis(1);

/// How many passes `delete_all` makes over a table before giving up.
const DELETE_ALL_MAX_PASSES: u32 = 5;
const DELETE_ALL_PASS_DELAY: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Reserved,
    Active,
}

/// The name/state/lifecycle bookkeeping shared by every resource kind,
/// independent of the type-specific payload `I`.
#[derive(Debug, Clone)]
pub struct CommonRecord {
    pub name: String,
    active_id: ObjectId,
    pub creator: ObjectId,
    pub refcount: u32,
    pub flags: RecordFlags,
}

impl CommonRecord {
    fn free() -> CommonRecord {
        CommonRecord {
            name: String::new(),
            active_id: ObjectId::UNDEFINED,
            creator: ObjectId::UNDEFINED,
            refcount: 0,
            flags: RecordFlags::empty(),
        }
    }

    pub fn state(&self) -> SlotState {
        if self.active_id == ObjectId::UNDEFINED {
            SlotState::Free
        } else if self.active_id == ObjectId::RESERVED {
            SlotState::Reserved
        } else {
            SlotState::Active
        }
    }

    pub fn active_id(&self) -> Option<ObjectId> {
        match self.state() {
            SlotState::Active => Some(self.active_id),
            _ => None,
        }
    }
}

/// How a lookup should treat the type-lock once the target slot is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Look up, copy out what's needed, release the lock immediately.
    None,
    /// On success, leave the type-lock held (returned as an `OwnedGuard`).
    Global,
    /// Like `Global`, but requires `refcount == 0`; retries a busy slot up
    /// to `EXCLUSIVE_RETRY_LIMIT` times with a short sleep in between.
    Exclusive,
    /// On success, increment refcount, then release the lock.
    Refcount,
}

struct Slot<I> {
    common: CommonRecord,
    internal: I,
}

struct Inner<I> {
    slots: Vec<Slot<I>>,
    next_serial: Vec<u32>,
}

/// One resource type's table: fixed capacity, one lock, paired common and
/// internal record arrays.
pub struct TypeTable<I> {
    ty: ResourceType,
    inner: Mutex<Inner<I>>,
}

/// A type-lock held across a multi-step operation, together with the slot
/// index it was acquired for. Dropping it releases the lock.
pub struct Held<'a, I> {
    guard: spin::MutexGuard<'a, Inner<I>>,
    pub index: usize,
}

impl<'a, I> Held<'a, I> {
    pub fn common(&self) -> &CommonRecord {
        &self.guard.slots[self.index].common
    }

    pub fn common_mut(&mut self) -> &mut CommonRecord {
        &mut self.guard.slots[self.index].common
    }

    pub fn internal(&self) -> &I {
        &self.guard.slots[self.index].internal
    }

    pub fn internal_mut(&mut self) -> &mut I {
        &mut self.guard.slots[self.index].internal
    }
}

impl<I: Default + Clone> TypeTable<I> {
    pub fn new(ty: ResourceType, capacity: usize) -> TypeTable<I> {
        let slots = (0..capacity)
            .map(|_| Slot {
                common: CommonRecord::free(),
                internal: I::default(),
            })
            .collect();
        TypeTable {
            ty,
            inner: Mutex::new(Inner {
                slots,
                next_serial: vec![0u32; capacity],
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Reserve a free slot under the given `name`, returning the held lock
    /// (still locked) positioned at the new slot. The caller must fill in
    /// the internal record and eventually call `finalize_new`. `creator` is
    /// stamped onto the slot's common record per §3.2/§4.D.2 step 5 (the
    /// handle of the task calling create, or `ObjectId::UNDEFINED` if none
    /// resolves).
    ///
    /// Matches the legacy `OS_ObjectIdAllocateNew` contract: the table is
    /// left locked on success so the caller can populate the internal
    /// record and invoke the platform adapter before anyone else can see
    /// the slot.
    pub fn allocate_new(&self, name: &str, creator: ObjectId) -> Result<Held<'_, I>> {
        let mut guard = self.inner.lock();
        if guard
            .slots
            .iter()
            .any(|s| s.common.state() != SlotState::Free && s.common.name == name)
        {
            return Err(OsalError::NameTaken);
        }
        let index = guard
            .slots
            .iter()
            .position(|s| s.common.state() == SlotState::Free)
            .ok_or(OsalError::NoFreeIds)?;
        {
            let slot = &mut guard.slots[index];
            slot.common.name = name.to_string();
            slot.common.active_id = ObjectId::RESERVED;
            slot.common.creator = creator;
            slot.common.refcount = 0;
            slot.common.flags = RecordFlags::empty();
        }
        Ok(Held { guard, index })
    }

    /// Complete an `allocate_new`, publishing the handle on success or
    /// freeing the slot on failure. Consumes the held lock, releasing it.
    pub fn finalize_new(&self, held: Held<'_, I>, outcome: Result<()>) -> Result<ObjectId> {
        let Held { mut guard, index } = held;
        match outcome {
            Ok(()) => {
                let prev = guard.next_serial[index];
                let serial = id::next_serial(prev, index);
                guard.next_serial[index] = serial;
                let handle = ObjectId::compose(self.ty, serial);
                guard.slots[index].common.active_id = handle;
                Ok(handle)
            }
            Err(e) => {
                guard.slots[index] = Slot {
                    common: CommonRecord::free(),
                    internal: I::default(),
                };
                Err(e)
            }
        }
    }

    /// Resolve `handle` to its slot, applying `mode`'s lock discipline.
    /// With `LockMode::None`/`Refcount` this returns a detached snapshot via
    /// `f`; with `Global`/`Exclusive` the lock stays held in the returned
    /// `Held`, so callers pick the right overload: see `get_with`.
    pub(crate) fn get_with<R>(
        &self,
        handle: ObjectId,
        mode: LockMode,
        f: impl FnOnce(&mut Slot<I>) -> R,
    ) -> Result<(R, Option<Held<'_, I>>)> {
        let index = handle
            .slot_of(self.ty, self.capacity())
            .ok_or(OsalError::InvalidId)?;

        let mut attempts = 0;
        loop {
            let mut guard = self.inner.lock();
            let slot = &mut guard.slots[index];
            if slot.common.state() != SlotState::Active || slot.common.active_id != handle {
                return Err(OsalError::InvalidId);
            }

            if mode == LockMode::Exclusive && slot.common.refcount != 0 {
                slot.common.flags |= RecordFlags::EXCLUSIVE_REQUEST;
                drop(guard);
                attempts += 1;
                if attempts > EXCLUSIVE_RETRY_LIMIT {
                    log::debug!(
                        "{} slot {} busy after {} retries, giving up",
                        self.ty,
                        index,
                        EXCLUSIVE_RETRY_LIMIT
                    );
                    return Err(OsalError::ObjInUse);
                }
                log::trace!(
                    "{} slot {} busy (refcount>0), retry {}/{}",
                    self.ty,
                    index,
                    attempts,
                    EXCLUSIVE_RETRY_LIMIT
                );
                std::thread::sleep(EXCLUSIVE_RETRY_DELAY);
                continue;
            }

            let result = f(slot);

            match mode {
                LockMode::None => {
                    drop(guard);
                    return Ok((result, None));
                }
                LockMode::Refcount => {
                    slot.common.refcount += 1;
                    drop(guard);
                    return Ok((result, None));
                }
                LockMode::Global => {
                    return Ok((result, Some(Held { guard, index })));
                }
                LockMode::Exclusive => {
                    slot.common.flags.remove(RecordFlags::EXCLUSIVE_REQUEST);
                    return Ok((result, Some(Held { guard, index })));
                }
            }
        }
    }

    /// Resolve by id, no lock retained, no refcount change. The common
    /// use-case of reading a handle's info snapshot.
    pub fn get_snapshot<R>(&self, handle: ObjectId, f: impl FnOnce(&Slot<I>) -> R) -> Result<R> {
        let (r, _) = self.get_with(handle, LockMode::None, |s| f(s))?;
        Ok(r)
    }

    /// Resolve by id, incrementing refcount on success; caller must later
    /// call `decrement_refcount`.
    pub fn get_refcounted(&self, handle: ObjectId) -> Result<()> {
        let (_, _) = self.get_with(handle, LockMode::Refcount, |_| ())?;
        Ok(())
    }

    pub fn decrement_refcount(&self, handle: ObjectId) -> Result<()> {
        let index = handle
            .slot_of(self.ty, self.capacity())
            .ok_or(OsalError::InvalidId)?;
        let mut guard = self.inner.lock();
        let slot = &mut guard.slots[index];
        if slot.common.state() != SlotState::Active || slot.common.active_id != handle {
            return Err(OsalError::InvalidId);
        }
        slot.common.refcount = slot.common.refcount.saturating_sub(1);
        Ok(())
    }

    /// Resolve by id with the lock retained on success (`Global` mode), for
    /// multi-step operations like delete that must hold the lock across a
    /// platform-adapter call.
    pub fn get_locked(&self, handle: ObjectId, exclusive: bool) -> Result<Held<'_, I>> {
        let mode = if exclusive {
            LockMode::Exclusive
        } else {
            LockMode::Global
        };
        let (_, held) = self.get_with(handle, mode, |_| ())?;
        Ok(held.expect("Global/Exclusive mode always retains the lock on success"))
    }

    /// Find the first active slot whose name matches, without retaining
    /// the lock (`LockMode::None`, as the legacy name lookup is specified).
    pub fn find_by_name(&self, name: &str) -> Result<ObjectId> {
        let guard = self.inner.lock();
        guard
            .slots
            .iter()
            .find(|s| s.common.state() == SlotState::Active && s.common.name == name)
            .map(|s| s.common.active_id)
            .ok_or(OsalError::NameNotFound)
    }

    /// Find the first active slot matching an arbitrary predicate.
    pub fn find_by<F: Fn(&CommonRecord, &I) -> bool>(&self, pred: F) -> Option<ObjectId> {
        let guard = self.inner.lock();
        guard
            .slots
            .iter()
            .find(|s| s.common.state() == SlotState::Active && pred(&s.common, &s.internal))
            .map(|s| s.common.active_id)
    }

    /// Complete a delete started via `get_locked(.., exclusive: true)`.
    /// On success, frees the slot; on failure, leaves it active.
    pub fn finalize_delete(&self, held: Held<'_, I>, outcome: Result<()>) -> Result<()> {
        let Held { mut guard, index } = held;
        outcome?;
        guard.slots[index] = Slot {
            common: CommonRecord::free(),
            internal: I::default(),
        };
        Ok(())
    }

    /// Invoke `f` once per active object. The type-lock is taken and
    /// released per-slot and never held while `f` runs, so `f` may safely
    /// call back into this table (e.g. to delete other objects).
    pub fn for_each<F: FnMut(ObjectId, &CommonRecord, &I)>(&self, mut f: F) {
        let count = self.capacity();
        for index in 0..count {
            let snapshot = {
                let guard = self.inner.lock();
                let slot = &guard.slots[index];
                if slot.common.state() != SlotState::Active {
                    None
                } else {
                    Some((slot.common.active_id, slot.common.clone(), slot.internal.clone()))
                }
            };
            if let Some((id, common, internal)) = snapshot {
                f(id, &common, &internal);
            }
        }
    }

    /// Delete every active object in this table, invoking `delete` (which
    /// should perform the platform-adapter teardown and then free the
    /// slot) for each. Matches the legacy multi-pass bulk-delete: up to
    /// `DELETE_ALL_MAX_PASSES`, short delay between passes, stopping early
    /// once a pass deletes nothing.
    pub fn delete_all<F: Fn(ObjectId) -> Result<()>>(&self, delete: F) {
        for pass in 0..DELETE_ALL_MAX_PASSES {
            let ids: Vec<ObjectId> = {
                let guard = self.inner.lock();
                guard
                    .slots
                    .iter()
                    .filter(|s| s.common.state() == SlotState::Active)
                    .map(|s| s.common.active_id)
                    .collect()
            };
            if ids.is_empty() {
                return;
            }
            log::debug!(
                "{} delete_all pass {}: {} objects",
                self.ty,
                pass + 1,
                ids.len()
            );
            let mut deleted = 0;
            for id in ids {
                if delete(id).is_ok() {
                    deleted += 1;
                }
            }
            if deleted == 0 {
                return;
            }
            if pass + 1 < DELETE_ALL_MAX_PASSES {
                std::thread::sleep(DELETE_ALL_PASS_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone)]
    struct Payload(u32);

    #[test]
    fn allocate_finalize_and_lookup() {
        let t: TypeTable<Payload> = TypeTable::new(ResourceType::Queue, 4);
        let mut held = t.allocate_new("q1", ObjectId::UNDEFINED).unwrap();
        held.internal_mut().0 = 42;
        let id = t.finalize_new(held, Ok(())).unwrap();
        assert_eq!(t.find_by_name("q1").unwrap(), id);
        let v = t.get_snapshot(id, |s| s.internal.0).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn allocate_new_stamps_creator() {
        let t: TypeTable<Payload> = TypeTable::new(ResourceType::Queue, 4);
        let creator = ObjectId::compose(ResourceType::Task, 7);
        let held = t.allocate_new("q1", creator).unwrap();
        let id = t.finalize_new(held, Ok(())).unwrap();
        assert_eq!(t.get_snapshot(id, |s| s.common.creator).unwrap(), creator);
    }

    #[test]
    fn duplicate_name_rejected() {
        let t: TypeTable<Payload> = TypeTable::new(ResourceType::Queue, 4);
        let held = t.allocate_new("q1", ObjectId::UNDEFINED).unwrap();
        t.finalize_new(held, Ok(())).unwrap();
        assert_eq!(t.allocate_new("q1", ObjectId::UNDEFINED).unwrap_err(), OsalError::NameTaken);
    }

    #[test]
    fn rollback_on_finalize_failure_frees_slot() {
        let t: TypeTable<Payload> = TypeTable::new(ResourceType::Queue, 1);
        let held = t.allocate_new("q1", ObjectId::UNDEFINED).unwrap();
        assert_eq!(
            t.finalize_new(held, Err(OsalError::Error)).unwrap_err(),
            OsalError::Error
        );
        // Slot must be free again.
        let held2 = t.allocate_new("q1", ObjectId::UNDEFINED).unwrap();
        t.finalize_new(held2, Ok(())).unwrap();
    }

    #[test]
    fn table_full_after_capacity_allocations() {
        let t: TypeTable<Payload> = TypeTable::new(ResourceType::Queue, 1);
        let held = t.allocate_new("q1", ObjectId::UNDEFINED).unwrap();
        t.finalize_new(held, Ok(())).unwrap();
        assert_eq!(t.allocate_new("q2", ObjectId::UNDEFINED).unwrap_err(), OsalError::NoFreeIds);
    }

    #[test]
    fn exclusive_lock_rejects_in_use_object() {
        let t: TypeTable<Payload> = TypeTable::new(ResourceType::Queue, 1);
        let held = t.allocate_new("q1", ObjectId::UNDEFINED).unwrap();
        let id = t.finalize_new(held, Ok(())).unwrap();
        t.get_refcounted(id).unwrap();
        assert_eq!(t.get_locked(id, true).unwrap_err(), OsalError::ObjInUse);
        t.decrement_refcount(id).unwrap();
        t.get_locked(id, true).unwrap();
    }

    #[test]
    fn exclusive_retry_sets_request_flag_then_clears_it_on_success() {
        let t: TypeTable<Payload> = TypeTable::new(ResourceType::Queue, 1);
        let held = t.allocate_new("q1", ObjectId::UNDEFINED).unwrap();
        let id = t.finalize_new(held, Ok(())).unwrap();
        t.get_refcounted(id).unwrap();

        let flag_was_set = std::sync::atomic::AtomicBool::new(false);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(2));
                if t.get_snapshot(id, |s| s.common.flags.contains(RecordFlags::EXCLUSIVE_REQUEST)).unwrap() {
                    flag_was_set.store(true, std::sync::atomic::Ordering::SeqCst);
                }
                t.decrement_refcount(id).unwrap();
            });
            t.get_locked(id, true).unwrap();
        });
        assert!(flag_was_set.load(std::sync::atomic::Ordering::SeqCst));
        assert!(!t
            .get_snapshot(id, |s| s.common.flags.contains(RecordFlags::EXCLUSIVE_REQUEST))
            .unwrap());
    }

    #[test]
    fn delete_all_removes_every_active_object() {
        let t: TypeTable<Payload> = TypeTable::new(ResourceType::Queue, 3);
        for n in ["a", "b", "c"] {
            let held = t.allocate_new(n, ObjectId::UNDEFINED).unwrap();
            t.finalize_new(held, Ok(())).unwrap();
        }
        t.delete_all(|id| {
            let held = t.get_locked(id, true)?;
            t.finalize_delete(held, Ok(()))
        });
        assert_eq!(t.find_by_name("a").unwrap_err(), OsalError::NameNotFound);
        assert_eq!(t.find_by_name("b").unwrap_err(), OsalError::NameNotFound);
    }

    #[test]
    fn for_each_visits_only_active_slots_with_creator() {
        let t: TypeTable<Payload> = TypeTable::new(ResourceType::Queue, 3);
        let creator = ObjectId::compose(ResourceType::Task, 1);
        let held = t.allocate_new("a", creator).unwrap();
        t.finalize_new(held, Ok(())).unwrap();

        let mut seen = Vec::new();
        t.for_each(|id, common, _internal| seen.push((id, common.name.clone(), common.creator)));
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, "a");
        assert_eq!(seen[0].2, creator);
    }
}
