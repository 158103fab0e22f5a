//! Timebase and timer-callback wrappers.
//!
//! A timebase owns a servicing thread (spawned via the adapter) and a ring
//! of timer callbacks (see `crate::timebase` for the tick state machine).
//! Application code must not call timer APIs from within a callback fired
//! by this engine — doing so from the servicing thread could deadlock
//! against the very lock the callback runs under.

use std::sync::Arc;

use crate::adapter::PlatformAdapter;
use crate::config::Config;
use crate::error::{OsalError, Result};
use crate::global::{GlobalState, LifecycleEvent};
use crate::id::{ObjectId, ResourceType};
use crate::resources::task::TaskApi;
use crate::table::TypeTable;
use crate::timebase::{TimeBaseState, TimerCb};

#[derive(Clone)]
pub(crate) struct TimeBaseRecord {
    pub state: Arc<TimeBaseState>,
    pub next_timer_local_id: usize,
}

impl Default for TimeBaseRecord {
    fn default() -> TimeBaseRecord {
        TimeBaseRecord {
            state: Arc::new(TimeBaseState::new()),
            next_timer_local_id: 0,
        }
    }
}

#[derive(Default, Clone)]
pub(crate) struct TimerCbRecord {
    pub parent: ObjectId,
    pub local_id: usize,
}

pub struct TimeBaseApi<A: PlatformAdapter> {
    timebases: TypeTable<TimeBaseRecord>,
    timercbs: TypeTable<TimerCbRecord>,
    adapter: Arc<A>,
    global: Arc<GlobalState>,
    tasks: Arc<TaskApi<A>>,
}

impl<A: PlatformAdapter> TimeBaseApi<A> {
    pub(crate) fn new(cfg: &Config, adapter: Arc<A>, global: Arc<GlobalState>, tasks: Arc<TaskApi<A>>) -> TimeBaseApi<A> {
        TimeBaseApi {
            timebases: TypeTable::new(ResourceType::TimeBase, cfg.max_timebases),
            timercbs: TypeTable::new(ResourceType::TimerCb, cfg.max_timers),
            adapter,
            global,
            tasks,
        }
    }

    pub fn create(&self, name: &str, max_name: usize) -> Result<ObjectId> {
        if name.len() >= max_name {
            return Err(OsalError::NameTooLong { max: max_name });
        }
        self.global.notify(LifecycleEvent::CreateBegin);
        let creator = self.tasks.current_task();
        let held = self.timebases.allocate_new(name, creator)?;
        let state = held.internal().state.clone();
        let id = self.timebases.finalize_new(held, Ok(()));
        self.global.notify(LifecycleEvent::CreateEnd);
        let id = id?;

        let adapter = self.adapter.clone();
        let us_per_tick = adapter.us_per_tick();
        let wait_tick = move || adapter.timebase_wait(std::time::Duration::from_micros(us_per_tick as u64));
        std::thread::Builder::new()
            .name(format!("timebase-{}", name))
            .spawn(move || crate::timebase::run_servicing_loop(state, wait_tick))
            .map_err(|_| OsalError::Error)?;

        Ok(id)
    }

    /// `OS_TimeBaseSet`-equivalent for the timebase's own periodic tick is
    /// not separately modeled: the legacy API sets the adapter-level
    /// hardware period once at create time via `external_sync`, which this
    /// crate represents with `PlatformAdapter::us_per_tick`.
    pub fn delete(&self, id: ObjectId) -> Result<()> {
        self.global.notify(LifecycleEvent::DeleteBegin);
        let held = self.timebases.get_locked(id, true)?;
        held.internal().state.stop.store(true, std::sync::atomic::Ordering::Release);
        let result = self.timebases.finalize_delete(held, Ok(()));
        self.global.notify(LifecycleEvent::DeleteEnd);
        result
    }

    pub fn get_id_by_name(&self, name: &str) -> Result<ObjectId> {
        self.timebases.find_by_name(name)
    }

    pub fn get_free_run(&self, id: ObjectId) -> Result<u64> {
        self.timebases
            .get_snapshot(id, |s| s.internal.state.freerun_us.load(std::sync::atomic::Ordering::Relaxed))
    }

    /// Attach a new timer callback to `timebase`, armed with `start_us`
    /// until first fire and `interval_us` thereafter (0 = one-shot).
    pub fn add_timer<F: Fn() + Send + Sync + 'static>(
        &self,
        timebase: ObjectId,
        name: &str,
        max_name: usize,
        start_us: i64,
        interval_us: i64,
        callback: F,
    ) -> Result<ObjectId> {
        if crate::timebase::in_timer_callback() {
            return Err(OsalError::IncorrectObjState);
        }
        if name.len() >= max_name {
            return Err(OsalError::NameTooLong { max: max_name });
        }
        if start_us < 0 {
            return Err(OsalError::TimerInvalidArgs);
        }
        let state = self
            .timebases
            .get_snapshot(timebase, |s| s.internal.state.clone())?;

        self.global.notify(LifecycleEvent::CreateBegin);
        let creator = self.tasks.current_task();
        let mut held = self.timercbs.allocate_new(name, creator)?;
        let outcome: Result<()> = Ok(());
        held.internal_mut().parent = timebase;
        let index = held.index;
        held.internal_mut().local_id = index;
        let id = self.timercbs.finalize_new(held, outcome);
        self.global.notify(LifecycleEvent::CreateEnd);
        let id = id?;

        state.ring.lock().insert(
            index,
            TimerCb {
                callback: Arc::new(callback),
                interval_us,
                wait_us: start_us,
                backlog_resets: 0,
            },
        );
        Ok(id)
    }

    pub fn set_timer(&self, timercb: ObjectId, start_us: i64, interval_us: i64) -> Result<()> {
        if crate::timebase::in_timer_callback() {
            return Err(OsalError::IncorrectObjState);
        }
        if start_us < 0 {
            return Err(OsalError::TimerInvalidArgs);
        }
        let (parent, index) = self
            .timercbs
            .get_snapshot(timercb, |s| (s.internal.parent, s.internal.local_id))?;
        let state = self.timebases.get_snapshot(parent, |s| s.internal.state.clone())?;
        let mut ring = state.ring.lock();
        if let Some(cb) = ring.cbs.get_mut(&index) {
            cb.wait_us = start_us;
            cb.interval_us = interval_us;
        }
        Ok(())
    }

    pub fn delete_timer(&self, timercb: ObjectId) -> Result<()> {
        if crate::timebase::in_timer_callback() {
            return Err(OsalError::IncorrectObjState);
        }
        self.global.notify(LifecycleEvent::DeleteBegin);
        let held = self.timercbs.get_locked(timercb, true)?;
        let parent = held.internal().parent;
        let index = held.internal().local_id;
        if let Ok(state) = self.timebases.get_snapshot(parent, |s| s.internal.state.clone()) {
            state.ring.lock().remove(index);
        }
        let result = self.timercbs.finalize_delete(held, Ok(()));
        self.global.notify(LifecycleEvent::DeleteEnd);
        result
    }

    pub(crate) fn delete_all(&self) {
        self.timercbs.delete_all(|id| {
            let held = self.timercbs.get_locked(id, true)?;
            let parent = held.internal().parent;
            let index = held.internal().local_id;
            if let Ok(state) = self.timebases.get_snapshot(parent, |s| s.internal.state.clone()) {
                state.ring.lock().remove(index);
            }
            self.timercbs.finalize_delete(held, Ok(()))
        });
        self.timebases.delete_all(|id| {
            let held = self.timebases.get_locked(id, true)?;
            held.internal().state.stop.store(true, std::sync::atomic::Ordering::Release);
            self.timebases.finalize_delete(held, Ok(()))
        });
    }

    pub(crate) fn for_each(&self, f: &mut dyn FnMut(ObjectId, &str, ObjectId)) {
        self.timebases.for_each(|id, common, _internal| f(id, &common.name, common.creator));
        self.timercbs.for_each(|id, common, _internal| f(id, &common.name, common.creator));
    }
}
