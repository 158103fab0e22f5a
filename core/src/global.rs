//! Process-wide shared state: the one record every wrapper consults to
//! confirm the library is initialized and to pull the tick/clock relation.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;

use crate::error::{OsalError, Result};

pub type EventHandler = Box<dyn Fn(LifecycleEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    CreateBegin,
    CreateEnd,
    DeleteBegin,
    DeleteEnd,
}

pub struct GlobalState {
    initialized: AtomicBool,
    shutdown: AtomicBool,
    us_per_tick: AtomicU32,
    ticks_per_second: AtomicU32,
    debug_level: AtomicU32,
    event_handler: RwLock<Option<EventHandler>>,
}

impl GlobalState {
    pub fn new() -> GlobalState {
        GlobalState {
            initialized: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            us_per_tick: AtomicU32::new(0),
            ticks_per_second: AtomicU32::new(0),
            debug_level: AtomicU32::new(0),
            event_handler: RwLock::new(None),
        }
    }

    pub fn mark_initialized(&self, us_per_tick: u32, ticks_per_second: u32) {
        if us_per_tick != 0 && ticks_per_second != 0 {
            let product = (us_per_tick as u64) * (ticks_per_second as u64);
            if product != 1_000_000 {
                log::warn!(
                    "us_per_tick ({}) * ticks_per_second ({}) = {}, expected 1_000_000",
                    us_per_tick,
                    ticks_per_second,
                    product
                );
            }
        }
        self.us_per_tick.store(us_per_tick, Ordering::Release);
        self.ticks_per_second.store(ticks_per_second, Ordering::Release);
        self.initialized.store(true, Ordering::Release);
    }

    pub fn require_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(OsalError::IncorrectObjState)
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn mark_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn us_per_tick(&self) -> u32 {
        self.us_per_tick.load(Ordering::Acquire)
    }

    pub fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second.load(Ordering::Acquire)
    }

    pub fn set_debug_level(&self, level: u32) {
        self.debug_level.store(level, Ordering::Relaxed);
    }

    pub fn debug_level(&self) -> u32 {
        self.debug_level.load(Ordering::Relaxed)
    }

    pub fn set_event_handler(&self, handler: Option<EventHandler>) {
        *self.event_handler.write().expect("event handler lock poisoned") = handler;
    }

    pub fn notify(&self, event: LifecycleEvent) {
        if let Some(handler) = &*self.event_handler.read().expect("event handler lock poisoned") {
            handler(event);
        }
    }
}

impl Default for GlobalState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_state_rejects_operations() {
        let g = GlobalState::new();
        assert_eq!(g.require_initialized(), Err(OsalError::IncorrectObjState));
    }

    #[test]
    fn initialized_state_reports_tick_relation() {
        let g = GlobalState::new();
        g.mark_initialized(1000, 1000);
        g.require_initialized().unwrap();
        assert_eq!(g.us_per_tick(), 1000);
        assert_eq!(g.ticks_per_second(), 1000);
    }
}
