//! Runtime configuration.
//!
//! The legacy implementation sizes every table from compile-time
//! `#define OS_MAX_*` constants. Since this crate is a hosted library
//! meant to back more than one deployment, those become runtime fields on
//! `Config`, validated once at `Osal::init` time rather than enforced by
//! the type system.

use crate::error::{OsalError, Result};

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub max_tasks: usize,
    pub max_queues: usize,
    pub max_bin_semaphores: usize,
    pub max_count_semaphores: usize,
    pub max_mutexes: usize,
    pub max_timebases: usize,
    pub max_timers: usize,
    pub max_modules: usize,
    pub max_file_systems: usize,
    pub max_streams: usize,
    pub max_dirs: usize,
    pub max_consoles: usize,
    pub max_api_name: usize,
    pub max_path_len: usize,
    pub max_local_path_len: usize,
    pub max_file_name: usize,
    pub fs_dev_name_len: usize,
    pub fs_phys_name_len: usize,
    pub queue_max_depth: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_tasks: 64,
            max_queues: 64,
            max_bin_semaphores: 64,
            max_count_semaphores: 64,
            max_mutexes: 64,
            max_timebases: 8,
            max_timers: 32,
            max_modules: 16,
            max_file_systems: 16,
            max_streams: 64,
            max_dirs: 16,
            max_consoles: 4,
            max_api_name: 32,
            max_path_len: 128,
            max_local_path_len: 64,
            max_file_name: 32,
            fs_dev_name_len: 32,
            fs_phys_name_len: 32,
            queue_max_depth: 256,
        }
    }
}

impl Config {
    /// Rejects any capacity field that is zero; every table must have room
    /// for at least one object.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            self.max_tasks,
            self.max_queues,
            self.max_bin_semaphores,
            self.max_count_semaphores,
            self.max_mutexes,
            self.max_timebases,
            self.max_timers,
            self.max_modules,
            self.max_file_systems,
            self.max_streams,
            self.max_dirs,
            self.max_consoles,
            self.max_api_name,
            self.max_path_len,
            self.max_local_path_len,
            self.max_file_name,
            self.fs_dev_name_len,
            self.fs_phys_name_len,
            self.queue_max_depth,
        ];
        if fields.iter().any(|&f| f == 0) {
            return Err(OsalError::InvalidPointer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_field_rejected() {
        let mut cfg = Config::default();
        cfg.max_tasks = 0;
        assert!(cfg.validate().is_err());
    }
}
