//! One module per resource kind. Each follows the uniform shape from the
//! core design: `create`/`delete`/`get_id_by_name`/`get_info`, plus
//! whatever type-specific operations that resource needs, delegating
//! lifecycle bookkeeping to `crate::table::TypeTable` and kernel-specific
//! work to `crate::adapter::PlatformAdapter`.

pub mod binsem;
pub mod console;
pub mod countsem;
pub mod dir;
pub mod filesys;
pub mod module;
pub mod mutex;
pub mod queue;
pub mod stream;
pub mod task;
pub mod timebase;
