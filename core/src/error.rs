//! Error types for the OSAL core.
//!
//! One flat enum rather than a tree of per-subsystem error types: callers
//! match on a stable, small vocabulary regardless of which resource wrapper
//! produced the error, mirroring the legacy `OS_SUCCESS`/`OS_ERR_*` code
//! space this crate's API replaces.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "osal errors must be handled, not silently discarded"]
pub enum OsalError {
    /// Generic, otherwise-uncategorized failure.
    Error,
    /// A pointer/reference argument was null or otherwise invalid.
    InvalidPointer,
    /// A handle did not decode to the expected resource type or slot range.
    InvalidId,
    /// A supplied name exceeded the configured maximum length.
    NameTooLong { max: usize },
    /// No object with the given name exists.
    NameNotFound,
    /// An object with the given name already exists.
    NameTaken,
    /// The type's table has no free slots.
    NoFreeIds,
    /// The object's slot was not in the state the operation required.
    IncorrectObjState,
    /// The object is referenced elsewhere and cannot be exclusively deleted.
    ObjInUse,
    /// A semaphore operation failed at the platform adapter.
    SemFailure,
    /// A semaphore take/pend operation timed out.
    SemTimeout,
    /// A queue receive found no message.
    QueueEmpty,
    /// A queue send found no free slot.
    QueueFull,
    /// A queue operation timed out.
    QueueTimeout,
    /// A queue message exceeded the queue's configured maximum size.
    QueueInvalidSize,
    /// A timer API call had invalid arguments (bad interval, null callback...).
    TimerInvalidArgs,
    /// A timer callback handle did not resolve.
    TimerInvalidId,
    /// No timer service is available from the platform adapter.
    TimerUnavailable,
    /// A filesystem path exceeded the configured maximum length.
    FsPathTooLong,
    /// A filesystem path was malformed.
    FsPathInvalid,
    /// A filesystem name exceeded the configured maximum length.
    FsNameTooLong,
    /// The requested device is already mounted or otherwise in use.
    FsDeviceNotFree,
    /// The volume has not been formatted/created.
    FsDriveNotCreated,
    /// A loadable module failed to load at the platform adapter.
    ModuleLoadError,
}

impl fmt::Display for OsalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "generic OSAL error"),
            Self::InvalidPointer => write!(f, "invalid pointer argument"),
            Self::InvalidId => write!(f, "invalid object id"),
            Self::NameTooLong { max } => write!(f, "name exceeds maximum length of {}", max),
            Self::NameNotFound => write!(f, "no object with that name"),
            Self::NameTaken => write!(f, "name already in use"),
            Self::NoFreeIds => write!(f, "no free ids for this object type"),
            Self::IncorrectObjState => write!(f, "object is not in the required state"),
            Self::ObjInUse => write!(f, "object is in use"),
            Self::SemFailure => write!(f, "semaphore operation failed"),
            Self::SemTimeout => write!(f, "semaphore operation timed out"),
            Self::QueueEmpty => write!(f, "queue is empty"),
            Self::QueueFull => write!(f, "queue is full"),
            Self::QueueTimeout => write!(f, "queue operation timed out"),
            Self::QueueInvalidSize => write!(f, "queue message size invalid"),
            Self::TimerInvalidArgs => write!(f, "invalid timer arguments"),
            Self::TimerInvalidId => write!(f, "invalid timer callback id"),
            Self::TimerUnavailable => write!(f, "timer service unavailable"),
            Self::FsPathTooLong => write!(f, "filesystem path too long"),
            Self::FsPathInvalid => write!(f, "filesystem path invalid"),
            Self::FsNameTooLong => write!(f, "filesystem name too long"),
            Self::FsDeviceNotFree => write!(f, "device already mounted or in use"),
            Self::FsDriveNotCreated => write!(f, "volume has not been created"),
            Self::ModuleLoadError => write!(f, "module failed to load"),
        }
    }
}

impl std::error::Error for OsalError {}

pub type Result<T> = core::result::Result<T, OsalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_nonempty() {
        assert!(!OsalError::NameTaken.to_string().is_empty());
    }
}
