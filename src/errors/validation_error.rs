use std::fmt::{Display, Formatter, Result as FmtResult};

use libc::{c_int, c_short};

/// An argument was rejected before any native call was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// A negative number of bytes was requested.
    NegativeCount(i64),
    /// The value does not fit into a native file offset.
    OffsetOutOfRange(u64),
    /// The buffer to write is split into several regions.
    NotContiguous,
    /// The locking command is neither get, set nor set-and-wait.
    InvalidLockCommand(c_int),
    /// The lock type is neither read, write nor unlock.
    InvalidLockType(c_short),
    /// Querying a lock requires a read or write lock type.
    UnlockQuery,
}

impl super::Error for ValidationError {}

impl std::error::Error for ValidationError {}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ValidationError::NegativeCount(count) => {
                write!(f, "{}: Byte count may not be negative", count)
            }
            ValidationError::OffsetOutOfRange(value) => {
                write!(f, "{}: Value exceeds the range of a file offset", value)
            }
            ValidationError::NotContiguous => f.write_str("Buffer must be contiguous"),
            ValidationError::InvalidLockCommand(command) => {
                write!(f, "{}: Invalid locking command", command)
            }
            ValidationError::InvalidLockType(kind) => write!(f, "{}: Invalid lock type", kind),
            ValidationError::UnlockQuery => f.write_str(
                "Lock type of F_UNLCK may not be specified for an operation to read lock",
            ),
        }
    }
}
