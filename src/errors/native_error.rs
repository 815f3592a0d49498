use std::fmt::{Display, Formatter, Result as FmtResult};

use super::Errno;

/// The native call a handle issues on behalf of one of its operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Opening a file.
    Open,
    /// Closing the descriptor.
    Close,
    /// Querying the file meta data.
    Fstat,
    /// Flushing the file to stable storage.
    Fsync,
    /// Changing the working directory of the volume.
    Fchdir,
    /// Changing the permissions.
    Fchmod,
    /// Changing the owner.
    Fchown,
    /// Changing the length of the file.
    Ftruncate,
    /// Repositioning the file offset.
    Lseek,
    /// Positioned read.
    Pread,
    /// Positioned write.
    Pwrite,
    /// Advisory record locking.
    PosixLock,
}

impl Operation {
    /// The name of the native call.
    pub const fn name(self) -> &'static str {
        match self {
            Operation::Open => "open",
            Operation::Close => "close",
            Operation::Fstat => "fstat",
            Operation::Fsync => "fsync",
            Operation::Fchdir => "fchdir",
            Operation::Fchmod => "fchmod",
            Operation::Fchown => "fchown",
            Operation::Ftruncate => "ftruncate",
            Operation::Lseek => "lseek",
            Operation::Pread => "pread",
            Operation::Pwrite => "pwrite",
            Operation::PosixLock => "posix_lock",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}()", self.name())
    }
}

/// A native call of the volume client failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeError {
    operation: Operation,
    errno: Errno,
}

impl NativeError {
    /// Attach the failed operation to the errno reported by the native call.
    pub fn new(operation: Operation, errno: Errno) -> Self {
        NativeError { operation, errno }
    }

    /// The native call which failed.
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The errno reported by the native call.
    pub fn errno(&self) -> Errno {
        self.errno
    }
}

impl super::Error for NativeError {}

impl std::error::Error for NativeError {}

impl Display for NativeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} failed: {}", self.operation, self.errno)
    }
}
