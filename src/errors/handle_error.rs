use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::{Error as IoError, ErrorKind};

use super::{ConstructionError, Errno, NativeError, Operation, ValidationError};

/// An error occurring during an operation on a file handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleError {
    /// An argument was rejected before the native call.
    Validation(ValidationError),
    /// The native call failed.
    Native(NativeError),
    /// The operation was attempted after the handle was closed.
    Closed(Operation),
    /// The handle could not be constructed.
    Construction(ConstructionError),
    /// A buffer of the given size could not be allocated.
    Allocation(usize),
}

impl HandleError {
    /// The errno describing this error the way the native client would.
    pub fn errno(&self) -> Errno {
        match self {
            HandleError::Validation(_) => Errno(libc::EINVAL),
            HandleError::Native(error) => error.errno(),
            HandleError::Closed(_) => Errno(libc::EBADF),
            HandleError::Construction(_) => Errno(libc::EINVAL),
            HandleError::Allocation(_) => Errno(libc::ENOMEM),
        }
    }

    /// Checks whether the handle was already closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, HandleError::Closed(_))
    }
}

impl super::Error for HandleError {}

impl std::error::Error for HandleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandleError::Validation(error) => Some(error),
            HandleError::Native(error) => Some(error),
            HandleError::Closed(_) | HandleError::Allocation(_) => None,
            HandleError::Construction(error) => Some(error),
        }
    }
}

impl From<ValidationError> for HandleError {
    fn from(error: ValidationError) -> Self {
        HandleError::Validation(error)
    }
}

impl From<NativeError> for HandleError {
    fn from(error: NativeError) -> Self {
        HandleError::Native(error)
    }
}

impl From<ConstructionError> for HandleError {
    fn from(error: ConstructionError) -> Self {
        HandleError::Construction(error)
    }
}

impl From<HandleError> for IoError {
    fn from(error: HandleError) -> Self {
        match error {
            HandleError::Native(native) => native.errno().into(),
            HandleError::Validation(_) | HandleError::Construction(_) => {
                IoError::new(ErrorKind::InvalidInput, error)
            }
            HandleError::Closed(_) => IoError::from_raw_os_error(libc::EBADF),
            HandleError::Allocation(_) => IoError::from_raw_os_error(libc::ENOMEM),
        }
    }
}

impl Display for HandleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            HandleError::Validation(error) => write!(f, "Invalid argument: {}", error),
            HandleError::Native(error) => write!(f, "{}", error),
            HandleError::Closed(operation) => {
                write!(f, "{}: The file handle is already closed", operation)
            }
            HandleError::Construction(error) => write!(f, "{}", error),
            HandleError::Allocation(size) => {
                write!(f, "{}: Allocating the buffer failed", size)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use super::{HandleError, NativeError, Operation, ValidationError};
    use crate::errors::Errno;

    #[test]
    fn test_errno() {
        assert_eq!(
            HandleError::from(ValidationError::NotContiguous).errno(),
            Errno(libc::EINVAL)
        );
        assert_eq!(
            HandleError::Closed(Operation::Fstat).errno(),
            Errno(libc::EBADF)
        );
        assert_eq!(
            HandleError::from(NativeError::new(Operation::Fsync, Errno(libc::EROFS))).errno(),
            Errno(libc::EROFS)
        );
        assert_eq!(HandleError::Allocation(42).errno(), Errno(libc::ENOMEM));
    }

    #[test]
    fn test_io_error() {
        let error: std::io::Error = HandleError::Closed(Operation::Pwrite).into();
        assert_eq!(error.raw_os_error(), Some(libc::EBADF));

        let error: std::io::Error = HandleError::from(ValidationError::UnlockQuery).into();
        assert_eq!(error.kind(), ErrorKind::InvalidInput);

        let error: std::io::Error =
            HandleError::from(NativeError::new(Operation::Pread, Errno(libc::ENOENT))).into();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }
}
