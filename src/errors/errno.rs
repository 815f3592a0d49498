use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::io::Error as IoError;

use libc::c_int;

/// A raw error number as reported by the native volume client.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub c_int);

impl Errno {
    /// Errno reported when the native layer did not set one.
    pub const UNKNOWN: Errno = Errno(libc::EIO);

    /// The raw error number.
    pub fn code(self) -> c_int {
        self.0
    }
}

impl super::Error for Errno {}

impl std::error::Error for Errno {}

impl From<c_int> for Errno {
    fn from(code: c_int) -> Self {
        Errno(code)
    }
}

impl From<IoError> for Errno {
    fn from(error: IoError) -> Self {
        error.raw_os_error().map(Errno).unwrap_or(Errno::UNKNOWN)
    }
}

impl From<Errno> for IoError {
    fn from(errno: Errno) -> Self {
        IoError::from_raw_os_error(errno.0)
    }
}

impl Debug for Errno {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Errno({})", self.0)
    }
}

impl Display for Errno {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} (errno {})", IoError::from_raw_os_error(self.0), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Errno;

    #[test]
    fn test_io_conversion() {
        let error: std::io::Error = Errno(libc::ENOENT).into();
        assert_eq!(error.kind(), std::io::ErrorKind::NotFound);
        assert_eq!(Errno::from(error), Errno(libc::ENOENT));
    }

    #[test]
    fn test_custom_io_error() {
        let error = std::io::Error::new(std::io::ErrorKind::Other, "no errno");
        assert_eq!(Errno::from(error), Errno::UNKNOWN);
    }
}
