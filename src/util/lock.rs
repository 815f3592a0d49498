use std::convert::TryFrom;

use libc::{c_int, c_short, pid_t};

use crate::errors::ValidationError;

/// The origin an offset is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Whence {
    /// The start of the file (`SEEK_SET`).
    Start,
    /// The current file offset (`SEEK_CUR`).
    Current,
    /// The end of the file (`SEEK_END`).
    End,
}

impl Whence {
    /// The native constant.
    pub fn raw(self) -> c_int {
        match self {
            Whence::Start => libc::SEEK_SET,
            Whence::Current => libc::SEEK_CUR,
            Whence::End => libc::SEEK_END,
        }
    }
}

impl Default for Whence {
    fn default() -> Self {
        Whence::Start
    }
}

/// A command for advisory record locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockCommand {
    /// Query for a lock conflicting with the request (`F_GETLK`).
    Get,
    /// Acquire or release a lock, failing on conflicts (`F_SETLK`).
    Set,
    /// Acquire or release a lock, waiting for conflicts to vanish (`F_SETLKW`).
    SetWait,
}

impl LockCommand {
    /// The native constant.
    pub fn raw(self) -> c_int {
        match self {
            LockCommand::Get => libc::F_GETLK,
            LockCommand::Set => libc::F_SETLK,
            LockCommand::SetWait => libc::F_SETLKW,
        }
    }
}

impl TryFrom<c_int> for LockCommand {
    type Error = ValidationError;

    fn try_from(raw: c_int) -> Result<Self, Self::Error> {
        match raw {
            libc::F_GETLK => Ok(LockCommand::Get),
            libc::F_SETLK => Ok(LockCommand::Set),
            libc::F_SETLKW => Ok(LockCommand::SetWait),
            _ => Err(ValidationError::InvalidLockCommand(raw)),
        }
    }
}

/// The type of an advisory lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockType {
    /// Shared lock (`F_RDLCK`).
    Read,
    /// Exclusive lock (`F_WRLCK`).
    Write,
    /// Release (`F_UNLCK`).
    Unlock,
}

impl LockType {
    /// The native constant.
    pub fn raw(self) -> c_short {
        match self {
            LockType::Read => libc::F_RDLCK as c_short,
            LockType::Write => libc::F_WRLCK as c_short,
            LockType::Unlock => libc::F_UNLCK as c_short,
        }
    }

    /// Checks whether two locks held by different owners on overlapping ranges conflict.
    pub fn conflicts_with(self, other: LockType) -> bool {
        matches!(
            (self, other),
            (LockType::Write, LockType::Read | LockType::Write)
                | (LockType::Read, LockType::Write)
        )
    }
}

impl TryFrom<c_short> for LockType {
    type Error = ValidationError;

    fn try_from(raw: c_short) -> Result<Self, Self::Error> {
        match raw {
            value if value == libc::F_RDLCK as c_short => Ok(LockType::Read),
            value if value == libc::F_WRLCK as c_short => Ok(LockType::Write),
            value if value == libc::F_UNLCK as c_short => Ok(LockType::Unlock),
            _ => Err(ValidationError::InvalidLockType(raw)),
        }
    }
}

/// The lock description exchanged with the native client, modelled after `struct flock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flock {
    /// The lock type.
    pub kind: LockType,
    /// The origin of `start`.
    pub whence: Whence,
    /// The first byte of the range.
    pub start: i64,
    /// The number of bytes; 0 extends the range to the end of the file.
    pub length: i64,
    /// The process holding a conflicting lock, filled in by `F_GETLK`.
    pub pid: pid_t,
}

/// A request for [`Handle::posix_lock`](crate::Handle::posix_lock).
///
/// Command and lock type are kept raw until validation, so requests assembled from untyped
/// input are checked the same way as typed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    /// The raw locking command.
    pub command: c_int,
    /// The raw lock type; [`LockRequest::UNSET`] until specified.
    pub kind: c_short,
    /// The origin of `start`.
    pub whence: Whence,
    /// The first byte of the range.
    pub start: i64,
    /// The number of bytes.
    pub length: i64,
    /// Report the resulting lock description.
    pub verbose: bool,
}

impl LockRequest {
    /// Sentinel for a lock type which was not specified.
    pub const UNSET: c_short = -1;

    /// A request for a single byte at the start of the file with the lock type still unset.
    pub fn new(command: LockCommand) -> Self {
        Self::from_raw(command.raw(), LockRequest::UNSET)
    }

    /// A request from untyped values, validated once it is issued.
    pub fn from_raw(command: c_int, kind: c_short) -> Self {
        LockRequest {
            command,
            kind,
            whence: Whence::Start,
            start: 0,
            length: 1,
            verbose: false,
        }
    }

    /// Set the lock type.
    pub fn kind(mut self, kind: LockType) -> Self {
        self.kind = kind.raw();
        self
    }

    /// Set the byte range.
    pub fn range(mut self, start: i64, length: i64) -> Self {
        self.start = start;
        self.length = length;
        self
    }

    /// Set the origin of the range.
    pub fn whence(mut self, whence: Whence) -> Self {
        self.whence = whence;
        self
    }

    /// Request the resulting lock description.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check command, lock type and their combination, in this order.
    pub fn validate(&self) -> Result<(LockCommand, Flock), ValidationError> {
        let command = LockCommand::try_from(self.command)?;
        let kind = LockType::try_from(self.kind)?;
        if command == LockCommand::Get && kind == LockType::Unlock {
            return Err(ValidationError::UnlockQuery);
        }

        Ok((
            command,
            Flock {
                kind,
                whence: self.whence,
                start: self.start,
                length: self.length,
                pid: 0,
            },
        ))
    }
}

/// The lock description reported by a verbose [`Handle::posix_lock`](crate::Handle::posix_lock).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    /// The command which was issued.
    pub command: LockCommand,
    /// The resulting lock type; `Unlock` for a query without conflicts.
    pub kind: LockType,
    /// The origin of `start`.
    pub whence: Whence,
    /// The first byte of the range.
    pub start: i64,
    /// The number of bytes.
    pub length: i64,
    /// The process holding the reported lock.
    pub pid: pid_t,
}

impl LockStatus {
    pub(crate) fn new(command: LockCommand, lock: Flock) -> Self {
        LockStatus {
            command,
            kind: lock.kind,
            whence: lock.whence,
            start: lock.start,
            length: lock.length,
            pid: lock.pid,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{LockCommand, LockRequest, LockType, ValidationError, Whence};

    #[test]
    fn test_defaults() {
        let request = LockRequest::new(LockCommand::Set);
        assert_eq!(request.command, libc::F_SETLK);
        assert_eq!(request.kind, LockRequest::UNSET);
        assert_eq!(request.whence, Whence::Start);
        assert_eq!((request.start, request.length), (0, 1));
        assert!(!request.verbose);
    }

    #[test]
    fn test_valid() {
        let (command, lock) = LockRequest::new(LockCommand::SetWait)
            .kind(LockType::Write)
            .range(10, 20)
            .whence(Whence::End)
            .validate()
            .expect("Valid lock request rejected");
        assert_eq!(command, LockCommand::SetWait);
        assert_eq!(lock.kind, LockType::Write);
        assert_eq!(lock.whence, Whence::End);
        assert_eq!((lock.start, lock.length), (10, 20));
    }

    #[test_case(4242, LockType::Read.raw(), ValidationError::InvalidLockCommand(4242); "invalid command")]
    #[test_case(4242, 4242, ValidationError::InvalidLockCommand(4242); "command checked before type")]
    #[test_case(libc::F_SETLK, 4242, ValidationError::InvalidLockType(4242); "invalid type")]
    #[test_case(libc::F_SETLK, LockRequest::UNSET, ValidationError::InvalidLockType(-1); "unset type")]
    #[test_case(libc::F_GETLK, LockType::Unlock.raw(), ValidationError::UnlockQuery; "unlock query")]
    fn test_invalid(command: libc::c_int, kind: libc::c_short, expected: ValidationError) {
        assert_eq!(
            LockRequest::from_raw(command, kind)
                .validate()
                .expect_err("Invalid lock request accepted"),
            expected
        );
    }

    #[test]
    fn test_conflicts() {
        assert!(LockType::Write.conflicts_with(LockType::Read));
        assert!(LockType::Read.conflicts_with(LockType::Write));
        assert!(LockType::Write.conflicts_with(LockType::Write));
        assert!(!LockType::Read.conflicts_with(LockType::Read));
        assert!(!LockType::Unlock.conflicts_with(LockType::Write));
    }
}
