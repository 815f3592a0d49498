use std::fmt::{Debug, Display, Formatter, Result as FmtResult};

use rusqlite::Error as WrappedError;
use rusqlite::ErrorCode as SQLiteError;

use super::Errno;

/// An error raised and described by SQLite.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseError {
    error: Option<SQLiteError>,
    message: Option<String>,
}

impl DatabaseError {
    /// Message returned if SQLite does not specify an error.
    pub const MISSING_MESSAGE: &'static str = "<Unknown SQLite error>";

    /// The SQLite error code, if the failure originates from SQLite itself.
    pub fn code(&self) -> Option<SQLiteError> {
        self.error
    }

    /// The errno a native volume client would report for this failure.
    pub fn errno(&self) -> Errno {
        Errno(match self.error {
            Some(SQLiteError::ReadOnly) => libc::EROFS,
            Some(SQLiteError::DiskFull) => libc::ENOSPC,
            Some(SQLiteError::TooBig) => libc::EFBIG,
            Some(SQLiteError::PermissionDenied) => libc::EACCES,
            Some(SQLiteError::OutOfMemory) => libc::ENOMEM,
            Some(SQLiteError::DatabaseBusy) | Some(SQLiteError::DatabaseLocked) => libc::EBUSY,
            _ => libc::EIO,
        })
    }
}

impl super::Error for DatabaseError {}

impl std::error::Error for DatabaseError {}

impl Debug for DatabaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.message {
            Some(message) => write!(f, "'{}' ({:?})", message, self.error),
            None => write!(f, "'{}' ({:?})", DatabaseError::MISSING_MESSAGE, self.error),
        }
    }
}

impl Display for DatabaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.message {
            Some(message) => f.write_str(message),
            None => f.write_str(DatabaseError::MISSING_MESSAGE),
        }
    }
}

impl From<WrappedError> for DatabaseError {
    fn from(value: WrappedError) -> Self {
        match value {
            WrappedError::SqliteFailure(error, message) => Self {
                error: Some(error.code),
                message,
            },
            other => Self {
                error: None,
                message: Some(other.to_string()),
            },
        }
    }
}

impl From<DatabaseError> for Errno {
    fn from(error: DatabaseError) -> Self {
        log::error!("Volume database failed: {:?}", error);
        error.errno()
    }
}

impl From<WrappedError> for Errno {
    fn from(error: WrappedError) -> Self {
        DatabaseError::from(error).into()
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection as Database;

    use super::{DatabaseError, Errno};

    #[test]
    fn test_sqlite_failure() {
        let database = Database::open_in_memory().expect("Valid SQLite database");
        let error: DatabaseError = database
            .execute("INSERT INTO missing_table VALUES (1)", [])
            .expect_err("Inserting into a missing table succeeded")
            .into();
        assert!(error.code().is_some());
        assert!(error.to_string().contains("missing_table"));
        assert_eq!(error.errno(), Errno(libc::EIO));
    }

    #[test]
    fn test_non_sqlite_failure() {
        let error = DatabaseError::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(error.code(), None);
        assert_eq!(Errno::from(error), Errno(libc::EIO));
    }
}
