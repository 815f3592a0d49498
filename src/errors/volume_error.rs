use std::fmt::{Display, Formatter, Result as FmtResult};

use rusqlite::Error as WrappedError;

use super::DatabaseError;

/// An error occurring during the loading of a volume from a database.
#[derive(Debug, PartialEq)]
pub enum VolumeError {
    /// The SQLite database neither contains a volume nor should one be created.
    NoVolume,
    /// One of the underlying SQL statements is invalid. Should not occur in the wild.
    InvalidBaseCommand(&'static str, DatabaseError),
    /// The volume has a version not supported by this version of the library.
    UnsupportedVersion(u32),
    /// A general database error from SQLite.
    DatabaseError(DatabaseError),
}

impl super::Error for VolumeError {}

impl std::error::Error for VolumeError {}

impl From<WrappedError> for VolumeError {
    fn from(error: WrappedError) -> Self {
        VolumeError::DatabaseError(error.into())
    }
}

impl From<DatabaseError> for VolumeError {
    fn from(error: DatabaseError) -> Self {
        VolumeError::DatabaseError(error)
    }
}

impl Display for VolumeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("Error during loading of volume from database: ")?;
        match self {
            VolumeError::NoVolume => write!(f, "No volume exists neither should it be created"),
            VolumeError::InvalidBaseCommand(sql, _) => write!(f, "Preparing an base SQL command '{}' failed", sql),
            VolumeError::UnsupportedVersion(version) => write!(f, "The version of the volume '{}' is not compatible with the current library version", version),
            VolumeError::DatabaseError(error) => write!(f, "The underlying database failed ('{}')", error)
        }
    }
}
