//! Various errors occurring while operating on volume file handles.

use std::fmt::{Debug, Display};

mod database_error;
mod errno;

mod construction_error;
mod handle_error;
mod native_error;
mod validation_error;
mod volume_error;

pub use self::construction_error::ConstructionError;
pub use self::database_error::DatabaseError;
pub use self::errno::Errno;
pub use self::handle_error::HandleError;
pub use self::native_error::{NativeError, Operation};
pub use self::validation_error::ValidationError;
pub use self::volume_error::VolumeError;

/// An error occurring while accessing a volume.
pub trait Error: PartialEq + Debug + Display {
    /// Generate a human-readable version of the error.
    fn error_message(&self) -> String {
        format!("{}", &self)
    }
}
