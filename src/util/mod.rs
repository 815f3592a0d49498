mod descriptor;
mod flags;
mod lock;
mod schema;
mod stat;
mod virtual_path;

pub(crate) use self::descriptor::Descriptor;
pub use self::descriptor::RawDescriptor;
pub use self::flags::OpenFlags;
pub use self::lock::{Flock, LockCommand, LockRequest, LockStatus, LockType, Whence};
pub use self::schema::{Availability, SchemaVersion};
pub(crate) use self::stat::timestamp;
pub use self::stat::Stat;
pub use self::virtual_path::VirtualPath;
