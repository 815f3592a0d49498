//! This crate provides safe handles over files opened on a mounted volume of a native
//! (typically remote) file system client.
//!
//! A [`Handle`] owns exactly one native descriptor, keeps the [`Volume`] it was opened on
//! alive and closes the descriptor exactly once. Each operation maps onto a single native call
//! issued with the host-wide lock of the volume's [`Scheduler`](volume::Scheduler) released;
//! failures surface as structured [`HandleError`](errors::HandleError)s.
//!
//! [`SqliteVolume`] is an embedded volume storing its files in a SQLite database.
#![deny(missing_docs)]

pub mod errors;
mod handle;
mod util;
pub mod volume;

pub use self::handle::Handle;
pub use self::util::{
    Availability, Flock, LockCommand, LockRequest, LockStatus, LockType, OpenFlags,
    RawDescriptor, SchemaVersion, Stat, VirtualPath, Whence,
};
pub use self::volume::{SqliteVolume, Volume};
