use std::convert::TryFrom;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use bytes::{Buf, Bytes};
use libc::c_int;

use crate::errors::{ConstructionError, Errno, HandleError, NativeError, Operation, ValidationError};
use crate::util::{Descriptor, LockRequest, LockStatus, OpenFlags, Stat, Whence};
use crate::volume::{allow_threads, Volume};

/// An open file on a volume.
///
/// The handle owns the native descriptor and keeps its volume alive. The descriptor is closed
/// exactly once: by [`Handle::close`] or when the handle is dropped. Afterwards every operation
/// fails with [`HandleError::Closed`] without reaching the volume.
///
/// Operations borrow the handle shared and may run concurrently; their relative order is then
/// up to the volume, just as for a native descriptor. Closing needs exclusive access.
pub struct Handle<V: Volume> {
    descriptor: Descriptor<V::Fd>,
    flags: OpenFlags,
    parent: Arc<V>,
}

impl<V: Volume> Handle<V> {
    /// Take ownership of a freshly opened descriptor of `parent`.
    ///
    /// On failure the descriptor is closed and no reference to `parent` is retained.
    pub fn wrap(fd: V::Fd, parent: &Arc<V>, flags: c_int) -> Result<Handle<V>, HandleError> {
        let flags = match OpenFlags::from_bits(flags) {
            Some(flags) => flags,
            None => {
                Self::discard(parent.as_ref(), fd);
                return Err(ConstructionError::UnsupportedFlags(flags).into());
            }
        };

        log::debug!("Wrapping descriptor opened with {:?}", flags);
        Ok(Handle {
            descriptor: Descriptor::Open(fd),
            flags,
            parent: Arc::clone(parent),
        })
    }

    /// Open `path` on `parent` and wrap the resulting descriptor.
    pub fn open(parent: &Arc<V>, path: &str, flags: OpenFlags) -> Result<Handle<V>, HandleError> {
        let volume = parent.as_ref();
        let fd = allow_threads(volume.scheduler(), || volume.open(path, flags))
            .map_err(|errno| NativeError::new(Operation::Open, errno))?;
        Handle::wrap(fd, parent, flags.bits())
    }

    /// Close a descriptor no handle took ownership of.
    fn discard(volume: &V, fd: V::Fd) {
        log::debug!("Closing descriptor which was never wrapped into a handle");
        if let Err(errno) = allow_threads(volume.scheduler(), move || volume.close(fd)) {
            log::error!("{}", NativeError::new(Operation::Close, errno));
        }
    }

    /// The flags the file was opened with.
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// The volume the file belongs to.
    pub fn parent(&self) -> &Arc<V> {
        &self.parent
    }

    /// Checks whether the descriptor was already closed.
    pub fn is_closed(&self) -> bool {
        self.descriptor.is_closed()
    }

    /// Issue exactly one native call on the open descriptor with the host-wide lock released.
    fn native<T, C>(&self, operation: Operation, call: C) -> Result<T, HandleError>
    where
        C: FnOnce(&V, &V::Fd) -> Result<T, Errno>,
    {
        let fd = self
            .descriptor
            .as_open()
            .ok_or(HandleError::Closed(operation))?;
        let volume = self.parent.as_ref();

        log::trace!("Issuing {}", operation);
        allow_threads(volume.scheduler(), || call(volume, fd))
            .map_err(|errno| NativeError::new(operation, errno).into())
    }

    /// Query the meta data of the file.
    pub fn stat(&self) -> Result<Stat, HandleError> {
        self.native(Operation::Fstat, |volume, fd| volume.fstat(fd))
    }

    /// Flush the file to stable storage.
    pub fn sync(&self) -> Result<(), HandleError> {
        self.native(Operation::Fsync, |volume, fd| volume.fsync(fd))
    }

    /// Make this directory the current working directory of the volume.
    pub fn change_directory(&self) -> Result<(), HandleError> {
        self.native(Operation::Fchdir, |volume, fd| volume.fchdir(fd))
    }

    /// Change the permission bits.
    pub fn change_mode(&self, mode: u32) -> Result<(), HandleError> {
        self.native(Operation::Fchmod, |volume, fd| {
            volume.fchmod(fd, mode as libc::mode_t)
        })
    }

    /// Change the owner. `None` leaves the respective id unchanged.
    pub fn change_owner(&self, uid: Option<u32>, gid: Option<u32>) -> Result<(), HandleError> {
        let uid = uid.map_or(libc::uid_t::MAX, |uid| uid as libc::uid_t);
        let gid = gid.map_or(libc::gid_t::MAX, |gid| gid as libc::gid_t);
        self.native(Operation::Fchown, |volume, fd| volume.fchown(fd, uid, gid))
    }

    /// Change the length of the file.
    pub fn truncate(&self, length: u64) -> Result<(), HandleError> {
        let length = libc::off_t::try_from(length)
            .map_err(|_| ValidationError::OffsetOutOfRange(length))?;
        self.native(Operation::Ftruncate, |volume, fd| {
            volume.ftruncate(fd, length)
        })
    }

    /// Reposition the file offset.
    pub fn seek(&self, position: i64, whence: Whence) -> Result<(), HandleError> {
        self.native(Operation::Lseek, |volume, fd| {
            volume
                .lseek(fd, position as libc::off_t, whence)
                .map(|_| ())
        })
    }

    /// Read up to `count` bytes starting at `offset`.
    ///
    /// A short read yields fewer bytes; the buffer is never padded. A count too large to
    /// allocate fails with [`HandleError::Allocation`] before the volume is asked.
    pub fn read_at(&self, offset: i64, count: i64) -> Result<Bytes, HandleError> {
        let count = usize::try_from(count).map_err(|_| ValidationError::NegativeCount(count))?;

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(count)
            .map_err(|_| HandleError::Allocation(count))?;
        buffer.resize(count, 0);

        let read = self.native(Operation::Pread, |volume, fd| {
            volume.pread(fd, &mut buffer, offset as libc::off_t)
        })?;

        buffer.truncate(read);
        Ok(Bytes::from(buffer))
    }

    /// Write `buffer` starting at `offset`, returning the number of bytes actually written.
    ///
    /// The buffer must consist of a single contiguous region.
    pub fn write_at<B: Buf>(&self, buffer: B, offset: i64) -> Result<usize, HandleError> {
        let data = buffer.chunk();
        if data.len() != buffer.remaining() {
            return Err(ValidationError::NotContiguous.into());
        }

        self.native(Operation::Pwrite, |volume, fd| {
            volume.pwrite(fd, data, offset as libc::off_t)
        })
    }

    /// Query, acquire or release an advisory record lock.
    ///
    /// For verbose requests, the resulting lock description is returned.
    pub fn posix_lock(&self, request: &LockRequest) -> Result<Option<LockStatus>, HandleError> {
        let (command, mut lock) = request.validate()?;
        self.native(Operation::PosixLock, |volume, fd| {
            volume.posix_lock(fd, command, &mut lock)
        })?;

        Ok(match request.verbose {
            true => Some(LockStatus::new(command, lock)),
            false => None,
        })
    }

    /// Close the descriptor. Closing an already closed handle does nothing.
    ///
    /// If the native close fails, the error is returned but the handle is closed nevertheless.
    pub fn close(&mut self) -> Result<(), HandleError> {
        match self.descriptor.take() {
            Some(fd) => {
                log::debug!("Closing handle");
                let volume = self.parent.as_ref();
                allow_threads(volume.scheduler(), move || volume.close(fd))
                    .map_err(|errno| NativeError::new(Operation::Close, errno).into())
            }
            None => Ok(()),
        }
    }
}

impl<V: Volume> Debug for Handle<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Handle")
            .field("closed", &self.descriptor.is_closed())
            .field("flags", &self.flags)
            .finish()
    }
}

impl<V: Volume> Drop for Handle<V> {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            log::error!("Closing dropped handle failed: {}", error);
        }
    }
}
