//! The interface of the native volume client a [`Handle`](crate::Handle) delegates to.
use crate::errors::Errno;
use crate::util::{Flock, LockCommand, OpenFlags, Stat, Whence};

mod sqlite;

pub use self::sqlite::SqliteVolume;

/// A coarse, host-wide lock which must not be held while a native call blocks.
///
/// Hosts embedding the volume into a runtime with a global interpreter-style lock implement
/// this to let other logical threads run during I/O.
pub trait Scheduler: Send + Sync {
    /// Called directly before a blocking native call.
    fn release(&self) {}
    /// Called directly after the native call returned, even if it panicked.
    fn reacquire(&self) {}
}

/// The scheduler of preemptive OS threads: nothing to release.
#[derive(Debug, Clone, Copy, Default)]
pub struct Preemptive;

impl Scheduler for Preemptive {}

/// Run a blocking native call with the host-wide lock released.
pub(crate) fn allow_threads<T, C: FnOnce() -> T>(scheduler: &dyn Scheduler, call: C) -> T {
    struct Reacquire<'a>(&'a dyn Scheduler);

    impl Drop for Reacquire<'_> {
        fn drop(&mut self) {
            self.0.reacquire();
        }
    }

    scheduler.release();
    let _reacquire = Reacquire(scheduler);
    call()
}

/// A mounted volume of a native file system client.
///
/// Every method maps onto exactly one native call. Failures are reported as the errno of the
/// native client; the caller attaches the failing operation.
pub trait Volume: Send + Sync {
    /// An open file of this volume. Owned exclusively by one handle and consumed by `close`.
    type Fd: Send + Sync;

    /// The lock released around every native call on this volume.
    fn scheduler(&self) -> &dyn Scheduler {
        &Preemptive
    }

    /// Open (and possibly create) a file relative to the current working directory.
    fn open(&self, path: &str, flags: OpenFlags) -> Result<Self::Fd, Errno>;

    /// Close an open file.
    fn close(&self, fd: Self::Fd) -> Result<(), Errno>;

    /// Query the meta data of an open file.
    fn fstat(&self, fd: &Self::Fd) -> Result<Stat, Errno>;

    /// Flush an open file to stable storage.
    fn fsync(&self, fd: &Self::Fd) -> Result<(), Errno>;

    /// Make the directory of an open file the current working directory of the volume.
    fn fchdir(&self, fd: &Self::Fd) -> Result<(), Errno>;

    /// Change the permission bits.
    fn fchmod(&self, fd: &Self::Fd, mode: libc::mode_t) -> Result<(), Errno>;

    /// Change the owner; `uid_t::MAX` or `gid_t::MAX` leave the respective id unchanged.
    fn fchown(&self, fd: &Self::Fd, uid: libc::uid_t, gid: libc::gid_t) -> Result<(), Errno>;

    /// Change the length of the file.
    fn ftruncate(&self, fd: &Self::Fd, length: libc::off_t) -> Result<(), Errno>;

    /// Reposition the file offset, returning the new offset.
    fn lseek(&self, fd: &Self::Fd, offset: libc::off_t, whence: Whence)
        -> Result<libc::off_t, Errno>;

    /// Read into `buffer` starting at `offset`; the returned count may be short.
    fn pread(&self, fd: &Self::Fd, buffer: &mut [u8], offset: libc::off_t) -> Result<usize, Errno>;

    /// Write `buffer` starting at `offset`; the returned count may be short.
    fn pwrite(&self, fd: &Self::Fd, buffer: &[u8], offset: libc::off_t) -> Result<usize, Errno>;

    /// Query, acquire or release an advisory record lock. `F_GETLK` updates `lock` in place.
    fn posix_lock(&self, fd: &Self::Fd, command: LockCommand, lock: &mut Flock)
        -> Result<(), Errno>;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{allow_threads, Scheduler};

    #[derive(Default)]
    struct Counting {
        released: AtomicUsize,
        reacquired: AtomicUsize,
    }

    impl Scheduler for Counting {
        fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }

        fn reacquire(&self) {
            assert_eq!(
                self.released.load(Ordering::SeqCst),
                self.reacquired.fetch_add(1, Ordering::SeqCst) + 1
            );
        }
    }

    #[test]
    fn test_released_during_call() {
        let scheduler = Counting::default();
        let result = allow_threads(&scheduler, || {
            assert_eq!(scheduler.released.load(Ordering::SeqCst), 1);
            assert_eq!(scheduler.reacquired.load(Ordering::SeqCst), 0);
            42
        });
        assert_eq!(result, 42);
        assert_eq!(scheduler.reacquired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reacquired_on_panic() {
        let scheduler = Counting::default();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            allow_threads(&scheduler, || panic!("native call panicked"))
        }));
        assert!(outcome.is_err());
        assert_eq!(scheduler.reacquired.load(Ordering::SeqCst), 1);
    }
}
