#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::UNIX_EPOCH;

use parking_lot::Mutex;

use volfd::errors::Errno;
use volfd::volume::Scheduler;
use volfd::{Flock, LockCommand, LockType, OpenFlags, Stat, Volume, Whence};

/// Process id the double reports as holder of conflicting locks.
pub const HOLDER_PID: libc::pid_t = 4242;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Counts how often the host-wide lock is released and reacquired.
#[derive(Debug, Default)]
pub struct CountingScheduler {
    released: AtomicUsize,
    reacquired: AtomicUsize,
}

impl CountingScheduler {
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn reacquired(&self) -> usize {
        self.reacquired.load(Ordering::SeqCst)
    }
}

impl Scheduler for CountingScheduler {
    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn reacquire(&self) {
        self.reacquired.fetch_add(1, Ordering::SeqCst);
    }
}

/// A descriptor of the counting volume.
#[derive(Debug)]
pub struct MockFd(pub u64);

/// A volume recording every native call instead of touching any file.
///
/// Failures and short transfers can be injected per call name.
#[derive(Debug, Default)]
pub struct CountingVolume {
    calls: Mutex<HashMap<&'static str, usize>>,
    failures: Mutex<HashMap<&'static str, Errno>>,
    transfer_limit: Mutex<Option<usize>>,
    owner: Mutex<Option<(libc::uid_t, libc::gid_t)>>,
    next_descriptor: AtomicU64,
    scheduler: CountingScheduler,
}

impl CountingVolume {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let every following call of `name` fail with `errno`.
    pub fn fail(&self, name: &'static str, errno: libc::c_int) {
        self.failures.lock().insert(name, Errno(errno));
    }

    /// Let reads and writes transfer at most `limit` bytes.
    pub fn limit_transfers(&self, limit: usize) {
        *self.transfer_limit.lock() = Some(limit);
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().get(name).copied().unwrap_or(0)
    }

    /// The ids passed to the latest `fchown`.
    pub fn owner(&self) -> Option<(libc::uid_t, libc::gid_t)> {
        *self.owner.lock()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Descriptors handed out and not closed yet.
    pub fn open_descriptors(&self) -> usize {
        self.next_descriptor.load(Ordering::SeqCst) as usize - self.calls("close")
    }

    pub fn counting_scheduler(&self) -> &CountingScheduler {
        &self.scheduler
    }

    /// Hand out a descriptor as if it had been opened natively.
    pub fn raw_open(&self) -> MockFd {
        MockFd(self.next_descriptor.fetch_add(1, Ordering::SeqCst))
    }

    fn record(&self, name: &'static str) -> Result<(), Errno> {
        *self.calls.lock().entry(name).or_insert(0) += 1;
        match self.failures.lock().get(name) {
            Some(&errno) => Err(errno),
            None => Ok(()),
        }
    }

    fn transfer(&self, requested: usize) -> usize {
        match *self.transfer_limit.lock() {
            Some(limit) => requested.min(limit),
            None => requested,
        }
    }
}

impl Volume for CountingVolume {
    type Fd = MockFd;

    fn scheduler(&self) -> &dyn Scheduler {
        &self.scheduler
    }

    fn open(&self, _path: &str, _flags: OpenFlags) -> Result<MockFd, Errno> {
        self.record("open")?;
        Ok(self.raw_open())
    }

    fn close(&self, _fd: MockFd) -> Result<(), Errno> {
        self.record("close")
    }

    fn fstat(&self, fd: &MockFd) -> Result<Stat, Errno> {
        self.record("fstat")?;
        Ok(Stat {
            dev: 1,
            ino: fd.0,
            mode: libc::S_IFREG as u32 | 0o640,
            nlink: 1,
            uid: 1000,
            gid: 1000,
            rdev: 0,
            size: 0,
            blksize: 4096,
            blocks: 0,
            atime: UNIX_EPOCH,
            mtime: UNIX_EPOCH,
            ctime: UNIX_EPOCH,
        })
    }

    fn fsync(&self, _fd: &MockFd) -> Result<(), Errno> {
        self.record("fsync")
    }

    fn fchdir(&self, _fd: &MockFd) -> Result<(), Errno> {
        self.record("fchdir")
    }

    fn fchmod(&self, _fd: &MockFd, _mode: libc::mode_t) -> Result<(), Errno> {
        self.record("fchmod")
    }

    fn fchown(&self, _fd: &MockFd, uid: libc::uid_t, gid: libc::gid_t) -> Result<(), Errno> {
        self.record("fchown")?;
        *self.owner.lock() = Some((uid, gid));
        Ok(())
    }

    fn ftruncate(&self, _fd: &MockFd, _length: libc::off_t) -> Result<(), Errno> {
        self.record("ftruncate")
    }

    fn lseek(&self, _fd: &MockFd, offset: libc::off_t, _whence: Whence) -> Result<libc::off_t, Errno> {
        self.record("lseek")?;
        Ok(offset)
    }

    fn pread(&self, _fd: &MockFd, buffer: &mut [u8], _offset: libc::off_t) -> Result<usize, Errno> {
        self.record("pread")?;
        let count = self.transfer(buffer.len());
        buffer[..count].iter_mut().for_each(|byte| *byte = b'x');
        Ok(count)
    }

    fn pwrite(&self, _fd: &MockFd, buffer: &[u8], _offset: libc::off_t) -> Result<usize, Errno> {
        self.record("pwrite")?;
        Ok(self.transfer(buffer.len()))
    }

    fn posix_lock(&self, _fd: &MockFd, command: LockCommand, lock: &mut Flock) -> Result<(), Errno> {
        self.record("posix_lock")?;
        if command == LockCommand::Get {
            // Pretend another process holds a write lock on the whole file.
            lock.kind = LockType::Write;
            lock.whence = Whence::Start;
            lock.start = 0;
            lock.length = 0;
            lock.pid = HOLDER_PID;
        }
        Ok(())
    }
}
