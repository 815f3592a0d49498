use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Meta data of an open file, as reported by `fstat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// The device containing the file.
    pub dev: u64,
    /// The inode number.
    pub ino: u64,
    /// File type and permission bits.
    pub mode: u32,
    /// Number of hard links.
    pub nlink: u64,
    /// Owning user.
    pub uid: u32,
    /// Owning group.
    pub gid: u32,
    /// Device id of a special file.
    pub rdev: u64,
    /// Size in bytes.
    pub size: u64,
    /// Preferred I/O block size.
    pub blksize: u64,
    /// Number of allocated 512-byte blocks.
    pub blocks: u64,
    /// Time of last access.
    pub atime: SystemTime,
    /// Time of last modification.
    pub mtime: SystemTime,
    /// Time of last status change.
    pub ctime: SystemTime,
}

impl Stat {
    /// Checks whether the file is a directory.
    pub fn is_dir(&self) -> bool {
        self.mode & libc::S_IFMT as u32 == libc::S_IFDIR as u32
    }

    /// Checks whether the file is a regular file.
    pub fn is_file(&self) -> bool {
        self.mode & libc::S_IFMT as u32 == libc::S_IFREG as u32
    }

    /// The permission bits.
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// Convert a native timestamp, which may predate the epoch.
pub(crate) fn timestamp(seconds: i64, nanoseconds: i64) -> SystemTime {
    let nanoseconds = nanoseconds.clamp(0, 999_999_999) as u32;
    if seconds >= 0 {
        UNIX_EPOCH + Duration::new(seconds as u64, nanoseconds)
    } else {
        UNIX_EPOCH - Duration::new(seconds.unsigned_abs(), 0) + Duration::new(0, nanoseconds)
    }
}

/// Native `Volume` implementations backed by a C client convert its `fstat` result with this.
impl From<libc::stat> for Stat {
    #[allow(clippy::unnecessary_cast)]
    fn from(st: libc::stat) -> Self {
        Stat {
            dev: st.st_dev as u64,
            ino: st.st_ino as u64,
            mode: st.st_mode as u32,
            nlink: st.st_nlink as u64,
            uid: st.st_uid as u32,
            gid: st.st_gid as u32,
            rdev: st.st_rdev as u64,
            size: st.st_size as u64,
            blksize: st.st_blksize as u64,
            blocks: st.st_blocks as u64,
            atime: timestamp(st.st_atime as i64, st.st_atime_nsec as i64),
            mtime: timestamp(st.st_mtime as i64, st.st_mtime_nsec as i64),
            ctime: timestamp(st.st_ctime as i64, st.st_ctime_nsec as i64),
        }
    }
}
