use bitflags::bitflags;
use libc::c_int;

bitflags! {
    /// The flags a file was opened with. Read-only access is the absence of `WRONLY` and `RDWR`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: c_int {
        /// Open for writing only.
        const WRONLY = libc::O_WRONLY;
        /// Open for reading and writing.
        const RDWR = libc::O_RDWR;
        /// Create the file if it does not exist.
        const CREAT = libc::O_CREAT;
        /// Together with `CREAT`, fail if the file exists.
        const EXCL = libc::O_EXCL;
        /// Do not become the controlling terminal.
        const NOCTTY = libc::O_NOCTTY;
        /// Truncate an existing regular file to length 0.
        const TRUNC = libc::O_TRUNC;
        /// Writes append to the end of the file.
        const APPEND = libc::O_APPEND;
        /// Non-blocking mode.
        const NONBLOCK = libc::O_NONBLOCK;
        /// Fail unless the path is a directory.
        const DIRECTORY = libc::O_DIRECTORY;
        /// Do not follow a trailing symbolic link.
        const NOFOLLOW = libc::O_NOFOLLOW;
        /// Synchronous data and meta data writes.
        const SYNC = libc::O_SYNC;
        /// Synchronous data writes.
        const DSYNC = libc::O_DSYNC;
        /// Close on exec.
        const CLOEXEC = libc::O_CLOEXEC;
        /// Signal-driven I/O.
        const ASYNC = libc::O_ASYNC;
        /// Bypass the page cache of the client.
        #[cfg(target_os = "linux")]
        const DIRECT = libc::O_DIRECT;
        /// Do not update the access time.
        #[cfg(target_os = "linux")]
        const NOATIME = libc::O_NOATIME;
        /// Descriptor usable only for path operations.
        #[cfg(target_os = "linux")]
        const PATH = libc::O_PATH;
        /// Unnamed temporary file in the given directory; includes `DIRECTORY`.
        #[cfg(target_os = "linux")]
        const TMPFILE = libc::O_TMPFILE;
        /// Offsets beyond 2 GiB on 32-bit clients; zero where it is implied.
        #[cfg(target_os = "linux")]
        const LARGEFILE = libc::O_LARGEFILE;
    }
}

impl OpenFlags {
    /// Read-only access.
    pub const RDONLY: OpenFlags = OpenFlags::empty();

    /// Checks whether the access mode permits reading.
    pub fn is_readable(self) -> bool {
        !self.contains(OpenFlags::WRONLY) || self.contains(OpenFlags::RDWR)
    }

    /// Checks whether the access mode permits writing.
    pub fn is_writable(self) -> bool {
        self.intersects(OpenFlags::WRONLY | OpenFlags::RDWR)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::OpenFlags;

    #[test_case(OpenFlags::RDONLY, true, false; "read only")]
    #[test_case(OpenFlags::WRONLY, false, true; "write only")]
    #[test_case(OpenFlags::RDWR | OpenFlags::CREAT, true, true; "read write")]
    fn test_access_mode(flags: OpenFlags, readable: bool, writable: bool) {
        assert_eq!(flags.is_readable(), readable);
        assert_eq!(flags.is_writable(), writable);
    }

    #[test]
    fn test_unknown_bits() {
        assert_eq!(OpenFlags::from_bits(libc::O_RDWR), Some(OpenFlags::RDWR));
        assert_eq!(OpenFlags::from_bits(1 << 30), None);
    }

    #[cfg(target_os = "linux")]
    #[test_case(libc::O_RDWR | libc::O_DIRECT, OpenFlags::RDWR | OpenFlags::DIRECT; "direct")]
    #[test_case(libc::O_NOATIME, OpenFlags::NOATIME; "no access time")]
    #[test_case(libc::O_PATH | libc::O_CLOEXEC, OpenFlags::PATH | OpenFlags::CLOEXEC; "path")]
    #[test_case(libc::O_RDWR | libc::O_TMPFILE, OpenFlags::RDWR | OpenFlags::TMPFILE; "temporary file")]
    #[test_case(libc::O_WRONLY | libc::O_ASYNC, OpenFlags::WRONLY | OpenFlags::ASYNC; "signal driven")]
    fn test_client_flags(raw: libc::c_int, expected: OpenFlags) {
        assert_eq!(OpenFlags::from_bits(raw), Some(expected));
    }
}
