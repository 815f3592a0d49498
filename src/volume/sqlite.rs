use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use libc::{gid_t, mode_t, off_t, uid_t};
use parking_lot::{Condvar, Mutex};
use rusqlite::limits::Limit;
use rusqlite::{params, Connection as Database, DatabaseName, OptionalExtension};

use super::Volume;
use crate::errors::{Errno, VolumeError};
use crate::util::{
    timestamp, Availability, Flock, LockCommand, LockType, OpenFlags, RawDescriptor,
    SchemaVersion, Stat, VirtualPath, Whence,
};

mod constants {
    use const_format::formatcp;

    pub const CURRENT_SCHEMA_VERSION: u32 = 0;
    pub const META_TABLE: &str = "Volfd_Meta_0";
    pub const DATA_TABLE: &str = "Volfd_Data";

    pub const S_IFMT: u32 = libc::S_IFMT as u32;
    pub const S_IFDIR: u32 = libc::S_IFDIR as u32;
    pub const S_IFREG: u32 = libc::S_IFREG as u32;
    pub const PERMISSION_BITS: u32 = 0o7777;

    pub const DEFAULT_FILE_MODE: u32 = 0o644;
    pub const ROOT_MODE: u32 = 0o755;
    pub const BLOCK_SIZE: u64 = 4096;
    pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

    pub const SQL_CREATE_META: &str = formatcp!(
        "CREATE TABLE {} (id INTEGER PRIMARY KEY, path TEXT UNIQUE NOT NULL, mode INTEGER NOT NULL, uid INTEGER NOT NULL, gid INTEGER NOT NULL, atime INTEGER NOT NULL, mtime INTEGER NOT NULL, ctime INTEGER NOT NULL)",
        META_TABLE
    );
    pub const SQL_CREATE_DATA: &str = formatcp!(
        "CREATE TABLE IF NOT EXISTS {} (file_id INTEGER PRIMARY KEY, data BLOB NOT NULL, FOREIGN KEY(file_id) REFERENCES {} (id) ON DELETE CASCADE ON UPDATE CASCADE)",
        DATA_TABLE,
        META_TABLE
    );
    pub const SQL_CREATE_NODE: &str = formatcp!(
        "INSERT INTO {} (path, mode, uid, gid, atime, mtime, ctime) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?5)",
        META_TABLE
    );
    pub const SQL_CREATE_BODY: &str = formatcp!(
        "INSERT INTO {} (file_id, data) VALUES (?, zeroblob(0))",
        DATA_TABLE
    );
    pub const SQL_LOOKUP: &str = formatcp!("SELECT id, mode FROM {} WHERE path = ?", META_TABLE);
    pub const SQL_PATH: &str = formatcp!("SELECT path FROM {} WHERE id = ?", META_TABLE);
    pub const SQL_STAT: &str = formatcp!(
        "SELECT {meta}.mode, {meta}.uid, {meta}.gid, {meta}.atime, {meta}.mtime, {meta}.ctime, LENGTH({data}.data) FROM {meta}
        INNER JOIN {data} ON {data}.file_id={meta}.id
        WHERE {meta}.id = ?",
        data=DATA_TABLE,
        meta=META_TABLE
    );
    pub const SQL_SIZE: &str = formatcp!("SELECT LENGTH(data) FROM {} WHERE file_id = ?", DATA_TABLE);
    pub const SQL_LOAD: &str = formatcp!("SELECT data FROM {} WHERE file_id = ?", DATA_TABLE);
    pub const SQL_STORE: &str = formatcp!("UPDATE {} SET data = ? WHERE file_id = ?", DATA_TABLE);
    pub const SQL_TOUCH: &str = formatcp!(
        "UPDATE {} SET mtime = ?1, ctime = ?1 WHERE id = ?2",
        META_TABLE
    );
    pub const SQL_CHMOD: &str = formatcp!(
        "UPDATE {} SET mode = (mode & ?1) | ?2, ctime = ?3 WHERE id = ?4",
        META_TABLE
    );
    pub const SQL_CHOWN: &str = formatcp!(
        "UPDATE {} SET uid = COALESCE(?1, uid), gid = COALESCE(?2, gid), ctime = ?3 WHERE id = ?4",
        META_TABLE
    );
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as i64)
        .unwrap_or(0)
}

fn from_nanos(nanos: i64) -> SystemTime {
    timestamp(
        nanos.div_euclid(constants::NANOS_PER_SECOND),
        nanos.rem_euclid(constants::NANOS_PER_SECOND),
    )
}

fn is_directory(mode: u32) -> bool {
    mode & constants::S_IFMT == constants::S_IFDIR
}

/// An entry of the descriptor table.
#[derive(Debug, Clone, Copy)]
struct OpenFile {
    file_id: i64,
    flags: OpenFlags,
    directory: bool,
    position: i64,
}

/// An advisory lock on the byte range `start..end`; no end extends it to the end of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecordLock {
    file_id: i64,
    owner: u64,
    kind: LockType,
    start: u64,
    end: Option<u64>,
}

impl RecordLock {
    fn overlaps(&self, start: u64, end: Option<u64>) -> bool {
        end.map_or(true, |end| self.start < end) && self.end.map_or(true, |own| start < own)
    }
}

#[derive(Debug)]
struct State {
    database: Database,
    cwd: VirtualPath,
    descriptors: HashMap<u64, OpenFile>,
    next_descriptor: u64,
    locks: Vec<RecordLock>,
}

impl State {
    fn descriptor(&self, fd: &RawDescriptor) -> Result<OpenFile, Errno> {
        self.descriptors
            .get(&fd.0)
            .copied()
            .ok_or(Errno(libc::EBADF))
    }

    fn lookup(&self, path: &VirtualPath) -> Result<Option<(i64, u32)>, Errno> {
        let mut statement = self.database.prepare_cached(constants::SQL_LOOKUP)?;
        let node = statement
            .query_row(params![path.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?;
        Ok(node)
    }

    fn create_node(
        &mut self,
        path: &VirtualPath,
        mode: u32,
        (uid, gid): (uid_t, gid_t),
    ) -> Result<i64, Errno> {
        let parent = path.parent().ok_or(Errno(libc::EEXIST))?;
        match self.lookup(&parent)? {
            Some((_, parent_mode)) if is_directory(parent_mode) => {}
            Some(_) => return Err(Errno(libc::ENOTDIR)),
            None => return Err(Errno(libc::ENOENT)),
        }

        let transaction = self.database.transaction()?;
        let file_id = {
            let mut create_node_statement = transaction.prepare_cached(constants::SQL_CREATE_NODE)?;
            let file_id =
                create_node_statement.insert(params![path.as_str(), mode, uid, gid, now()])?;
            transaction
                .prepare_cached(constants::SQL_CREATE_BODY)?
                .execute(params![file_id])?;
            file_id
        };
        transaction.commit()?;

        log::debug!("Created '{}' with mode {:o}", path.as_str(), mode);
        Ok(file_id)
    }

    fn size(&self, file_id: i64) -> Result<i64, Errno> {
        let mut statement = self.database.prepare_cached(constants::SQL_SIZE)?;
        let size = statement.query_row(params![file_id], |row| row.get(0))?;
        Ok(size)
    }

    fn check_length(&self, length: usize) -> Result<(), Errno> {
        let limit = self.database.limit(Limit::SQLITE_LIMIT_LENGTH);
        match length > limit as usize {
            true => Err(Errno(libc::EFBIG)),
            false => Ok(()),
        }
    }

    fn load(&self, file_id: i64) -> Result<Vec<u8>, Errno> {
        let mut statement = self.database.prepare_cached(constants::SQL_LOAD)?;
        let data = statement.query_row(params![file_id], |row| row.get(0))?;
        Ok(data)
    }

    fn store(&self, file_id: i64, data: &[u8]) -> Result<(), Errno> {
        self.database
            .prepare_cached(constants::SQL_STORE)?
            .execute(params![data, file_id])?;
        self.database
            .prepare_cached(constants::SQL_TOUCH)?
            .execute(params![now(), file_id])?;
        Ok(())
    }

    /// Resolve the byte range of a lock request to absolute offsets.
    fn lock_range(&self, file: &OpenFile, lock: &Flock) -> Result<(u64, Option<u64>), Errno> {
        let base = match lock.whence {
            Whence::Start => 0,
            Whence::Current => file.position,
            Whence::End => self.size(file.file_id)?,
        };
        let overflow = Errno(libc::EOVERFLOW);
        let start = base.checked_add(lock.start).ok_or(overflow)?;
        let (start, end) = match lock.length {
            0 => (start, None),
            length if length > 0 => (start, Some(start.checked_add(length).ok_or(overflow)?)),
            length => (start.checked_add(length).ok_or(overflow)?, Some(start)),
        };

        match start < 0 {
            true => Err(Errno(libc::EINVAL)),
            false => Ok((start as u64, end.map(|end| end as u64))),
        }
    }

    fn conflict(
        &self,
        file_id: i64,
        owner: u64,
        kind: LockType,
        start: u64,
        end: Option<u64>,
    ) -> Option<RecordLock> {
        self.locks
            .iter()
            .find(|lock| {
                lock.file_id == file_id
                    && lock.owner != owner
                    && kind.conflicts_with(lock.kind)
                    && lock.overlaps(start, end)
            })
            .copied()
    }

    /// Remove the range from all locks of the owner, splitting locks which extend beyond it.
    fn carve(&mut self, file_id: i64, owner: u64, start: u64, end: Option<u64>) {
        let mut kept = Vec::with_capacity(self.locks.len() + 1);
        for lock in self.locks.drain(..) {
            if lock.file_id != file_id || lock.owner != owner || !lock.overlaps(start, end) {
                kept.push(lock);
                continue;
            }
            if lock.start < start {
                kept.push(RecordLock {
                    end: Some(start),
                    ..lock
                });
            }
            if let Some(end) = end {
                if lock.end.map_or(true, |own| own > end) {
                    kept.push(RecordLock { start: end, ..lock });
                }
            }
        }
        self.locks = kept;
    }
}

/// A volume whose namespace and file contents live in a SQLite database.
///
/// Descriptors are numbers local to this volume; advisory locks are owned by descriptors.
#[derive(Debug)]
pub struct SqliteVolume {
    state: Mutex<State>,
    unlocked: Condvar,
    schema: SchemaVersion,
    owner: (uid_t, gid_t),
}

impl SqliteVolume {
    /// Load the volume from an SQLite database, creating it if requested.
    pub fn load(mut database: Database, create_volume: bool) -> Result<SqliteVolume, VolumeError> {
        let schema = match SchemaVersion::detect(&database) {
            Availability::Available(schema)
                if schema.version() == constants::CURRENT_SCHEMA_VERSION =>
            {
                Ok(schema)
            }
            Availability::Available(schema) => {
                Err(VolumeError::UnsupportedVersion(schema.version()))
            }
            Availability::Missing if create_volume => {
                let transaction = database.transaction()?;
                transaction.execute(constants::SQL_CREATE_META, [])?;
                transaction.execute(constants::SQL_CREATE_DATA, [])?;
                transaction.execute(
                    constants::SQL_CREATE_NODE,
                    params![
                        "",
                        constants::S_IFDIR | constants::ROOT_MODE,
                        0u32,
                        0u32,
                        now()
                    ],
                )?;
                let root = transaction.last_insert_rowid();
                transaction.execute(constants::SQL_CREATE_BODY, params![root])?;
                transaction.commit()?;
                Ok(SchemaVersion::new(constants::CURRENT_SCHEMA_VERSION))
            }
            Availability::Missing => Err(VolumeError::NoVolume),
            Availability::Error(error) => Err(error.into()),
        }?;

        // Pre-compile the primary SQL commands
        const PRECOMPILED_COMMANDS: [&str; 11] = [
            constants::SQL_CREATE_NODE,
            constants::SQL_CREATE_BODY,
            constants::SQL_LOOKUP,
            constants::SQL_PATH,
            constants::SQL_STAT,
            constants::SQL_SIZE,
            constants::SQL_LOAD,
            constants::SQL_STORE,
            constants::SQL_TOUCH,
            constants::SQL_CHMOD,
            constants::SQL_CHOWN,
        ];

        database.set_prepared_statement_cache_capacity(PRECOMPILED_COMMANDS.len());
        for &statement in &PRECOMPILED_COMMANDS {
            database
                .prepare_cached(statement)
                .map_err(|error| VolumeError::InvalidBaseCommand(statement, error.into()))?;
        }

        log::debug!("Loaded volume with schema version {}", schema.version());
        Ok(SqliteVolume {
            state: Mutex::new(State {
                database,
                cwd: VirtualPath::root(),
                descriptors: HashMap::new(),
                next_descriptor: 0,
                locks: Vec::new(),
            }),
            unlocked: Condvar::new(),
            schema,
            owner: (0, 0),
        })
    }

    /// Create a fresh volume in an in-memory database.
    pub fn open_in_memory() -> Result<SqliteVolume, VolumeError> {
        SqliteVolume::load(Database::open_in_memory()?, true)
    }

    /// Record `uid` and `gid` as owner of files created from now on.
    pub fn with_owner(mut self, uid: uid_t, gid: gid_t) -> Self {
        self.owner = (uid, gid);
        self
    }

    /// The schema version of the underlying database.
    pub fn schema_version(&self) -> SchemaVersion {
        self.schema
    }

    /// Create a directory relative to the current working directory.
    pub fn mkdir(&self, path: &str, mode: u32) -> Result<(), Errno> {
        let mut state = self.state.lock();
        let path = state.cwd.resolve(path);
        if state.lookup(&path)?.is_some() {
            return Err(Errno(libc::EEXIST));
        }
        state.create_node(
            &path,
            constants::S_IFDIR | (mode & constants::PERMISSION_BITS),
            self.owner,
        )?;
        Ok(())
    }
}

impl Volume for SqliteVolume {
    type Fd = RawDescriptor;

    fn open(&self, path: &str, flags: OpenFlags) -> Result<RawDescriptor, Errno> {
        let mut state = self.state.lock();
        let path = state.cwd.resolve(path);
        let writable = flags.is_writable();

        let (file_id, directory) = match state.lookup(&path)? {
            Some(_) if flags.contains(OpenFlags::CREAT | OpenFlags::EXCL) => {
                return Err(Errno(libc::EEXIST));
            }
            Some((file_id, mode)) => {
                let directory = is_directory(mode);
                if flags.contains(OpenFlags::DIRECTORY) && !directory {
                    return Err(Errno(libc::ENOTDIR));
                }
                if directory && writable {
                    return Err(Errno(libc::EISDIR));
                }
                if flags.contains(OpenFlags::TRUNC) && writable {
                    state.store(file_id, &[])?;
                }
                (file_id, directory)
            }
            None if flags.contains(OpenFlags::CREAT) && !flags.contains(OpenFlags::DIRECTORY) => {
                let mode = constants::S_IFREG | constants::DEFAULT_FILE_MODE;
                (state.create_node(&path, mode, self.owner)?, false)
            }
            None => return Err(Errno(libc::ENOENT)),
        };

        let descriptor = state.next_descriptor;
        state.next_descriptor += 1;
        state.descriptors.insert(
            descriptor,
            OpenFile {
                file_id,
                flags,
                directory,
                position: 0,
            },
        );

        log::trace!("Opened '{}' as descriptor {}", path.as_str(), descriptor);
        Ok(RawDescriptor(descriptor))
    }

    fn close(&self, fd: RawDescriptor) -> Result<(), Errno> {
        let mut state = self.state.lock();
        state
            .descriptors
            .remove(&fd.0)
            .ok_or(Errno(libc::EBADF))?;

        let held = state.locks.len();
        state.locks.retain(|lock| lock.owner != fd.0);
        if state.locks.len() != held {
            self.unlocked.notify_all();
        }
        Ok(())
    }

    fn fstat(&self, fd: &RawDescriptor) -> Result<Stat, Errno> {
        let state = self.state.lock();
        let file = state.descriptor(fd)?;

        let mut statement = state.database.prepare_cached(constants::SQL_STAT)?;
        let (mode, uid, gid, atime, mtime, ctime, size): (u32, u32, u32, i64, i64, i64, i64) =
            statement.query_row(params![file.file_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?;

        let size = size as u64;
        Ok(Stat {
            dev: 0,
            ino: file.file_id as u64,
            mode,
            nlink: if file.directory { 2 } else { 1 },
            uid,
            gid,
            rdev: 0,
            size,
            blksize: constants::BLOCK_SIZE,
            blocks: (size + 511) / 512,
            atime: from_nanos(atime),
            mtime: from_nanos(mtime),
            ctime: from_nanos(ctime),
        })
    }

    fn fsync(&self, fd: &RawDescriptor) -> Result<(), Errno> {
        // Every change is committed to the database right away.
        self.state.lock().descriptor(fd).map(|_| ())
    }

    fn fchdir(&self, fd: &RawDescriptor) -> Result<(), Errno> {
        let mut state = self.state.lock();
        let file = state.descriptor(fd)?;
        if !file.directory {
            return Err(Errno(libc::ENOTDIR));
        }

        let path: String = state
            .database
            .prepare_cached(constants::SQL_PATH)?
            .query_row(params![file.file_id], |row| row.get(0))?;
        state.cwd = VirtualPath::from(path);
        Ok(())
    }

    fn fchmod(&self, fd: &RawDescriptor, mode: mode_t) -> Result<(), Errno> {
        let state = self.state.lock();
        let file = state.descriptor(fd)?;
        state.database.prepare_cached(constants::SQL_CHMOD)?.execute(params![
            constants::S_IFMT,
            mode as u32 & constants::PERMISSION_BITS,
            now(),
            file.file_id
        ])?;
        Ok(())
    }

    fn fchown(&self, fd: &RawDescriptor, uid: uid_t, gid: gid_t) -> Result<(), Errno> {
        let state = self.state.lock();
        let file = state.descriptor(fd)?;
        let uid = (uid != uid_t::MAX).then(|| uid);
        let gid = (gid != gid_t::MAX).then(|| gid);
        state
            .database
            .prepare_cached(constants::SQL_CHOWN)?
            .execute(params![uid, gid, now(), file.file_id])?;
        Ok(())
    }

    fn ftruncate(&self, fd: &RawDescriptor, length: off_t) -> Result<(), Errno> {
        let state = self.state.lock();
        let file = state.descriptor(fd)?;
        if file.directory {
            return Err(Errno(libc::EISDIR));
        }
        if length < 0 || !file.flags.is_writable() {
            return Err(Errno(libc::EINVAL));
        }
        state.check_length(length as usize)?;

        let mut data = state.load(file.file_id)?;
        data.resize(length as usize, 0);
        state.store(file.file_id, &data)
    }

    fn lseek(&self, fd: &RawDescriptor, offset: off_t, whence: Whence) -> Result<off_t, Errno> {
        let mut state = self.state.lock();
        let mut file = state.descriptor(fd)?;
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => file.position,
            Whence::End => state.size(file.file_id)?,
        };

        let position = base
            .checked_add(offset as i64)
            .ok_or(Errno(libc::EOVERFLOW))?;
        if position < 0 {
            return Err(Errno(libc::EINVAL));
        }

        file.position = position;
        state.descriptors.insert(fd.0, file);
        Ok(position as off_t)
    }

    fn pread(&self, fd: &RawDescriptor, buffer: &mut [u8], offset: off_t) -> Result<usize, Errno> {
        let state = self.state.lock();
        let file = state.descriptor(fd)?;
        if file.directory {
            return Err(Errno(libc::EISDIR));
        }
        if !file.flags.is_readable() {
            return Err(Errno(libc::EBADF));
        }
        if offset < 0 {
            return Err(Errno(libc::EINVAL));
        }

        let offset = offset as i64;
        let size = state.size(file.file_id)?;
        if buffer.is_empty() || offset >= size {
            return Ok(0);
        }

        // Short read at the end of the file.
        let count = std::cmp::min(buffer.len() as i64, size - offset) as usize;
        let blob = state.database.blob_open(
            DatabaseName::Main,
            constants::DATA_TABLE,
            "data",
            file.file_id,
            true,
        )?;
        blob.read_at_exact(&mut buffer[..count], offset as usize)?;
        Ok(count)
    }

    fn pwrite(&self, fd: &RawDescriptor, buffer: &[u8], offset: off_t) -> Result<usize, Errno> {
        let state = self.state.lock();
        let file = state.descriptor(fd)?;
        if file.directory {
            return Err(Errno(libc::EISDIR));
        }
        if !file.flags.is_writable() {
            return Err(Errno(libc::EBADF));
        }
        if offset < 0 {
            return Err(Errno(libc::EINVAL));
        }
        if buffer.is_empty() {
            return Ok(0);
        }

        let size = state.size(file.file_id)? as usize;
        let start = match file.flags.contains(OpenFlags::APPEND) {
            true => size,
            false => offset as usize,
        };
        let end = start
            .checked_add(buffer.len())
            .ok_or(Errno(libc::EFBIG))?;
        state.check_length(end)?;

        let mut data = state.load(file.file_id)?;
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buffer);
        state.store(file.file_id, &data)?;
        Ok(buffer.len())
    }

    fn posix_lock(
        &self,
        fd: &RawDescriptor,
        command: LockCommand,
        lock: &mut Flock,
    ) -> Result<(), Errno> {
        let mut state = self.state.lock();
        let file = state.descriptor(fd)?;
        match lock.kind {
            LockType::Read if !file.flags.is_readable() => return Err(Errno(libc::EBADF)),
            LockType::Write if !file.flags.is_writable() => return Err(Errno(libc::EBADF)),
            _ => {}
        }
        let (start, end) = state.lock_range(&file, lock)?;

        if command == LockCommand::Get {
            match state.conflict(file.file_id, fd.0, lock.kind, start, end) {
                Some(conflict) => {
                    lock.kind = conflict.kind;
                    lock.whence = Whence::Start;
                    lock.start = conflict.start as i64;
                    lock.length = conflict
                        .end
                        .map_or(0, |end| (end - conflict.start) as i64);
                    lock.pid = std::process::id() as libc::pid_t;
                }
                None => lock.kind = LockType::Unlock,
            }
            return Ok(());
        }

        if lock.kind != LockType::Unlock {
            while state
                .conflict(file.file_id, fd.0, lock.kind, start, end)
                .is_some()
            {
                if command == LockCommand::Set {
                    return Err(Errno(libc::EAGAIN));
                }
                self.unlocked.wait(&mut state);
            }
        }

        state.carve(file.file_id, fd.0, start, end);
        if lock.kind != LockType::Unlock {
            state.locks.push(RecordLock {
                file_id: file.file_id,
                owner: fd.0,
                kind: lock.kind,
                start,
                end,
            });
        }
        self.unlocked.notify_all();
        Ok(())
    }
}
