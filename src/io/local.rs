use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(not(unix))]
use std::sync::Mutex;

use super::{Storage, closed};

/// Local file with random access support.
///
/// On unix this uses `pread`/`pwrite`, which never touch the shared file
/// cursor. Elsewhere every seek+read (or seek+write) pair runs under one
/// mutex.
pub struct LocalFile {
    #[cfg(unix)]
    file: File,
    #[cfg(not(unix))]
    file: Mutex<File>,
    writable: bool,
    closed: AtomicBool,
}

impl LocalFile {
    /// Open an existing file read-only.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::wrap(File::open(path)?, false))
    }

    /// Open an existing file for reading and writing (update mode).
    pub fn open_rw(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self::wrap(file, true))
    }

    /// Create (or truncate) a file for a new archive.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::wrap(file, true))
    }

    fn wrap(file: File, writable: bool) -> Self {
        Self {
            #[cfg(unix)]
            file,
            #[cfg(not(unix))]
            file: Mutex::new(file),
            writable,
            closed: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(closed());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|_| io::Error::other("file lock poisoned"))
    }
}

impl Storage for LocalFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_at(buf, offset)
        }

        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = self.lock()?;
            file.seek(SeekFrom::Start(offset))?;
            file.read(buf)
        }
    }

    fn size(&self) -> io::Result<u64> {
        self.check_open()?;

        #[cfg(unix)]
        {
            Ok(self.file.metadata()?.len())
        }

        #[cfg(not(unix))]
        {
            Ok(self.lock()?.metadata()?.len())
        }
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<usize> {
        self.check_open()?;
        if !self.writable {
            return Err(super::read_only());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.write_at(buf, offset)
        }

        #[cfg(not(unix))]
        {
            use std::io::{Seek, SeekFrom, Write};
            let mut file = self.lock()?;
            file.seek(SeekFrom::Start(offset))?;
            file.write(buf)
        }
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        self.check_open()?;
        if !self.writable {
            return Err(super::read_only());
        }

        #[cfg(unix)]
        {
            self.file.set_len(len)
        }

        #[cfg(not(unix))]
        {
            self.lock()?.set_len(len)
        }
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.writable {
            #[cfg(unix)]
            self.file.sync_all()?;
            #[cfg(not(unix))]
            self.lock()?.sync_all()?;
        }
        Ok(())
    }
}
