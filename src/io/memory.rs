use std::io;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Storage, closed};

/// In-memory storage, used for archives built in memory and for
/// forward-only sources that had to be drained before parsing.
pub struct MemoryStorage {
    data: RwLock<Vec<u8>>,
    writable: bool,
    closed: AtomicBool,
}

impl MemoryStorage {
    /// Read-only storage over `data`.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
            writable: false,
            closed: AtomicBool::new(false),
        }
    }

    /// Writable storage, initially holding `data`.
    pub fn writable(data: Vec<u8>) -> Self {
        Self {
            writable: true,
            ..Self::new(data)
        }
    }

    /// Empty writable storage, for creating archives.
    pub fn empty() -> Self {
        Self::writable(Vec::new())
    }

    /// Copy of the current contents.
    pub fn to_vec(&self) -> Vec<u8> {
        match self.data.read() {
            Ok(data) => data.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Whether [`Storage::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> io::Result<()> {
        if self.is_closed() {
            return Err(closed());
        }
        Ok(())
    }
}

fn poisoned() -> io::Error {
    io::Error::other("memory storage lock poisoned")
}

impl Storage for MemoryStorage {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open()?;
        let data = self.data.read().map_err(|_| poisoned())?;
        let len = data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> io::Result<u64> {
        self.check_open()?;
        Ok(self.data.read().map_err(|_| poisoned())?.len() as u64)
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> io::Result<usize> {
        self.check_open()?;
        if !self.writable {
            return Err(super::read_only());
        }
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset too large"))?;
        let mut data = self.data.write().map_err(|_| poisoned())?;
        let end = start + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        self.check_open()?;
        if !self.writable {
            return Err(super::read_only());
        }
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length too large"))?;
        self.data.write().map_err(|_| poisoned())?.resize(len, 0);
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
