use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Mutex;

use super::{Storage, closed};

/// Adapts any `Read + Seek` source into [`Storage`].
///
/// The source has a single cursor, so every positioned read performs the
/// seek and the read inside one critical section.
pub struct SeekableStorage<T> {
    inner: Mutex<Option<T>>,
}

impl<T: Read + Seek + Send> SeekableStorage<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Mutex::new(Some(inner)),
        }
    }

    /// Take back the wrapped source, unless the storage was closed.
    pub fn into_inner(self) -> Option<T> {
        self.inner.into_inner().unwrap_or_else(|p| p.into_inner())
    }

    fn with<F, V>(&self, f: F) -> io::Result<V>
    where
        F: FnOnce(&mut T) -> io::Result<V>,
    {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("seekable storage lock poisoned"))?;
        match guard.as_mut() {
            Some(inner) => f(inner),
            None => Err(closed()),
        }
    }
}

impl<T: Read + Seek + Send> Storage for SeekableStorage<T> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.with(|inner| {
            inner.seek(SeekFrom::Start(offset))?;
            inner.read(buf)
        })
    }

    fn size(&self) -> io::Result<u64> {
        self.with(|inner| inner.seek(SeekFrom::End(0)))
    }

    fn close(&self) -> io::Result<()> {
        if let Ok(mut guard) = self.inner.lock() {
            guard.take();
        }
        Ok(())
    }
}
