//! Archive configuration.

use super::directory::DEFAULT_BUFFER_SIZE;

/// How an archive may be used for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveMode {
    /// Enumerate and read entries; nothing may change.
    #[default]
    Read,
    /// Start an empty archive; entries are write-only.
    Create,
    /// Read, modify, add and delete entries; rewritten on dispose.
    Update,
}

/// Compression applied to entries written by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    #[default]
    Optimal,
    Fastest,
    SmallestSize,
    /// Store entries without compression.
    NoCompression,
}

impl CompressionLevel {
    /// The flate2 level, or `None` for stored entries.
    pub fn deflate_level(self) -> Option<flate2::Compression> {
        match self {
            CompressionLevel::Optimal => Some(flate2::Compression::default()),
            CompressionLevel::Fastest => Some(flate2::Compression::fast()),
            CompressionLevel::SmallestSize => Some(flate2::Compression::best()),
            CompressionLevel::NoCompression => None,
        }
    }
}

/// Options for opening an archive.
///
/// ```
/// use razip::{ArchiveMode, ArchiveOptions};
///
/// let options = ArchiveOptions::new()
///     .mode(ArchiveMode::Update)
///     .leave_open(true);
/// assert_eq!(options.mode, ArchiveMode::Update);
/// ```
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub mode: ArchiveMode,
    /// Keep the storage open after the archive is disposed.
    pub leave_open: bool,
    /// Capacity of the window used to stream the central directory.
    pub directory_buffer_size: usize,
    /// Level for entries created without an explicit one.
    pub compression: CompressionLevel,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            mode: ArchiveMode::Read,
            leave_open: false,
            directory_buffer_size: DEFAULT_BUFFER_SIZE,
            compression: CompressionLevel::Optimal,
        }
    }
}

impl ArchiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: ArchiveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn leave_open(mut self, leave_open: bool) -> Self {
        self.leave_open = leave_open;
        self
    }

    pub fn directory_buffer_size(mut self, size: usize) -> Self {
        self.directory_buffer_size = size;
        self
    }

    pub fn compression(mut self, level: CompressionLevel) -> Self {
        self.compression = level;
        self
    }
}
