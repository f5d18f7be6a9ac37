//! Positioned-read access to the device holding the volume.
//!
//! The volume never writes, so a device only has to answer reads at explicit
//! byte offsets. Reads take `&self`: concurrent requests share one device
//! without locking.

use std::fs::File;
use std::io;
use std::ops::Deref;
use std::os::unix::fs::FileExt;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};

pub trait BlockDev: Send + Sync {
    /// Fill all of `buf` starting at byte `offset`. A short read is an error.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Read-only view of `len` bytes at `offset`, valid for the device lifetime.
    fn map(&self, offset: u64, len: usize) -> io::Result<Region> {
        let mut buf = vec![0u8; len].into_boxed_slice();
        self.read_at(offset, &mut buf)?;
        Ok(Region::Owned(buf))
    }
}

/// A fixed byte region of the device, either memory-mapped or copied out.
pub enum Region {
    Mapped(Mmap),
    Owned(Box<[u8]>),
}

impl Deref for Region {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Region::Mapped(map) => map,
            Region::Owned(buf) => buf,
        }
    }
}

// ─── Disk image or block device on the host ────────────────────────────────────

pub struct ImageFile {
    file: File,
}

impl ImageFile {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self { file: File::open(path)? })
    }
}

impl BlockDev for ImageFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.read_exact_at(buf, offset)
    }

    fn map(&self, offset: u64, len: usize) -> io::Result<Region> {
        // Touching a mapping past the end of a regular file raises SIGBUS, so
        // catch truncated images here. Block devices report a zero length.
        let meta = self.file.metadata()?;
        if meta.is_file() && offset + len as u64 > meta.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "FAT region extends past the end of the image",
            ));
        }
        // SAFETY: the file is opened read-only and this process never writes to it.
        let map = unsafe { MmapOptions::new().offset(offset).len(len).map(&self.file)? };
        Ok(Region::Mapped(map))
    }
}

// ─── In-memory image ───────────────────────────────────────────────────────────

/// Volume image held in memory.
pub struct MemDisk(pub Vec<u8>);

impl BlockDev for MemDisk {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::from(io::ErrorKind::UnexpectedEof))?;
        let src = start
            .checked_add(buf.len())
            .and_then(|end| self.0.get(start..end))
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
        buf.copy_from_slice(src);
        Ok(())
    }
}
