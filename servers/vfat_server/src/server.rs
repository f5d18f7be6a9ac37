//! Path-based operation surface served to the host mount layer.
//!
//! Every operation resolves its path from the root, answers from the volume
//! and reports failures as `FsResult` codes. Paths under `/.debug` never reach
//! the volume; they go to the `DebugFs` collaborator instead.

use vfat_api_types::fs::FsResult;
use vfat_api_types::{DEBUGFS_PATH, XATTR_DEBUG_CLUSTER};

use crate::fat32::{BlockDev, FatError, Metadata, Volume};

// ─── Diagnostic filesystem ─────────────────────────────────────────────────────

/// Filesystem mounted at `/.debug`. Paths are relative to it: `/` is its root.
pub trait DebugFs: Send + Sync {
    fn getattr(&self, _path: &str) -> Result<Metadata, FsResult> {
        Err(FsResult::NotFound)
    }

    fn readdir(&self, _path: &str) -> Result<Vec<Metadata>, FsResult> {
        Err(FsResult::NotFound)
    }

    fn read(&self, _path: &str, _size: usize, _offset: u64) -> Result<Vec<u8>, FsResult> {
        Err(FsResult::NotFound)
    }
}

/// No diagnostics: everything under `/.debug` is absent.
pub struct NoDebugFs;

impl DebugFs for NoDebugFs {}

// ─── Server ────────────────────────────────────────────────────────────────────

/// Answer to an extended attribute query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XattrReply {
    /// The caller passed a zero size: only the value length is returned.
    Size(usize),
    Data(Vec<u8>),
}

pub struct VfatServer<D, G = NoDebugFs> {
    volume: Volume<D>,
    debug:  G,
}

impl<D: BlockDev> VfatServer<D> {
    pub fn new(volume: Volume<D>) -> Self {
        Self::with_debugfs(volume, NoDebugFs)
    }
}

impl<D: BlockDev, G: DebugFs> VfatServer<D, G> {
    pub fn with_debugfs(volume: Volume<D>, debug: G) -> Self {
        Self { volume, debug }
    }

    pub fn volume(&self) -> &Volume<D> { &self.volume }

    pub fn get_attributes(&self, path: &str) -> Result<Metadata, FsResult> {
        log::trace!("getattr {path}");
        if let Some(rest) = debug_path(path) {
            return self.debug.getattr(rest);
        }
        self.volume.resolve(path).map_err(|e| fail("getattr", path, e))
    }

    /// Every entry of the directory at `path`, in on-disk order.
    pub fn list_directory(&self, path: &str) -> Result<Vec<Metadata>, FsResult> {
        log::trace!("readdir {path}");
        if let Some(rest) = debug_path(path) {
            return self.debug.readdir(rest);
        }
        let dir = self.volume.resolve(path).map_err(|e| fail("readdir", path, e))?;
        if !dir.is_dir() {
            return Err(FsResult::NotDir);
        }
        self.volume
            .dir_entries(dir.cluster)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| fail("readdir", path, e))
    }

    /// Up to `size` bytes of the file at `path` starting at `offset`. The
    /// result is shorter than `size` only at the end of the file.
    pub fn read(&self, path: &str, size: usize, offset: u64) -> Result<Vec<u8>, FsResult> {
        log::trace!("read {path} size={size} offset={offset}");
        if let Some(rest) = debug_path(path) {
            return self.debug.read(rest, size, offset);
        }
        let file = self.volume.resolve(path).map_err(|e| fail("read", path, e))?;
        if file.is_dir() {
            return Err(FsResult::IsDir);
        }

        let remaining = u64::from(file.size).saturating_sub(offset);
        let len = remaining.min(size as u64) as usize;
        let mut buf = vec![0u8; len];
        let n = self
            .volume
            .read_at(&file, offset, &mut buf)
            .map_err(|e| fail("read", path, e))?;
        buf.truncate(n);
        Ok(buf)
    }

    /// The only attribute is `debug.cluster`: the decimal starting cluster.
    /// `size == 0` asks for the value length; a smaller non-zero `size` is `Range`.
    /// The value carries no NUL terminator and the reported length counts none,
    /// unlike a C-string convention that would answer one byte more.
    pub fn get_extended_attribute(&self, path: &str, name: &str, size: usize) -> Result<XattrReply, FsResult> {
        log::trace!("getxattr {path} {name} size={size}");
        if debug_path(path).is_some() || name != XATTR_DEBUG_CLUSTER {
            return Err(FsResult::NoAttribute);
        }
        let entry = self.volume.resolve(path).map_err(|e| fail("getxattr", path, e))?;
        let value = entry.cluster.to_string().into_bytes();
        match size {
            0 => Ok(XattrReply::Size(value.len())),
            n if n < value.len() => Err(FsResult::Range),
            _ => Ok(XattrReply::Data(value)),
        }
    }
}

/// The part of `path` below `/.debug`, if the path lies there.
fn debug_path(path: &str) -> Option<&str> {
    match path.strip_prefix(DEBUGFS_PATH)? {
        "" => Some("/"),
        rest if rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

fn fail(op: &str, path: &str, err: FatError) -> FsResult {
    let result = err.result();
    match result {
        FsResult::NotFound | FsResult::NotDir | FsResult::IsDir => log::debug!("{op} {path}: {err}"),
        FsResult::Corrupted => log::warn!("{op} {path}: {err}"),
        _ => log::error!("{op} {path}: {err}"),
    }
    result
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
