//! Read-only FAT32 driver.
//!
//! Assumes the FAT32 volume starts at byte 0 of the device (raw image or
//! partition node, no MBR). Short (8.3) and VFAT long names are both understood.
//!
//! All device access goes through `BlockDev` positioned reads, so a mounted
//! `Volume` is immutable and can be shared between threads as-is.

mod bpb;
mod datetime;
mod device;
mod dir;
mod error;
mod fat;
mod lfn;

#[cfg(test)]
pub(crate) mod testutil;

use std::time::SystemTime;

use vfat_api_types::ROOT_MODE;
use vfat_api_types::fs::FileKind;

pub use bpb::{BOOT_SECTOR_LEN, Geometry, MIN_FAT32_CLUSTERS};
pub use device::{BlockDev, ImageFile, MemDisk, Region};
pub use dir::{DirEntries, Metadata, ShortEntry, Slot};
pub use error::FatError;
pub use fat::{Chain, FAT32_EOC, FatTable, is_eoc};
pub use lfn::{LfnFragment, lfn_checksum};

pub(crate) fn le16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

pub(crate) fn le32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Who mounted the volume and when. Every entry is owned by the mounting user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MountContext {
    pub uid:  u32,
    pub gid:  u32,
    pub time: SystemTime,
}

impl MountContext {
    /// Capture the calling process's user, group and the current time.
    pub fn current() -> Self {
        // SAFETY: getuid/getgid cannot fail and touch no memory.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self { uid, gid, time: SystemTime::now() }
    }
}

// ─── Volume ────────────────────────────────────────────────────────────────────

pub struct Volume<D> {
    dev:      D,
    geometry: Geometry,
    fat:      FatTable,
    owner:    MountContext,
    root:     Metadata,
}

impl<D: BlockDev> Volume<D> {
    /// Mount a FAT32 volume: parse the boot sector, map the active FAT and
    /// synthesize the root directory record.
    pub fn mount(dev: D, owner: MountContext) -> Result<Self, FatError> {
        let mut sector = [0u8; BOOT_SECTOR_LEN];
        dev.read_at(0, &mut sector)?;
        let geometry = Geometry::parse(&sector)?;
        let fat = FatTable::new(dev.map(geometry.fat_offset, geometry.fat_len())?);

        log::info!(
            "fat32: {} clusters of {} bytes, root at cluster {}, FAT #{} at {:#x}, data at {:#x}",
            geometry.cluster_count,
            geometry.bytes_per_cluster,
            geometry.root_cluster,
            geometry.active_fat,
            geometry.fat_offset,
            geometry.cluster_offset,
        );

        let root = Metadata {
            name:    String::from("/"),
            kind:    FileKind::Directory,
            size:    0,
            cluster: geometry.root_cluster,
            atime:   owner.time,
            mtime:   owner.time,
            ctime:   owner.time,
            uid:     owner.uid,
            gid:     owner.gid,
            mode:    ROOT_MODE,
        };
        Ok(Self { dev, geometry, fat, owner, root })
    }

    pub fn geometry(&self) -> &Geometry { &self.geometry }

    pub fn root(&self) -> &Metadata { &self.root }

    pub fn owner(&self) -> &MountContext { &self.owner }

    pub(crate) fn device(&self) -> &D { &self.dev }

    /// Raw FAT value following `cluster`; see [`is_eoc`].
    pub fn next_cluster(&self, cluster: u32) -> Result<u32, FatError> {
        self.fat.next_cluster(cluster)
    }

    /// Clusters of the chain starting at `start`, bounded by the volume size.
    pub fn chain(&self, start: u32) -> Chain<'_> {
        self.fat.chain(start, self.geometry.last_cluster(), self.geometry.cluster_count)
    }

    /// Lazily decode the directory whose first cluster is `cluster`.
    /// Cluster 0 (what `..` records for the root) means the root directory.
    pub fn dir_entries(&self, cluster: u32) -> DirEntries<'_, D> {
        let cluster = if cluster == 0 { self.geometry.root_cluster } else { cluster };
        DirEntries::new(self, self.chain(cluster))
    }

    /// Look up an absolute, slash-separated path. `/` is the root.
    pub fn resolve(&self, path: &str) -> Result<Metadata, FatError> {
        let mut current = self.root.clone();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !current.is_dir() {
                return Err(FatError::NotDir);
            }
            current = self.find_in_dir(current.cluster, component)?;
        }
        Ok(current)
    }

    /// An exact spelling wins; otherwise the first entry equal ignoring
    /// ASCII case, once the whole directory has been scanned.
    fn find_in_dir(&self, cluster: u32, name: &str) -> Result<Metadata, FatError> {
        let mut folded = None;
        for entry in self.dir_entries(cluster) {
            let entry = entry?;
            if entry.name == name {
                return Ok(entry);
            }
            if folded.is_none() && names_match(&entry.name, name) {
                folded = Some(entry);
            }
        }
        folded.ok_or(FatError::NotFound)
    }

    /// Copy file bytes starting at `offset` into `buf`, stopping at the end
    /// of the file. Returns the number of bytes copied.
    pub fn read_at(&self, file: &Metadata, offset: u64, buf: &mut [u8]) -> Result<usize, FatError> {
        if file.is_dir() {
            return Err(FatError::IsDir);
        }
        let size = u64::from(file.size);
        if offset >= size || buf.is_empty() {
            return Ok(0);
        }
        let len = (size - offset).min(buf.len() as u64) as usize;
        let cluster_bytes = u64::from(self.geometry.bytes_per_cluster);

        let mut chain = self.chain(file.cluster);
        let mut next = || chain.next().unwrap_or(Err(FatError::ShortChain { start: file.cluster }));
        for _ in 0..offset / cluster_bytes {
            next()?;
        }

        let mut within = (offset % cluster_bytes) as usize;
        let mut copied = 0usize;
        while copied < len {
            let cluster = next()?;
            let take = (cluster_bytes as usize - within).min(len - copied);
            let at = self.geometry.cluster_to_offset(cluster) + within as u64;
            self.dev.read_at(at, &mut buf[copied..copied + take])?;
            copied += take;
            within = 0;
        }
        Ok(copied)
    }
}

// ─── Helpers ───────────────────────────────────────────────────────────────────

/// Case-insensitive (ASCII) comparison used when no entry is spelled exactly as asked.
pub fn names_match(entry: &str, query: &str) -> bool {
    entry.eq_ignore_ascii_case(query)
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
