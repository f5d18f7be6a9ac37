//! Fixture images for the unit tests.
//!
//! `fatfs` formats and populates realistic volumes; `ImageBuilder` lays out
//! slots and FAT links byte by byte for the cases `fatfs` will not produce
//! (broken long names, loops, truncated chains).

use std::io::{Cursor, Write};
use std::time::{Duration, UNIX_EPOCH};

use super::lfn::{LFN_CHARS, LFN_LAST, lfn_checksum};
use super::{MemDisk, MountContext, Volume};

pub const UID: u32 = 1000;
pub const GID: u32 = 100;

pub fn ctx() -> MountContext {
    MountContext { uid: UID, gid: GID, time: UNIX_EPOCH + Duration::from_secs(1_700_000_000) }
}

// ── fatfs-built images ───────────────────────────────────────────────────────

pub const README_CONTENT: &[u8] = b"top level readme\n";
pub const NOTES_CONTENT:  &[u8] = b"notes kept in a subdirectory\n";
pub const DEEP_CONTENT:   &[u8] = b"two levels down; long enough to be more than a handful of bytes \
and short enough to stay in one cluster.\n";

fn format(size: usize, fat_type: fatfs::FatType, bytes_per_cluster: u32) -> MemDisk {
    let mut cursor = Cursor::new(vec![0u8; size]);
    fatfs::format_volume(
        &mut cursor,
        fatfs::FormatVolumeOptions::new()
            .fat_type(fat_type)
            .bytes_per_cluster(bytes_per_cluster),
    )
    .expect("format_volume failed");
    MemDisk(cursor.into_inner())
}

/// Empty FAT32 volume. 512-byte clusters keep 40 MiB above the 65 525-cluster
/// FAT32 minimum and make multi-cluster files and directories cheap.
pub fn make_disk() -> MemDisk {
    format(40 * 1024 * 1024, fatfs::FatType::Fat32, 512)
}

/// A valid FAT16 volume, which the driver must refuse.
pub fn make_fat16_disk() -> MemDisk {
    format(16 * 1024 * 1024, fatfs::FatType::Fat16, 2048)
}

pub fn disk_with_file(name: &str, content: &[u8]) -> MemDisk {
    let mut disk = make_disk();
    {
        let mut cursor = Cursor::new(&mut disk.0);
        let fs = fatfs::FileSystem::new(&mut cursor, fatfs::FsOptions::new())
            .expect("FileSystem::new failed");
        let mut f = fs.root_dir().create_file(name).expect("create_file failed");
        f.truncate().unwrap();
        f.write_all(content).unwrap();
    }
    disk
}

/// Root directory holding one file per name, each containing its own name.
pub fn disk_with_files(names: &[&str]) -> MemDisk {
    let mut disk = make_disk();
    {
        let mut cursor = Cursor::new(&mut disk.0);
        let fs = fatfs::FileSystem::new(&mut cursor, fatfs::FsOptions::new()).unwrap();
        for name in names {
            let mut f = fs.root_dir().create_file(name).unwrap();
            f.write_all(name.as_bytes()).unwrap();
        }
    }
    disk
}

/// `/README.TXT`, `/DOCS/NOTES.TXT`, `/DOCS/SUB/DEEP.BIN`.
pub fn disk_with_tree() -> MemDisk {
    let mut disk = make_disk();
    {
        let mut cursor = Cursor::new(&mut disk.0);
        let fs = fatfs::FileSystem::new(&mut cursor, fatfs::FsOptions::new()).unwrap();
        let root = fs.root_dir();
        let mut readme = root.create_file("README.TXT").unwrap();
        readme.write_all(README_CONTENT).unwrap();
        let docs = root.create_dir("DOCS").unwrap();
        let mut notes = docs.create_file("NOTES.TXT").unwrap();
        notes.write_all(NOTES_CONTENT).unwrap();
        let sub = docs.create_dir("SUB").unwrap();
        let mut deep = sub.create_file("DEEP.BIN").unwrap();
        deep.write_all(DEEP_CONTENT).unwrap();
    }
    disk
}

// ── hand-built images ────────────────────────────────────────────────────────

/// Data clusters declared by `ImageBuilder` images (one 512-byte sector each).
pub const BUILDER_CLUSTERS: u32 = 70_000;

const SECTOR:            usize = 512;
const RESERVED_SECTORS:  u32 = 32;
const FAT_SECTORS:       u32 = 548; // 70 002 entries of 4 bytes
const SLOTS_PER_CLUSTER: usize = SECTOR / 32;
const FAT_OFFSET:        usize = RESERVED_SECTORS as usize * SECTOR;
const DATA_OFFSET:       usize = (RESERVED_SECTORS + 2 * FAT_SECTORS) as usize * SECTOR;
/// Extra root directory clusters are taken from here up.
const ROOT_OVERFLOW:     u32 = 100;

/// FAT32 image whose clusters are materialized only when written; reading a
/// cluster that was never written fails like a short device.
pub struct ImageBuilder {
    data: Vec<u8>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        let mut data = vec![0u8; DATA_OFFSET + SECTOR];
        let total = RESERVED_SECTORS + 2 * FAT_SECTORS + BUILDER_CLUSTERS;
        data[11..13].copy_from_slice(&(SECTOR as u16).to_le_bytes());
        data[13] = 1;
        data[14..16].copy_from_slice(&(RESERVED_SECTORS as u16).to_le_bytes());
        data[16] = 2;
        data[21] = 0xF8;
        data[32..36].copy_from_slice(&total.to_le_bytes());
        data[36..40].copy_from_slice(&FAT_SECTORS.to_le_bytes());
        data[44..48].copy_from_slice(&2u32.to_le_bytes());
        data[510] = 0x55;
        data[511] = 0xAA;

        let mut img = Self { data };
        img.link(0, 0x0FFF_FFF8);
        img.link(1, 0x0FFF_FFFF);
        img.link(2, 0x0FFF_FFFF);
        img
    }

    /// Set the FAT entry of `cluster` in both copies.
    pub fn link(&mut self, cluster: u32, next: u32) {
        for copy in 0..2 {
            let off = FAT_OFFSET + copy * FAT_SECTORS as usize * SECTOR + cluster as usize * 4;
            self.data[off..off + 4].copy_from_slice(&next.to_le_bytes());
        }
    }

    /// Write `bytes` at the start of `cluster`.
    pub fn cluster(&mut self, cluster: u32, bytes: &[u8]) {
        assert!(bytes.len() <= SECTOR);
        let off = DATA_OFFSET + (cluster as usize - 2) * SECTOR;
        if self.data.len() < off + SECTOR {
            self.data.resize(off + SECTOR, 0);
        }
        self.data[off..off + bytes.len()].copy_from_slice(bytes);
    }

    /// Lay `slots` out as the root directory, chaining more clusters as needed.
    pub fn root_slots(&mut self, slots: &[[u8; 32]]) {
        let mut cluster = 2;
        for (i, chunk) in slots.chunks(SLOTS_PER_CLUSTER).enumerate() {
            if i > 0 {
                let next = ROOT_OVERFLOW + i as u32 - 1;
                self.link(cluster, next);
                cluster = next;
            }
            self.cluster(cluster, &chunk.concat());
            self.link(cluster, 0x0FFF_FFFF);
        }
    }

    pub fn disk(self) -> MemDisk {
        MemDisk(self.data)
    }

    pub fn mount(self) -> Volume<MemDisk> {
        Volume::mount(self.disk(), ctx()).expect("builder image must mount")
    }
}

/// A short directory entry; `name` is the 11-byte padded field.
pub fn short_slot(name: &[u8], attr: u8, cluster: u32, size: u32) -> [u8; 32] {
    assert_eq!(name.len(), 11);
    let mut s = [0u8; 32];
    s[..11].copy_from_slice(name);
    s[11] = attr;
    s[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
    s[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
    s[28..32].copy_from_slice(&size.to_le_bytes());
    s
}

/// One long-name fragment holding up to 13 code units.
pub fn lfn_slot(sequence: u8, checksum: u8, units: &[u16]) -> [u8; 32] {
    let mut padded = [0xFFFFu16; LFN_CHARS];
    padded[..units.len()].copy_from_slice(units);
    if units.len() < LFN_CHARS {
        padded[units.len()] = 0x0000;
    }
    let mut s = [0u8; 32];
    s[0] = sequence;
    s[11] = 0x0F;
    s[13] = checksum;
    for (i, unit) in padded.iter().enumerate() {
        let off = match i {
            0..=4 => 1 + i * 2,
            5..=10 => 14 + (i - 5) * 2,
            _ => 28 + (i - 11) * 2,
        };
        s[off..off + 2].copy_from_slice(&unit.to_le_bytes());
    }
    s
}

/// All fragments of `name` bound to `short`, in on-disk order (last fragment first).
pub fn lfn_slots(name: &str, short: &[u8; 11]) -> Vec<[u8; 32]> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let chunks: Vec<&[u16]> = units.chunks(LFN_CHARS).collect();
    let checksum = lfn_checksum(short);
    (0..chunks.len())
        .rev()
        .map(|i| {
            let mut sequence = (i + 1) as u8;
            if i == chunks.len() - 1 {
                sequence |= LFN_LAST;
            }
            lfn_slot(sequence, checksum, chunks[i])
        })
        .collect()
}

/// Split a name into the padded, upper-cased 8.3 fields.
pub fn split_83(filename: &str) -> ([u8; 8], [u8; 3]) {
    let mut name = [b' '; 8];
    let mut ext  = [b' '; 3];
    let (base, extension) = match filename.rfind('.') {
        Some(i) => (&filename[..i], &filename[i + 1..]),
        None    => (filename, ""),
    };
    for (i, b) in base.bytes().take(8).enumerate()      { name[i] = b.to_ascii_uppercase(); }
    for (i, b) in extension.bytes().take(3).enumerate() { ext[i]  = b.to_ascii_uppercase(); }
    (name, ext)
}
