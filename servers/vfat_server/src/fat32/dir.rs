use std::time::SystemTime;

use vfat_api_types::ENTRY_MODE;
use vfat_api_types::fs::FileKind;

use super::datetime::dos_to_system_time;
use super::device::BlockDev;
use super::error::FatError;
use super::fat::Chain;
use super::lfn::{LfnFragment, LongName};
use super::{Volume, le16, le32};

pub const DIR_ENTRY_SIZE: usize = 32;

const ATTR_VOLUME_ID: u8 = 0x08;
const ATTR_DIRECTORY: u8 = 0x10;
const ATTR_LFN:       u8 = 0x0F;
const SLOT_END:       u8 = 0x00;
const SLOT_DELETED:   u8 = 0xE5;

// ─── Raw slot decoding ─────────────────────────────────────────────────────────

/// A regular (8.3) directory entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortEntry {
    /// 8-byte base and 3-byte extension, space padded.
    pub name:        [u8; 11],
    pub attr:        u8,
    pub create_time: u16,
    pub create_date: u16,
    pub access_date: u16,
    pub modify_time: u16,
    pub modify_date: u16,
    pub cluster:     u32,
    pub size:        u32,
}

impl ShortEntry {
    fn decode(slot: &[u8]) -> Self {
        let mut name = [0u8; 11];
        name.copy_from_slice(&slot[..11]);
        Self {
            name,
            attr:        slot[11],
            create_time: le16(slot, 14),
            create_date: le16(slot, 16),
            access_date: le16(slot, 18),
            modify_time: le16(slot, 22),
            modify_date: le16(slot, 24),
            cluster:     (u32::from(le16(slot, 20)) << 16) | u32::from(le16(slot, 26)),
            size:        le32(slot, 28),
        }
    }

    pub fn is_dir(&self) -> bool { self.attr & ATTR_DIRECTORY != 0 }

    /// The legacy 8.3 name, e.g. `"HELLO   TXT"` → `"HELLO.TXT"`, `"MAKEFILE   "` → `"MAKEFILE"`.
    pub fn short_name(&self) -> String {
        let (base, ext) = self.name.split_at(8);
        let base = trim_padding(base);
        let ext = trim_padding(ext);
        let mut out = String::from_utf8_lossy(base).into_owned();
        if !ext.is_empty() {
            out.push('.');
            out.push_str(&String::from_utf8_lossy(ext));
        }
        out
    }
}

fn trim_padding(field: &[u8]) -> &[u8] {
    let end = field.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    &field[..end]
}

/// One 32-byte directory slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    /// First byte zero: no entries follow.
    End,
    Deleted,
    VolumeLabel,
    LongName(LfnFragment),
    Short(ShortEntry),
}

impl Slot {
    pub fn decode(slot: &[u8]) -> Self {
        match slot[0] {
            SLOT_END => return Slot::End,
            SLOT_DELETED => return Slot::Deleted,
            _ => {}
        }
        let attr = slot[11];
        if attr & ATTR_LFN == ATTR_LFN {
            Slot::LongName(LfnFragment::decode(slot))
        } else if attr & ATTR_VOLUME_ID != 0 {
            Slot::VolumeLabel
        } else {
            Slot::Short(ShortEntry::decode(slot))
        }
    }
}

// ─── Metadata ──────────────────────────────────────────────────────────────────

/// Attributes of a file or directory, as handed to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub name:    String,
    pub kind:    FileKind,
    pub size:    u32,
    /// First cluster of the data; zero for empty files.
    pub cluster: u32,
    pub atime:   SystemTime,
    pub mtime:   SystemTime,
    pub ctime:   SystemTime,
    pub uid:     u32,
    pub gid:     u32,
    pub mode:    u16,
}

impl Metadata {
    pub fn is_dir(&self) -> bool { self.kind == FileKind::Directory }
}

// ─── Directory scan ────────────────────────────────────────────────────────────

/// Lazy scan over the entries of one directory.
///
/// Yields one `Metadata` per short entry, named by its long name when a
/// matching one precedes it. Dropping the iterator stops the scan; calling
/// `Volume::dir_entries` again starts over. Errors end the scan.
pub struct DirEntries<'v, D> {
    volume:  &'v Volume<D>,
    chain:   Chain<'v>,
    cluster: Vec<u8>,
    slot:    usize,
    lfn:     LongName,
    done:    bool,
}

impl<'v, D: BlockDev> DirEntries<'v, D> {
    pub(super) fn new(volume: &'v Volume<D>, chain: Chain<'v>) -> Self {
        let slots = volume.geometry().slots_per_cluster();
        Self {
            volume,
            chain,
            cluster: vec![0u8; volume.geometry().bytes_per_cluster as usize],
            slot: slots,
            lfn: LongName::default(),
            done: false,
        }
    }

    /// Load the next cluster of the directory. `Ok(false)` at end of chain.
    fn load_next_cluster(&mut self) -> Result<bool, FatError> {
        let Some(cluster) = self.chain.next().transpose()? else {
            return Ok(false);
        };
        let offset = self.volume.geometry().cluster_to_offset(cluster);
        self.volume.device().read_at(offset, &mut self.cluster)?;
        self.slot = 0;
        Ok(true)
    }

    fn finalize(&mut self, entry: ShortEntry) -> Metadata {
        let name = self.lfn.take(&entry.name).unwrap_or_else(|| entry.short_name());
        let owner = self.volume.owner();
        Metadata {
            name,
            kind: if entry.is_dir() { FileKind::Directory } else { FileKind::File },
            size: entry.size,
            cluster: entry.cluster,
            atime: dos_to_system_time(entry.access_date, 0),
            mtime: dos_to_system_time(entry.modify_date, entry.modify_time),
            ctime: dos_to_system_time(entry.create_date, entry.create_time),
            uid: owner.uid,
            gid: owner.gid,
            mode: ENTRY_MODE,
        }
    }
}

impl<D: BlockDev> Iterator for DirEntries<'_, D> {
    type Item = Result<Metadata, FatError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.slot == self.volume.geometry().slots_per_cluster() {
                match self.load_next_cluster() {
                    Ok(true) => {}
                    Ok(false) => self.done = true,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
                continue;
            }

            let start = self.slot * DIR_ENTRY_SIZE;
            let slot = Slot::decode(&self.cluster[start..start + DIR_ENTRY_SIZE]);
            self.slot += 1;

            match slot {
                Slot::End => self.done = true,
                Slot::Deleted => {}
                Slot::VolumeLabel => self.lfn.reset(),
                Slot::LongName(frag) => self.lfn.feed(&frag),
                Slot::Short(entry) => return Some(Ok(self.finalize(entry))),
            }
        }
        None
    }
}
