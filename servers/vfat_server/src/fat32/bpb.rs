use super::error::FatError;
use super::{le16, le32};

/// Bytes of the boot sector the parser needs (fields plus the 0x55AA signature).
pub const BOOT_SECTOR_LEN: usize = 512;

/// Fewer data clusters than this means FAT12 or FAT16.
pub const MIN_FAT32_CLUSTERS: u32 = 65_525;

const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];
const FAT_MIRRORING_DISABLED: u16 = 0x0080;

// ─── BPB (BIOS Parameter Block) field offsets ──────────────────────────────────

const BPB_BYTES_PER_SECTOR:  usize = 11;
const BPB_SECTORS_PER_CLUS:  usize = 13;
const BPB_RESERVED_SECTORS:  usize = 14;
const BPB_NUM_FATS:          usize = 16;
const BPB_TOTAL_SECTORS_16:  usize = 19;
const BPB_FAT_SIZE_16:       usize = 22;
const BPB_TOTAL_SECTORS_32:  usize = 32;
// FAT32 extension
const BPB_FAT_SIZE_32:       usize = 36;
const BPB_EXT_FLAGS:         usize = 40;
const BPB_ROOT_CLUSTER:      usize = 44;

/// Layout of a mounted FAT32 volume. Computed once, never changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub bytes_per_sector:    u32,
    pub sectors_per_cluster: u32,
    pub bytes_per_cluster:   u32,
    pub reserved_sectors:    u32,
    pub fat_copies:          u32,
    /// Sectors per FAT copy.
    pub fat_size:            u32,
    pub total_sectors:       u32,
    /// Number of data clusters; valid cluster numbers are `2..=cluster_count + 1`.
    pub cluster_count:       u32,
    pub root_cluster:        u32,
    /// Index of the FAT copy in use.
    pub active_fat:          u32,
    /// Byte offset of the active FAT copy.
    pub fat_offset:          u64,
    /// Byte offset of cluster 2.
    pub cluster_offset:      u64,
}

impl Geometry {
    /// Parse the boot sector. Anything but FAT32 is refused.
    pub fn parse(sector: &[u8]) -> Result<Self, FatError> {
        if sector.len() < BOOT_SECTOR_LEN {
            return Err(FatError::InvalidBootSector("boot sector is truncated"));
        }
        if sector[510..512] != BOOT_SIGNATURE {
            return Err(FatError::InvalidBootSector("missing 0x55AA signature"));
        }

        let bytes_per_sector    = u32::from(le16(sector, BPB_BYTES_PER_SECTOR));
        let sectors_per_cluster = u32::from(sector[BPB_SECTORS_PER_CLUS]);
        let reserved_sectors    = u32::from(le16(sector, BPB_RESERVED_SECTORS));
        let fat_copies          = u32::from(sector[BPB_NUM_FATS]);
        let total_sectors_16    = u32::from(le16(sector, BPB_TOTAL_SECTORS_16));
        let fat_size_16         = u32::from(le16(sector, BPB_FAT_SIZE_16));
        let total_sectors_32    = le32(sector, BPB_TOTAL_SECTORS_32);
        let fat_size_32         = le32(sector, BPB_FAT_SIZE_32);
        let ext_flags           = le16(sector, BPB_EXT_FLAGS);
        let root_cluster        = le32(sector, BPB_ROOT_CLUSTER);

        if bytes_per_sector == 0 || sectors_per_cluster == 0 || fat_copies == 0 {
            return Err(FatError::InvalidBootSector("zero sector, cluster or FAT count"));
        }

        let fat_size      = if fat_size_16 != 0 { fat_size_16 } else { fat_size_32 };
        let total_sectors = if total_sectors_16 != 0 { total_sectors_16 } else { total_sectors_32 };
        if fat_size == 0 {
            return Err(FatError::InvalidBootSector("zero FAT size"));
        }

        let meta_sectors = fat_size
            .checked_mul(fat_copies)
            .and_then(|fats| fats.checked_add(reserved_sectors))
            .ok_or(FatError::InvalidBootSector("FAT region overflows"))?;
        let data_sectors = total_sectors
            .checked_sub(meta_sectors)
            .ok_or(FatError::InvalidBootSector("FAT region exceeds the volume"))?;
        let cluster_count = data_sectors / sectors_per_cluster;
        if cluster_count < MIN_FAT32_CLUSTERS {
            return Err(FatError::UnsupportedGeometry { clusters: cluster_count });
        }

        let active_fat = if ext_flags & FAT_MIRRORING_DISABLED != 0 {
            u32::from(ext_flags & 1)
        } else {
            0
        };

        let sector_bytes = u64::from(bytes_per_sector);
        let fat_offset = (u64::from(reserved_sectors) + u64::from(active_fat) * u64::from(fat_size_32))
            * sector_bytes;
        // The data region always follows exactly two FAT copies.
        let cluster_offset = (u64::from(reserved_sectors) + 2 * u64::from(fat_size)) * sector_bytes;

        Ok(Self {
            bytes_per_sector,
            sectors_per_cluster,
            bytes_per_cluster: bytes_per_sector * sectors_per_cluster,
            reserved_sectors,
            fat_copies,
            fat_size,
            total_sectors,
            cluster_count,
            root_cluster,
            active_fat,
            fat_offset,
            cluster_offset,
        })
    }

    /// Size in bytes of one FAT copy.
    pub fn fat_len(&self) -> usize {
        self.fat_size as usize * self.bytes_per_sector as usize
    }

    /// Highest valid cluster number.
    pub fn last_cluster(&self) -> u32 {
        self.cluster_count + 1
    }

    /// Byte offset of the first byte of `cluster`.
    pub fn cluster_to_offset(&self, cluster: u32) -> u64 {
        self.cluster_offset + u64::from(cluster - 2) * u64::from(self.bytes_per_cluster)
    }

    /// Number of 32-byte directory slots in one cluster.
    pub fn slots_per_cluster(&self) -> usize {
        self.bytes_per_cluster as usize / super::dir::DIR_ENTRY_SIZE
    }
}
