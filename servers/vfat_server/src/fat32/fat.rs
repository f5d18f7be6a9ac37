use super::device::Region;
use super::error::FatError;

/// First value of the end-of-chain range (0x0FFFFFF8..=0x0FFFFFFF).
pub const FAT32_EOC:   u32 = 0x0FFF_FFF8;
pub const FAT32_BAD:   u32 = 0x0FFF_FFF7;
const FAT_ENTRY_MASK:  u32 = 0x0FFF_FFFF;
const FAT_ENTRY_SIZE:  usize = 4;

pub fn is_eoc(value: u32) -> bool { value >= FAT32_EOC }

/// The active FAT copy, mapped read-only for the life of the volume.
pub struct FatTable {
    region: Region,
}

impl FatTable {
    pub fn new(region: Region) -> Self {
        Self { region }
    }

    /// Number of entries the mapped table holds.
    pub fn len(&self) -> usize {
        self.region.len() / FAT_ENTRY_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw FAT value stored for `cluster`, upper four reserved bits cleared.
    /// Values `>= FAT32_EOC` end the chain.
    pub fn next_cluster(&self, cluster: u32) -> Result<u32, FatError> {
        let off = cluster as usize * FAT_ENTRY_SIZE;
        let raw = self
            .region
            .get(off..off + FAT_ENTRY_SIZE)
            .ok_or(FatError::InvalidCluster(cluster))?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) & FAT_ENTRY_MASK)
    }

    /// Walk the chain starting at `start`, refusing to visit more than
    /// `max_len` clusters or any cluster above `last_cluster`.
    pub fn chain(&self, start: u32, last_cluster: u32, max_len: u32) -> Chain<'_> {
        Chain { fat: self, start, cursor: Some(start), visited: 0, last_cluster, max_len }
    }
}

/// Iterator over the clusters of one chain, in order.
///
/// Any error is yielded once and ends the iteration.
pub struct Chain<'a> {
    fat:          &'a FatTable,
    start:        u32,
    cursor:       Option<u32>,
    visited:      u32,
    last_cluster: u32,
    max_len:      u32,
}

impl Iterator for Chain<'_> {
    type Item = Result<u32, FatError>;

    fn next(&mut self) -> Option<Self::Item> {
        let cluster = self.cursor.take()?;
        if !(2..=self.last_cluster).contains(&cluster) {
            return Some(Err(FatError::InvalidCluster(cluster)));
        }
        // A well-formed chain cannot be longer than the volume.
        if self.visited == self.max_len {
            return Some(Err(FatError::ChainLoop { start: self.start }));
        }
        self.visited += 1;

        match self.fat.next_cluster(cluster) {
            Ok(value) if is_eoc(value) => {}
            Ok(value) if value < 2 || value == FAT32_BAD => {
                return Some(Err(FatError::BrokenChain { cluster, value }));
            }
            Ok(value) => self.cursor = Some(value),
            Err(e) => return Some(Err(e)),
        }
        Some(Ok(cluster))
    }
}
