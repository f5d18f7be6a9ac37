use std::io;

use thiserror::Error;
use vfat_api_types::fs::FsResult;

#[derive(Debug, Error)]
pub enum FatError {
    #[error("no such file or directory")]
    NotFound,
    #[error("not a directory")]
    NotDir,
    #[error("is a directory")]
    IsDir,
    #[error("invalid boot sector: {0}")]
    InvalidBootSector(&'static str),
    #[error("volume has {clusters} clusters; FAT12/FAT16 volumes are not supported")]
    UnsupportedGeometry { clusters: u32 },
    #[error("cluster {0} lies outside the volume")]
    InvalidCluster(u32),
    #[error("cluster chain starting at {start} does not terminate")]
    ChainLoop { start: u32 },
    #[error("cluster chain broken at cluster {cluster} (FAT value {value:#010x})")]
    BrokenChain { cluster: u32, value: u32 },
    #[error("cluster chain starting at {start} ends before the recorded file size")]
    ShortChain { start: u32 },
    #[error("device read failed: {0}")]
    Io(#[from] io::Error),
}

impl FatError {
    /// Result code reported to the host for this error.
    pub fn result(&self) -> FsResult {
        match self {
            FatError::NotFound => FsResult::NotFound,
            FatError::NotDir => FsResult::NotDir,
            FatError::IsDir => FsResult::IsDir,
            FatError::Io(_) => FsResult::IoError,
            FatError::InvalidBootSector(_)
            | FatError::UnsupportedGeometry { .. }
            | FatError::InvalidCluster(_)
            | FatError::ChainLoop { .. }
            | FatError::BrokenChain { .. }
            | FatError::ShortChain { .. } => FsResult::Corrupted,
        }
    }
}
