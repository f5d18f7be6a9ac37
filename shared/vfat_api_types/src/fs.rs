/// Kind of a node as seen by the host mount layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// Failure codes returned by the filesystem operations.
#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsResult {
    NotFound    = 1,
    IsDir       = 2,
    NotDir      = 3,
    IoError     = 4,
    NoAttribute = 5,
    Range       = 6,
    /// On-disk structures are inconsistent (bad geometry, broken or looping chain).
    Corrupted   = 7,
}

impl FsResult {
    /// errno value handed back to the host.
    pub fn errno(self) -> i32 {
        match self {
            FsResult::NotFound    => libc::ENOENT,
            FsResult::IsDir       => libc::EISDIR,
            FsResult::NotDir      => libc::ENOTDIR,
            FsResult::IoError     => libc::EIO,
            FsResult::NoAttribute => libc::ENODATA,
            FsResult::Range       => libc::ERANGE,
            FsResult::Corrupted   => libc::EIO,
        }
    }
}
