pub mod fs;

/// Paths under this prefix belong to the diagnostic filesystem, not the volume.
pub const DEBUGFS_PATH: &str = "/.debug";

/// Extended attribute exposing an entry's starting cluster as a decimal string.
pub const XATTR_DEBUG_CLUSTER: &str = "debug.cluster";

/// Permission bits reported for every entry decoded from a directory.
/// FAT stores no Unix permissions, so everything is rwx for everyone.
pub const ENTRY_MODE: u16 = 0o777;

/// Permission bits of the synthesized root directory.
pub const ROOT_MODE: u16 = 0o555;
