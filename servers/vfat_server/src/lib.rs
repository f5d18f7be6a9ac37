// Library crate root: the FAT32 core, the operation surface and the host-side
// bookkeeping, tested on the host. The binary adds logging and the FUSE glue.

pub mod fat32;
pub mod host;
pub mod server;
