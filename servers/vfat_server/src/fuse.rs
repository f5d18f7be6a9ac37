//! FUSE adapter: inode-based kernel requests onto the path-based server.

use std::ffi::OsStr;
use std::time::Duration;

use anyhow::Context;
use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEntry, ReplyOpen,
    ReplyXattr, Request,
};
use vfat_api_types::fs::FileKind;
use vfat_impl::fat32::{BlockDev, Metadata};
use vfat_impl::host::{Inodes, MountArgs, canonical_child, join};
use vfat_impl::server::{VfatServer, XattrReply};

const TTL: Duration = Duration::from_secs(1);

pub struct VfatFs<D> {
    server: VfatServer<D>,
    inodes: Inodes,
}

impl<D: BlockDev> VfatFs<D> {
    pub fn new(server: VfatServer<D>) -> Self {
        Self { server, inodes: Inodes::new() }
    }

    fn attr(&self, ino: u64, meta: &Metadata) -> FileAttr {
        let size = u64::from(meta.size);
        FileAttr {
            ino,
            size,
            blocks:  size.div_ceil(512),
            atime:   meta.atime,
            mtime:   meta.mtime,
            ctime:   meta.ctime,
            crtime:  meta.ctime,
            kind:    file_type(meta.kind),
            perm:    meta.mode,
            nlink:   if meta.is_dir() { 2 } else { 1 },
            uid:     meta.uid,
            gid:     meta.gid,
            rdev:    0,
            blksize: self.server.volume().geometry().bytes_per_cluster,
            flags:   0,
        }
    }

    fn path(&self, ino: u64) -> Result<String, i32> {
        self.inodes.path(ino).map(str::to_string).ok_or(libc::ENOENT)
    }
}

fn file_type(kind: FileKind) -> FileType {
    match kind {
        FileKind::File => FileType::RegularFile,
        FileKind::Directory => FileType::Directory,
    }
}

impl<D: BlockDev> Filesystem for VfatFs<D> {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let (Ok(parent), Some(name)) = (self.path(parent), name.to_str()) else {
            return reply.error(libc::ENOENT);
        };
        match self.server.get_attributes(&join(&parent, name)) {
            Ok(meta) => {
                let ino = self.inodes.intern(canonical_child(&parent, name, &meta));
                reply.entry(&TTL, &self.attr(ino, &meta), 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        match self.server.get_attributes(&path) {
            Ok(meta) => reply.attr(&TTL, &self.attr(ino, &meta)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, _ino: u64, flags: i32, reply: ReplyOpen) {
        if flags & libc::O_ACCMODE != libc::O_RDONLY {
            return reply.error(libc::EROFS);
        }
        reply.opened(0, 0);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let Ok(offset) = u64::try_from(offset) else {
            return reply.error(libc::EINVAL);
        };
        match self.server.read(&path, size as usize, offset) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let entries = match self.server.list_directory(&path) {
            Ok(entries) => entries,
            Err(e) => return reply.error(e.errno()),
        };
        for slot in self.inodes.listing(ino, &path, entries, offset) {
            if reply.add(slot.ino, slot.offset, file_type(slot.kind), slot.name) {
                break;
            }
        }
        reply.ok();
    }

    fn getxattr(&mut self, _req: &Request<'_>, ino: u64, name: &OsStr, size: u32, reply: ReplyXattr) {
        let path = match self.path(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let Some(name) = name.to_str() else {
            return reply.error(libc::ENODATA);
        };
        match self.server.get_extended_attribute(&path, name, size as usize) {
            Ok(XattrReply::Size(len)) => reply.size(len as u32),
            Ok(XattrReply::Data(value)) => reply.data(&value),
            Err(e) => reply.error(e.errno()),
        }
    }
}

/// Serve `server` at the mountpoint until unmounted.
pub fn mount<D: BlockDev>(server: VfatServer<D>, args: &MountArgs) -> anyhow::Result<()> {
    log::info!(
        "serving {} on {} ({:?})",
        args.device.display(),
        args.mountpoint.display(),
        args.options
    );
    fuser::mount2(VfatFs::new(server), &args.mountpoint, &args.options)
        .with_context(|| format!("FUSE mount on {} failed", args.mountpoint.display()))
}
