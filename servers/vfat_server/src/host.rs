//! Host-side bookkeeping for the FUSE adapter: the command line, mount
//! options, the inode table and `readdir` listings.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use fuser::{FUSE_ROOT_ID, MountOption};
use vfat_api_types::fs::FileKind;

use crate::fat32::Metadata;

// ─── Command line ──────────────────────────────────────────────────────────────

/// Mount a FAT32 image or block device read-only through FUSE.
///
/// The first argument that is not an option names the device and the next
/// one the mountpoint. Options (`-o list`, `-f`, `-d`, `-s`) may come anywhere.
#[derive(Parser, Debug)]
#[command(name = "vfat_server", version, about)]
pub struct Cli {
    /// DEVICE, MOUNTPOINT and FUSE options, in any order
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<OsString>,
}

/// What to mount where, and how.
#[derive(Debug, PartialEq, Eq)]
pub struct MountArgs {
    pub device:     PathBuf,
    pub mountpoint: PathBuf,
    /// Always contains `RO` and an `FSName`.
    pub options:    Vec<MountOption>,
}

impl MountArgs {
    pub fn parse(args: &[OsString]) -> anyhow::Result<Self> {
        let mut positional = Vec::new();
        let mut options = vec![MountOption::RO];
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.to_str() {
                Some("-o") => {
                    let list = iter.next().context("-o needs an option list")?;
                    let list = list.to_str().context("mount options must be valid UTF-8")?;
                    options.extend(list.split(',').filter_map(parse_option));
                }
                Some(s) if s.starts_with("-o") => options.extend(s[2..].split(',').filter_map(parse_option)),
                Some(flag @ ("-f" | "-s" | "-d")) => log::debug!("ignoring mount flag {flag}"),
                Some(s) if s.starts_with('-') => bail!("unsupported mount flag {s}"),
                _ => positional.push(PathBuf::from(arg)),
            }
        }

        let mut positional = positional.into_iter();
        let device = positional.next().context("missing device path")?;
        let mountpoint = positional.next().context("missing mountpoint")?;
        if let Some(extra) = positional.next() {
            bail!("unexpected extra argument {}", extra.display());
        }
        if !options.iter().any(|o| matches!(o, MountOption::FSName(_))) {
            options.push(MountOption::FSName(device.display().to_string()));
        }
        Ok(Self { device, mountpoint, options })
    }
}

fn parse_option(opt: &str) -> Option<MountOption> {
    Some(match opt {
        "" | "ro" => return None,
        "rw" => {
            log::warn!("ignoring `rw`: the volume is mounted read-only");
            return None;
        }
        "allow_other" => MountOption::AllowOther,
        "allow_root" => MountOption::AllowRoot,
        "auto_unmount" => MountOption::AutoUnmount,
        "default_permissions" => MountOption::DefaultPermissions,
        "nodev" => MountOption::NoDev,
        "nosuid" => MountOption::NoSuid,
        "noexec" => MountOption::NoExec,
        "noatime" => MountOption::NoAtime,
        _ => match opt.split_once('=') {
            Some(("fsname", v)) => MountOption::FSName(v.to_string()),
            Some(("subtype", v)) => MountOption::Subtype(v.to_string()),
            _ => MountOption::CUSTOM(opt.to_string()),
        },
    })
}

// ─── Inode table ───────────────────────────────────────────────────────────────

/// Paths handed out to the kernel, indexed by `ino - 1`. Entries are never
/// forgotten; the volume is read-only so a path keeps its meaning.
pub struct Inodes {
    paths:   Vec<String>,
    by_path: HashMap<String, u64>,
}

/// One `readdir` reply entry. `offset` is where the next call resumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirSlot {
    pub ino:    u64,
    pub kind:   FileKind,
    pub name:   String,
    pub offset: i64,
}

impl Inodes {
    pub fn new() -> Self {
        let root = String::from("/");
        Self { by_path: HashMap::from([(root.clone(), FUSE_ROOT_ID)]), paths: vec![root] }
    }

    pub fn intern(&mut self, path: String) -> u64 {
        if let Some(&ino) = self.by_path.get(&path) {
            return ino;
        }
        self.paths.push(path.clone());
        let ino = self.paths.len() as u64;
        self.by_path.insert(path, ino);
        ino
    }

    pub fn path(&self, ino: u64) -> Option<&str> {
        let index = usize::try_from(ino.checked_sub(1)?).ok()?;
        self.paths.get(index).map(String::as_str)
    }

    /// Entries of directory `ino` (at `path`) from `offset` on. `.` and `..`
    /// are synthesized since the root directory has none on disk.
    pub fn listing(&mut self, ino: u64, path: &str, entries: Vec<Metadata>, offset: i64) -> Vec<DirSlot> {
        let parent = self.intern(parent_of(path).to_string());
        let mut all = vec![
            (ino, FileKind::Directory, String::from(".")),
            (parent, FileKind::Directory, String::from("..")),
        ];
        for entry in entries.into_iter().filter(|e| e.name != "." && e.name != "..") {
            let child = self.intern(join(path, &entry.name));
            all.push((child, entry.kind, entry.name));
        }

        let skip = usize::try_from(offset).unwrap_or(0);
        all.into_iter()
            .enumerate()
            .skip(skip)
            .map(|(i, (ino, kind, name))| DirSlot { ino, kind, name, offset: i as i64 + 1 })
            .collect()
    }
}

impl Default for Inodes {
    fn default() -> Self {
        Self::new()
    }
}

pub fn join(parent: &str, name: &str) -> String {
    match name {
        "." => parent.to_string(),
        ".." => parent_of(parent).to_string(),
        _ if parent == "/" => format!("/{name}"),
        _ => format!("{parent}/{name}"),
    }
}

pub fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

/// Path to key the inode of `requested` under `parent` by. Lookups may match
/// another spelling, so the on-disk name of `found` is used.
pub fn canonical_child(parent: &str, requested: &str, found: &Metadata) -> String {
    match requested {
        "." | ".." => join(parent, requested),
        _ => join(parent, &found.name),
    }
}

// ─── Unit tests ────────────────────────────────────────────────────────────────
