mod fuse;
mod logger;

use anyhow::Context;
use clap::Parser;
use vfat_impl::fat32::{ImageFile, MountContext, Volume};
use vfat_impl::host::{Cli, MountArgs};
use vfat_impl::server::VfatServer;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(logger::level_from_env()).context("failed to install logger")?;
    let args = MountArgs::parse(&cli.args)?;

    let dev = ImageFile::open(&args.device)
        .with_context(|| format!("failed to open {}", args.device.display()))?;
    let volume = Volume::mount(dev, MountContext::current())
        .with_context(|| format!("{} is not a usable FAT32 volume", args.device.display()))?;

    fuse::mount(VfatServer::new(volume), &args)
}
