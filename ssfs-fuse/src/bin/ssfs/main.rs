mod cli;

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use ssfs::ShadowFileSystem;
use ssfs_fuse::{BlockFile, Error};
use typed_bytesize::ByteSizeIec;

use self::cli::{Cli, Command, VolumeCommand};

fn main() -> Result<(), Error> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Format {
            num_blocks,
            num_files,
        } => format(&cli.image, cli.block_size, num_blocks, num_files),
        Command::Volume(command) => {
            let disk = BlockFile::open(&cli.image, cli.block_size)?;
            let mut fs = ShadowFileSystem::load(Arc::new(disk))?;
            run(&mut fs, command)
        }
    }
}

fn format(
    image: &Path,
    block_size: usize,
    num_blocks: usize,
    num_files: usize,
) -> Result<(), Error> {
    let disk = BlockFile::init_fresh_disk(image, block_size, num_blocks)?;
    let fs = ShadowFileSystem::format(Arc::new(disk), num_files)?;
    println!(
        "{image:?}: {} volume, {num_files} files, {} free",
        ByteSizeIec((block_size * num_blocks) as u64),
        ByteSizeIec((fs.free_blocks() * block_size) as u64)
    );
    Ok(())
}

fn run(fs: &mut ShadowFileSystem, command: VolumeCommand) -> Result<(), Error> {
    match command {
        VolumeCommand::Ls => {
            for (fid, name) in fs.files() {
                println!("{fid:>4} {:>10} {name}", fs.file_size(name)?);
            }
        }
        VolumeCommand::Put { source, name } => {
            let name = match name {
                Some(name) => name,
                None => source
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(str::to_owned)
                    .ok_or_else(|| ssfs::Error::InvalidName(source.display().to_string()))?,
            };
            let data = std::fs::read(&source)?;
            ssfs_fuse::put(fs, &name, &data)?;
        }
        VolumeCommand::Cat { name } => {
            let size = fs.file_size(&name)?;
            let fid = fs.open(&name)?;
            let mut buf = vec![0; size];
            let len = fs.read(fid, &mut buf)?;
            fs.close(fid)?;
            io::stdout().write_all(&buf[..len])?;
        }
        VolumeCommand::Rm { name } => fs.remove(&name)?,
        VolumeCommand::Commit => println!("committed to shadow slot {}", fs.commit()?),
        VolumeCommand::Restore { slot } => fs.restore(slot)?,
        VolumeCommand::Info => {
            let geometry = fs.geometry();
            println!(
                "blocks:  {} x {} bytes",
                geometry.num_blocks, geometry.block_size
            );
            println!("files:   {} / {}", fs.files().count(), geometry.num_files);
            println!(
                "free:    {} blocks ({})",
                fs.free_blocks(),
                ByteSizeIec((fs.free_blocks() * geometry.block_size) as u64)
            );
            println!(
                "largest: {}",
                ByteSizeIec(geometry.max_file_size() as u64)
            );
            for slot in fs.shadows() {
                let last = if fs.last_shadow() == Some(slot) { " (last)" } else { "" };
                println!("shadow:  {slot}{last}");
            }
        }
    }

    Ok(())
}
