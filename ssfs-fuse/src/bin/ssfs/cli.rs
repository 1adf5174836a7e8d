use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ssfs::config::{BLOCK_SIZE, NUM_BLOCKS, NUM_FILES};

#[derive(Parser)]
#[command(version, about = "Inspect and modify an ssfs disk image")]
pub struct Cli {
    /// Disk image
    #[arg(long, short, default_value = "ssfs.img")]
    pub image: PathBuf,

    /// Block size of the image in bytes
    #[arg(long, short, default_value_t = BLOCK_SIZE)]
    pub block_size: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the image and format an empty volume on it
    Format {
        /// Number of blocks on the device
        #[arg(long, short, default_value_t = NUM_BLOCKS)]
        num_blocks: usize,

        /// Number of file slots
        #[arg(long, short = 'f', default_value_t = NUM_FILES)]
        num_files: usize,
    },

    #[command(flatten)]
    Volume(VolumeCommand),
}

/// Commands that work on an already formatted image
#[derive(Subcommand)]
pub enum VolumeCommand {
    /// List the files in the directory
    Ls,

    /// Copy a host file into the volume, replacing any file of the same name
    Put {
        source: PathBuf,

        /// Name inside the volume, defaults to the host file name
        #[arg(long, short)]
        name: Option<String>,
    },

    /// Write a file's content to stdout
    Cat { name: String },

    /// Remove a file
    Rm { name: String },

    /// Save the current state into the next shadow slot
    Commit,

    /// Roll the volume back to a shadow slot
    Restore { slot: usize },

    /// Show geometry, free space and shadow slots
    Info,
}
