//! packrat command line interface

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use packrat::{
    count_entries, list, pack, unpack, Config, EntryDescriptor, FileType, PackOptions,
    UnpackOptions,
};
use packrat::types::{format_mode, format_size};

#[derive(Parser)]
#[command(name = "packrat")]
#[command(about = "file-tree backup - metadata-preserving archives with optional compression")]
#[command(version)]
struct Cli {
    /// config file with defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// pack files and directories into an archive
    Pack {
        /// source paths to back up
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// archive file to write
        #[arg(short, long)]
        output: PathBuf,

        /// huffman-compress the archive
        #[arg(long)]
        compress: bool,
    },

    /// restore an archive into a directory
    Unpack {
        /// archive file to read
        archive: PathBuf,

        /// destination directory
        destination: PathBuf,
    },

    /// list archive contents without restoring
    List {
        /// archive file to read
        archive: PathBuf,

        /// long listing with permissions, sizes and times
        #[arg(short, long)]
        long: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> packrat::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Pack {
            sources,
            output,
            compress,
        } => {
            let opts = PackOptions {
                compress: compress || config.compress,
                buffer_size: config.copy_buffer,
                ..Default::default()
            };

            let total = count_entries(&sources);
            let file = File::create(&output).map_err(|source| packrat::Error::Open {
                path: output.clone(),
                source,
            })?;
            let stats = pack(&sources, file, &opts)?;

            println!(
                "packed {} of {} entries into {} ({} of file data, {} hardlinks, {} skipped)",
                stats.entries,
                total,
                output.display(),
                format_size(stats.file_bytes),
                stats.hardlinks,
                stats.skipped,
            );
        }

        Commands::Unpack {
            archive,
            destination,
        } => {
            let file = File::open(&archive).map_err(|source| packrat::Error::Open {
                path: archive.clone(),
                source,
            })?;
            let opts = UnpackOptions {
                buffer_size: config.copy_buffer,
                ..Default::default()
            };
            unpack(file, &destination, &opts)?;

            println!("restored {} to {}", archive.display(), destination.display());
        }

        Commands::List { archive, long } => {
            let file = File::open(&archive).map_err(|source| packrat::Error::Open {
                path: archive.clone(),
                source,
            })?;

            for entry in list(file)? {
                if long {
                    println!("{}", long_line(&entry));
                } else {
                    println!("{}", entry.path);
                }
            }
        }
    }

    Ok(())
}

fn long_line(entry: &EntryDescriptor) -> String {
    let meta = &entry.meta;
    let mtime = chrono::DateTime::from_timestamp(meta.mtime, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| meta.mtime.to_string());

    let suffix = if meta.file_type == FileType::Symlink {
        format!(" -> {}", meta.link_target)
    } else if meta.hardlink_ref {
        format!(" link to {}", meta.link_target)
    } else {
        String::new()
    };

    format!(
        "{} {:>5} {:>5} {:>9} {} {}{}",
        format_mode(meta.mode, meta.file_type),
        meta.uid,
        meta.gid,
        format_size(meta.size),
        mtime,
        entry.path,
        suffix,
    )
}
