use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use vsfs_fs::{FsError, Vsfs, DATA_BLOCKS_COUNT};

/// Operate on a VSFS disk image.
#[derive(Parser)]
#[command(name = "fs", author, version, about)]
struct Cli {
    /// Path to the disk image
    disk: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new file (logs to journal)
    Create {
        /// Name of the file to create
        filename: String,
    },
    /// Install journal transactions
    Install,
    /// List files in the root directory
    Ls,
    /// Show file system statistics
    Stat,
    /// Validate file system consistency
    Check,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<(), FsError> {
    let mut fs = Vsfs::open(&cli.disk)?;
    match cli.command {
        Commands::Create { filename } => {
            fs.create(&filename)?;
        }
        Commands::Install => {
            fs.install()?;
        }
        Commands::Ls => cmd_ls(&mut fs)?,
        Commands::Stat => cmd_stat(&mut fs)?,
        Commands::Check => cmd_check(&mut fs)?,
    }
    Ok(())
}

fn cmd_ls(fs: &mut Vsfs) -> Result<(), FsError> {
    let files = fs.ls()?;

    println!("Files in root directory:");
    println!("{:<30} {:>10} {:>10}", "Name", "Inode", "Size");
    println!("-------------------------------------------------------");
    for file in &files {
        println!("{:<30} {:>10} {:>10}", file.name, file.inum, file.size);
    }
    println!();
    println!("Total: {} files", files.len());
    Ok(())
}

fn cmd_stat(fs: &mut Vsfs) -> Result<(), FsError> {
    let stats = fs.stat()?;

    println!("File System Statistics:");
    println!("  Magic:        {:#010x}", stats.magic);
    println!("  Total blocks: {}", stats.total_blocks);
    println!("  Total inodes: {}", stats.total_inodes);
    println!("  Used inodes:  {} / {}", stats.used_inodes, stats.total_inodes);
    println!("  Used blocks:  {} / {}", stats.used_data_blocks, DATA_BLOCKS_COUNT);
    println!("  Free inodes:  {}", stats.free_inodes());
    println!("  Free blocks:  {}", stats.free_data_blocks());
    Ok(())
}

fn cmd_check(fs: &mut Vsfs) -> Result<(), FsError> {
    println!("Checking file system consistency...");
    let faults = fs.check()?;
    for fault in &faults {
        println!("ERROR: {fault}");
    }
    if faults.is_empty() {
        println!("✓ File system is consistent");
    } else {
        println!("✗ Found {} error(s)", faults.len());
    }
    Ok(())
}
