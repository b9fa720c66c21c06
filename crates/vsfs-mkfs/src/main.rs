use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Create and format a VSFS disk image.
#[derive(Parser)]
#[command(name = "mkfs", author, version, about)]
struct Cli {
    /// Path to the disk image
    disk: PathBuf,
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

    println!("Creating VSFS disk image: {}", cli.disk.display());
    if let Err(err) = vsfs_fs::mkfs::format(&cli.disk) {
        eprintln!("Error: {err}");
        return ExitCode::from(1);
    }
    println!("VSFS formatted successfully!");
    ExitCode::SUCCESS
}
