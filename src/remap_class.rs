use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use voc2yolo::remap_class_id;

/// Rewrite one class id to another in every YOLO label file of a directory.
#[derive(Parser, Debug)]
#[command(version, long_about = None)]
struct RemapArgs {
    /// Directory holding the YOLO .txt label files
    #[arg(short = 'l', long = "labels_dir")]
    labels_dir: PathBuf,

    /// Class id to replace
    #[arg(long = "from")]
    from: usize,

    /// Replacement class id
    #[arg(long = "to")]
    to: usize,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = RemapArgs::parse();

    match remap_class_id(&args.labels_dir, args.from, args.to) {
        Ok(stats) => {
            info!(
                "Remapped class {} → {}: {} lines in {} of {} files",
                args.from, args.to, stats.lines_changed, stats.files_changed, stats.files_scanned
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to remap {}: {}", args.labels_dir.display(), e);
            ExitCode::FAILURE
        }
    }
}
