use clap::Parser;
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

use voc2yolo::{count_labels, ClassMap};

/// Count YOLO annotations per class in a labels directory.
#[derive(Parser, Debug)]
#[command(version, long_about = None)]
struct CountArgs {
    /// Directory holding the YOLO .txt label files
    #[arg(short = 'l', long = "labels_dir", default_value = "data/processed/labels")]
    labels_dir: PathBuf,

    /// Class names used to display ids, as NAME or NAME=ID
    #[arg(short = 'c', long = "classes", value_delimiter = ',')]
    classes: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CountArgs::parse();

    let classes = if args.classes.is_empty() {
        None
    } else {
        match ClassMap::from_label_list(&args.classes) {
            Ok(classes) => Some(classes),
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    };

    match count_labels(&args.labels_dir) {
        Ok(counts) => {
            counts.print_summary(classes.as_ref());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to count labels in {}: {}", args.labels_dir.display(), e);
            ExitCode::FAILURE
        }
    }
}
