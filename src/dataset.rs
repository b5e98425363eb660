use log::info;

use crate::balance::balance;
use crate::collect::collect_annotations;
use crate::config::Config;
use crate::error::Result;
use crate::export::export;
use crate::types::RunSummary;
use crate::utils::reset_directory;

/// Main dataset processing pipeline: collect, balance, then export into a
/// freshly reset output directory.
///
/// The config is validated here again because library callers may build a
/// [`Config`] directly without going through [`Args::to_config`]. A config
/// whose output directory contains a dataset root is refused before anything
/// is deleted.
///
/// [`Args::to_config`]: crate::config::Args::to_config
pub fn process_dataset(config: &Config) -> Result<RunSummary> {
    config.validate()?;

    info!("Collecting annotations...");
    let collection = collect_annotations(config)?;
    collection.stats.print_summary();

    info!("Balancing dataset...");
    let outcome = balance(collection.index, &config.balance, &config.classes);

    info!("Saving in YOLO format to {}...", config.output_dir.display());
    reset_directory(&config.output_dir)?;
    let export_stats = export(&outcome.samples, &config.output_dir, &config.prefix)?;
    export_stats.print_summary();

    Ok(RunSummary {
        collect: collection.stats,
        export: export_stats,
        samples: outcome.samples.len(),
        empty_classes: outcome.empty_classes,
    })
}
