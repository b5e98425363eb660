use log::{error, info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, DatasetLayout, Registration};
use crate::error::{Error, Result};
use crate::types::{AnnotationRecord, ClassIndex, CollectStats, Sample};
use crate::utils::{create_progress_bar, list_files_sorted};
use crate::voc::parse_annotation_file;

/// The class index built from every dataset root, with its statistics.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub index: ClassIndex,
    pub stats: CollectStats,
}

/// Walk every dataset root, parse its annotation files and index the usable
/// records by class.
///
/// Malformed records and records without an image are skipped and counted.
/// A dataset root without an annotation directory is a configuration error.
pub fn collect_annotations(config: &Config) -> Result<Collection> {
    let mut candidates = Vec::new();
    for root in &config.dataset_dirs {
        let annotations_dir = root.join(&config.layout.annotations_subdir);
        if !annotations_dir.is_dir() {
            return Err(Error::Config(format!(
                "annotation directory does not exist: {}",
                annotations_dir.display()
            )));
        }
        let files = list_files_sorted(&annotations_dir, "xml")?;
        info!(
            "Found {} annotation files in {}",
            files.len(),
            annotations_dir.display()
        );
        let dataset = dataset_tag(root);
        candidates.extend(files.into_iter().map(|path| (root, dataset.clone(), path)));
    }

    let mut collection = Collection::default();
    let pb = create_progress_bar(candidates.len() as u64, "Collect");
    for (root, dataset, annotation_path) in candidates {
        collect_record(root, dataset, annotation_path, config, &mut collection);
        pb.inc(1);
    }
    pb.finish_with_message("Collection complete");

    Ok(collection)
}

fn collect_record(
    root: &Path,
    dataset: String,
    annotation_path: PathBuf,
    config: &Config,
    collection: &mut Collection,
) {
    let stats = &mut collection.stats;
    stats.records_seen += 1;

    let parsed = match parse_annotation_file(&annotation_path, &config.classes) {
        Ok(parsed) => parsed,
        Err(e) => {
            error!("Skipping record: {}", e);
            stats.skipped_malformed += 1;
            return;
        }
    };
    for name in parsed.dropped {
        *stats.dropped_objects.entry(name).or_default() += 1;
    }
    if parsed.boxes.is_empty() {
        stats.skipped_empty += 1;
        return;
    }

    let image_path = image_path_for(root, &annotation_path, &config.layout);
    if !image_path.is_file() {
        let missing = Error::MissingAsset {
            path: annotation_path,
            image: image_path,
        };
        warn!("Skipping record: {}", missing);
        stats.skipped_missing_image += 1;
        return;
    }

    stats.records_registered += 1;
    stats.boxes_kept += parsed.boxes.len();
    let record = AnnotationRecord {
        annotation_path,
        image_path,
        dataset,
        image_width: parsed.image_width,
        image_height: parsed.image_height,
        boxes: parsed.boxes,
    };
    register_record(&mut collection.index, Arc::new(record), config.registration);
}

/// Add a record to the class index according to the registration policy.
pub fn register_record(
    index: &mut ClassIndex,
    record: Arc<AnnotationRecord>,
    registration: Registration,
) {
    match registration {
        Registration::PerBox => {
            for (box_index, bbox) in record.boxes.iter().enumerate() {
                index.insert(bbox.class_id, Sample::new(record.clone(), vec![box_index]));
            }
        }
        Registration::PerRecord => {
            let class_ids: BTreeSet<usize> = record.boxes.iter().map(|b| b.class_id).collect();
            let all_boxes: Vec<usize> = (0..record.boxes.len()).collect();
            for class_id in class_ids {
                index.insert(class_id, Sample::new(record.clone(), all_boxes.clone()));
            }
        }
    }
}

/// Image belonging to an annotation file: same stem, in the images directory
/// of the dataset root.
pub fn image_path_for(root: &Path, annotation_path: &Path, layout: &DatasetLayout) -> PathBuf {
    let stem = annotation_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    root.join(&layout.images_subdir)
        .join(format!("{}.{}", stem, layout.image_ext))
}

fn dataset_tag(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "dataset".to_string())
}
