use log::{debug, error, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{AnnotationRecord, ExportStats, Sample};
use crate::utils::{create_progress_bar, prefixed_name};

// Every box selected for one image, whatever sample selected it
struct ImageGroup {
    record: Arc<AnnotationRecord>,
    box_indices: BTreeSet<usize>,
}

/// Output file names chosen for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportNames {
    pub image: String,
    pub label: String,
}

/// Write the selected samples as a YOLO dataset under `output_dir`.
///
/// `output_dir` is expected to be empty or absent; resetting it is the
/// caller's job. Samples drawn several times for the same image produce one
/// image copy and one label file holding the union of their boxes. A failed
/// copy or write is logged and counted, and the remaining images are still
/// exported.
pub fn export(samples: &[Sample], output_dir: &Path, prefix: &str) -> Result<ExportStats> {
    let images_dir = output_dir.join("images");
    let labels_dir = output_dir.join("labels");
    for dir in [&images_dir, &labels_dir] {
        fs::create_dir_all(dir).map_err(|e| Error::IoWrite {
            path: dir.clone(),
            source: e,
        })?;
    }

    let groups = group_by_image(samples);
    let mut stats = ExportStats::default();
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();

    let pb = create_progress_bar(groups.len() as u64, "Export");
    for (image_path, group) in &groups {
        let names = assign_names(&group.record, prefix, &mut claimed);
        if names.label != default_names(&group.record, prefix).label {
            warn!(
                "{} collides with an image of another dataset, exported as {}",
                image_path.display(),
                names.image
            );
            stats.renamed_collisions += 1;
        }

        match write_image_group(group, &images_dir, &labels_dir, &names) {
            Ok(boxes) => {
                stats.images_copied += 1;
                stats.labels_written += 1;
                stats.boxes_written += boxes;
            }
            Err(e) => {
                error!("Failed to export {}: {}", image_path.display(), e);
                stats.failures += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Export complete");

    Ok(stats)
}

fn group_by_image(samples: &[Sample]) -> BTreeMap<PathBuf, ImageGroup> {
    let mut groups: BTreeMap<PathBuf, ImageGroup> = BTreeMap::new();
    for sample in samples {
        groups
            .entry(sample.record.image_path.clone())
            .or_insert_with(|| ImageGroup {
                record: sample.record.clone(),
                box_indices: BTreeSet::new(),
            })
            .box_indices
            .extend(sample.box_indices.iter().copied());
    }
    groups
}

fn default_names(record: &AnnotationRecord, prefix: &str) -> ExportNames {
    names_for(prefix, &file_name(&record.image_path))
}

fn names_for(prefix: &str, image_file_name: &str) -> ExportNames {
    let image = prefixed_name(prefix, image_file_name);
    let label = Path::new(&image)
        .with_extension("txt")
        .to_string_lossy()
        .into_owned();
    ExportNames { image, label }
}

/// Pick output names for a record, renaming it when a different source image
/// already owns its default names.
///
/// The first image keeps `{prefix}_{file}`. Later images with the same file
/// name get their dataset tag, `{prefix}_{dataset}_{file}`, and a counter if
/// even that is taken.
pub fn assign_names(
    record: &AnnotationRecord,
    prefix: &str,
    claimed: &mut HashMap<String, PathBuf>,
) -> ExportNames {
    let file = file_name(&record.image_path);
    let mut candidates = vec![
        names_for(prefix, &file),
        names_for(prefix, &format!("{}_{}", record.dataset, file)),
    ];
    let mut counter = 1;
    loop {
        for names in candidates.drain(..) {
            match claimed.get(&names.label) {
                Some(owner) if owner != &record.image_path => {
                    debug!("{} already taken by {}", names.label, owner.display());
                }
                _ => {
                    claimed.insert(names.label.clone(), record.image_path.clone());
                    return names;
                }
            }
        }
        let path = Path::new(&file);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let renamed = match path.extension() {
            Some(ext) => format!("{}_{}_{}.{}", record.dataset, stem, counter, ext.to_string_lossy()),
            None => format!("{}_{}_{}", record.dataset, stem, counter),
        };
        candidates.push(names_for(prefix, &renamed));
        counter += 1;
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn write_image_group(
    group: &ImageGroup,
    images_dir: &Path,
    labels_dir: &Path,
    names: &ExportNames,
) -> Result<usize> {
    let image_output_path = images_dir.join(&names.image);
    fs::copy(&group.record.image_path, &image_output_path).map_err(|e| Error::IoWrite {
        path: image_output_path.clone(),
        source: e,
    })?;

    let label_output_path = labels_dir.join(&names.label);
    let write_labels = || -> std::io::Result<usize> {
        let mut writer = BufWriter::new(File::create(&label_output_path)?);
        let mut written = 0;
        for bbox in group
            .box_indices
            .iter()
            .filter_map(|&index| group.record.boxes.get(index))
        {
            writer.write_all(bbox.to_label_line().as_bytes())?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    };
    write_labels().map_err(|e| Error::IoWrite {
        path: label_output_path.clone(),
        source: e,
    })
}
