use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Ordered mapping from class name to YOLO class id.
///
/// Several names may share one id, which is how separately labelled classes
/// are merged into a single training class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMap {
    ids: BTreeMap<String, usize>,
}

impl ClassMap {
    /// Build a class map from a label list.
    ///
    /// Each item is either a bare name, which takes its position in the list
    /// as id, or `NAME=ID` to pin the id explicitly.
    pub fn from_label_list(labels: &[String]) -> Result<Self> {
        let mut ids = BTreeMap::new();
        for (position, item) in labels.iter().enumerate() {
            let (name, id) = match item.split_once('=') {
                Some((name, id)) => {
                    let id = id.trim().parse::<usize>().map_err(|_| {
                        Error::Config(format!("invalid class id in '{}'", item))
                    })?;
                    (name.trim(), id)
                }
                None => (item.trim(), position),
            };
            if name.is_empty() {
                return Err(Error::Config(format!("empty class name in '{}'", item)));
            }
            if ids.insert(name.to_string(), id).is_some() {
                return Err(Error::Config(format!("class '{}' listed twice", name)));
            }
        }
        if ids.is_empty() {
            return Err(Error::Config("at least one class is required".to_string()));
        }
        Ok(Self { ids })
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    /// Distinct class ids in ascending order.
    pub fn class_ids(&self) -> Vec<usize> {
        let ids: BTreeSet<usize> = self.ids.values().copied().collect();
        ids.into_iter().collect()
    }

    /// Human readable name of a class id, joining merged names with '/'.
    pub fn display_name(&self, class_id: usize) -> String {
        let names: Vec<&str> = self
            .ids
            .iter()
            .filter(|&(_, &id)| id == class_id)
            .map(|(name, _)| name.as_str())
            .collect();
        if names.is_empty() {
            format!("#{}", class_id)
        } else {
            names.join("/")
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A bounding box in normalized center form. All geometric fields are
/// fractions of the image width or height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub class_id: usize,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Format the box as one YOLO label line, newline included.
    pub fn to_label_line(&self) -> String {
        format!(
            "{} {:.6} {:.6} {:.6} {:.6}\n",
            self.class_id, self.x_center, self.y_center, self.width, self.height
        )
    }
}

/// One parsed annotation file together with the image it describes.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub annotation_path: PathBuf,
    pub image_path: PathBuf,
    /// Name of the dataset root the record was found under.
    pub dataset: String,
    pub image_width: f64,
    pub image_height: f64,
    pub boxes: Vec<BoundingBox>,
}

/// A record selected for export together with the boxes it contributes.
#[derive(Debug, Clone)]
pub struct Sample {
    pub record: Arc<AnnotationRecord>,
    /// Indices into `record.boxes`.
    pub box_indices: Vec<usize>,
}

impl Sample {
    pub fn new(record: Arc<AnnotationRecord>, box_indices: Vec<usize>) -> Self {
        Self {
            record,
            box_indices,
        }
    }

    pub fn boxes(&self) -> impl Iterator<Item = &BoundingBox> + '_ {
        self.box_indices
            .iter()
            .filter_map(move |&index| self.record.boxes.get(index))
    }
}

/// Samples grouped by class id.
#[derive(Debug, Clone, Default)]
pub struct ClassIndex {
    entries: BTreeMap<usize, Vec<Sample>>,
}

impl ClassIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class_id: usize, sample: Sample) {
        self.entries.entry(class_id).or_default().push(sample);
    }

    pub fn get(&self, class_id: usize) -> &[Sample] {
        self.entries
            .get(&class_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn counts(&self) -> BTreeMap<usize, usize> {
        self.entries
            .iter()
            .map(|(&class_id, samples)| (class_id, samples.len()))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn remove(&mut self, class_id: usize) -> Vec<Sample> {
        self.entries.remove(&class_id).unwrap_or_default()
    }

    /// Consume the index and concatenate every class in class id order.
    pub fn into_samples(self) -> Vec<Sample> {
        self.entries.into_values().flatten().collect()
    }
}

// Statistics gathered while walking the dataset roots
#[derive(Debug, Default, Clone)]
pub struct CollectStats {
    pub records_seen: usize,
    pub records_registered: usize,
    pub skipped_empty: usize,
    pub skipped_malformed: usize,
    pub skipped_missing_image: usize,
    pub boxes_kept: usize,
    pub dropped_objects: BTreeMap<String, usize>,
}

impl CollectStats {
    pub fn skipped(&self) -> usize {
        self.skipped_empty + self.skipped_malformed + self.skipped_missing_image
    }

    pub fn print_summary(&self) {
        log::info!("=== Collection Summary ===");
        log::info!("Annotation files seen: {}", self.records_seen);
        log::info!("Records registered: {}", self.records_registered);
        log::info!("Boxes kept: {}", self.boxes_kept);
        log::info!("Skipped (no known class): {}", self.skipped_empty);
        log::info!("Skipped (malformed): {}", self.skipped_malformed);
        log::info!("Skipped (missing image file): {}", self.skipped_missing_image);
        for (name, count) in &self.dropped_objects {
            log::info!("Dropped objects of unmapped class '{}': {}", name, count);
        }
    }
}

// Statistics gathered while writing the output tree
#[derive(Debug, Default, Clone)]
pub struct ExportStats {
    pub images_copied: usize,
    pub labels_written: usize,
    pub boxes_written: usize,
    pub renamed_collisions: usize,
    pub failures: usize,
}

impl ExportStats {
    pub fn print_summary(&self) {
        log::info!("=== Export Summary ===");
        log::info!("Images copied: {}", self.images_copied);
        log::info!("Label files written: {}", self.labels_written);
        log::info!("Boxes written: {}", self.boxes_written);
        if self.renamed_collisions > 0 {
            log::warn!(
                "Renamed {} images whose file name was already taken",
                self.renamed_collisions
            );
        }
        if self.failures > 0 {
            log::error!("Failed writes: {}", self.failures);
        }
    }
}

/// Outcome of a whole pipeline run.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub collect: CollectStats,
    pub export: ExportStats,
    pub samples: usize,
    /// Configured classes that could not be balanced because they had no entries.
    pub empty_classes: Vec<usize>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.export.failures == 0 && self.empty_classes.is_empty()
    }

    pub fn print_summary(&self, classes: &ClassMap) {
        log::info!("=== Run Summary ===");
        log::info!(
            "Exported {} images from {} samples ({} records registered, {} skipped)",
            self.export.images_copied,
            self.samples,
            self.collect.records_registered,
            self.collect.skipped()
        );
        for &class_id in &self.empty_classes {
            log::error!(
                "Class {} (ID: {}) has no source annotations and is missing from the output",
                classes.display_name(class_id),
                class_id
            );
        }
        if self.export.failures > 0 {
            log::error!("{} images failed to export", self.export.failures);
        }
    }
}
