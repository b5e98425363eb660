//! Tools working on an already exported YOLO label directory.

use log::{info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::ClassMap;
use crate::utils::list_files_sorted;

/// Box counts found in a label directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelCounts {
    pub files: usize,
    pub per_class: BTreeMap<usize, usize>,
    pub invalid_lines: usize,
}

impl LabelCounts {
    pub fn total(&self) -> usize {
        self.per_class.values().sum()
    }

    pub fn print_summary(&self, classes: Option<&ClassMap>) {
        let total = self.total();
        info!("=== Annotation Count Summary ===");
        info!("Label files: {}", self.files);
        for (&class_id, &count) in &self.per_class {
            let name = classes
                .map(|classes| classes.display_name(class_id))
                .unwrap_or_else(|| class_id.to_string());
            let percentage = if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            info!(
                "Class {} (ID: {}): {} annotations ({:.2}%)",
                name, class_id, count, percentage
            );
        }
        info!("Total annotations: {}", total);
        if self.invalid_lines > 0 {
            warn!("Invalid label lines: {}", self.invalid_lines);
        }
    }
}

/// Count boxes per class over every `.txt` file of `labels_dir`.
pub fn count_labels(labels_dir: &Path) -> Result<LabelCounts> {
    let mut counts = LabelCounts::default();
    for path in list_files_sorted(labels_dir, "txt")? {
        let content = fs::read_to_string(&path).map_err(|e| Error::Io {
            path: path.clone(),
            source: e,
        })?;
        counts.files += 1;
        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            match line.split_whitespace().next().map(str::parse::<usize>) {
                Some(Ok(class_id)) => *counts.per_class.entry(class_id).or_default() += 1,
                _ => {
                    warn!("{}: invalid label line '{}'", path.display(), line);
                    counts.invalid_lines += 1;
                }
            }
        }
    }
    Ok(counts)
}

/// Files and lines touched by [`remap_class_id`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapStats {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub lines_changed: usize,
}

/// Replace class id `from` with `to` in every label file of `labels_dir`.
///
/// Files without a matching line are left untouched.
pub fn remap_class_id(labels_dir: &Path, from: usize, to: usize) -> Result<RemapStats> {
    let mut stats = RemapStats::default();
    let from = from.to_string();
    let to = to.to_string();
    for path in list_files_sorted(labels_dir, "txt")? {
        stats.files_scanned += 1;
        let content = fs::read_to_string(&path).map_err(|e| Error::Io {
            path: path.clone(),
            source: e,
        })?;

        let mut changed = 0;
        let mut rewritten = String::with_capacity(content.len());
        for line in content.lines() {
            let mut parts: Vec<&str> = line.split_whitespace().collect();
            if parts.first() == Some(&from.as_str()) {
                parts[0] = to.as_str();
                changed += 1;
            }
            if !parts.is_empty() {
                rewritten.push_str(&parts.join(" "));
                rewritten.push('\n');
            }
        }

        if changed > 0 {
            fs::write(&path, rewritten).map_err(|e| Error::IoWrite {
                path: path.clone(),
                source: e,
            })?;
            stats.files_changed += 1;
            stats.lines_changed += changed;
        }
    }
    Ok(stats)
}
