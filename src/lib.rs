//! Pascal VOC to YOLO format converter
//!
//! This library collects Pascal VOC annotations from one or more dataset
//! roots, balances the class distribution and exports the result as a YOLO
//! dataset for object detection training.

pub mod balance;
pub mod collect;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod labels;
pub mod types;
pub mod utils;
pub mod voc;

// Re-export commonly used types and functions
pub use balance::{balance, BalanceOutcome};
pub use collect::{collect_annotations, Collection};
pub use config::{Args, BalanceConfig, BalanceMode, Config, DatasetLayout, Registration, TargetPolicy};
pub use dataset::process_dataset;
pub use error::{Error, Result};
pub use export::export;
pub use labels::{count_labels, remap_class_id};
pub use types::{AnnotationRecord, BoundingBox, ClassIndex, ClassMap, RunSummary, Sample};
pub use voc::parse_annotation_file;
