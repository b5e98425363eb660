use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::ClassMap;

/// Convert Pascal VOC annotations into a class-balanced YOLO dataset.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Dataset roots holding the VOC annotation files and their images
    #[arg(short = 'd', long = "dataset_dir", required = true, num_args = 1..)]
    pub dataset_dirs: Vec<PathBuf>,

    /// Directory receiving the images/ and labels/ trees (reset on every run)
    #[arg(short = 'o', long = "output_dir", default_value = "data/processed")]
    pub output_dir: PathBuf,

    /// Classes to keep, as NAME or NAME=ID; bare names take their list position as id
    #[arg(short = 'c', long = "classes", value_delimiter = ',', required = true)]
    pub classes: Vec<String>,

    /// Balance the class distribution before exporting
    #[arg(long = "balance")]
    pub balance: bool,

    /// Balancing policy: oversample up to a floor or cap at a ceiling
    #[arg(long = "balance_mode", value_enum, default_value = "min")]
    pub balance_mode: BalanceMode,

    /// How the configured per-class bound combines with the observed counts
    #[arg(long = "target_policy", value_enum, default_value = "clamp")]
    pub target_policy: TargetPolicy,

    /// Per-class floor used by the min mode
    #[arg(long = "min_per_class", default_value_t = 100, value_parser = validate_count)]
    pub min_per_class: usize,

    /// Per-class ceiling used by the max mode
    #[arg(long = "max_per_class", default_value_t = 400, value_parser = validate_count)]
    pub max_per_class: usize,

    /// How images with several boxes are registered in the class index
    #[arg(long = "registration", value_enum, default_value = "per-record")]
    pub registration: Registration,

    /// Seed for the balancing random generator
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Prefix prepended to every exported file name
    #[arg(long = "prefix", default_value = "")]
    pub prefix: String,

    /// Annotation directory inside each dataset root
    #[arg(long = "annotations_subdir", default_value = "annotations/xmls")]
    pub annotations_subdir: PathBuf,

    /// Image directory inside each dataset root
    #[arg(long = "images_subdir", default_value = "images")]
    pub images_subdir: PathBuf,

    /// Extension of the image matching an annotation file
    #[arg(long = "image_ext", default_value = "jpg")]
    pub image_ext: String,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum BalanceMode {
    /// Oversample every class up to the target
    Min,
    /// Subsample every class down to the target
    Max,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum TargetPolicy {
    /// Combine the configured bound with the observed class counts
    Clamp,
    /// Use the configured bound as is
    Fixed,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum Registration {
    /// One entry per class present, carrying every box of the image
    PerRecord,
    /// One entry per box, carrying only that box
    PerBox,
}

/// Where annotation files and images live inside a dataset root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    pub annotations_subdir: PathBuf,
    pub images_subdir: PathBuf,
    pub image_ext: String,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        Self {
            annotations_subdir: PathBuf::from("annotations/xmls"),
            images_subdir: PathBuf::from("images"),
            image_ext: "jpg".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceConfig {
    pub enabled: bool,
    pub mode: BalanceMode,
    pub policy: TargetPolicy,
    pub min_per_class: usize,
    pub max_per_class: usize,
    pub seed: u64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: BalanceMode::Min,
            policy: TargetPolicy::Clamp,
            min_per_class: 100,
            max_per_class: 400,
            seed: 42,
        }
    }
}

/// Everything a pipeline run needs, passed explicitly to each stage.
#[derive(Debug, Clone)]
pub struct Config {
    pub dataset_dirs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub classes: ClassMap,
    pub layout: DatasetLayout,
    pub registration: Registration,
    pub balance: BalanceConfig,
    pub prefix: String,
}

impl Config {
    /// Check the configuration before anything is written. Paths are only read.
    pub fn validate(&self) -> Result<()> {
        if self.dataset_dirs.is_empty() {
            return Err(Error::Config("no dataset directory given".to_string()));
        }
        let output_dir = resolve_path(&self.output_dir)?;
        for dir in &self.dataset_dirs {
            if !dir.is_dir() {
                return Err(Error::Config(format!(
                    "dataset directory does not exist: {}",
                    dir.display()
                )));
            }
            // the output tree is deleted before export
            if resolve_path(dir)?.starts_with(&output_dir) {
                return Err(Error::Config(format!(
                    "output directory {} contains dataset directory {}",
                    self.output_dir.display(),
                    dir.display()
                )));
            }
        }
        if self.classes.is_empty() {
            return Err(Error::Config("at least one class is required".to_string()));
        }
        if self.layout.image_ext.is_empty() {
            return Err(Error::Config("image extension must not be empty".to_string()));
        }
        if self.balance.enabled {
            let target = match self.balance.mode {
                BalanceMode::Min => self.balance.min_per_class,
                BalanceMode::Max => self.balance.max_per_class,
            };
            if target == 0 {
                return Err(Error::Config(
                    "per-class target must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl Args {
    /// Turn the command line into a validated pipeline configuration.
    pub fn to_config(&self) -> Result<Config> {
        let config = Config {
            dataset_dirs: self.dataset_dirs.clone(),
            output_dir: self.output_dir.clone(),
            classes: ClassMap::from_label_list(&self.classes)?,
            layout: DatasetLayout {
                annotations_subdir: self.annotations_subdir.clone(),
                images_subdir: self.images_subdir.clone(),
                image_ext: self.image_ext.trim_start_matches('.').to_string(),
            },
            registration: self.registration,
            balance: BalanceConfig {
                enabled: self.balance,
                mode: self.balance_mode,
                policy: self.target_policy,
                min_per_class: self.min_per_class,
                max_per_class: self.max_per_class,
                seed: self.seed,
            },
            prefix: self.prefix.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Absolute, symlink-free form of a path that may not exist yet. The nearest
/// existing ancestor is canonicalized and the missing components appended.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    let io_error = |source: std::io::Error| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_err(io_error)?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(resolved) => {
                return Ok(missing
                    .iter()
                    .rev()
                    .fold(resolved, |resolved, name| resolved.join(name)))
            }
            Err(e) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name);
                    existing = parent;
                }
                _ => return Err(io_error(e)),
            },
        }
    }
}

// Validate that a per-class bound is a positive integer
pub fn validate_count(s: &str) -> std::result::Result<usize, String> {
    match usize::from_str(s) {
        Ok(val) if val > 0 => Ok(val),
        _ => Err("COUNT must be a positive integer".to_string()),
    }
}
