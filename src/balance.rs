//! Class balancing
//!
//! Reshapes the per-class sample lists either by oversampling every class up
//! to a floor (`min` mode) or by subsampling every class down to a ceiling
//! (`max` mode). All randomness comes from a seeded `StdRng` and classes are
//! visited in id order, so a run is reproducible for a given seed.

use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

use crate::config::{BalanceConfig, BalanceMode, TargetPolicy};
use crate::error::{Error, Result};
use crate::types::{ClassIndex, ClassMap, Sample};

/// The balanced sample list and the distributions around it.
#[derive(Debug, Clone, Default)]
pub struct BalanceOutcome {
    pub samples: Vec<Sample>,
    pub before: BTreeMap<usize, usize>,
    pub after: BTreeMap<usize, usize>,
    /// Per-class target, `None` when balancing is disabled.
    pub target: Option<usize>,
    /// Configured classes that had nothing to draw from.
    pub empty_classes: Vec<usize>,
}

/// Balance the class index according to `config`.
///
/// A configured class without entries cannot be balanced: it is reported in
/// `empty_classes` and contributes nothing, the other classes are unaffected.
pub fn balance(mut index: ClassIndex, config: &BalanceConfig, classes: &ClassMap) -> BalanceOutcome {
    let class_ids = classes.class_ids();
    let observed = index.counts();
    let before: BTreeMap<usize, usize> = class_ids
        .iter()
        .map(|&class_id| (class_id, observed.get(&class_id).copied().unwrap_or(0)))
        .collect();
    log_class_distribution("Initial Class Distribution", &before, classes);

    if !config.enabled {
        info!("Skipping dataset balancing, keeping all {} samples", index.total());
        for (&class_id, &count) in &before {
            if count == 0 {
                warn!(
                    "Class {} (ID: {}) has no samples",
                    classes.display_name(class_id),
                    class_id
                );
            }
        }
        return BalanceOutcome {
            samples: index.into_samples(),
            after: before.clone(),
            before,
            target: None,
            empty_classes: Vec::new(),
        };
    }

    let target = target_count(config, &before);
    info!(
        "Balancing dataset with {:?} mode (target: {} samples per class)",
        config.mode, target
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut outcome = BalanceOutcome {
        before,
        target: Some(target),
        ..Default::default()
    };
    for class_id in class_ids {
        let entries = index.remove(class_id);
        let name = classes.display_name(class_id);
        let selected = match config.mode {
            BalanceMode::Min => {
                if entries.len() < target {
                    info!(
                        "Class {}: Duplicating {} → {} samples",
                        name,
                        entries.len(),
                        target
                    );
                }
                oversample(class_id, &entries, target, &mut rng)
            }
            BalanceMode::Max => {
                if entries.len() > target {
                    info!("Class {}: Reducing {} → {} samples", name, entries.len(), target);
                } else if entries.len() < target {
                    warn!(
                        "Class {} has only {} samples, below the target of {}",
                        name,
                        entries.len(),
                        target
                    );
                }
                subsample(class_id, &entries, target, &mut rng)
            }
        };
        match selected {
            Ok(selected) => {
                outcome.after.insert(class_id, selected.len());
                outcome.samples.extend(selected);
            }
            Err(e) => {
                error!("Class {}: {}", name, e);
                outcome.after.insert(class_id, 0);
                outcome.empty_classes.push(class_id);
            }
        }
    }

    log_class_distribution("Final Class Distribution", &outcome.after, classes);
    outcome
}

/// Per-class target for the configured mode and policy.
pub fn target_count(config: &BalanceConfig, counts: &BTreeMap<usize, usize>) -> usize {
    match (config.mode, config.policy) {
        (BalanceMode::Min, TargetPolicy::Fixed) => config.min_per_class,
        (BalanceMode::Max, TargetPolicy::Fixed) => config.max_per_class,
        (BalanceMode::Min, TargetPolicy::Clamp) => {
            let observed_min = counts.values().copied().filter(|&n| n > 0).min().unwrap_or(0);
            config.min_per_class.max(observed_min)
        }
        (BalanceMode::Max, TargetPolicy::Clamp) => {
            let observed_max = counts.values().copied().max().unwrap_or(0);
            config.max_per_class.min(observed_max)
        }
    }
}

/// Draw exactly `target` samples.
///
/// A class with enough entries yields a subset without repetition. A smaller
/// class keeps every entry once and is topped up with draws with replacement.
pub fn oversample<R: Rng>(
    class_id: usize,
    entries: &[Sample],
    target: usize,
    rng: &mut R,
) -> Result<Vec<Sample>> {
    if target == 0 {
        return Ok(Vec::new());
    }
    if entries.is_empty() {
        return Err(Error::EmptyClass {
            class_id,
            requested: target,
        });
    }
    if entries.len() >= target {
        return Ok(entries.choose_multiple(rng, target).cloned().collect());
    }

    let mut selected = Vec::with_capacity(target);
    selected.extend_from_slice(entries);
    for _ in entries.len()..target {
        let pick = rng.gen_range(0..entries.len());
        selected.push(entries[pick].clone());
    }
    Ok(selected)
}

/// Draw `min(entries.len(), target)` samples without replacement.
pub fn subsample<R: Rng>(
    class_id: usize,
    entries: &[Sample],
    target: usize,
    rng: &mut R,
) -> Result<Vec<Sample>> {
    if entries.is_empty() && target > 0 {
        return Err(Error::EmptyClass {
            class_id,
            requested: target,
        });
    }
    if entries.len() <= target {
        return Ok(entries.to_vec());
    }
    Ok(entries.choose_multiple(rng, target).cloned().collect())
}

/// Log the number and share of samples per class
pub fn log_class_distribution(title: &str, counts: &BTreeMap<usize, usize>, classes: &ClassMap) {
    let total: usize = counts.values().sum();
    info!("{}:", title);
    for (&class_id, &count) in counts {
        let percentage = if total > 0 {
            count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        info!(
            "Class {} (ID: {}): {} samples ({:.2}%)",
            classes.display_name(class_id),
            class_id,
            count,
            percentage
        );
    }
    info!("Total: {} samples", total);
}
