mod common;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use common::{config, voc_xml, write_record};
use voc2yolo::{
    collect_annotations, export, process_dataset, BalanceConfig, BalanceMode, Error,
    Registration, TargetPolicy,
};

fn read_dir_contents(dir: &Path) -> BTreeMap<String, String> {
    let mut contents = BTreeMap::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        contents.insert(name, fs::read_to_string(&path).unwrap());
    }
    contents
}

// Three records: a mixed one, a D10 one and a D20 one
fn mixed_dataset(root: &Path) {
    write_record(
        root,
        "img_mixed",
        &voc_xml(
            600,
            600,
            &[
                ("D00", [0, 0, 60, 60]),
                ("D00", [100, 100, 160, 220]),
                ("D10", [300, 300, 600, 600]),
            ],
        ),
        true,
    );
    write_record(
        root,
        "img_d10",
        &voc_xml(600, 600, &[("D10", [10, 10, 70, 70])]),
        true,
    );
    write_record(
        root,
        "img_d20",
        &voc_xml(600, 600, &[("D20", [20, 20, 80, 80]), ("D40", [1, 1, 5, 5])]),
        true,
    );
}

#[test]
fn test_collect_per_record() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("China_Motorbike");
    mixed_dataset(&root);

    let config = config(vec![root], temp_dir.path().join("out"));
    let collection = collect_annotations(&config).unwrap();

    assert_eq!(collection.stats.records_seen, 3);
    assert_eq!(collection.stats.records_registered, 3);
    assert_eq!(collection.stats.boxes_kept, 5);
    assert_eq!(collection.stats.dropped_objects.get("D40"), Some(&1));

    let counts = collection.index.counts();
    assert_eq!(counts[&0], 1);
    assert_eq!(counts[&1], 2);
    assert_eq!(counts[&2], 1);
    let mixed = &collection.index.get(0)[0];
    assert_eq!(mixed.box_indices, vec![0, 1, 2]);
    assert_eq!(mixed.record.dataset, "China_Motorbike");
}

#[test]
fn test_collect_per_box() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("ds");
    mixed_dataset(&root);

    let mut config = config(vec![root], temp_dir.path().join("out"));
    config.registration = Registration::PerBox;
    let collection = collect_annotations(&config).unwrap();

    let counts = collection.index.counts();
    assert_eq!(counts[&0], 2);
    assert_eq!(counts[&1], 2);
    assert_eq!(counts[&2], 1);
    for sample in collection.index.get(0) {
        assert_eq!(sample.box_indices.len(), 1);
        assert!(sample.boxes().all(|b| b.class_id == 0));
    }
}

#[test]
fn test_malformed_and_missing_image_records_are_skipped() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("ds");
    mixed_dataset(&root);
    let no_width = voc_xml(600, 600, &[("D00", [0, 0, 10, 10])]).replace("<width>600</width>", "");
    write_record(&root, "broken", &no_width, true);
    let bad_height = voc_xml(600, 600, &[("D10", [0, 0, 10, 10])])
        .replace("<height>600</height>", "<height>tall</height>");
    write_record(&root, "bad_height", &bad_height, true);
    write_record(
        &root,
        "orphan",
        &voc_xml(600, 600, &[("D00", [0, 0, 10, 10])]),
        false,
    );

    let config = config(vec![root], temp_dir.path().join("out"));
    let collection = collect_annotations(&config).unwrap();

    assert_eq!(collection.stats.records_seen, 6);
    assert_eq!(collection.stats.skipped_malformed, 2);
    assert_eq!(collection.stats.skipped_missing_image, 1);
    assert_eq!(collection.stats.records_registered, 3);
}

#[test]
fn test_missing_annotation_dir_is_a_config_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("empty");
    fs::create_dir_all(&root).unwrap();

    let config = config(vec![root], temp_dir.path().join("out"));
    let err = collect_annotations(&config).unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let missing = common::config(
        vec![temp_dir.path().join("does_not_exist")],
        temp_dir.path().join("out"),
    );
    assert!(matches!(process_dataset(&missing), Err(Error::Config(_))));
    assert!(!temp_dir.path().join("out").exists());
}

#[test]
fn test_export_record_selected_once_keeps_all_boxes() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("ds");
    mixed_dataset(&root);
    let output_dir = temp_dir.path().join("out");

    let config = config(vec![root], output_dir.clone());
    let collection = collect_annotations(&config).unwrap();
    let selected = vec![collection.index.get(0)[0].clone()];

    let stats = export(&selected, &output_dir, "D00_D10_D20").unwrap();
    assert_eq!(stats.images_copied, 1);
    assert_eq!(stats.boxes_written, 3);
    assert_eq!(stats.failures, 0);

    let label = fs::read_to_string(output_dir.join("labels/D00_D10_D20_img_mixed.txt")).unwrap();
    assert_eq!(
        label,
        "0 0.050000 0.050000 0.100000 0.100000\n\
         0 0.216667 0.266667 0.100000 0.200000\n\
         1 0.750000 0.750000 0.500000 0.500000\n"
    );
    assert!(output_dir.join("images/D00_D10_D20_img_mixed.jpg").is_file());
}

#[test]
fn test_export_per_box_sample_writes_only_its_box() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("ds");
    mixed_dataset(&root);
    let output_dir = temp_dir.path().join("out");

    let mut config = config(vec![root], output_dir.clone());
    config.registration = Registration::PerBox;
    let collection = collect_annotations(&config).unwrap();
    let selected = vec![collection.index.get(1)[0].clone()];

    export(&selected, &output_dir, "").unwrap();
    let labels = read_dir_contents(&output_dir.join("labels"));
    assert_eq!(labels.len(), 1);
    let (name, content) = labels.iter().next().unwrap();
    assert!(name == "img_d10.txt" || name == "img_mixed.txt", "{}", name);
    assert_eq!(content.lines().count(), 1);
    assert!(content.starts_with("1 "));
}

#[test]
fn test_duplicate_draws_are_exported_once() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("ds");
    mixed_dataset(&root);
    let output_dir = temp_dir.path().join("out");

    let mut config = config(vec![root], output_dir.clone());
    config.balance = BalanceConfig {
        enabled: true,
        mode: BalanceMode::Min,
        policy: TargetPolicy::Fixed,
        min_per_class: 25,
        ..Default::default()
    };
    let summary = process_dataset(&config).unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.samples, 75);
    assert_eq!(summary.export.images_copied, 3);
    assert_eq!(read_dir_contents(&output_dir.join("images")).len(), 3);

    let labels = read_dir_contents(&output_dir.join("labels"));
    assert_eq!(labels.len(), 3);
    assert_eq!(labels["D00_D10_D20_img_mixed.txt"].lines().count(), 3);
    assert_eq!(labels["D00_D10_D20_img_d10.txt"].lines().count(), 1);
    assert_eq!(labels["D00_D10_D20_img_d20.txt"].lines().count(), 1);
}

#[test]
fn test_export_is_idempotent() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("ds");
    mixed_dataset(&root);
    for i in 0..20 {
        write_record(
            &root,
            &format!("extra_{:02}", i),
            &voc_xml(800, 400, &[("D10", [i * 10, 5, i * 10 + 30, 100])]),
            true,
        );
    }
    let output_dir = temp_dir.path().join("out");

    let mut config = config(vec![root], output_dir.clone());
    config.balance = BalanceConfig {
        enabled: true,
        mode: BalanceMode::Max,
        policy: TargetPolicy::Fixed,
        max_per_class: 5,
        seed: 1234,
        ..Default::default()
    };

    process_dataset(&config).unwrap();
    let first = read_dir_contents(&output_dir.join("labels"));
    fs::write(output_dir.join("labels/stale.txt"), "0 0.5 0.5 0.5 0.5\n").unwrap();

    process_dataset(&config).unwrap();
    let second = read_dir_contents(&output_dir.join("labels"));

    assert_eq!(first, second);
    assert!(!second.contains_key("stale.txt"));
}

#[test]
fn test_missing_class_fails_the_run() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("ds");
    write_record(
        &root,
        "only_d00",
        &voc_xml(600, 600, &[("D00", [0, 0, 60, 60])]),
        true,
    );

    let mut config = config(vec![root], temp_dir.path().join("out"));
    config.balance = BalanceConfig {
        enabled: true,
        min_per_class: 2,
        ..Default::default()
    };
    let summary = process_dataset(&config).unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.empty_classes, vec![1, 2]);
    assert_eq!(summary.export.images_copied, 1);
}

#[test]
fn test_same_file_name_in_two_datasets_is_not_overwritten() {
    let temp_dir = tempfile::tempdir().unwrap();
    let motorbike = temp_dir.path().join("China_Motorbike");
    let drone = temp_dir.path().join("China_Drone");
    write_record(
        &motorbike,
        "img_0001",
        &voc_xml(600, 600, &[("D00", [0, 0, 60, 60])]),
        true,
    );
    write_record(
        &drone,
        "img_0001",
        &voc_xml(600, 600, &[("D20", [0, 0, 300, 300])]),
        true,
    );
    let output_dir = temp_dir.path().join("out");

    let config = config(vec![motorbike.clone(), drone.clone()], output_dir.clone());
    let summary = process_dataset(&config).unwrap();
    assert_eq!(summary.export.images_copied, 2);
    assert_eq!(summary.export.renamed_collisions, 1);

    let images = read_dir_contents(&output_dir.join("images"));
    let names: Vec<&String> = images.keys().collect();
    assert_eq!(
        names,
        vec![
            "D00_D10_D20_China_Motorbike_img_0001.jpg",
            "D00_D10_D20_img_0001.jpg"
        ]
    );
    // sorted source paths: China_Drone claims the plain name first
    assert!(images["D00_D10_D20_img_0001.jpg"].contains("China_Drone"));

    let labels = read_dir_contents(&output_dir.join("labels"));
    assert!(labels["D00_D10_D20_img_0001.txt"].starts_with("2 "));
    assert!(labels["D00_D10_D20_China_Motorbike_img_0001.txt"].starts_with("0 "));
}

#[test]
fn test_failed_copy_does_not_stop_export() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path().join("ds");
    mixed_dataset(&root);
    let output_dir = temp_dir.path().join("out");

    let config = config(vec![root.clone()], output_dir.clone());
    let collection = collect_annotations(&config).unwrap();
    fs::remove_file(root.join("images/img_d10.jpg")).unwrap();

    let samples = collection.index.into_samples();
    let stats = export(&samples, &output_dir, "p").unwrap();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.images_copied, 2);

    let written: Vec<PathBuf> = fs::read_dir(output_dir.join("labels"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(written.len(), 2);
}

#[test]
fn test_output_dir_containing_a_dataset_is_refused() {
    let temp_dir = tempfile::tempdir().unwrap();
    let output_dir = temp_dir.path().join("data");
    let root = output_dir.join("raw/China_Motorbike");
    mixed_dataset(&root);
    let raw_xml = root.join("annotations/xmls/img_d10.xml");

    let config = config(vec![root.clone()], output_dir.clone());
    assert!(matches!(config.validate(), Err(Error::Config(_))));
    assert!(matches!(process_dataset(&config), Err(Error::Config(_))));
    assert!(raw_xml.is_file());

    // same directory spelled differently
    let same = common::config(
        vec![root.clone()],
        output_dir.join("raw/../raw/China_Motorbike"),
    );
    assert!(matches!(process_dataset(&same), Err(Error::Config(_))));
    assert!(raw_xml.is_file());

    // an output directory that does not exist yet, next to the dataset, is fine
    let sibling = common::config(vec![root], temp_dir.path().join("processed/yolo"));
    assert!(sibling.validate().is_ok());
}
