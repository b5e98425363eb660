#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use voc2yolo::{
    AnnotationRecord, BalanceConfig, BoundingBox, ClassIndex, ClassMap, Config, DatasetLayout,
    Registration, Sample,
};

pub fn classes() -> ClassMap {
    let labels: Vec<String> = ["D00", "D10", "D20"].iter().map(|s| s.to_string()).collect();
    ClassMap::from_label_list(&labels).unwrap()
}

/// VOC XML for one image with the given `(name, [xmin, ymin, xmax, ymax])` objects.
pub fn voc_xml(width: u32, height: u32, objects: &[(&str, [u32; 4])]) -> String {
    let mut xml = String::from("<annotation>\n  <folder>images</folder>\n");
    xml.push_str("  <filename>image.jpg</filename>\n");
    xml.push_str(&format!(
        "  <size>\n    <width>{}</width>\n    <height>{}</height>\n    <depth>3</depth>\n  </size>\n",
        width, height
    ));
    xml.push_str("  <segmented>0</segmented>\n");
    for (name, [xmin, ymin, xmax, ymax]) in objects {
        xml.push_str(&format!(
            "  <object>\n    <name>{}</name>\n    <pose>Unspecified</pose>\n    <truncated>0</truncated>\n    <difficult>0</difficult>\n    <bndbox>\n      <xmin>{}</xmin>\n      <ymin>{}</ymin>\n      <xmax>{}</xmax>\n      <ymax>{}</ymax>\n    </bndbox>\n  </object>\n",
            name, xmin, ymin, xmax, ymax
        ));
    }
    xml.push_str("</annotation>\n");
    xml
}

/// Write an annotation file and, optionally, its image into a dataset root.
pub fn write_record(root: &Path, stem: &str, xml: &str, with_image: bool) {
    let xml_dir = root.join("annotations/xmls");
    let img_dir = root.join("images");
    fs::create_dir_all(&xml_dir).unwrap();
    fs::create_dir_all(&img_dir).unwrap();
    fs::write(xml_dir.join(format!("{}.xml", stem)), xml).unwrap();
    if with_image {
        let bytes = format!("jpeg bytes of {}/{}", root.display(), stem);
        fs::write(img_dir.join(format!("{}.jpg", stem)), bytes).unwrap();
    }
}

pub fn config(dataset_dirs: Vec<PathBuf>, output_dir: PathBuf) -> Config {
    Config {
        dataset_dirs,
        output_dir,
        classes: classes(),
        layout: DatasetLayout::default(),
        registration: Registration::PerRecord,
        balance: BalanceConfig::default(),
        prefix: "D00_D10_D20".to_string(),
    }
}

/// A class index with `n` single-box records for each `(class_id, n)`.
pub fn synthetic_index(counts: &[(usize, usize)]) -> ClassIndex {
    let mut index = ClassIndex::new();
    for &(class_id, n) in counts {
        for i in 0..n {
            let record = Arc::new(AnnotationRecord {
                annotation_path: PathBuf::from(format!("xmls/c{}_{}.xml", class_id, i)),
                image_path: PathBuf::from(format!("images/c{}_{}.jpg", class_id, i)),
                dataset: "synthetic".to_string(),
                image_width: 100.0,
                image_height: 100.0,
                boxes: vec![BoundingBox {
                    class_id,
                    x_center: 0.5,
                    y_center: 0.5,
                    width: 0.2,
                    height: 0.2,
                }],
            });
            index.insert(class_id, Sample::new(record, vec![0]));
        }
    }
    index
}

pub fn image_paths(samples: &[Sample]) -> Vec<PathBuf> {
    samples.iter().map(|s| s.record.image_path.clone()).collect()
}
