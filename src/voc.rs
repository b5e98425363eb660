//! Pascal VOC annotation parsing
//!
//! Reads one VOC XML file, keeps the objects whose class is in the configured
//! class map and converts their pixel boxes to normalized YOLO boxes.

use log::debug;
use std::fs;
use std::path::Path;
use xml::reader::{EventReader, XmlEvent};

use crate::error::{Error, Result};
use crate::types::{BoundingBox, ClassMap};

// Minimal element tree. <object> may be interleaved with any other child of
// <annotation>, so children are looked up by name.
#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|child| child.text.as_str())
    }
}

fn parse_tree(content: &str) -> std::result::Result<Option<Element>, xml::reader::Error> {
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    for event in EventReader::from_str(content) {
        match event? {
            XmlEvent::StartElement { name, .. } => stack.push(Element {
                name: name.local_name,
                ..Default::default()
            }),
            XmlEvent::Characters(text) | XmlEvent::CData(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            XmlEvent::EndElement { .. } => {
                if let Some(element) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
            }
            _ => {}
        }
    }
    Ok(root)
}

/// The useful content of one annotation file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAnnotation {
    pub image_width: f64,
    pub image_height: f64,
    /// Boxes of mapped classes, in document order.
    pub boxes: Vec<BoundingBox>,
    /// Class names of the objects dropped because they are not mapped.
    pub dropped: Vec<String>,
}

/// Read and parse a VOC annotation file.
pub fn parse_annotation_file(path: &Path, classes: &ClassMap) -> Result<ParsedAnnotation> {
    let content = fs::read_to_string(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_annotation_str(&content, path, classes)
}

/// Parse VOC XML already read into memory. `path` is only used in errors.
pub fn parse_annotation_str(
    content: &str,
    path: &Path,
    classes: &ClassMap,
) -> Result<ParsedAnnotation> {
    let annotation = parse_tree(content)
        .map_err(|e| Error::malformed(path, format!("invalid XML: {}", e)))?
        .ok_or_else(|| Error::malformed(path, "no root element"))?;

    let size = annotation
        .child("size")
        .ok_or_else(|| Error::malformed(path, "missing <size> block"))?;
    let image_width = parse_field(path, "width", size.child_text("width"))?;
    let image_height = parse_field(path, "height", size.child_text("height"))?;
    if image_width <= 0.0 || image_height <= 0.0 {
        return Err(Error::malformed(
            path,
            format!("image size must be positive, got {}x{}", image_width, image_height),
        ));
    }

    let mut boxes = Vec::new();
    let mut dropped = Vec::new();
    for object in annotation.children_named("object") {
        let name = object.child_text("name").unwrap_or_default().trim();
        let class_id = match classes.get(name) {
            Some(class_id) => class_id,
            None => {
                debug!("{}: dropping object of unmapped class '{}'", path.display(), name);
                dropped.push(name.to_string());
                continue;
            }
        };

        let bndbox = object
            .child("bndbox")
            .ok_or_else(|| Error::malformed(path, format!("object '{}' has no <bndbox>", name)))?;
        let xmin = parse_field(path, "xmin", bndbox.child_text("xmin"))?;
        let ymin = parse_field(path, "ymin", bndbox.child_text("ymin"))?;
        let xmax = parse_field(path, "xmax", bndbox.child_text("xmax"))?;
        let ymax = parse_field(path, "ymax", bndbox.child_text("ymax"))?;
        // zero-area boxes would become zero width or height labels
        if xmax <= xmin || ymax <= ymin {
            return Err(Error::malformed(
                path,
                format!(
                    "empty or inverted box [{}, {}, {}, {}] for object '{}'",
                    xmin, ymin, xmax, ymax, name
                ),
            ));
        }

        boxes.push(normalize_bbox(
            class_id,
            [xmin, ymin, xmax, ymax],
            image_width,
            image_height,
        ));
    }

    Ok(ParsedAnnotation {
        image_width,
        image_height,
        boxes,
        dropped,
    })
}

/// Convert a pixel box `[xmin, ymin, xmax, ymax]` to normalized center form.
pub fn normalize_bbox(class_id: usize, tlbr: [f64; 4], width: f64, height: f64) -> BoundingBox {
    let [xmin, ymin, xmax, ymax] = tlbr;
    BoundingBox {
        class_id,
        x_center: (xmin + xmax) / 2.0 / width,
        y_center: (ymin + ymax) / 2.0 / height,
        width: (xmax - xmin) / width,
        height: (ymax - ymin) / height,
    }
}

/// Inverse of [`normalize_bbox`]: recover the pixel box `[xmin, ymin, xmax, ymax]`.
pub fn denormalize_bbox(bbox: &BoundingBox, width: f64, height: f64) -> [f64; 4] {
    let half_w = bbox.width * width / 2.0;
    let half_h = bbox.height * height / 2.0;
    let cx = bbox.x_center * width;
    let cy = bbox.y_center * height;
    [cx - half_w, cy - half_h, cx + half_w, cy + half_h]
}

fn parse_field(path: &Path, field: &str, value: Option<&str>) -> Result<f64> {
    let text = value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| Error::malformed(path, format!("missing <{}>", field)))?;
    match text.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number),
        _ => Err(Error::malformed(
            path,
            format!("<{}> is not a number: '{}'", field, text),
        )),
    }
}
