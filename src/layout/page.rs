use super::xml::{Element, XmlDocument};
use crate::error::{DespeckleError, Result};

/// A derived image reference attached to a page or segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternativeImage {
    pub filename: String,
    /// Comma-separated list of features applied to the image
    pub comments: String,
}

impl AlternativeImage {
    pub fn new(filename: impl Into<String>, features: &[String]) -> Self {
        Self {
            filename: filename.into(),
            comments: features.join(","),
        }
    }

    pub fn features(&self) -> Vec<String> {
        self.comments
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether every requested feature is present
    pub fn satisfies<S: AsRef<str>>(&self, required: &[S]) -> bool {
        let features = self.features();
        required
            .iter()
            .all(|r| features.iter().any(|f| f == r.as_ref()))
    }
}

/// Accessors shared by the page and every segment below it
pub trait Segment {
    fn segment_id(&self) -> &str;

    /// Outline from `Coords/@points`, `None` if the element has no coordinates
    fn polygon(&self) -> Result<Option<Vec<(f64, f64)>>>;

    /// Clockwise correction angle in degrees, if annotated
    fn orientation(&self) -> Option<f64>;

    fn alternative_images(&self) -> Vec<AlternativeImage>;

    fn add_alternative_image(&mut self, image: &AlternativeImage);
}

impl Segment for Element {
    fn segment_id(&self) -> &str {
        self.attr("id").unwrap_or("")
    }

    fn polygon(&self) -> Result<Option<Vec<(f64, f64)>>> {
        match self.child("Coords").and_then(|c| c.attr("points")) {
            Some(points) => parse_points(points)
                .map(Some)
                .map_err(|reason| DespeckleError::InvalidCoords {
                    segment: describe(self),
                    reason,
                }),
            None => Ok(None),
        }
    }

    fn orientation(&self) -> Option<f64> {
        self.attr("orientation")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    fn alternative_images(&self) -> Vec<AlternativeImage> {
        self.elements()
            .map(|(_, el)| el)
            .filter(|el| el.local_name() == "AlternativeImage")
            .filter_map(|el| {
                el.attr("filename").map(|filename| AlternativeImage {
                    filename: filename.to_string(),
                    comments: el.attr("comments").unwrap_or("").to_string(),
                })
            })
            .collect()
    }

    fn add_alternative_image(&mut self, image: &AlternativeImage) {
        let el = Element::new(self.sibling_name("AlternativeImage"))
            .with_attr("filename", image.filename.as_str())
            .with_attr("comments", image.comments.as_str());

        // AlternativeImage comes first in every PAGE element sequence
        let last_image = self
            .elements()
            .filter(|(_, el)| el.local_name() == "AlternativeImage")
            .map(|(i, _)| i)
            .last();
        let index = match last_image {
            Some(i) => i + 1,
            None => self
                .elements()
                .map(|(i, _)| i)
                .next()
                .unwrap_or(self.children.len()),
        };
        self.insert(index, el);
    }
}

/// Human readable name for log and error messages, e.g. `region 'r1'`
pub fn describe(el: &Element) -> String {
    let kind = match el.local_name() {
        "Page" => "page",
        "TextRegion" => "region",
        "TextLine" => "line",
        "Word" => "word",
        "Glyph" => "glyph",
        other => other,
    };
    format!("{} '{}'", kind, el.segment_id())
}

fn parse_points(points: &str) -> std::result::Result<Vec<(f64, f64)>, String> {
    let polygon = points
        .split_whitespace()
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| format!("malformed point '{}'", pair))?;
            let x = x
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("malformed x in '{}'", pair))?;
            let y = y
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("malformed y in '{}'", pair))?;
            Ok((x, y))
        })
        .collect::<std::result::Result<Vec<_>, String>>()?;

    if polygon.is_empty() {
        return Err("no points".to_string());
    }
    Ok(polygon)
}

/// A provenance record for `Metadata`
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataItem {
    pub item_type: String,
    pub name: String,
    pub value: String,
    /// Parameter labels as (type, value)
    pub labels: Vec<(String, String)>,
}

impl MetadataItem {
    pub fn processing_step(step: &str, tool: &str, labels: Vec<(String, String)>) -> Self {
        Self {
            item_type: "processingStep".to_string(),
            name: step.to_string(),
            value: tool.to_string(),
            labels,
        }
    }

    fn to_element(&self, parent: &Element) -> Element {
        let mut labels = Element::new(parent.sibling_name("Labels"))
            .with_attr("externalModel", "ocrd-tool")
            .with_attr("externalId", "parameters");
        for (label_type, value) in &self.labels {
            labels.push(
                Element::new(parent.sibling_name("Label"))
                    .with_attr("type", label_type.as_str())
                    .with_attr("value", value.as_str()),
            );
        }

        let mut item = Element::new(parent.sibling_name("MetadataItem"))
            .with_attr("type", self.item_type.as_str())
            .with_attr("name", self.name.as_str())
            .with_attr("value", self.value.as_str());
        item.push(labels);
        item
    }
}

/// A PAGE-XML document
#[derive(Debug, Clone)]
pub struct PcGts {
    doc: XmlDocument,
}

impl PcGts {
    pub fn parse(content: &str) -> Result<Self> {
        let doc = XmlDocument::parse(content)?;
        if doc.root.local_name() != "PcGts" {
            return Err(DespeckleError::Layout(format!(
                "root element is <{}>, expected PcGts",
                doc.root.name
            )));
        }
        if doc.root.child("Page").is_none() {
            return Err(DespeckleError::Layout("document has no Page".to_string()));
        }
        Ok(Self { doc })
    }

    pub fn to_xml(&self) -> Result<String> {
        self.doc.to_xml()
    }

    pub fn page(&self) -> Result<&Element> {
        self.doc
            .root
            .child("Page")
            .ok_or_else(|| DespeckleError::Layout("document has no Page".to_string()))
    }

    pub fn page_mut(&mut self) -> Result<&mut Element> {
        self.doc
            .root
            .child_mut("Page")
            .ok_or_else(|| DespeckleError::Layout("document has no Page".to_string()))
    }

    pub fn set_pcgts_id(&mut self, id: &str) {
        self.doc.root.set_attr("pcGtsId", id);
    }

    pub fn metadata(&self) -> Option<&Element> {
        self.doc.root.child("Metadata")
    }

    /// Append a record to `Metadata`, creating it if needed
    pub fn add_metadata_item(&mut self, item: &MetadataItem) {
        if self.metadata().is_none() {
            let metadata = Element::new(self.doc.root.sibling_name("Metadata"));
            let index = self
                .doc
                .root
                .elements()
                .map(|(i, _)| i)
                .next()
                .unwrap_or(self.doc.root.children.len());
            self.doc.root.insert(index, metadata);
        }

        if let Some(metadata) = self.doc.root.child_mut("Metadata") {
            let el = item.to_element(metadata);
            metadata.push(el);
        }
    }
}
