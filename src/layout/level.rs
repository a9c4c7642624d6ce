use super::xml::Element;
use serde::{Deserialize, Serialize};

/// Hierarchy level of the layout tree
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Page,
    Region,
    Line,
    Word,
    Glyph,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Region => "region",
            Self::Line => "line",
            Self::Word => "word",
            Self::Glyph => "glyph",
        }
    }

    /// Next level down, `None` below glyphs
    pub fn child(&self) -> Option<Level> {
        match self {
            Self::Page => Some(Self::Region),
            Self::Region => Some(Self::Line),
            Self::Line => Some(Self::Word),
            Self::Word => Some(Self::Glyph),
            Self::Glyph => None,
        }
    }

    /// Plural noun used in warnings about empty collections
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Page => "pages",
            Self::Region => "text regions",
            Self::Line => "text lines",
            Self::Word => "words",
            Self::Glyph => "glyphs",
        }
    }

    /// Paths (relative to `parent`) of the nodes of this level below `parent`,
    /// in document order
    ///
    /// Regions are collected from the whole subtree, so text regions nested
    /// in other regions (tables, other text regions) take part. Lines, words
    /// and glyphs are direct children only.
    pub fn select(&self, parent: &Element) -> Vec<Vec<usize>> {
        match self {
            Self::Page => Vec::new(),
            Self::Region => {
                let mut paths = Vec::new();
                collect_text_regions(parent, &mut Vec::new(), &mut paths);
                paths
            }
            Self::Line => direct_children(parent, "TextLine"),
            Self::Word => direct_children(parent, "Word"),
            Self::Glyph => direct_children(parent, "Glyph"),
        }
    }
}

fn direct_children(parent: &Element, local: &str) -> Vec<Vec<usize>> {
    parent
        .elements()
        .filter(|(_, el)| el.local_name() == local)
        .map(|(i, _)| vec![i])
        .collect()
}

fn collect_text_regions(el: &Element, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    for (i, child) in el.elements() {
        let name = child.local_name();
        if !name.ends_with("Region") {
            continue;
        }
        prefix.push(i);
        if name == "TextRegion" {
            out.push(prefix.clone());
        }
        collect_text_regions(child, prefix, out);
        prefix.pop();
    }
}
