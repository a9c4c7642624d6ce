//! PAGE-XML layout documents
//!
//! A lossless XML tree plus the PAGE-specific view used by the pipeline:
//! the page, its segment hierarchy, derived images and provenance records.

pub mod level;
pub mod page;
pub mod xml;

pub use level::Level;
pub use page::{describe, AlternativeImage, MetadataItem, PcGts, Segment};
pub use xml::{Element, Node, XmlDocument};
