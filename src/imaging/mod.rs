//! Raster operations on binarized page and segment images

pub mod crop;
pub mod despeckle;
pub mod deskew;

pub use crop::crop_polygon;
pub use despeckle::{despeckle, is_binary, DespeckleStats, INK, PAPER};
