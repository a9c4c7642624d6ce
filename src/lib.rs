//! Despeckling of binarized PAGE-XML page and segment images
//!
//! Walks the layout hierarchy of each input document down to a chosen
//! level, removes foreground specks and background holes smaller than a
//! DPI-scaled threshold from every segment image, and records the cleaned
//! images as alternative images of their segments.

pub mod annotate;
pub mod config;
pub mod coords;
pub mod error;
pub mod imaging;
pub mod layout;
pub mod processor;
pub mod resolution;
pub mod walker;
pub mod workspace;

pub use config::{Args, Config, Parameters};
pub use error::{DespeckleError, Result};
pub use layout::Level;
pub use processor::{Despeckler, RunSummary};
pub use workspace::{FsWorkspace, Workspace};
