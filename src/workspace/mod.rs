//! Storage and image resolution collaborators
//!
//! The pipeline only talks to these traits; [`fs::FsWorkspace`] is the
//! directory-backed implementation used by the binary.

pub mod fs;

use crate::coords::CoordContext;
use crate::error::Result;
use crate::layout::Element;
use crate::resolution::ImageInfo;
use image::GrayImage;

pub use fs::FsWorkspace;

/// Feature every image handed to the despeckler must carry
pub const BINARIZED: &str = "binarized";

/// An input layout document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub id: String,
    pub file_grp: String,
    pub page_id: Option<String>,
}

impl InputFile {
    /// Page identifier for logs, falling back to the file ID
    pub fn page_or_file_id(&self) -> &str {
        self.page_id.as_deref().unwrap_or(&self.id)
    }
}

/// Where a derived image is persisted
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTarget<'a> {
    pub file_id: &'a str,
    pub file_grp: &'a str,
    pub page_id: Option<&'a str>,
    /// Resolution recorded in the stored image, if any
    pub dpi: Option<f64>,
}

/// Produces page and segment rasters together with their coordinate context
pub trait ImageResolver {
    /// The page raster carrying every feature in `features`
    fn image_from_page(
        &self,
        page: &Element,
        page_id: &str,
        features: &[&str],
    ) -> Result<(GrayImage, CoordContext, ImageInfo)>;

    /// The raster of `segment`, derived from its parent raster unless the
    /// segment has a suitable image of its own
    fn image_from_segment(
        &self,
        segment: &Element,
        parent_image: &GrayImage,
        parent_coords: &CoordContext,
        features: &[&str],
    ) -> Result<(GrayImage, CoordContext)>;
}

/// Input listing and output persistence
pub trait Workspace: ImageResolver {
    fn input_files(&self) -> Result<Vec<InputFile>>;

    /// Raw content of an input document
    fn download(&self, file: &InputFile) -> Result<String>;

    /// Store a derived image, returning the path to reference it by
    fn save_image(&self, image: &GrayImage, target: &ImageTarget<'_>) -> Result<String>;

    /// Store a layout document, returning its path
    fn add_file(
        &self,
        file_grp: &str,
        file_id: &str,
        page_id: Option<&str>,
        content: &str,
    ) -> Result<String>;
}

/// Output file ID for `input`
///
/// The input group inside the ID is replaced by `output_grp`. When the ID
/// does not mention the input group, the result is `<output_grp>_<NNNN>`,
/// numbered by the first run of at least three digits in the page ID, or
/// else by the 1-based `position` of the file among the inputs.
pub fn make_file_id(input: &InputFile, output_grp: &str, position: usize) -> String {
    if !input.file_grp.is_empty() && input.id.contains(&input.file_grp) {
        let id = input.id.replace(&input.file_grp, output_grp);
        if id != input.id {
            return id;
        }
    }

    let number = input
        .page_id
        .as_deref()
        .and_then(first_number)
        .unwrap_or(position as u64);
    format!("{}_{:04}", output_grp, number)
}

fn first_number(s: &str) -> Option<u64> {
    let bytes = s.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        if bytes[start].is_ascii_digit() {
            let end = bytes[start..]
                .iter()
                .position(|b| !b.is_ascii_digit())
                .map_or(bytes.len(), |len| start + len);
            if end - start >= 3 {
                return s[start..end].parse().ok();
            }
            start = end;
        } else {
            start += 1;
        }
    }
    None
}
