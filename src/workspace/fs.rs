use super::{ImageResolver, ImageTarget, InputFile, Workspace, BINARIZED};
use crate::coords::{Affine, CoordContext};
use crate::error::{DespeckleError, Result};
use crate::imaging::crop::{bounding_box, crop_polygon};
use crate::imaging::deskew::{needs_rotation, rotate};
use crate::imaging::is_binary;
use crate::layout::{describe, AlternativeImage, Element, Segment};
use crate::resolution::{ImageInfo, ResolutionUnit};
use image::{GrayImage, ImageFormat};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

const CROPPED: &str = "cropped";
const DESKEWED: &str = "deskewed";
const METERS_PER_INCH: f64 = 0.0254;

/// Workspace rooted at a directory
///
/// Documents live at `<root>/<file group>/<file id>.xml`, derived images at
/// `<root>/<file group>/<file id>.png`. Image references inside documents are
/// paths relative to the root.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
    input_grp: String,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>, input_grp: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            input_grp: input_grp.into(),
        }
    }

    fn resolve(&self, href: &str) -> PathBuf {
        self.root.join(href)
    }

    fn load(&self, href: &str) -> Result<GrayImage> {
        Ok(image::open(self.resolve(href))?.to_luma8())
    }
}

/// Newest image carrying every requested feature
fn newest_matching(images: Vec<AlternativeImage>, features: &[&str]) -> Option<AlternativeImage> {
    images.into_iter().rev().find(|alt| alt.satisfies(features))
}

fn check_features(segment: &str, features: &[String], required: &[&str]) -> Result<()> {
    if required.iter().all(|r| features.iter().any(|f| f == r)) {
        return Ok(());
    }
    Err(DespeckleError::MissingFeature {
        segment: segment.to_string(),
        features: required.join(","),
    })
}

/// Rotate by `angle` unless the image is already deskewed, extending the context
fn apply_rotation(
    image: GrayImage,
    angle: f64,
    transform: Affine,
    features: &mut Vec<String>,
) -> (GrayImage, Affine) {
    let (w, h) = image.dimensions();
    let transform = transform.then(&Affine::rotation_about(angle, w as f64 / 2.0, h as f64 / 2.0));
    if features.iter().any(|f| f == DESKEWED) {
        return (image, transform);
    }
    features.push(DESKEWED.to_string());
    (rotate(&image, angle), transform)
}

/// Read the pixel density of an image file
///
/// Only PNG `pHYs` chunks in pixels per metre are understood; everything else
/// reports an unknown resolution.
pub fn read_image_info(path: &Path) -> Result<ImageInfo> {
    if !matches!(ImageFormat::from_path(path), Ok(ImageFormat::Png)) {
        return Ok(ImageInfo::unknown());
    }

    let decoder = png::Decoder::new(BufReader::new(File::open(path)?));
    let reader = decoder.read_info()?;
    let info = match reader.info().pixel_dims {
        Some(png::PixelDimensions {
            xppu,
            unit: png::Unit::Meter,
            ..
        }) if xppu > 0 => ImageInfo {
            resolution: xppu as f64 / 100.0,
            unit: ResolutionUnit::Centimeter,
        },
        _ => ImageInfo::unknown(),
    };
    Ok(info)
}

impl ImageResolver for FsWorkspace {
    fn image_from_page(
        &self,
        page: &Element,
        page_id: &str,
        features: &[&str],
    ) -> Result<(GrayImage, CoordContext, ImageInfo)> {
        let segment = format!("page '{}'", page_id);
        let filename = page
            .attr("imageFilename")
            .ok_or_else(|| DespeckleError::Layout(format!("{} has no imageFilename", segment)))?;
        let original = self.resolve(filename);
        let info = read_image_info(&original)?;
        let (width, height) = image::image_dimensions(&original)?;

        let (mut image, mut applied) = match newest_matching(page.alternative_images(), features) {
            Some(alt) => (self.load(&alt.filename)?, alt.features()),
            None => {
                let image = self.load(filename)?;
                let applied = if is_binary(&image) {
                    vec![BINARIZED.to_string()]
                } else {
                    Vec::new()
                };
                (image, applied)
            }
        };

        let mut transform = Affine::identity();
        if let Some(border) = page.child("Border") {
            if let Some(polygon) = border.polygon()? {
                let invalid = || DespeckleError::InvalidCoords {
                    segment: segment.clone(),
                    reason: "border lies outside the image".to_string(),
                };
                let (x0, y0, _, _) = bounding_box(&polygon, width, height).ok_or_else(invalid)?;
                transform = Affine::translation(-(x0 as f64), -(y0 as f64));
                if !applied.iter().any(|f| f == CROPPED) {
                    image = crop_polygon(&image, &polygon).ok_or_else(invalid)?;
                    applied.push(CROPPED.to_string());
                }
            }
        }

        let angle = page.orientation().filter(|a| needs_rotation(*a)).unwrap_or(0.0);
        if angle != 0.0 {
            (image, transform) = apply_rotation(image, angle, transform, &mut applied);
        }

        check_features(&segment, &applied, features)?;
        Ok((image, CoordContext::new(transform, angle, applied), info))
    }

    fn image_from_segment(
        &self,
        segment: &Element,
        parent_image: &GrayImage,
        parent_coords: &CoordContext,
        features: &[&str],
    ) -> Result<(GrayImage, CoordContext)> {
        let name = describe(segment);
        let invalid = |reason: &str| DespeckleError::InvalidCoords {
            segment: name.clone(),
            reason: reason.to_string(),
        };

        let polygon = segment.polygon()?.ok_or_else(|| invalid("no Coords"))?;
        let mapped: Vec<(f64, f64)> = polygon
            .iter()
            .map(|&(x, y)| parent_coords.transform.apply(x, y))
            .collect();
        let (x0, y0, _, _) = bounding_box(&mapped, parent_image.width(), parent_image.height())
            .ok_or_else(|| invalid("empty bounding box"))?;
        let mut transform = parent_coords
            .transform
            .then(&Affine::translation(-(x0 as f64), -(y0 as f64)));

        let (mut image, mut applied) = match newest_matching(segment.alternative_images(), features) {
            Some(alt) => (self.load(&alt.filename)?, alt.features()),
            None => {
                let crop = crop_polygon(parent_image, &mapped)
                    .ok_or_else(|| invalid("empty bounding box"))?;
                (crop, parent_coords.features.clone())
            }
        };

        // Orientation is absolute; only the part not yet applied upstream remains
        let angle = segment
            .orientation()
            .map(|a| a - parent_coords.angle)
            .filter(|a| needs_rotation(*a))
            .unwrap_or(0.0);
        if angle != 0.0 {
            (image, transform) = apply_rotation(image, angle, transform, &mut applied);
        }

        check_features(&name, &applied, features)?;
        Ok((
            image,
            CoordContext::new(transform, parent_coords.angle + angle, applied),
        ))
    }
}

impl Workspace for FsWorkspace {
    fn input_files(&self) -> Result<Vec<InputFile>> {
        let dir = self.root.join(&self.input_grp);
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("xml") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();

        Ok(ids
            .into_iter()
            .map(|id| InputFile {
                id,
                file_grp: self.input_grp.clone(),
                page_id: None,
            })
            .collect())
    }

    fn download(&self, file: &InputFile) -> Result<String> {
        let path = self.root.join(&file.file_grp).join(format!("{}.xml", file.id));
        Ok(fs::read_to_string(path)?)
    }

    fn save_image(&self, image: &GrayImage, target: &ImageTarget<'_>) -> Result<String> {
        fs::create_dir_all(self.root.join(target.file_grp))?;
        let relative = format!("{}/{}.png", target.file_grp, target.file_id);

        let file = File::create(self.resolve(&relative))?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), image.width(), image.height());
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::Eight);
        if let Some(dpi) = target.dpi.filter(|d| d.is_finite() && *d > 0.0) {
            let ppm = (dpi / METERS_PER_INCH).round() as u32;
            encoder.set_pixel_dims(Some(png::PixelDimensions {
                xppu: ppm,
                yppu: ppm,
                unit: png::Unit::Meter,
            }));
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(image.as_raw())?;
        writer.finish()?;

        Ok(relative)
    }

    fn add_file(
        &self,
        file_grp: &str,
        file_id: &str,
        _page_id: Option<&str>,
        content: &str,
    ) -> Result<String> {
        fs::create_dir_all(self.root.join(file_grp))?;
        let relative = format!("{}/{}.xml", file_grp, file_id);
        fs::write(self.resolve(&relative), content)?;
        Ok(relative)
    }
}
