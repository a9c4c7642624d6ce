use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

/// Ink (foreground) pixel value of a binarized raster
pub const INK: u8 = 0;
/// Paper (background) pixel value of a binarized raster
pub const PAPER: u8 = 255;

/// Counts of components removed by the two passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DespeckleStats {
    /// Ink components turned into paper
    pub specks_removed: usize,
    /// Paper components turned into ink
    pub holes_filled: usize,
}

/// Remove small connected components from a binarized raster in place
///
/// First every 8-connected ink component with an area strictly below
/// `threshold` pixels is erased, then every 8-connected paper component below
/// `threshold` is filled, on the already cleaned raster. A threshold of zero
/// or less leaves the raster untouched; a raster left without ink stays blank.
pub fn despeckle(image: &mut GrayImage, threshold: f64) -> DespeckleStats {
    if threshold.is_nan() || threshold <= 0.0 {
        return DespeckleStats::default();
    }

    let normalized = normalize(image);
    if normalized > 0 {
        tracing::warn!("Normalized {} non-binary pixels before despeckling", normalized);
    }

    let specks_removed = remove_small_components(image, INK, threshold);
    // Without ink left there is nothing for paper to be a hole in
    let holes_filled = if image.pixels().any(|p| p.0[0] == INK) {
        remove_small_components(image, PAPER, threshold)
    } else {
        0
    };

    DespeckleStats {
        specks_removed,
        holes_filled,
    }
}

/// Whether every pixel is pure ink or pure paper
pub fn is_binary(image: &GrayImage) -> bool {
    image.pixels().all(|p| p.0[0] == INK || p.0[0] == PAPER)
}

/// Snap intermediate gray values to ink or paper, returning how many changed
fn normalize(image: &mut GrayImage) -> usize {
    let mut changed = 0;
    for pixel in image.pixels_mut() {
        let value = pixel.0[0];
        if value != INK && value != PAPER {
            pixel.0[0] = if value < 128 { INK } else { PAPER };
            changed += 1;
        }
    }
    changed
}

/// Flip every component of `value` smaller than `threshold` to the opposite value
fn remove_small_components(image: &mut GrayImage, value: u8, threshold: f64) -> usize {
    let replacement = if value == INK { PAPER } else { INK };
    // On a binary raster everything that is not `value` is `replacement`
    let labels = connected_components(&*image, Connectivity::Eight, Luma([replacement]));

    let mut areas: Vec<u64> = Vec::new();
    for label in labels.pixels() {
        let label = label.0[0] as usize;
        if label == 0 {
            continue;
        }
        if label >= areas.len() {
            areas.resize(label + 1, 0);
        }
        areas[label] += 1;
    }

    let small: Vec<bool> = areas
        .iter()
        .map(|&area| area > 0 && (area as f64) < threshold)
        .collect();

    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0] as usize;
        if label != 0 && small[label] {
            image.put_pixel(x, y, Luma([replacement]));
        }
    }

    small.iter().filter(|&&s| s).count()
}
