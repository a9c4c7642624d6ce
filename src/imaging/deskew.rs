use super::despeckle::PAPER;
use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

/// Angles below this (degrees) are treated as no rotation
const MIN_ANGLE: f64 = 0.01;

/// Whether an angle is large enough to warrant rotating a raster
pub fn needs_rotation(degrees: f64) -> bool {
    degrees.is_finite() && degrees.abs() >= MIN_ANGLE
}

/// Rotate a binarized raster clockwise about its center by `degrees`
///
/// Dimensions are preserved; uncovered corners are filled with paper and
/// nearest-neighbour sampling keeps the raster two-valued.
pub fn rotate(image: &GrayImage, degrees: f64) -> GrayImage {
    if !needs_rotation(degrees) {
        return image.clone();
    }

    let theta = degrees.to_radians() as f32;
    rotate_about_center(image, theta, Interpolation::Nearest, Luma([PAPER]))
}
