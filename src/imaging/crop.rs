use super::despeckle::PAPER;
use image::{imageops, GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

/// Integer bounding box `(x0, y0, x1, y1)` of a polygon, clamped to the image
///
/// Returns `None` when the clamped box is empty.
pub fn bounding_box(polygon: &[(f64, f64)], width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
    if polygon.is_empty() {
        return None;
    }

    let (min_x, min_y, max_x, max_y) = polygon.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
    );

    let clamp = |v: f64, max: u32| v.max(0.0).min(max as f64) as u32;
    let x0 = clamp(min_x.floor(), width);
    let y0 = clamp(min_y.floor(), height);
    let x1 = clamp(max_x.ceil(), width);
    let y1 = clamp(max_y.ceil(), height);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0, y0, x1, y1))
}

/// Cut the bounding box of `polygon` (parent pixel coordinates) out of
/// `image`, painting everything outside the polygon as paper
pub fn crop_polygon(image: &GrayImage, polygon: &[(f64, f64)]) -> Option<GrayImage> {
    let (x0, y0, x1, y1) = bounding_box(polygon, image.width(), image.height())?;
    let mut cropped = imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image();

    let mut outline: Vec<Point<i32>> = Vec::with_capacity(polygon.len());
    for &(x, y) in polygon {
        let point = Point::new((x - x0 as f64).round() as i32, (y - y0 as f64).round() as i32);
        if outline.last() != Some(&point) {
            outline.push(point);
        }
    }
    while outline.len() > 1 && outline.first() == outline.last() {
        outline.pop();
    }

    // Rectangles (the common case) and degenerate outlines need no mask
    if outline.len() >= 3 && !is_axis_aligned_box(&outline, cropped.width(), cropped.height()) {
        let mut mask = GrayImage::new(cropped.width(), cropped.height());
        draw_polygon_mut(&mut mask, &outline, Luma([255u8]));
        for (x, y, pixel) in cropped.enumerate_pixels_mut() {
            if mask.get_pixel(x, y).0[0] == 0 {
                *pixel = Luma([PAPER]);
            }
        }
    }

    Some(cropped)
}

fn is_axis_aligned_box(outline: &[Point<i32>], width: u32, height: u32) -> bool {
    let (w, h) = (width as i32, height as i32);
    outline.len() == 4
        && outline
            .iter()
            .all(|p| (p.x == 0 || p.x >= w) && (p.y == 0 || p.y >= h))
}
