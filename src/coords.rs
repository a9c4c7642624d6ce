/// 2x3 affine transform: `x' = a*x + b*y + c`, `y' = d*x + e*y + f`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    m: [f64; 6],
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    pub fn identity() -> Self {
        Self {
            m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            m: [1.0, 0.0, dx, 0.0, 1.0, dy],
        }
    }

    /// Clockwise rotation (y axis pointing down) about `(cx, cy)`
    pub fn rotation_about(degrees: f64, cx: f64, cy: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            m: [
                cos,
                -sin,
                cx - cos * cx + sin * cy,
                sin,
                cos,
                cy - sin * cx - cos * cy,
            ],
        }
    }

    /// Apply `self` first, then `next`
    pub fn then(&self, next: &Affine) -> Affine {
        let [a1, b1, c1, d1, e1, f1] = self.m;
        let [a2, b2, c2, d2, e2, f2] = next.m;
        Affine {
            m: [
                a2 * a1 + b2 * d1,
                a2 * b1 + b2 * e1,
                a2 * c1 + b2 * f1 + c2,
                d2 * a1 + e2 * d1,
                d2 * b1 + e2 * e1,
                d2 * c1 + e2 * f1 + f2,
            ],
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.m;
        (a * x + b * y + c, d * x + e * y + f)
    }
}

/// Coordinate context accompanying a page or segment raster
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoordContext {
    /// Page coordinates to image pixels
    pub transform: Affine,
    /// Rotation (degrees, clockwise) already applied to the image
    pub angle: f64,
    /// Features already applied to the image, in order
    pub features: Vec<String>,
}

impl CoordContext {
    pub fn new(transform: Affine, angle: f64, features: Vec<String>) -> Self {
        Self {
            transform,
            angle,
            features,
        }
    }

    /// Copy of this context with `feature` appended
    pub fn with_feature(&self, feature: &str) -> CoordContext {
        let mut features = self.features.clone();
        features.push(feature.to_string());
        CoordContext {
            features,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: (f64, f64), expected: (f64, f64)) {
        assert!(
            (actual.0 - expected.0).abs() < 1e-9 && (actual.1 - expected.1).abs() < 1e-9,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn test_translation_then_rotation() {
        let crop = Affine::translation(-10.0, -20.0);
        let rotate = Affine::rotation_about(90.0, 0.0, 0.0);
        let combined = crop.then(&rotate);

        // (11, 20) -> (1, 0) -> rotated clockwise by 90 degrees -> (0, 1)
        assert_close(combined.apply(11.0, 20.0), (0.0, 1.0));
    }

    #[test]
    fn test_rotation_keeps_center_fixed() {
        let rotate = Affine::rotation_about(33.0, 50.0, 25.0);
        assert_close(rotate.apply(50.0, 25.0), (50.0, 25.0));
    }

    #[test]
    fn test_with_feature_does_not_mutate_original() {
        let ctx = CoordContext::new(
            Affine::identity(),
            0.0,
            vec!["binarized".to_string(), "deskewed".to_string()],
        );
        let derived = ctx.with_feature("despeckled");

        assert_eq!(ctx.features, vec!["binarized", "deskewed"]);
        assert_eq!(derived.features, vec!["binarized", "deskewed", "despeckled"]);
    }
}
