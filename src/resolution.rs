/// Default resolution when neither an override nor image metadata is usable
pub const FALLBACK_DPI: f64 = 300.0;
/// Typographic points per inch
const POINTS_PER_INCH: f64 = 72.0;
const CM_PER_INCH: f64 = 2.54;

/// Pixel density unit of the image metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionUnit {
    #[default]
    Inch,
    Centimeter,
}

/// Resolution metadata of a page image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageInfo {
    /// Pixels per unit; 1 means unknown
    pub resolution: f64,
    pub unit: ResolutionUnit,
}

impl Default for ImageInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

impl ImageInfo {
    pub fn unknown() -> Self {
        Self {
            resolution: 1.0,
            unit: ResolutionUnit::Inch,
        }
    }

    pub fn is_known(&self) -> bool {
        self.resolution.is_finite() && self.resolution > 0.0 && self.resolution != 1.0
    }
}

/// Where the effective DPI came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpiSource {
    Override,
    Metadata,
    Fallback,
}

impl DpiSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Override => "parameter override",
            Self::Metadata => "image meta-data",
            Self::Fallback => "fall-back",
        }
    }
}

/// Pick the effective DPI: positive override, else known metadata, else 300
pub fn effective_dpi(override_dpi: f64, info: &ImageInfo) -> (f64, DpiSource) {
    if override_dpi > 0.0 {
        return (override_dpi, DpiSource::Override);
    }
    if info.is_known() {
        let dpi = match info.unit {
            ResolutionUnit::Centimeter => (info.resolution * CM_PER_INCH).round(),
            ResolutionUnit::Inch => info.resolution,
        };
        return (dpi, DpiSource::Metadata);
    }
    (FALLBACK_DPI, DpiSource::Fallback)
}

/// Same as [`effective_dpi`], logging which source was used
pub fn resolve_dpi(page_id: &str, override_dpi: f64, info: &ImageInfo) -> f64 {
    let (dpi, source) = effective_dpi(override_dpi, info);
    tracing::info!(
        "Page '{}' images will use {} DPI from {}",
        page_id,
        dpi,
        source.as_str()
    );
    dpi
}

/// Convert a size in points into pixels at `dpi`
///
/// The result is used unchanged as the area limit of the despeckle passes.
pub fn noise_threshold_px(maxsize_pt: f64, dpi: f64) -> f64 {
    maxsize_pt * dpi / POINTS_PER_INCH
}
