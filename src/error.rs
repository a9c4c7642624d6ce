use thiserror::Error;

#[derive(Error, Debug)]
pub enum DespeckleError {
    #[error("No image with features [{features}] available for {segment}")]
    MissingFeature { segment: String, features: String },

    #[error("Invalid coordinates for {segment}: {reason}")]
    InvalidCoords { segment: String, reason: String },

    #[error("Invalid layout document: {0}")]
    Layout(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Failed to process image: {0}")]
    Image(#[from] image::ImageError),

    #[error("PNG error: {0}")]
    Png(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<quick_xml::Error> for DespeckleError {
    fn from(err: quick_xml::Error) -> Self {
        DespeckleError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for DespeckleError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        DespeckleError::Xml(err.to_string())
    }
}

impl From<png::DecodingError> for DespeckleError {
    fn from(err: png::DecodingError) -> Self {
        DespeckleError::Png(err.to_string())
    }
}

impl From<png::EncodingError> for DespeckleError {
    fn from(err: png::EncodingError) -> Self {
        DespeckleError::Png(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DespeckleError>;
