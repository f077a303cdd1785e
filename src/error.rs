use std::fmt;

#[derive(Debug)]
pub enum PdfError {
    InvalidConfiguration(String),
    Font(String),
    Image(ImageError),
    Closed,
    Flushed,
    Io(std::io::Error),
}

/// Coarse classification of a [`PdfError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad construction parameter; the document was never usable.
    Configuration,
    /// A font or image could not be loaded; only that call failed.
    Resource,
    /// The call is not allowed in the document's current state.
    State,
    Io,
}

#[derive(Debug)]
pub enum ImageError {
    Unreadable { source: String, message: String },
    UnknownType(String),
    NotJpeg(String),
    NotPng(String),
    UnsupportedFormat { source: String, reason: String },
    MissingPalette(String),
}

impl PdfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PdfError::InvalidConfiguration(_) => ErrorKind::Configuration,
            PdfError::Font(_) | PdfError::Image(_) => ErrorKind::Resource,
            PdfError::Closed | PdfError::Flushed => ErrorKind::State,
            PdfError::Io(_) => ErrorKind::Io,
        }
    }
}

impl fmt::Display for PdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            PdfError::Font(message) => write!(f, "font error: {}", message),
            PdfError::Image(err) => write!(f, "image error: {}", err),
            PdfError::Closed => write!(f, "document is already closed"),
            PdfError::Flushed => write!(
                f,
                "buffer has been flushed already, in-memory output is unavailable"
            ),
            PdfError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Unreadable { source, message } => {
                write!(f, "missing or incorrect image {}: {}", source, message)
            }
            ImageError::UnknownType(source) => {
                write!(f, "cannot determine image type of {}", source)
            }
            ImageError::NotJpeg(source) => write!(f, "not a JPEG file: {}", source),
            ImageError::NotPng(source) => write!(f, "not a PNG file: {}", source),
            ImageError::UnsupportedFormat { source, reason } => {
                write!(f, "unsupported image {}: {}", source, reason)
            }
            ImageError::MissingPalette(source) => write!(f, "missing palette in {}", source),
        }
    }
}

impl std::error::Error for PdfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PdfError::Io(err) => Some(err),
            PdfError::Image(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for ImageError {}

impl From<std::io::Error> for PdfError {
    fn from(value: std::io::Error) -> Self {
        PdfError::Io(value)
    }
}

impl From<ImageError> for PdfError {
    fn from(value: ImageError) -> Self {
        PdfError::Image(value)
    }
}
