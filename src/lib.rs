mod canvas;
mod compress;
mod core_fonts;
mod debug;
mod document;
mod encoding;
mod error;
mod font;
mod font_metrics;
mod geometry;
mod image;
mod metrics;
mod page;
mod pdf;
mod text;
mod types;

pub use compress::{Compressor, ZlibCompressor};
pub use document::{
    Delivery, Document, DocumentBuilder, DocumentInfo, FileDelivery, PageDecorator,
};
pub use error::{ErrorKind, ImageError, PdfError};
pub use font_metrics::{
    CharWidths, FontDefinition, FontKind, FontMetricsProvider, FontProgram, StandardMetrics,
    truetype_definition,
};
pub use crate::image::{ColorSpace, ImageInfo};
pub use metrics::{DocumentMetrics, PageMetrics};
pub use types::{
    Align, Border, Color, Disposition, DrawStyle, FontStyle, ImageType, LayoutMode, LineBreak,
    LinkId, LinkTarget, Orientation, PageFormat, Sides, Unit, ZoomMode,
};
