use crate::canvas::GraphicsState;
use crate::compress::{Compressor, ZlibCompressor};
use crate::debug::{DebugLogger, Field};
use crate::error::PdfError;
use crate::font::FontRegistry;
use crate::font_metrics::{FontMetricsProvider, StandardMetrics};
use crate::geometry::PageGeometry;
use crate::image::ImageRegistry;
use crate::metrics::DocumentMetrics;
use crate::page::{DocState, LinkDest, Page};
use crate::pdf::{self, PdfBuffer, SerializeContext};
use crate::types::{Disposition, FontStyle, LayoutMode, Orientation, PageFormat, Unit, ZoomMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_ALIAS: &str = "{nb}";

/// Header and footer hooks run around every page.
///
/// The decorator is detached from the document while a hook runs, so hooks
/// may freely draw on the document they receive.
pub trait PageDecorator {
    fn header(&mut self, doc: &mut Document) -> Result<(), PdfError> {
        let _ = doc;
        Ok(())
    }

    fn footer(&mut self, doc: &mut Document) -> Result<(), PdfError> {
        let _ = doc;
        Ok(())
    }

    /// Consulted before `cell` breaks the page automatically.
    fn accept_page_break(&mut self, doc: &Document) -> bool {
        doc.auto_page_break()
    }
}

/// Receives the finished document, e.g. to send it over HTTP.
pub trait Delivery {
    fn deliver(
        &mut self,
        bytes: &[u8],
        filename: &str,
        disposition: Disposition,
    ) -> Result<(), PdfError>;
}

/// Writes the document to `filename` on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileDelivery;

impl Delivery for FileDelivery {
    fn deliver(&mut self, bytes: &[u8], filename: &str, _: Disposition) -> Result<(), PdfError> {
        std::fs::write(filename, bytes)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub producer: String,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub author: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
}

pub struct DocumentBuilder {
    orientation: Orientation,
    unit: Unit,
    format: PageFormat,
    compression: bool,
    metrics_provider: Option<Arc<dyn FontMetricsProvider>>,
    compressor: Option<Arc<dyn Compressor>>,
    decorator: Option<Box<dyn PageDecorator>>,
    creation_date: Option<String>,
    producer: String,
    debug_path: Option<PathBuf>,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            orientation: Orientation::Portrait,
            unit: Unit::Mm,
            format: PageFormat::A4,
            compression: true,
            metrics_provider: None,
            compressor: None,
            decorator: None,
            creation_date: None,
            producer: "pagewright".to_string(),
            debug_path: None,
        }
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn format(mut self, format: PageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    // Shared across documents; defaults to a fresh StandardMetrics.
    pub fn metrics_provider(mut self, provider: Arc<dyn FontMetricsProvider>) -> Self {
        self.metrics_provider = Some(provider);
        self
    }

    pub fn compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn decorator(mut self, decorator: impl PageDecorator + 'static) -> Self {
        self.decorator = Some(Box::new(decorator));
        self
    }

    // Pins /CreationDate (YYYYMMDDHHMMSS) for reproducible output.
    pub fn creation_date(mut self, stamp: impl Into<String>) -> Self {
        self.creation_date = Some(stamp.into());
        self
    }

    pub fn producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    // JSON-lines trace of page, font, image and serialization events.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Document, PdfError> {
        let geometry = PageGeometry::new(self.unit, self.format, self.orientation)?;
        if let Some(stamp) = &self.creation_date {
            if stamp.len() != 14 || !stamp.bytes().all(|b| b.is_ascii_digit()) {
                return Err(PdfError::InvalidConfiguration(format!(
                    "creation date must be YYYYMMDDHHMMSS, got {}",
                    stamp
                )));
            }
        }
        let debug = if let Some(path) = self.debug_path {
            Some(Arc::new(DebugLogger::new(path)?))
        } else {
            None
        };

        let scale = geometry.scale;
        let margin = 28.35 / scale;
        let break_margin = margin * 2.0;
        let page_break_trigger = geometry.height - break_margin;
        Ok(Document {
            state: DocState::Initial,
            buffer: PdfBuffer::new(),
            pages: Vec::new(),
            geometry,
            left_margin: margin,
            top_margin: margin,
            right_margin: margin,
            break_margin,
            cell_margin: margin / 10.0,
            auto_page_break: true,
            page_break_trigger,
            in_footer: false,
            gs: GraphicsState::new(0.567 / scale, 12.0 / scale),
            fonts: FontRegistry::new(),
            images: ImageRegistry::new(),
            links: Vec::new(),
            compress: self.compression,
            compressor: self
                .compressor
                .unwrap_or_else(|| Arc::new(ZlibCompressor::default())),
            metrics_provider: self
                .metrics_provider
                .unwrap_or_else(|| Arc::new(StandardMetrics::new())),
            decorator: self.decorator,
            info: DocumentInfo {
                producer: self.producer,
                title: None,
                subject: None,
                author: None,
                keywords: None,
                creator: None,
            },
            alias_nb_pages: Some(DEFAULT_ALIAS.to_string()),
            zoom: ZoomMode::FullWidth,
            layout: LayoutMode::Continuous,
            creation_date: self.creation_date,
            debug,
            metrics: None,
        })
    }
}

/// A PDF document under construction.
pub struct Document {
    pub(crate) state: DocState,
    pub(crate) buffer: PdfBuffer,
    pub(crate) pages: Vec<Page>,
    pub(crate) geometry: PageGeometry,
    pub(crate) left_margin: f64,
    pub(crate) top_margin: f64,
    pub(crate) right_margin: f64,
    pub(crate) break_margin: f64,
    pub(crate) cell_margin: f64,
    pub(crate) auto_page_break: bool,
    pub(crate) page_break_trigger: f64,
    pub(crate) in_footer: bool,
    pub(crate) gs: GraphicsState,
    pub(crate) fonts: FontRegistry,
    pub(crate) images: ImageRegistry,
    pub(crate) links: Vec<LinkDest>,
    pub(crate) compress: bool,
    pub(crate) compressor: Arc<dyn Compressor>,
    pub(crate) metrics_provider: Arc<dyn FontMetricsProvider>,
    decorator: Option<Box<dyn PageDecorator>>,
    info: DocumentInfo,
    alias_nb_pages: Option<String>,
    zoom: ZoomMode,
    layout: LayoutMode,
    creation_date: Option<String>,
    pub(crate) debug: Option<Arc<DebugLogger>>,
    metrics: Option<DocumentMetrics>,
}

impl Document {
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::new()
    }

    pub fn new(orientation: Orientation, unit: Unit, format: PageFormat) -> Result<Self, PdfError> {
        DocumentBuilder::new()
            .orientation(orientation)
            .unit(unit)
            .format(format)
            .build()
    }

    pub(crate) fn debug_event(&self, kind: &str, fields: &[(&str, Field<'_>)]) {
        if let Some(logger) = self.debug.as_deref() {
            logger.event(kind, fields);
        }
    }

    /// Appends one line to the open page, or to the document buffer when no
    /// page is open.
    pub(crate) fn out(&mut self, line: &[u8]) -> Result<(), PdfError> {
        match self.state {
            DocState::Closed => return Err(PdfError::Closed),
            DocState::Initial => self.begin_doc(),
            DocState::Opened | DocState::PageOpen => {}
        }
        match (self.state, self.pages.last_mut()) {
            (DocState::PageOpen, Some(page)) => {
                page.content.extend_from_slice(line);
                page.content.push(b'\n');
            }
            _ => self.buffer.out(line),
        }
        Ok(())
    }

    pub(crate) fn out_str(&mut self, line: &str) -> Result<(), PdfError> {
        self.out(line.as_bytes())
    }

    fn begin_doc(&mut self) {
        if self.state == DocState::Initial {
            self.state = DocState::Opened;
            self.buffer.out_str("%PDF-1.3");
        }
    }

    /// Writes the file header. Called implicitly by any output operation.
    pub fn open(&mut self) -> Result<(), PdfError> {
        if self.state == DocState::Closed {
            return Err(PdfError::Closed);
        }
        self.begin_doc();
        Ok(())
    }

    /// Starts a new page, finishing the current one with its footer.
    /// `None` uses the document's default orientation.
    pub fn add_page(&mut self, orientation: Option<Orientation>) -> Result<(), PdfError> {
        if self.state == DocState::Closed {
            return Err(PdfError::Closed);
        }
        self.begin_doc();

        let line_width = self.gs.line_width;
        let draw = self.gs.draw_color.clone();
        let fill = self.gs.fill_color.clone();
        let text = self.gs.text_color.clone();
        let color_flag = self.gs.color_flag;
        let family = self.gs.font_family.clone();
        let style = FontStyle {
            underline: self.gs.underline,
            ..self.gs.font_style
        };
        let size = self.gs.font_size_pt;

        if !self.pages.is_empty() {
            self.run_footer()?;
            self.end_page();
        }
        self.begin_page(orientation);

        self.out_str("2 J")?;
        self.gs.line_width = line_width;
        self.out_str(&format!("{:.2} w", line_width * self.geometry.scale))?;
        if !family.is_empty() {
            self.select_font(&family, style, Some(size), true)?;
        }
        self.gs.draw_color = draw.clone();
        if draw != "0 G" {
            self.out_str(&draw)?;
        }
        self.gs.fill_color = fill.clone();
        if fill != "0 g" {
            self.out_str(&fill)?;
        }
        self.gs.text_color = text.clone();
        self.gs.color_flag = color_flag;

        self.run_header()?;

        // The header may have changed the pen; put the caller's settings back.
        if self.gs.line_width != line_width {
            self.gs.line_width = line_width;
            self.out_str(&format!("{:.2} w", line_width * self.geometry.scale))?;
        }
        if !family.is_empty() {
            self.select_font(&family, style, Some(size), false)?;
        }
        if self.gs.draw_color != draw {
            self.out_str(&draw)?;
            self.gs.draw_color = draw;
        }
        if self.gs.fill_color != fill {
            self.out_str(&fill)?;
            self.gs.fill_color = fill;
        }
        self.gs.text_color = text;
        self.gs.color_flag = color_flag;
        Ok(())
    }

    fn begin_page(&mut self, orientation: Option<Orientation>) {
        let default = self.geometry.default_orientation;
        let resolved = orientation.unwrap_or(default);
        let changed = resolved != default;
        self.pages.push(Page::new(changed));
        self.state = DocState::PageOpen;
        self.gs.x = self.left_margin;
        self.gs.y = self.top_margin;
        self.gs.last_height = 0.0;
        if resolved != self.geometry.current_orientation {
            self.geometry.apply_orientation(resolved);
            self.page_break_trigger = self.geometry.height - self.break_margin;
        }
        log::debug!("page {} started", self.pages.len());
        self.debug_event(
            "pdf.page.begin",
            &[
                ("page", Field::Int(self.pages.len() as u64)),
                ("orientation_changed", Field::Bool(changed)),
            ],
        );
    }

    fn end_page(&mut self) {
        self.state = DocState::Opened;
        let bytes = self.pages.last().map_or(0, |page| page.content.len());
        self.debug_event(
            "pdf.page.end",
            &[
                ("page", Field::Int(self.pages.len() as u64)),
                ("content_bytes", Field::Int(bytes as u64)),
            ],
        );
    }

    fn run_header(&mut self) -> Result<(), PdfError> {
        if let Some(mut decorator) = self.decorator.take() {
            let result = decorator.header(self);
            self.decorator = Some(decorator);
            result?;
        }
        Ok(())
    }

    fn run_footer(&mut self) -> Result<(), PdfError> {
        self.in_footer = true;
        self.gs.x = self.left_margin;
        let result = match self.decorator.take() {
            Some(mut decorator) => {
                let result = decorator.footer(self);
                self.decorator = Some(decorator);
                result
            }
            None => Ok(()),
        };
        self.in_footer = false;
        result
    }

    pub(crate) fn accept_page_break(&mut self) -> bool {
        match self.decorator.take() {
            Some(mut decorator) => {
                let accepted = decorator.accept_page_break(self);
                self.decorator = Some(decorator);
                accepted
            }
            None => self.auto_page_break,
        }
    }

    /// Finishes the last page and serializes the document. Further calls
    /// are no-ops.
    pub fn close(&mut self) -> Result<(), PdfError> {
        if self.state == DocState::Closed {
            return Ok(());
        }
        if self.pages.is_empty() {
            self.add_page(None)?;
        }
        self.run_footer()?;
        self.end_page();
        self.end_document();
        Ok(())
    }

    fn end_document(&mut self) {
        let started = Instant::now();
        let creation_date = self.creation_date.clone().unwrap_or_else(now_stamp);
        let ctx = SerializeContext {
            geometry: &self.geometry,
            links: &self.links,
            fonts: &self.fonts,
            images: &self.images,
            info: &self.info,
            zoom: self.zoom,
            layout: self.layout,
            alias: self.alias_nb_pages.as_deref(),
            compressor: if self.compress {
                Some(self.compressor.as_ref())
            } else {
                None
            },
            creation_date: &creation_date,
            debug: self.debug.as_deref(),
        };
        let mut metrics = pdf::write_document(&mut self.buffer, &self.pages, &ctx);
        metrics.serialize_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.state = DocState::Closed;

        log::debug!(
            "document closed: {} pages, {} objects, {} bytes",
            metrics.pages.len(),
            metrics.object_count,
            metrics.total_bytes
        );
        if let Some(logger) = self.debug.as_deref() {
            logger.event(
                "pdf.close",
                &[
                    ("pages", Field::Int(metrics.pages.len() as u64)),
                    ("fonts", Field::Int(metrics.font_count as u64)),
                    ("images", Field::Int(metrics.image_count as u64)),
                    ("objects", Field::Int(metrics.object_count as u64)),
                    ("bytes", Field::Int(metrics.total_bytes as u64)),
                    ("ms", Field::Float(metrics.serialize_ms)),
                ],
            );
            logger.emit_summary("close");
            logger.flush();
        }
        self.metrics = Some(metrics);
    }

    /// Closes the document if needed and returns the buffered bytes. After
    /// [`Document::flush`] this is only the unflushed tail.
    pub fn get_output(&mut self) -> Result<&[u8], PdfError> {
        self.close()?;
        Ok(self.buffer.bytes())
    }

    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), PdfError> {
        if self.buffer.is_flushed() {
            return Err(PdfError::Flushed);
        }
        self.close()?;
        std::fs::write(path, self.buffer.bytes())?;
        Ok(())
    }

    pub fn output(
        &mut self,
        filename: &str,
        disposition: Disposition,
        delivery: &mut impl Delivery,
    ) -> Result<(), PdfError> {
        if self.buffer.is_flushed() {
            return Err(PdfError::Flushed);
        }
        self.close()?;
        delivery.deliver(self.buffer.bytes(), filename, disposition)
    }

    /// Hands out everything buffered so far. Once used, `save` and `output`
    /// are no longer available for this document.
    pub fn flush(&mut self) -> Result<Vec<u8>, PdfError> {
        self.begin_doc();
        let bytes = self.buffer.take();
        self.debug_event("pdf.flush", &[("bytes", Field::Int(bytes.len() as u64))]);
        Ok(bytes)
    }

    pub fn metrics(&self) -> Option<&DocumentMetrics> {
        self.metrics.as_ref()
    }

    pub fn set_margins(&mut self, left: f64, top: f64, right: Option<f64>) {
        self.left_margin = left;
        self.top_margin = top;
        self.right_margin = right.unwrap_or(left);
    }

    // Moves the pen right if it sits inside the new margin.
    pub fn set_left_margin(&mut self, margin: f64) {
        self.left_margin = margin;
        if !self.pages.is_empty() && self.gs.x < margin {
            self.gs.x = margin;
        }
    }

    pub fn set_top_margin(&mut self, margin: f64) {
        self.top_margin = margin;
    }

    pub fn set_right_margin(&mut self, margin: f64) {
        self.right_margin = margin;
    }

    pub fn set_auto_page_break(&mut self, enabled: bool, margin: f64) {
        self.auto_page_break = enabled;
        self.break_margin = margin;
        self.page_break_trigger = self.geometry.height - margin;
    }

    pub fn auto_page_break(&self) -> bool {
        self.auto_page_break
    }

    pub fn set_display_mode(&mut self, zoom: ZoomMode, layout: LayoutMode) -> Result<(), PdfError> {
        if let ZoomMode::Percent(value) = zoom {
            if !value.is_finite() || value <= 0.0 {
                return Err(PdfError::InvalidConfiguration(format!(
                    "incorrect zoom display mode: {}",
                    value
                )));
            }
        }
        self.zoom = zoom;
        self.layout = layout;
        Ok(())
    }

    pub fn set_compression(&mut self, enabled: bool) {
        self.compress = enabled;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.info.title = Some(title.into());
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.info.subject = Some(subject.into());
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.info.author = Some(author.into());
    }

    pub fn set_keywords(&mut self, keywords: impl Into<String>) {
        self.info.keywords = Some(keywords.into());
    }

    pub fn set_creator(&mut self, creator: impl Into<String>) {
        self.info.creator = Some(creator.into());
    }

    /// Token replaced by the total page count at close; `None` means `{nb}`
    /// and an empty token turns replacement off.
    pub fn alias_nb_pages(&mut self, alias: Option<&str>) {
        self.alias_nb_pages = match alias {
            Some("") => None,
            Some(alias) => Some(alias.to_string()),
            None => Some(DEFAULT_ALIAS.to_string()),
        };
    }

    pub fn page_no(&self) -> usize {
        self.pages.len()
    }

    pub fn x(&self) -> f64 {
        self.gs.x
    }

    pub fn y(&self) -> f64 {
        self.gs.y
    }

    pub fn set_x(&mut self, x: f64) {
        self.gs.x = self.geometry.resolve_x(x);
    }

    // Also returns the pen to the left margin.
    pub fn set_y(&mut self, y: f64) {
        self.gs.x = self.left_margin;
        self.gs.y = self.geometry.resolve_y(y);
    }

    pub fn set_xy(&mut self, x: f64, y: f64) {
        self.set_y(y);
        self.set_x(x);
    }

    /// Printable width between the left and right margins.
    pub fn page_width(&self) -> f64 {
        self.geometry.width - self.right_margin - self.left_margin
    }

    /// Printable height between the top margin and the page break margin.
    pub fn page_height(&self) -> f64 {
        self.geometry.height - self.top_margin - self.break_margin
    }

    pub fn scale(&self) -> f64 {
        self.geometry.scale
    }

    // Line break; `None` advances by the height of the last cell.
    pub fn new_line(&mut self, height: Option<f64>) {
        self.gs.x = self.left_margin;
        self.gs.y += height.unwrap_or(self.gs.last_height);
    }
}

fn now_stamp() -> String {
    let now = time::OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
