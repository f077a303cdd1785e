use crate::compress::Compressor;
use crate::debug::{DebugLogger, Field};
use crate::document::DocumentInfo;
use crate::encoding::{escape_bytes, replace_bytes, text_string, to_winansi};
use crate::font::FontRegistry;
use crate::font_metrics::FontKind;
use crate::geometry::PageGeometry;
use crate::image::{ColorSpace, ImageRegistry};
use crate::metrics::{DocumentMetrics, PageMetrics};
use crate::page::{LinkDest, Page};
use crate::types::{LayoutMode, LinkTarget, ZoomMode};

/// Pages root, written last but referenced from every page.
const PAGES_ID: usize = 1;
/// Shared resource dictionary.
const RESOURCES_ID: usize = 2;

/// Append-only output buffer that records the byte offset of every object.
///
/// Offsets are absolute: bytes handed out by [`PdfBuffer::take`] still count.
pub(crate) struct PdfBuffer {
    buffer: Vec<u8>,
    flushed_len: usize,
    flushed: bool,
    offsets: Vec<usize>, // index by object id; 0 is the free object.
    last_id: usize,
}

impl PdfBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buffer: Vec::new(),
            flushed_len: 0,
            flushed: false,
            offsets: vec![0; PAGES_ID + RESOURCES_ID],
            last_id: RESOURCES_ID,
        }
    }

    pub(crate) fn offset(&self) -> usize {
        self.flushed_len + self.buffer.len()
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub(crate) fn is_flushed(&self) -> bool {
        self.flushed
    }

    pub(crate) fn last_id(&self) -> usize {
        self.last_id
    }

    /// Writes one line.
    pub(crate) fn out(&mut self, line: &[u8]) {
        self.buffer.extend_from_slice(line);
        self.buffer.push(b'\n');
    }

    pub(crate) fn out_str(&mut self, line: &str) {
        self.out(line.as_bytes());
    }

    /// Starts the next numbered object.
    pub(crate) fn new_object(&mut self) -> usize {
        self.last_id += 1;
        let id = self.last_id;
        self.begin_object(id);
        id
    }

    fn begin_object(&mut self, id: usize) {
        if self.offsets.len() <= id {
            self.offsets.resize(id + 1, 0);
        }
        self.offsets[id] = self.offset();
        self.out_str(&format!("{} 0 obj", id));
    }

    pub(crate) fn put_stream(&mut self, data: &[u8]) {
        self.out(b"stream");
        self.out(data);
        self.out(b"endstream");
    }

    /// Hands out everything buffered so far.
    pub(crate) fn take(&mut self) -> Vec<u8> {
        let bytes = std::mem::take(&mut self.buffer);
        self.flushed_len += bytes.len();
        self.flushed = true;
        bytes
    }
}

pub(crate) struct SerializeContext<'a> {
    pub(crate) geometry: &'a PageGeometry,
    pub(crate) links: &'a [LinkDest],
    pub(crate) fonts: &'a FontRegistry,
    pub(crate) images: &'a ImageRegistry,
    pub(crate) info: &'a DocumentInfo,
    pub(crate) zoom: ZoomMode,
    pub(crate) layout: LayoutMode,
    pub(crate) alias: Option<&'a str>,
    pub(crate) compressor: Option<&'a dyn Compressor>,
    pub(crate) creation_date: &'a str,
    pub(crate) debug: Option<&'a DebugLogger>,
}

/// Writes everything after the last page: page objects, fonts, images,
/// resources, info, catalog, cross-reference table and trailer.
pub(crate) fn write_document(
    buf: &mut PdfBuffer,
    pages: &[Page],
    ctx: &SerializeContext<'_>,
) -> DocumentMetrics {
    let mut metrics = DocumentMetrics {
        pages: put_pages(buf, pages, ctx),
        font_count: ctx.fonts.len(),
        image_count: ctx.images.len(),
        ..DocumentMetrics::default()
    };
    let font_ids = put_fonts(buf, ctx.fonts);
    let image_ids = put_images(buf, ctx);
    put_resources(buf, &font_ids, &image_ids);

    buf.new_object();
    buf.out_str("<<");
    put_info(buf, ctx);
    buf.out_str(">>");
    buf.out_str("endobj");

    buf.new_object();
    buf.out_str("<<");
    put_catalog(buf, ctx);
    buf.out_str(">>");
    buf.out_str("endobj");

    put_xref(buf);
    metrics.object_count = buf.last_id;
    metrics.total_bytes = buf.offset();
    metrics
}

fn put_pages(buf: &mut PdfBuffer, pages: &[Page], ctx: &SerializeContext<'_>) -> Vec<PageMetrics> {
    let (w_pt, h_pt) = ctx.geometry.default_size_pt();
    let page_count = pages.len().to_string();
    let mut metrics = Vec::with_capacity(pages.len());

    for (idx, page) in pages.iter().enumerate() {
        buf.new_object();
        buf.out_str("<</Type /Page");
        buf.out_str(&format!("/Parent {} 0 R", PAGES_ID));
        if page.orientation_changed {
            buf.out_str(&format!("/MediaBox [0 0 {:.2} {:.2}]", h_pt, w_pt));
        }
        buf.out_str(&format!("/Resources {} 0 R", RESOURCES_ID));
        if !page.links.is_empty() {
            let mut annots = b"/Annots [".to_vec();
            for link in &page.links {
                annots.extend_from_slice(
                    format!(
                        "<</Type /Annot /Subtype /Link /Rect [{:.2} {:.2} {:.2} {:.2}] /Border [0 0 0] ",
                        link.x,
                        link.y,
                        link.x + link.width,
                        link.y - link.height
                    )
                    .as_bytes(),
                );
                match &link.target {
                    LinkTarget::Uri(uri) => {
                        annots.extend_from_slice(b"/A <</S /URI /URI (");
                        annots.extend_from_slice(&escape_bytes(&to_winansi(uri)));
                        annots.extend_from_slice(b")>>>>");
                    }
                    LinkTarget::Internal(id) => {
                        let dest = ctx
                            .links
                            .get(id.0.saturating_sub(1))
                            .copied()
                            .unwrap_or_default();
                        let rotated = dest
                            .page
                            .checked_sub(1)
                            .and_then(|p| pages.get(p))
                            .is_some_and(|p| p.orientation_changed);
                        let height = if rotated { w_pt } else { h_pt };
                        annots.extend_from_slice(
                            format!(
                                "/Dest [{} 0 R /XYZ 0 {:.2} null]>>",
                                1 + 2 * dest.page,
                                height - dest.y * ctx.geometry.scale
                            )
                            .as_bytes(),
                        );
                    }
                }
            }
            annots.push(b']');
            buf.out(&annots);
        }
        buf.out_str(&format!("/Contents {} 0 R>>", buf.last_id() + 1));
        buf.out_str("endobj");

        let content = match ctx.alias {
            Some(alias) => replace_bytes(&page.content, alias.as_bytes(), page_count.as_bytes()),
            None => page.content.clone(),
        };
        let (stream, compressed) = compress_stream(ctx, &content);
        buf.new_object();
        let filter = if compressed { "/Filter /FlateDecode " } else { "" };
        buf.out_str(&format!("<<{}/Length {}>>", filter, stream.len()));
        buf.put_stream(&stream);
        buf.out_str("endobj");

        metrics.push(PageMetrics {
            page_number: idx + 1,
            content_bytes: content.len(),
            stream_bytes: stream.len(),
            compressed,
            link_count: page.links.len(),
        });
    }

    buf.offsets[PAGES_ID] = buf.offset();
    buf.out_str(&format!("{} 0 obj", PAGES_ID));
    buf.out_str("<</Type /Pages");
    let kids: String = (0..pages.len())
        .map(|i| format!("{} 0 R ", 3 + 2 * i))
        .collect();
    buf.out_str(&format!("/Kids [{}]", kids));
    buf.out_str(&format!("/Count {}", pages.len()));
    buf.out_str(&format!("/MediaBox [0 0 {:.2} {:.2}]", w_pt, h_pt));
    buf.out_str(">>");
    buf.out_str("endobj");
    metrics
}

// Falls back to the raw bytes when the compressor fails.
fn compress_stream(ctx: &SerializeContext<'_>, data: &[u8]) -> (Vec<u8>, bool) {
    let Some(compressor) = ctx.compressor else {
        return (data.to_vec(), false);
    };
    match compressor.compress(data) {
        Ok(packed) => (packed, true),
        Err(err) => {
            log::warn!("stream compression failed, writing uncompressed: {}", err);
            if let Some(logger) = ctx.debug {
                logger.event(
                    "pdf.compress.fallback",
                    &[
                        ("bytes", Field::Int(data.len() as u64)),
                        ("error", Field::Str(&err.to_string())),
                    ],
                );
            }
            (data.to_vec(), false)
        }
    }
}

fn put_fonts(buf: &mut PdfBuffer, fonts: &FontRegistry) -> Vec<usize> {
    let mut diff_ids = Vec::with_capacity(fonts.differences().len());
    for diff in fonts.differences() {
        diff_ids.push(buf.new_object());
        buf.out_str(&format!(
            "<</Type /Encoding /BaseEncoding /WinAnsiEncoding /Differences [{}]>>",
            diff
        ));
        buf.out_str("endobj");
    }

    let mut program_ids = Vec::with_capacity(fonts.programs().len());
    for program in fonts.programs() {
        program_ids.push(buf.new_object());
        buf.out_str(&format!("<</Length {}", program.data.len()));
        if program.deflated {
            buf.out_str("/Filter /FlateDecode");
        }
        buf.out_str(&format!("/Length1 {}", program.length1));
        if let Some(length2) = program.length2 {
            buf.out_str(&format!("/Length2 {} /Length3 0", length2));
        }
        buf.out_str(">>");
        buf.put_stream(&program.data);
        buf.out_str("endobj");
    }

    let mut font_ids = Vec::with_capacity(fonts.len());
    for font in fonts.fonts() {
        let font_id = buf.new_object();
        font_ids.push(font_id);
        buf.out_str("<</Type /Font");
        buf.out_str(&format!("/BaseFont /{}", font.name));
        if font.kind == FontKind::Core {
            buf.out_str("/Subtype /Type1");
            if !font.symbolic {
                buf.out_str("/Encoding /WinAnsiEncoding");
            }
            buf.out_str(">>");
            buf.out_str("endobj");
            continue;
        }

        buf.out_str(&format!("/Subtype /{}", font.kind.subtype()));
        buf.out_str("/FirstChar 32 /LastChar 255");
        buf.out_str(&format!("/Widths {} 0 R", font_id + 1));
        buf.out_str(&format!("/FontDescriptor {} 0 R", font_id + 2));
        if font.encoding.is_some() {
            match font.diff.and_then(|diff| diff_ids.get(diff - 1)) {
                Some(id) => buf.out_str(&format!("/Encoding {} 0 R", id)),
                None => buf.out_str("/Encoding /WinAnsiEncoding"),
            }
        }
        buf.out_str(">>");
        buf.out_str("endobj");

        buf.new_object();
        let mut widths = String::from("[");
        for byte in 32..=255u8 {
            widths.push_str(&format!("{} ", font.widths.width(byte)));
        }
        widths.push(']');
        buf.out_str(&widths);
        buf.out_str("endobj");

        buf.new_object();
        let mut descriptor = format!("<</Type /FontDescriptor /FontName /{}", font.name);
        for (key, value) in &font.descriptor {
            descriptor.push_str(&format!(" /{} {}", key, value));
        }
        if let Some(id) = font.program.and_then(|slot| program_ids.get(slot)) {
            let suffix = if font.kind == FontKind::Type1 { "" } else { "2" };
            descriptor.push_str(&format!(" /FontFile{} {} 0 R", suffix, id));
        }
        descriptor.push_str(">>");
        buf.out_str(&descriptor);
        buf.out_str("endobj");
    }
    font_ids
}

fn put_images(buf: &mut PdfBuffer, ctx: &SerializeContext<'_>) -> Vec<usize> {
    let mut ids = Vec::with_capacity(ctx.images.len());
    for image in ctx.images.images() {
        let info = &image.info;
        let id = buf.new_object();
        ids.push(id);
        buf.out_str("<</Type /XObject");
        buf.out_str("/Subtype /Image");
        buf.out_str(&format!("/Width {}", info.width));
        buf.out_str(&format!("/Height {}", info.height));
        if info.color_space == ColorSpace::Indexed {
            buf.out_str(&format!(
                "/ColorSpace [/Indexed /DeviceRGB {} {} 0 R]",
                (info.palette.len() / 3).saturating_sub(1),
                id + 1
            ));
        } else {
            buf.out_str(&format!("/ColorSpace /{}", info.color_space.name()));
            if info.color_space == ColorSpace::DeviceCmyk {
                buf.out_str("/Decode [1 0 1 0 1 0 1 0]");
            }
        }
        buf.out_str(&format!("/BitsPerComponent {}", info.bits_per_component));
        buf.out_str(&format!("/Filter /{}", info.filter));
        if let Some(parms) = &info.decode_parms {
            buf.out_str(parms);
        }
        if let Some(mask) = &info.transparency {
            let values: String = mask.iter().map(|v| format!("{} {} ", v, v)).collect();
            buf.out_str(&format!("/Mask [{}]", values));
        }
        buf.out_str(&format!("/Length {}>>", info.data.len()));
        buf.put_stream(&info.data);
        buf.out_str("endobj");

        if info.color_space == ColorSpace::Indexed {
            let (palette, compressed) = compress_stream(ctx, &info.palette);
            buf.new_object();
            let filter = if compressed { "/Filter /FlateDecode " } else { "" };
            buf.out_str(&format!("<<{}/Length {}>>", filter, palette.len()));
            buf.put_stream(&palette);
            buf.out_str("endobj");
        }
    }
    ids
}

fn put_resources(buf: &mut PdfBuffer, font_ids: &[usize], image_ids: &[usize]) {
    buf.offsets[RESOURCES_ID] = buf.offset();
    buf.out_str(&format!("{} 0 obj", RESOURCES_ID));
    buf.out_str("<</ProcSet [/PDF /Text /ImageB /ImageC /ImageI]");
    buf.out_str("/Font <<");
    for (idx, id) in font_ids.iter().enumerate() {
        buf.out_str(&format!("/F{} {} 0 R", idx + 1, id));
    }
    buf.out_str(">>");
    if !image_ids.is_empty() {
        buf.out_str("/XObject <<");
        for (idx, id) in image_ids.iter().enumerate() {
            buf.out_str(&format!("/I{} {} 0 R", idx + 1, id));
        }
        buf.out_str(">>");
    }
    buf.out_str(">>");
    buf.out_str("endobj");
}

fn put_info(buf: &mut PdfBuffer, ctx: &SerializeContext<'_>) {
    let info = ctx.info;
    let mut entry = |key: &str, value: &str| {
        let mut line = format!("/{} ", key).into_bytes();
        line.extend_from_slice(&text_string(value));
        buf.out(&line);
    };
    entry("Producer", &info.producer);
    let optional = [
        ("Title", &info.title),
        ("Subject", &info.subject),
        ("Author", &info.author),
        ("Keywords", &info.keywords),
        ("Creator", &info.creator),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            entry(key, value);
        }
    }
    entry("CreationDate", &format!("D:{}", ctx.creation_date));
}

fn put_catalog(buf: &mut PdfBuffer, ctx: &SerializeContext<'_>) {
    buf.out_str("/Type /Catalog");
    buf.out_str(&format!("/Pages {} 0 R", PAGES_ID));
    match ctx.zoom {
        ZoomMode::FullPage => buf.out_str("/OpenAction [3 0 R /Fit]"),
        ZoomMode::FullWidth => buf.out_str("/OpenAction [3 0 R /FitH null]"),
        ZoomMode::Real => buf.out_str("/OpenAction [3 0 R /XYZ null null 1]"),
        ZoomMode::Percent(zoom) => {
            buf.out_str(&format!("/OpenAction [3 0 R /XYZ null null {}]", zoom / 100.0))
        }
        ZoomMode::Default => {}
    }
    match ctx.layout {
        LayoutMode::Single => buf.out_str("/PageLayout /SinglePage"),
        LayoutMode::Continuous => buf.out_str("/PageLayout /OneColumn"),
        LayoutMode::Two => buf.out_str("/PageLayout /TwoColumnLeft"),
        LayoutMode::Default => {}
    }
}

fn put_xref(buf: &mut PdfBuffer) {
    let xref_start = buf.offset();
    let count = buf.last_id + 1;
    buf.out_str("xref");
    buf.out_str(&format!("0 {}", count));
    buf.out_str("0000000000 65535 f ");
    for id in 1..count {
        let offset = buf.offsets.get(id).copied().unwrap_or(0);
        buf.out_str(&format!("{:010} 00000 n ", offset));
    }
    buf.out_str("trailer");
    buf.out_str("<<");
    buf.out_str(&format!("/Size {}", count));
    buf.out_str(&format!("/Root {} 0 R", buf.last_id));
    buf.out_str(&format!("/Info {} 0 R", buf.last_id - 1));
    buf.out_str(">>");
    buf.out_str("startxref");
    buf.out_str(&xref_start.to_string());
    buf.out_str("%%EOF");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_start_after_reserved_ids() {
        let mut buf = PdfBuffer::new();
        buf.out_str("%PDF-1.3");
        let id = buf.new_object();
        assert_eq!(id, 3);
        assert_eq!(buf.offsets[3], 9);
        assert!(buf.bytes().ends_with(b"3 0 obj\n"));
    }

    #[test]
    fn offsets_survive_take() {
        let mut buf = PdfBuffer::new();
        buf.out_str("%PDF-1.3");
        let head = buf.take();
        assert_eq!(head, b"%PDF-1.3\n");
        assert!(buf.is_flushed());
        assert!(buf.bytes().is_empty());
        let id = buf.new_object();
        assert_eq!(buf.offsets[id], 9);
        assert_eq!(buf.offset(), 9 + "3 0 obj\n".len());
    }

    #[test]
    fn stream_is_framed_by_keywords() {
        let mut buf = PdfBuffer::new();
        buf.put_stream(b"q Q");
        assert_eq!(buf.bytes(), b"stream\nq Q\nendstream\n");
    }

    #[test]
    fn xref_entries_are_twenty_bytes() {
        let mut buf = PdfBuffer::new();
        buf.out_str("%PDF-1.3");
        buf.offsets[1] = 9;
        buf.offsets[2] = 9;
        buf.new_object();
        buf.new_object();
        put_xref(&mut buf);
        let text = String::from_utf8_lossy(buf.bytes()).to_string();
        let xref = &text[text.find("xref\n").unwrap()..];
        let entries: Vec<&str> = xref.lines().skip(2).take(5).collect();
        assert_eq!(entries[0], "0000000000 65535 f ");
        assert!(entries.iter().all(|e| e.len() == 19));
        assert!(xref.contains("/Size 5\n/Root 4 0 R\n/Info 3 0 R"));
        assert!(text.ends_with("%%EOF\n"));
    }
}
