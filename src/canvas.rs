use crate::debug::Field;
use crate::document::Document;
use crate::error::{ImageError, PdfError};
use crate::image;
use crate::page::{DocState, LinkDest, PageLink};
use crate::types::{Color, DrawStyle, FontStyle, ImageType, LinkId, LinkTarget};

const DEFAULT_DRAW: &str = "0 G";
const DEFAULT_FILL: &str = "0 g";

/// Pen, colors and font selection. Carried across pages.
#[derive(Debug, Clone)]
pub(crate) struct GraphicsState {
    pub(crate) x: f64,
    pub(crate) y: f64,
    /// Height of the last printed cell.
    pub(crate) last_height: f64,
    pub(crate) line_width: f64,
    pub(crate) font_family: String,
    pub(crate) font_style: FontStyle,
    pub(crate) underline: bool,
    /// Registry slot of the selected font.
    pub(crate) current_font: Option<usize>,
    pub(crate) font_size_pt: f64,
    pub(crate) font_size: f64,
    // Operators as emitted, e.g. "0.500 g".
    pub(crate) draw_color: String,
    pub(crate) fill_color: String,
    pub(crate) text_color: String,
    /// Text color differs from fill color.
    pub(crate) color_flag: bool,
    pub(crate) word_spacing: f64,
}

impl GraphicsState {
    pub(crate) fn new(line_width: f64, font_size: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            last_height: 0.0,
            line_width,
            font_family: String::new(),
            font_style: FontStyle::REGULAR,
            underline: false,
            current_font: None,
            font_size_pt: 12.0,
            font_size,
            draw_color: DEFAULT_DRAW.to_string(),
            fill_color: DEFAULT_FILL.to_string(),
            text_color: DEFAULT_FILL.to_string(),
            color_flag: false,
            word_spacing: 0.0,
        }
    }
}

impl Document {
    pub fn set_draw_color(&mut self, color: Color) -> Result<(), PdfError> {
        self.gs.draw_color = color.stroke_operator();
        if !self.pages.is_empty() {
            let op = self.gs.draw_color.clone();
            self.out_str(&op)?;
        }
        Ok(())
    }

    pub fn set_fill_color(&mut self, color: Color) -> Result<(), PdfError> {
        self.gs.fill_color = color.fill_operator();
        self.gs.color_flag = self.gs.fill_color != self.gs.text_color;
        if !self.pages.is_empty() {
            let op = self.gs.fill_color.clone();
            self.out_str(&op)?;
        }
        Ok(())
    }

    // Applied lazily around each text operation.
    pub fn set_text_color(&mut self, color: Color) {
        self.gs.text_color = color.fill_operator();
        self.gs.color_flag = self.gs.fill_color != self.gs.text_color;
    }

    pub fn set_line_width(&mut self, width: f64) -> Result<(), PdfError> {
        self.gs.line_width = width;
        if !self.pages.is_empty() {
            self.out_str(&format!("{:.2} w", width * self.geometry.scale))?;
        }
        Ok(())
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<(), PdfError> {
        let (x1, y1) = (self.geometry.resolve_x(x1), self.geometry.resolve_y(y1));
        let (x2, y2) = (self.geometry.resolve_x(x2), self.geometry.resolve_y(y2));
        let k = self.geometry.scale;
        let h = self.geometry.height;
        self.out_str(&format!(
            "{:.2} {:.2} m {:.2} {:.2} l S",
            x1 * k,
            (h - y1) * k,
            x2 * k,
            (h - y2) * k
        ))
    }

    pub fn rect(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        style: DrawStyle,
    ) -> Result<(), PdfError> {
        let (x, y) = (self.geometry.resolve_x(x), self.geometry.resolve_y(y));
        let g = &self.geometry;
        let line = format!(
            "{:.2} {:.2} {:.2} {:.2} re {}",
            g.to_pt(x),
            g.height_pt - g.to_pt(y),
            g.to_pt(width),
            -g.to_pt(height),
            style.operator()
        );
        self.out_str(&line)
    }

    /// Circle centered on (x, y) built from four Bézier quarters.
    pub fn circle(&mut self, x: f64, y: f64, radius: f64, style: DrawStyle) -> Result<(), PdfError> {
        let (x, y) = (self.geometry.resolve_x(x), self.geometry.resolve_y(y));
        let g = &self.geometry;
        let r = g.to_pt(radius);
        let b = r * 0.552;
        let mut x = g.to_pt(x) - r;
        let mut y = g.height_pt - g.to_pt(y);

        let mut path = format!("{:.2} {:.2} m", x, y);
        path.push_str(&format!(
            " {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c",
            x,
            y + b,
            x + r - b,
            y + r,
            x + r,
            y + r
        ));
        x += r;
        y += r;
        path.push_str(&format!(
            " {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c",
            x + b,
            y,
            x + r,
            y - r + b,
            x + r,
            y - r
        ));
        x += r;
        y -= r;
        path.push_str(&format!(
            " {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c",
            x,
            y - b,
            x - r + b,
            y - r,
            x - r,
            y - r
        ));
        x -= r;
        y -= r;
        path.push_str(&format!(
            " {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c {}",
            x - b,
            y,
            x - r,
            y + r - b,
            x - r,
            y + r,
            style.operator()
        ));
        self.out_str(&path)
    }

    /// New internal link destination; place it with [`Document::set_link`].
    pub fn add_link(&mut self) -> LinkId {
        self.links.push(LinkDest::default());
        LinkId(self.links.len())
    }

    /// Points `link` at `y` on `page`; `None` means the current position.
    pub fn set_link(&mut self, link: LinkId, y: Option<f64>, page: Option<usize>) {
        let y = y.unwrap_or(self.gs.y);
        let page = page.unwrap_or(self.pages.len());
        if let Some(dest) = link.0.checked_sub(1).and_then(|idx| self.links.get_mut(idx)) {
            *dest = LinkDest { page, y };
        }
    }

    /// Clickable area on the current page.
    pub fn link(&mut self, x: f64, y: f64, width: f64, height: f64, target: LinkTarget) {
        let (x, y) = (self.geometry.resolve_x(x), self.geometry.resolve_y(y));
        let g = &self.geometry;
        let link = PageLink {
            x: g.to_pt(x),
            y: g.height_pt - g.to_pt(y),
            width: g.to_pt(width),
            height: g.to_pt(height),
            target,
        };
        self.push_link(link);
    }

    pub(crate) fn push_link(&mut self, link: PageLink) {
        if let Some(page) = self.pages.last_mut() {
            page.links.push(link);
        }
    }

    /// Registers image bytes under `identifier` so later `image` calls can
    /// place them without touching the filesystem.
    pub fn register_image_bytes(
        &mut self,
        identifier: &str,
        data: Vec<u8>,
        kind: ImageType,
    ) -> Result<(), PdfError> {
        if self.images.lookup(identifier).is_some() {
            return Ok(());
        }
        let info = image::parse(identifier, data, kind)?;
        self.store_image(identifier, info);
        Ok(())
    }

    fn store_image(&mut self, source: &str, info: image::ImageInfo) -> usize {
        let (width, height) = (info.width, info.height);
        let color_space = info.color_space.name();
        let slot = self.images.insert(source, info);
        log::debug!("image {} registered as I{}", source, slot + 1);
        self.debug_event(
            "pdf.image.register",
            &[
                ("index", Field::Int(slot as u64 + 1)),
                ("width", Field::Int(width as u64)),
                ("height", Field::Int(height as u64)),
                ("color_space", Field::Str(color_space)),
            ],
        );
        slot
    }

    fn resolve_image(&mut self, source: &str, kind: Option<ImageType>) -> Result<usize, PdfError> {
        if let Some(slot) = self.images.lookup(source) {
            self.debug_event("pdf.image.reuse", &[("index", Field::Int(slot as u64 + 1))]);
            return Ok(slot);
        }
        let (data, hint) = image::load_source(source)?;
        let kind = kind
            .or(hint)
            .ok_or_else(|| ImageError::UnknownType(source.to_string()))?;
        let info = image::parse(source, data, kind)?;
        Ok(self.store_image(source, info))
    }

    /// Places an image with its top-left corner at (x, y). A zero width or
    /// height is derived from the other, keeping proportions; both zero
    /// uses the pixel size as points.
    #[allow(clippy::too_many_arguments)]
    pub fn image(
        &mut self,
        source: &str,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        kind: Option<ImageType>,
        link: Option<&LinkTarget>,
    ) -> Result<(), PdfError> {
        if self.state == DocState::Closed {
            return Err(PdfError::Closed);
        }
        let (x, y) = (self.geometry.resolve_x(x), self.geometry.resolve_y(y));
        let slot = self.resolve_image(source, kind)?;
        let Some(image) = self.images.get(slot) else {
            return Ok(());
        };
        let index = image.index;
        let (iw, ih) = (image.info.width as f64, image.info.height as f64);

        let g = &self.geometry;
        let x = g.to_pt(x);
        let y = g.height_pt - g.to_pt(y);
        let mut w = g.to_pt(width);
        let mut h = g.to_pt(height);
        if w == 0.0 && h == 0.0 {
            w = iw;
            h = ih;
        } else if w == 0.0 {
            w = h * iw / ih;
        } else if h == 0.0 {
            h = w * ih / iw;
        }

        self.out_str(&format!(
            "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /I{} Do Q",
            w,
            h,
            x,
            y - h,
            index
        ))?;
        if let Some(target) = link {
            self.push_link(PageLink {
                x,
                y,
                width: w,
                height: h,
                target: target.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::document::tests::{count_token, pinned, text_of};
    use crate::error::{ImageError, PdfError};
    use crate::image::tests::{encode_jpeg, encode_png, indexed_png};
    use crate::types::{Color, DrawStyle, ImageType, LinkTarget, Unit};

    #[test]
    fn colors_are_emitted_once_a_page_exists() {
        let mut doc = pinned().compression(false).build().unwrap();
        doc.set_fill_color(Color::rgb(255, 0, 0)).unwrap();
        doc.add_page(None).unwrap();
        doc.set_draw_color(Color::Cmyk(0.0, 1.0, 0.0, 0.0)).unwrap();
        doc.set_text_color(Color::gray(0));
        assert!(doc.gs.color_flag);
        let bytes = doc.get_output().unwrap().to_vec();
        let text = text_of(&bytes);
        assert!(text.contains("1.000 0.000 0.000 rg\n"));
        assert!(text.contains("0.000 1.000 0.000 0.000 K\n"));
    }

    #[test]
    fn shapes_use_page_coordinates() {
        let mut doc = pinned().unit(Unit::Pt).compression(false).build().unwrap();
        doc.add_page(None).unwrap();
        doc.line(10.0, 10.0, 100.0, 10.0).unwrap();
        doc.rect(20.0, 30.0, 40.0, 50.0, DrawStyle::FillStroke).unwrap();
        doc.circle(100.0, 100.0, 10.0, DrawStyle::Fill).unwrap();
        let text = text_of(doc.get_output().unwrap());
        assert!(text.contains("10.00 831.89 m 100.00 831.89 l S"));
        assert!(text.contains("20.00 811.89 40.00 -50.00 re B"));
        assert!(text.contains("90.00 741.89 m 90.00 747.41 94.48 751.89 100.00 751.89 c"));
        assert!(text.contains(" 90.00 736.37 90.00 741.89 c f\n"));
    }

    #[test]
    fn same_image_is_embedded_once() {
        let mut doc = pinned().unit(Unit::Pt).compression(false).build().unwrap();
        doc.add_page(None).unwrap();
        doc.register_image_bytes("logo", encode_png(4, 2, image::ExtendedColorType::Rgb8), ImageType::Png)
            .unwrap();
        doc.image("logo", 10.0, 10.0, 0.0, 0.0, None, None).unwrap();
        doc.image("logo", 10.0, 100.0, 40.0, 0.0, None, Some(&LinkTarget::from("https://example.com")))
            .unwrap();
        let bytes = doc.get_output().unwrap().to_vec();
        let text = text_of(&bytes);
        assert_eq!(count_token(&bytes, "/Subtype /Image"), 1);
        assert_eq!(count_token(&bytes, "/I1 Do Q"), 2);
        assert!(text.contains("q 4.00 0 0 2.00 10.00 829.89 cm /I1 Do Q"));
        assert!(text.contains("q 40.00 0 0 20.00 10.00 721.89 cm /I1 Do Q"));
        assert!(text.contains("/XObject <<\n/I1 "));
        assert!(text.contains("/A <</S /URI /URI (https://example.com)>>>>"));
        assert!(lopdf::Document::load_mem(&bytes).is_ok());
    }

    #[test]
    fn indexed_image_gets_palette_object_and_mask() {
        let mut doc = pinned().compression(false).build().unwrap();
        doc.add_page(None).unwrap();
        doc.register_image_bytes("pal", indexed_png(true), ImageType::Png).unwrap();
        doc.image("pal", 10.0, 10.0, 20.0, 20.0, None, None).unwrap();
        let bytes = doc.get_output().unwrap().to_vec();
        let text = text_of(&bytes);
        let image_obj = text.find("/Subtype /Image").unwrap();
        let header_start = text[..image_obj].rfind(" 0 obj").unwrap();
        let id: usize = text[..header_start]
            .rsplit('\n')
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert!(text.contains(&format!("/ColorSpace [/Indexed /DeviceRGB 1 {} 0 R]", id + 1)));
        assert!(text.contains("/Mask [1 1 ]"));
        assert!(text.contains(&format!("{} 0 obj\n<</Length 6>>", id + 1)));
    }

    #[test]
    fn jpeg_from_data_uri_is_placed() {
        use base64::Engine;
        let jpeg = encode_jpeg(8, 4);
        let uri = format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&jpeg)
        );
        let mut doc = pinned().build().unwrap();
        doc.add_page(None).unwrap();
        doc.image(&uri, 10.0, 10.0, 40.0, 0.0, None, None).unwrap();
        let bytes = doc.get_output().unwrap().to_vec();
        let text = text_of(&bytes);
        assert!(text.contains("/Filter /DCTDecode"));
        assert!(text.contains("/ColorSpace /DeviceRGB"));
        assert!(text.contains(&format!("/Length {}>>", jpeg.len())));
    }

    #[test]
    fn image_errors_leave_document_usable() {
        let mut doc = pinned().build().unwrap();
        doc.add_page(None).unwrap();
        let err = doc
            .register_image_bytes("nopal", indexed_png(false), ImageType::Png)
            .unwrap_err();
        assert!(matches!(err, PdfError::Image(ImageError::MissingPalette(_))));
        assert!(matches!(
            doc.image("/nonexistent/file.gif", 0.0, 0.0, 0.0, 0.0, None, None),
            Err(PdfError::Image(ImageError::Unreadable { .. }))
        ));
        assert_eq!(doc.images.len(), 0);
        doc.rect(10.0, 10.0, 5.0, 5.0, DrawStyle::Stroke).unwrap();
        let bytes = doc.get_output().unwrap().to_vec();
        assert!(!text_of(&bytes).contains("/XObject"));
    }

    #[test]
    fn internal_links_resolve_to_target_page() {
        let mut doc = pinned().unit(Unit::Pt).compression(false).build().unwrap();
        doc.add_page(None).unwrap();
        let link = doc.add_link();
        doc.link(10.0, 10.0, 50.0, 20.0, LinkTarget::Internal(link));
        doc.add_page(None).unwrap();
        doc.set_y(100.0);
        doc.set_link(link, None, None);
        let text = text_of(doc.get_output().unwrap());
        assert!(text.contains(
            "/Annots [<</Type /Annot /Subtype /Link /Rect [10.00 831.89 60.00 811.89] /Border [0 0 0] /Dest [5 0 R /XYZ 0 741.89 null]>>]"
        ));
    }
}
