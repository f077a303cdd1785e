use crate::core_fonts;
use crate::debug::Field;
use crate::document::Document;
use crate::encoding::{escape_bytes, to_winansi};
use crate::error::PdfError;
use crate::font::{RegisteredFont, font_key, normalize_family};
use crate::types::{Align, Border, FontStyle, LineBreak, LinkTarget, Sides};
use std::path::Path;
use std::sync::Arc;

fn push_segment(ops: &mut Vec<u8>, x1: f64, y1: f64, x2: f64, y2: f64) {
    ops.extend_from_slice(format!("{:.2} {:.2} m {:.2} {:.2} l S ", x1, y1, x2, y2).as_bytes());
}

fn strip_cr(text: &str) -> Vec<u8> {
    to_winansi(text)
        .into_iter()
        .filter(|byte| *byte != b'\r')
        .collect()
}

impl Document {
    pub(crate) fn current_font(&self) -> Result<&RegisteredFont, PdfError> {
        self.gs
            .current_font
            .and_then(|slot| self.fonts.get(slot))
            .ok_or_else(|| PdfError::Font("no font selected".to_string()))
    }

    // Includes the current word spacing for every space.
    fn bytes_width(&self, bytes: &[u8], in_points: bool) -> Result<f64, PdfError> {
        let font = self.current_font()?;
        let mut width: f64 = bytes.iter().map(|byte| font.widths.width(*byte) as f64).sum();
        let spaces = bytes.iter().filter(|byte| **byte == b' ').count() as f64;
        width += self.gs.word_spacing * spaces * font.widths.width(b' ') as f64;
        let size = if in_points {
            self.gs.font_size_pt
        } else {
            self.gs.font_size
        };
        Ok(width * size / 1000.0)
    }

    /// Width of `text` in user units with the current font.
    pub fn string_width(&self, text: &str) -> Result<f64, PdfError> {
        self.bytes_width(&to_winansi(text), false)
    }

    /// Selects a standard or added font. An empty family keeps the current
    /// one; `None` keeps the current size.
    pub fn set_font(
        &mut self,
        family: &str,
        style: FontStyle,
        size: Option<f64>,
    ) -> Result<(), PdfError> {
        self.select_font(family, style, size, false)
    }

    pub(crate) fn select_font(
        &mut self,
        family: &str,
        style: FontStyle,
        size: Option<f64>,
        force: bool,
    ) -> Result<(), PdfError> {
        let family = if family.trim().is_empty() {
            self.gs.font_family.clone()
        } else {
            normalize_family(family)
        };
        if family.is_empty() {
            return Err(PdfError::Font("no font family selected".to_string()));
        }
        let style = if core_fonts::is_symbolic(&family) {
            FontStyle::REGULAR
        } else {
            style
        };
        let underline = style.underline;
        let style = style.without_underline();
        let size = size.unwrap_or(self.gs.font_size_pt);

        if !force
            && family == self.gs.font_family
            && style == self.gs.font_style
            && size == self.gs.font_size_pt
        {
            self.gs.underline = underline;
            return Ok(());
        }

        let key = font_key(&family, style);
        let slot = match self.fonts.lookup(&key) {
            Some(slot) => slot,
            None => {
                let slot = self
                    .fonts
                    .register_core(&key, self.metrics_provider.as_ref())?;
                self.font_registered(slot);
                slot
            }
        };

        self.gs.underline = underline;

        self.gs.font_family = family;
        self.gs.font_style = style;
        self.gs.font_size_pt = size;
        self.gs.font_size = size / self.geometry.scale;
        self.gs.current_font = Some(slot);
        if !self.pages.is_empty() {
            self.emit_font()?;
        }
        Ok(())
    }

    fn emit_font(&mut self) -> Result<(), PdfError> {
        let index = self.current_font()?.index;
        self.out_str(&format!("BT /F{} {:.2} Tf ET", index, self.gs.font_size_pt))
    }

    fn font_registered(&self, slot: usize) {
        if let Some(font) = self.fonts.get(slot) {
            log::debug!("font {} registered as F{}", font.key, font.index);
            self.debug_event(
                "pdf.font.register",
                &[
                    ("index", Field::Int(font.index as u64)),
                    ("key", Field::Str(&font.key)),
                    ("name", Field::Str(&font.name)),
                ],
            );
        }
    }

    pub fn set_font_size(&mut self, size: f64) -> Result<(), PdfError> {
        if self.gs.font_size_pt == size {
            return Ok(());
        }
        self.gs.font_size_pt = size;
        self.gs.font_size = size / self.geometry.scale;
        if !self.pages.is_empty() && self.gs.current_font.is_some() {
            self.emit_font()?;
        }
        Ok(())
    }

    pub fn set_font_style(&mut self, style: FontStyle) -> Result<(), PdfError> {
        let family = self.gs.font_family.clone();
        self.select_font(&family, style, None, false)
    }

    /// Registers an embeddable font under `family` and `style` through the
    /// metrics provider. It can then be selected with [`Document::set_font`].
    pub fn add_font(
        &mut self,
        family: &str,
        style: FontStyle,
        file: Option<&Path>,
    ) -> Result<(), PdfError> {
        let family = normalize_family(family);
        let style = style.without_underline();
        let key = font_key(&family, style);
        if self.fonts.lookup(&key).is_some() {
            return Err(PdfError::Font(format!("font already added: {}", key)));
        }
        let definition = self
            .metrics_provider
            .font_definition(&family, style.key_suffix(), file)?;
        let slot = self.fonts.register_definition(&key, definition)?;
        self.font_registered(slot);
        Ok(())
    }

    fn underline_op(&self, x: f64, y: f64, bytes: &[u8]) -> Result<String, PdfError> {
        let font = self.current_font()?;
        let width = self.bytes_width(bytes, true)?;
        let size = self.gs.font_size_pt;
        let y = y + font.underline_position as f64 * size / 1000.0;
        let height = -(font.underline_thickness as f64) * size / 1000.0;
        Ok(format!("{:.2} {:.2} {:.2} {:.2} re f", x, y, width, height))
    }

    fn with_text_color(&self, ops: Vec<u8>) -> Vec<u8> {
        if !self.gs.color_flag {
            return ops;
        }
        let mut out = format!("q {} ", self.gs.text_color).into_bytes();
        out.extend(ops);
        out.extend_from_slice(b" Q");
        out
    }

    /// Prints a string with its baseline origin at (x, y).
    pub fn text(&mut self, x: f64, y: f64, text: &str) -> Result<(), PdfError> {
        let (x, y) = (self.geometry.resolve_x(x), self.geometry.resolve_y(y));
        let x = self.geometry.to_pt(x);
        let y = self.geometry.height_pt - self.geometry.to_pt(y);
        let bytes = to_winansi(text);
        let mut ops = format!("BT {:.2} {:.2} Td (", x, y).into_bytes();
        ops.extend(escape_bytes(&bytes));
        ops.extend_from_slice(b") Tj ET");
        if self.gs.underline && !bytes.is_empty() {
            ops.push(b' ');
            ops.extend_from_slice(self.underline_op(x, y, &bytes)?.as_bytes());
        }
        let ops = self.with_text_color(ops);
        self.out(&ops)
    }

    /// Prints a string rotated by `text_angle` degrees; `font_angle` tilts
    /// the glyphs on top of that.
    pub fn write_rotated(
        &mut self,
        x: f64,
        y: f64,
        text: &str,
        text_angle: f64,
        font_angle: f64,
    ) -> Result<(), PdfError> {
        let (x, y) = (self.geometry.resolve_x(x), self.geometry.resolve_y(y));
        let font_angle = (font_angle + 90.0 + text_angle).to_radians();
        let text_angle = text_angle.to_radians();
        let k = self.geometry.scale;
        let mut ops = format!(
            "q {} BT {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} Tm (",
            self.gs.draw_color,
            text_angle.cos(),
            text_angle.sin(),
            font_angle.cos(),
            font_angle.sin(),
            x * k,
            (self.geometry.height - y) * k
        )
        .into_bytes();
        ops.extend(escape_bytes(&to_winansi(text)));
        ops.extend_from_slice(b") Tj ET Q");
        self.out(&ops)
    }

    /// Prints a cell at the current position. A zero width extends the cell
    /// to the right margin.
    #[allow(clippy::too_many_arguments)]
    pub fn cell(
        &mut self,
        width: f64,
        height: f64,
        text: &str,
        border: Border,
        ln: LineBreak,
        align: Align,
        fill: bool,
        link: Option<&LinkTarget>,
    ) -> Result<(), PdfError> {
        self.cell_bytes(width, height, &to_winansi(text), border, ln, align, fill, link)
    }

    #[allow(clippy::too_many_arguments)]
    fn cell_bytes(
        &mut self,
        width: f64,
        height: f64,
        text: &[u8],
        border: Border,
        ln: LineBreak,
        align: Align,
        fill: bool,
        link: Option<&LinkTarget>,
    ) -> Result<(), PdfError> {
        let k = self.geometry.scale;
        if self.gs.y + height > self.page_break_trigger
            && !self.in_footer
            && self.accept_page_break()
        {
            let x = self.gs.x;
            let ws = self.gs.word_spacing;
            if ws > 0.0 {
                self.gs.word_spacing = 0.0;
                self.out_str("0 Tw")?;
            }
            let orientation = self.geometry.current_orientation;
            self.add_page(Some(orientation))?;
            self.gs.x = x;
            if ws > 0.0 {
                self.gs.word_spacing = ws;
                self.out_str(&format!("{:.3} Tw", ws * k))?;
            }
        }
        let width = if width == 0.0 {
            self.geometry.width - self.right_margin - self.gs.x
        } else {
            width
        };
        let (x, y, h) = (self.gs.x, self.gs.y, self.geometry.height);

        let mut ops = Vec::new();
        let frame = border == Border::Frame;
        if fill || frame {
            let op = match (fill, frame) {
                (true, true) => "B",
                (true, false) => "f",
                _ => "S",
            };
            ops.extend_from_slice(
                format!(
                    "{:.2} {:.2} {:.2} {:.2} re {} ",
                    x * k,
                    (h - y) * k,
                    width * k,
                    -height * k,
                    op
                )
                .as_bytes(),
            );
        }
        if let Border::Sides(sides) = border {
            let (left, right) = (x * k, (x + width) * k);
            let (top, bottom) = ((h - y) * k, (h - (y + height)) * k);
            if sides.left {
                push_segment(&mut ops, left, top, left, bottom);
            }
            if sides.top {
                push_segment(&mut ops, left, top, right, top);
            }
            if sides.right {
                push_segment(&mut ops, right, top, right, bottom);
            }
            if sides.bottom {
                push_segment(&mut ops, left, bottom, right, bottom);
            }
        }

        if !text.is_empty() {
            let text_width = self.bytes_width(text, false)?;
            let dx = match align {
                Align::Right => width - self.cell_margin - text_width,
                Align::Center => (width - text_width) / 2.0,
                Align::Left | Align::Justify => self.cell_margin,
            };
            if self.gs.color_flag {
                ops.extend_from_slice(format!("q {} ", self.gs.text_color).as_bytes());
            }
            // Baseline sits .3 em below the vertical middle of the cell.
            let tx = (x + dx) * k;
            let ty = (h - (y + 0.5 * height + 0.3 * self.gs.font_size)) * k;
            ops.extend_from_slice(format!("BT {:.2} {:.2} Td (", tx, ty).as_bytes());
            ops.extend(escape_bytes(text));
            ops.extend_from_slice(b") Tj ET");
            if self.gs.underline {
                ops.push(b' ');
                ops.extend_from_slice(self.underline_op(tx, ty, text)?.as_bytes());
            }
            if self.gs.color_flag {
                ops.extend_from_slice(b" Q");
            }
            if let Some(target) = link {
                let size = self.gs.font_size;
                self.link(
                    x + dx,
                    y + 0.5 * height - 0.5 * size,
                    text_width,
                    size,
                    target.clone(),
                );
            }
        }
        if !ops.is_empty() {
            self.out(&ops)?;
        }

        self.gs.last_height = height;
        match ln {
            LineBreak::Right => self.gs.x += width,
            LineBreak::NextLine => {
                self.gs.y += height;
                self.gs.x = self.left_margin;
            }
            LineBreak::Below => self.gs.y += height,
        }
        Ok(())
    }

    fn reset_word_spacing(&mut self) -> Result<(), PdfError> {
        if self.gs.word_spacing > 0.0 {
            self.gs.word_spacing = 0.0;
            self.out_str("0 Tw")?;
        }
        Ok(())
    }

    // Line width available for text, in thousandths of the font size.
    fn wrap_limit(&self, width: f64) -> f64 {
        (width - 2.0 * self.cell_margin) * 1000.0 / self.gs.font_size
    }

    /// Prints text in a column of cells, wrapping at spaces and at `\n`.
    /// The pen ends on the left margin below the block.
    pub fn multi_cell(
        &mut self,
        width: f64,
        height: f64,
        text: &str,
        border: Border,
        align: Align,
        fill: bool,
    ) -> Result<(), PdfError> {
        let widths = Arc::clone(&self.current_font()?.widths);
        let width = if width == 0.0 {
            self.geometry.width - self.right_margin - self.gs.x
        } else {
            width
        };
        let wmax = self.wrap_limit(width);
        let s = strip_cr(text);
        let mut nb = s.len();
        if nb > 0 && s[nb - 1] == b'\n' {
            nb -= 1;
        }

        // First line gets the top edge, the last one the bottom edge.
        let (mut b, b2, bottom) = match border {
            Border::None => (Sides::NONE, Sides::NONE, false),
            Border::Frame => (
                Sides::LEFT | Sides::RIGHT | Sides::TOP,
                Sides::LEFT | Sides::RIGHT,
                true,
            ),
            Border::Sides(sides) => {
                let b2 = Sides {
                    left: sides.left,
                    right: sides.right,
                    ..Sides::NONE
                };
                let b = if sides.top { b2 | Sides::TOP } else { b2 };
                (b, b2, sides.bottom)
            }
        };

        let mut sep: Option<usize> = None;
        let (mut i, mut j) = (0, 0);
        let (mut l, mut ls) = (0.0, 0.0);
        let mut ns = 0usize;
        let mut nl = 1usize;
        while i < nb {
            let c = s[i];
            if c == b'\n' {
                self.reset_word_spacing()?;
                self.cell_bytes(
                    width,
                    height,
                    &s[j..i],
                    Border::Sides(b),
                    LineBreak::Below,
                    align,
                    fill,
                    None,
                )?;
                i += 1;
                sep = None;
                j = i;
                l = 0.0;
                ns = 0;
                nl += 1;
                if nl == 2 {
                    b = b2;
                }
                continue;
            }
            if c == b' ' {
                sep = Some(i);
                ls = l;
                ns += 1;
            }
            l += widths.width(c) as f64;
            if l > wmax {
                match sep {
                    None => {
                        if i == j {
                            i += 1;
                        }
                        self.reset_word_spacing()?;
                        self.cell_bytes(
                            width,
                            height,
                            &s[j..i],
                            Border::Sides(b),
                            LineBreak::Below,
                            align,
                            fill,
                            None,
                        )?;
                    }
                    Some(at) => {
                        if align == Align::Justify {
                            self.gs.word_spacing = if ns > 1 {
                                (wmax - ls) / 1000.0 * self.gs.font_size / (ns - 1) as f64
                            } else {
                                0.0
                            };
                            self.out_str(&format!(
                                "{:.3} Tw",
                                self.gs.word_spacing * self.geometry.scale
                            ))?;
                        }
                        self.cell_bytes(
                            width,
                            height,
                            &s[j..at],
                            Border::Sides(b),
                            LineBreak::Below,
                            align,
                            fill,
                            None,
                        )?;
                        i = at + 1;
                    }
                }
                sep = None;
                j = i;
                l = 0.0;
                ns = 0;
                nl += 1;
                if nl == 2 {
                    b = b2;
                }
            } else {
                i += 1;
            }
        }

        self.reset_word_spacing()?;
        if bottom {
            b = b | Sides::BOTTOM;
        }
        self.cell_bytes(
            width,
            height,
            &s[j..i],
            Border::Sides(b),
            LineBreak::Below,
            align,
            fill,
            None,
        )?;
        self.gs.x = self.left_margin;
        Ok(())
    }

    /// Flowing text from the current position. Lines wrap at the right
    /// margin and restart at the left one; the pen stays at the end of the
    /// text.
    pub fn write(
        &mut self,
        height: f64,
        text: &str,
        link: Option<&LinkTarget>,
    ) -> Result<(), PdfError> {
        let widths = Arc::clone(&self.current_font()?.widths);
        let mut width = self.geometry.width - self.right_margin - self.gs.x;
        let mut wmax = self.wrap_limit(width);
        let s = strip_cr(text);
        let nb = s.len();

        let mut sep: Option<usize> = None;
        let (mut i, mut j) = (0, 0);
        let mut l = 0.0;
        let mut nl = 1usize;
        while i < nb {
            let c = s[i];
            if c == b'\n' {
                self.cell_bytes(
                    width,
                    height,
                    &s[j..i],
                    Border::None,
                    LineBreak::Below,
                    Align::Left,
                    false,
                    link,
                )?;
                i += 1;
                sep = None;
                j = i;
                l = 0.0;
                if nl == 1 {
                    self.gs.x = self.left_margin;
                    width = self.geometry.width - self.right_margin - self.gs.x;
                    wmax = self.wrap_limit(width);
                }
                nl += 1;
                continue;
            }
            if c == b' ' {
                sep = Some(i);
            }
            l += widths.width(c) as f64;
            if l > wmax {
                match sep {
                    None => {
                        if self.gs.x > self.left_margin {
                            // Nothing fits after the pen; retry the word on a fresh line.
                            self.gs.x = self.left_margin;
                            self.gs.y += height;
                            width = self.geometry.width - self.right_margin - self.gs.x;
                            wmax = self.wrap_limit(width);
                            i += 1;
                            nl += 1;
                            continue;
                        }
                        if i == j {
                            i += 1;
                        }
                        self.cell_bytes(
                            width,
                            height,
                            &s[j..i],
                            Border::None,
                            LineBreak::Below,
                            Align::Left,
                            false,
                            link,
                        )?;
                    }
                    Some(at) => {
                        self.cell_bytes(
                            width,
                            height,
                            &s[j..at],
                            Border::None,
                            LineBreak::Below,
                            Align::Left,
                            false,
                            link,
                        )?;
                        i = at + 1;
                    }
                }
                sep = None;
                j = i;
                l = 0.0;
                if nl == 1 {
                    self.gs.x = self.left_margin;
                    width = self.geometry.width - self.right_margin - self.gs.x;
                    wmax = self.wrap_limit(width);
                }
                nl += 1;
            } else {
                i += 1;
            }
        }

        if i != j {
            let tail = l / 1000.0 * self.gs.font_size;
            self.cell_bytes(
                tail,
                height,
                &s[j..i],
                Border::None,
                LineBreak::Right,
                Align::Left,
                false,
                link,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::document::tests::{count_token, pinned, text_of};
    use crate::document::Document;
    use crate::error::PdfError;
    use crate::types::{Align, Border, Color, FontStyle, LineBreak, LinkTarget, Sides, Unit};
    use std::path::Path;

    fn courier_doc() -> Document {
        let mut doc = pinned().unit(Unit::Pt).compression(false).build().unwrap();
        doc.add_page(None).unwrap();
        doc.set_font("courier", FontStyle::REGULAR, Some(10.0)).unwrap();
        doc
    }

    fn page_text(doc: &Document, page: usize) -> String {
        text_of(&doc.pages[page].content)
    }

    #[test]
    fn widths_add_up_without_kerning() {
        let mut doc = pinned().unit(Unit::Pt).build().unwrap();
        doc.set_font("helvetica", FontStyle::REGULAR, Some(10.0)).unwrap();
        let one = doc.string_width("A").unwrap();
        assert!((one - 6.67).abs() < 1e-9);
        assert!((doc.string_width("AA").unwrap() - 2.0 * one).abs() < 1e-9);
        doc.set_font("times", FontStyle::REGULAR, Some(20.0)).unwrap();
        assert!(doc.string_width("AA").unwrap() > 2.0 * one);
    }

    #[test]
    fn text_without_font_is_an_error() {
        let mut doc = pinned().build().unwrap();
        doc.add_page(None).unwrap();
        assert!(matches!(doc.string_width("x"), Err(PdfError::Font(_))));
        assert!(matches!(
            doc.multi_cell(0.0, 5.0, "x", Border::None, Align::Left, false),
            Err(PdfError::Font(_))
        ));
        assert!(doc.set_font_style(FontStyle::BOLD).is_err());
        // Borders alone need no font.
        doc.cell(10.0, 5.0, "", Border::Frame, LineBreak::Right, Align::Left, false, None)
            .unwrap();
        assert!(doc.set_font("wingdings", FontStyle::REGULAR, None).is_err());
    }

    #[test]
    fn font_selection_is_emitted_only_on_change() {
        let mut doc = courier_doc();
        doc.set_font("Courier", FontStyle::REGULAR, None).unwrap();
        doc.set_font_size(14.0).unwrap();
        doc.set_font_style(FontStyle::BOLD).unwrap();
        doc.set_font("Arial", FontStyle::BOLD | FontStyle::UNDERLINE, None).unwrap();
        assert!(doc.gs.underline);
        assert_eq!(doc.gs.font_style, FontStyle::BOLD);
        // A rejected family leaves the underline flag alone.
        assert!(matches!(
            doc.set_font("wingdings", FontStyle::REGULAR, None),
            Err(PdfError::Font(_))
        ));
        assert!(doc.gs.underline);
        assert_eq!(doc.gs.font_family, "helvetica");
        let text = page_text(&doc, 0);
        assert_eq!(text.matches("BT /F1 10.00 Tf ET").count(), 1);
        assert!(text.contains("BT /F1 14.00 Tf ET\n"));
        assert!(text.contains("BT /F2 14.00 Tf ET\n"));
        assert!(text.contains("BT /F3 14.00 Tf ET\n"));
        let bytes = doc.get_output().unwrap().to_vec();
        assert!(text_of(&bytes).contains("/BaseFont /Courier-Bold\n/Subtype /Type1\n/Encoding /WinAnsiEncoding\n>>"));
        assert!(text_of(&bytes).contains("/BaseFont /Helvetica-Bold"));
    }

    #[test]
    fn symbolic_and_times_faces_resolve() {
        let mut doc = courier_doc();
        doc.set_font("symbol", FontStyle::BOLD | FontStyle::ITALIC, None).unwrap();
        assert_eq!(doc.gs.font_style, FontStyle::REGULAR);
        assert!((doc.string_width("abg").unwrap() - 15.91).abs() < 1e-9);
        doc.set_font("ZapfDingbats", FontStyle::REGULAR, None).unwrap();
        doc.set_font("times", FontStyle::BOLD, None).unwrap();
        assert!((doc.string_width("Hello").unwrap() - 22.78).abs() < 1e-9);
        doc.set_font("times", FontStyle::ITALIC, None).unwrap();
        doc.set_font("times", FontStyle::BOLD | FontStyle::ITALIC, None).unwrap();

        let bytes = doc.get_output().unwrap().to_vec();
        let text = text_of(&bytes);
        assert!(text.contains("/BaseFont /Symbol\n/Subtype /Type1\n>>"));
        assert!(text.contains("/BaseFont /ZapfDingbats\n/Subtype /Type1\n>>"));
        for name in ["Times-Bold", "Times-Italic", "Times-BoldItalic"] {
            assert!(text.contains(&format!(
                "/BaseFont /{name}\n/Subtype /Type1\n/Encoding /WinAnsiEncoding\n>>"
            )));
        }
        assert_eq!(count_token(&bytes, "/Encoding /WinAnsiEncoding"), 4);
    }

    #[test]
    fn add_font_requires_a_readable_file() {
        let mut doc = pinned().build().unwrap();
        assert!(matches!(
            doc.add_font("custom", FontStyle::REGULAR, None),
            Err(PdfError::Font(_))
        ));
        assert!(matches!(
            doc.add_font(
                "custom",
                FontStyle::BOLD,
                Some(Path::new("/nonexistent/custom.ttf"))
            ),
            Err(PdfError::Font(_))
        ));
        assert!(matches!(
            doc.add_font("helvetica", FontStyle::REGULAR, None),
            Err(PdfError::Font(_))
        ));
        doc.set_font("helvetica", FontStyle::REGULAR, None).unwrap();
        let err = doc.add_font("arial", FontStyle::REGULAR, None).unwrap_err();
        assert!(err.to_string().contains("already added"));
    }

    #[test]
    fn cell_borders_fill_and_alignment() {
        let mut doc = courier_doc();
        doc.cell(50.0, 10.0, "", Border::Frame, LineBreak::Right, Align::Left, true, None)
            .unwrap();
        assert_eq!(doc.x(), 28.35 + 50.0);
        doc.cell(
            60.0,
            10.0,
            "AB",
            Border::Sides(Sides::LEFT | Sides::BOTTOM),
            LineBreak::NextLine,
            Align::Center,
            false,
            None,
        )
        .unwrap();
        assert_eq!(doc.x(), 28.35);
        assert!((doc.y() - 38.35).abs() < 1e-9);
        let text = page_text(&doc, 0);
        assert!(text.contains("28.35 813.54 50.00 -10.00 re B \n"));
        assert!(text.contains("78.35 813.54 m 78.35 803.54 l S 78.35 803.54 m 138.35 803.54 l S "));
        assert!(text.contains("BT 102.35 805.54 Td (AB) Tj ET"));
    }

    #[test]
    fn colored_and_underlined_text() {
        let mut doc = pinned().unit(Unit::Pt).compression(false).build().unwrap();
        doc.add_page(None).unwrap();
        doc.set_font("helvetica", FontStyle::UNDERLINE, Some(10.0)).unwrap();
        doc.set_text_color(Color::rgb(255, 0, 0));
        doc.cell(0.0, 10.0, "Hi", Border::None, LineBreak::Right, Align::Left, false, None)
            .unwrap();
        doc.text(100.0, 100.0, "(x)").unwrap();
        let text = page_text(&doc, 0);
        assert!(text.contains("q 1.000 0.000 0.000 rg BT "));
        assert!(text.contains("(Hi) Tj ET "));
        assert!(text.contains(" 9.44 -0.50 re f Q\n"));
        assert!(text.contains(
            "q 1.000 0.000 0.000 rg BT 100.00 741.89 Td (\\(x\\)) Tj ET 100.00 740.89 "
        ));
    }

    #[test]
    fn rotated_text_uses_draw_color() {
        let mut doc = courier_doc();
        doc.write_rotated(100.0, 100.0, "Up", 90.0, 0.0).unwrap();
        assert!(page_text(&doc, 0)
            .contains("q 0 G BT 0.00 1.00 -1.00 0.00 100.00 741.89 Tm (Up) Tj ET Q\n"));
    }

    #[test]
    fn short_multi_cell_is_one_line() {
        let mut doc = courier_doc();
        doc.multi_cell(0.0, 12.0, "Short line", Border::None, Align::Justify, false)
            .unwrap();
        let text = page_text(&doc, 0);
        assert_eq!(text.matches(" Tj ET").count(), 1);
        assert!(!text.contains("Tw"));
        assert_eq!(doc.x(), 28.35);
        assert!((doc.y() - 40.35).abs() < 1e-9);
    }

    #[test]
    fn single_space_line_is_not_stretched() {
        let mut doc = courier_doc();
        // 15 courier characters fit in 100pt at 10pt.
        doc.multi_cell(100.0, 12.0, "AAAAAAAA BBBBBBBBBB", Border::None, Align::Justify, false)
            .unwrap();
        let text = page_text(&doc, 0);
        assert!(text.contains("0.000 Tw\n"));
        assert_eq!(text.matches(" Tw").count(), 1);
        assert!(text.contains("(AAAAAAAA) Tj"));
        assert!(text.contains("(BBBBBBBBBB) Tj"));
    }

    #[test]
    fn justified_line_reaches_the_margin() {
        let mut doc = courier_doc();
        doc.multi_cell(100.0, 12.0, "AA BB CC DD EEEEEEEE", Border::Frame, Align::Justify, false)
            .unwrap();
        let text = page_text(&doc, 0);
        let spacing = text.find("9.443 Tw\n").unwrap();
        let first = text.find("(AA BB CC DD) Tj").unwrap();
        let reset = text.find("0 Tw\n").unwrap();
        let second = text.find("(EEEEEEEE) Tj").unwrap();
        assert!(spacing < first && first < reset && reset < second);
        // Sides plus top edge on the first line, sides plus bottom on the last.
        assert_eq!(text.matches(" l S ").count(), 6);
        assert_eq!(doc.gs.word_spacing, 0.0);
    }

    #[test]
    fn character_wider_than_cell_is_forced_out() {
        let mut doc = courier_doc();
        doc.multi_cell(8.0, 12.0, "AB", Border::None, Align::Left, false)
            .unwrap();
        let text = page_text(&doc, 0);
        assert!(text.contains("(A) Tj"));
        assert!(text.contains("(B) Tj"));
        assert_eq!(text.matches(" Tj ET").count(), 2);
    }

    #[test]
    fn long_text_breaks_onto_a_new_page() {
        let mut doc = courier_doc();
        let body: Vec<String> = (1..=40).map(|n| format!("line {}", n)).collect();
        doc.multi_cell(0.0, 20.0, &body.join("\n"), Border::None, Align::Left, false)
            .unwrap();
        assert_eq!(doc.page_no(), 2);
        assert!(page_text(&doc, 0).contains("(line 37) Tj"));
        assert!(page_text(&doc, 1).contains("(line 38) Tj"));
        assert!(page_text(&doc, 1).starts_with("2 J\n"));
    }

    #[test]
    fn page_break_keeps_pen_and_word_spacing() {
        let mut doc = courier_doc();
        doc.set_xy(100.0, 780.0);
        doc.gs.word_spacing = 2.0;
        doc.cell(10.0, 20.0, "x", Border::None, LineBreak::Right, Align::Left, false, None)
            .unwrap();
        assert_eq!(doc.page_no(), 2);
        assert_eq!(doc.x(), 110.0);
        assert!(page_text(&doc, 0).ends_with("0 Tw\n"));
        assert!(page_text(&doc, 1).contains("2.000 Tw\n"));
    }

    #[test]
    fn no_break_while_disabled_or_in_footer() {
        let mut doc = courier_doc();
        doc.set_auto_page_break(false, 0.0);
        doc.set_y(830.0);
        doc.cell(10.0, 20.0, "x", Border::None, LineBreak::Right, Align::Left, false, None)
            .unwrap();
        assert_eq!(doc.page_no(), 1);
    }

    #[test]
    fn write_flows_from_the_pen() {
        let mut doc = courier_doc();
        let y0 = doc.y();
        doc.write(12.0, "Hello ", None).unwrap();
        assert!((doc.x() - 64.35).abs() < 1e-9);
        assert_eq!(doc.y(), y0);

        let link = LinkTarget::from("https://example.com");
        doc.write(12.0, &"aaaa ".repeat(30), Some(&link)).unwrap();
        assert!((doc.y() - (y0 + 12.0)).abs() < 1e-9);
        assert!((doc.x() - 448.35).abs() < 1e-9);
        assert_eq!(doc.pages[0].links.len(), 2);
        assert_eq!(count_token(&doc.pages[0].content, " Tj ET"), 3);
    }

    #[test]
    fn write_honours_explicit_newlines() {
        let mut doc = courier_doc();
        let y0 = doc.y();
        doc.set_x(200.0);
        doc.write(10.0, "one\ntwo", None).unwrap();
        let text = page_text(&doc, 0);
        assert!(text.contains("(one) Tj"));
        assert!(text.contains("(two) Tj"));
        assert!((doc.x() - (28.35 + 18.0)).abs() < 1e-9);
        assert!((doc.y() - (y0 + 10.0)).abs() < 1e-9);
    }
}
