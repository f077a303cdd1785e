use crate::error::PdfError;
use std::ops::BitOr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    Pt,
    #[default]
    Mm,
    Cm,
    In,
}

impl Unit {
    /// Points per user unit.
    pub fn scale(self) -> f64 {
        match self {
            Unit::Pt => 1.0,
            Unit::Mm => 72.0 / 25.4,
            Unit::Cm => 72.0 / 2.54,
            Unit::In => 72.0,
        }
    }

    pub fn parse(value: &str) -> Result<Self, PdfError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pt" => Ok(Unit::Pt),
            "mm" => Ok(Unit::Mm),
            "cm" => Ok(Unit::Cm),
            "in" => Ok(Unit::In),
            other => Err(PdfError::InvalidConfiguration(format!(
                "incorrect unit: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn parse(value: &str) -> Result<Self, PdfError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "p" | "portrait" => Ok(Orientation::Portrait),
            "l" | "landscape" => Ok(Orientation::Landscape),
            other => Err(PdfError::InvalidConfiguration(format!(
                "incorrect orientation: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PageFormat {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
    /// Width and height in user units.
    Custom { width: f64, height: f64 },
}

impl PageFormat {
    pub fn parse(value: &str) -> Result<Self, PdfError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a3" => Ok(PageFormat::A3),
            "a4" => Ok(PageFormat::A4),
            "a5" => Ok(PageFormat::A5),
            "letter" => Ok(PageFormat::Letter),
            "legal" => Ok(PageFormat::Legal),
            other => Err(PdfError::InvalidConfiguration(format!(
                "unknown page format: {}",
                other
            ))),
        }
    }

    /// Portrait size in points.
    pub(crate) fn size_pt(self, scale: f64) -> Result<(f64, f64), PdfError> {
        let size = match self {
            PageFormat::A3 => (841.89, 1190.55),
            PageFormat::A4 => (595.28, 841.89),
            PageFormat::A5 => (420.94, 595.28),
            PageFormat::Letter => (612.0, 792.0),
            PageFormat::Legal => (612.0, 1008.0),
            PageFormat::Custom { width, height } => {
                let valid = |v: f64| v.is_finite() && v > 0.0;
                if !valid(width) || !valid(height) {
                    return Err(PdfError::InvalidConfiguration(format!(
                        "custom page size must be positive, got {} x {}",
                        width, height
                    )));
                }
                (width * scale, height * scale)
            }
        };
        Ok(size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    /// Components run from 0.0 to 1.0.
    Gray(f64),
    Rgb(f64, f64, f64),
    Cmyk(f64, f64, f64, f64),
}

impl Color {
    pub const BLACK: Color = Color::Gray(0.0);
    pub const WHITE: Color = Color::Gray(1.0);

    pub fn gray(level: u8) -> Self {
        Color::Gray(level as f64 / 255.0)
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color::Rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }

    pub(crate) fn fill_operator(self) -> String {
        match self {
            Color::Gray(g) => format!("{:.3} g", g),
            Color::Rgb(r, g, b) => format!("{:.3} {:.3} {:.3} rg", r, g, b),
            Color::Cmyk(c, m, y, k) => format!("{:.3} {:.3} {:.3} {:.3} k", c, m, y, k),
        }
    }

    pub(crate) fn stroke_operator(self) -> String {
        match self {
            Color::Gray(g) => format!("{:.3} G", g),
            Color::Rgb(r, g, b) => format!("{:.3} {:.3} {:.3} RG", r, g, b),
            Color::Cmyk(c, m, y, k) => format!("{:.3} {:.3} {:.3} {:.3} K", c, m, y, k),
        }
    }
}

/// Bold/italic/underline flags of a font selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FontStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl FontStyle {
    pub const REGULAR: FontStyle = FontStyle {
        bold: false,
        italic: false,
        underline: false,
    };
    pub const BOLD: FontStyle = FontStyle {
        bold: true,
        italic: false,
        underline: false,
    };
    pub const ITALIC: FontStyle = FontStyle {
        bold: false,
        italic: true,
        underline: false,
    };
    pub const UNDERLINE: FontStyle = FontStyle {
        bold: false,
        italic: false,
        underline: true,
    };

    /// Accepts any combination of `B`, `I` and `U` in any case and order.
    pub fn parse(value: &str) -> Result<Self, PdfError> {
        let mut style = FontStyle::REGULAR;
        for ch in value.chars() {
            match ch.to_ascii_uppercase() {
                'B' => style.bold = true,
                'I' => style.italic = true,
                'U' => style.underline = true,
                _ => {
                    return Err(PdfError::Font(format!("incorrect font style: {}", value)));
                }
            }
        }
        Ok(style)
    }

    pub(crate) fn without_underline(self) -> Self {
        FontStyle {
            underline: false,
            ..self
        }
    }

    /// `""`, `"B"`, `"I"` or `"BI"`.
    pub(crate) fn key_suffix(self) -> &'static str {
        match (self.bold, self.italic) {
            (false, false) => "",
            (true, false) => "B",
            (false, true) => "I",
            (true, true) => "BI",
        }
    }
}

impl BitOr for FontStyle {
    type Output = FontStyle;

    fn bitor(self, rhs: Self) -> Self::Output {
        FontStyle {
            bold: self.bold || rhs.bold,
            italic: self.italic || rhs.italic,
            underline: self.underline || rhs.underline,
        }
    }
}

/// Individual cell edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sides {
    pub left: bool,
    pub top: bool,
    pub right: bool,
    pub bottom: bool,
}

impl Sides {
    pub const NONE: Sides = Sides {
        left: false,
        top: false,
        right: false,
        bottom: false,
    };
    pub const LEFT: Sides = Sides {
        left: true,
        ..Sides::NONE
    };
    pub const TOP: Sides = Sides {
        top: true,
        ..Sides::NONE
    };
    pub const RIGHT: Sides = Sides {
        right: true,
        ..Sides::NONE
    };
    pub const BOTTOM: Sides = Sides {
        bottom: true,
        ..Sides::NONE
    };

    /// Parses any subset of `LTRB`.
    pub fn parse(value: &str) -> Result<Self, PdfError> {
        let mut sides = Sides::NONE;
        for ch in value.chars() {
            match ch.to_ascii_uppercase() {
                'L' => sides.left = true,
                'T' => sides.top = true,
                'R' => sides.right = true,
                'B' => sides.bottom = true,
                _ => {
                    return Err(PdfError::InvalidConfiguration(format!(
                        "incorrect border: {}",
                        value
                    )));
                }
            }
        }
        Ok(sides)
    }

    pub fn is_empty(self) -> bool {
        self == Sides::NONE
    }
}

impl BitOr for Sides {
    type Output = Sides;

    fn bitor(self, rhs: Self) -> Self::Output {
        Sides {
            left: self.left || rhs.left,
            top: self.top || rhs.top,
            right: self.right || rhs.right,
            bottom: self.bottom || rhs.bottom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Border {
    #[default]
    None,
    /// Full rectangle around the cell.
    Frame,
    Sides(Sides),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
    /// Only meaningful for multi-line cells; single cells treat it as left.
    Justify,
}

/// Where the pen goes after a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineBreak {
    #[default]
    Right,
    NextLine,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawStyle {
    #[default]
    Stroke,
    Fill,
    FillStroke,
}

impl DrawStyle {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "F" => DrawStyle::Fill,
            "FD" | "DF" => DrawStyle::FillStroke,
            _ => DrawStyle::Stroke,
        }
    }

    pub(crate) fn operator(self) -> &'static str {
        match self {
            DrawStyle::Stroke => "S",
            DrawStyle::Fill => "f",
            DrawStyle::FillStroke => "B",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ZoomMode {
    FullPage,
    #[default]
    FullWidth,
    Real,
    Default,
    /// Zoom factor in percent.
    Percent(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutMode {
    Single,
    #[default]
    Continuous,
    Two,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Png,
}

impl ImageType {
    /// From a file extension or a MIME subtype.
    pub fn from_hint(hint: &str) -> Option<Self> {
        let hint = hint.trim().to_ascii_lowercase();
        let hint = hint.rsplit(|c| c == '.' || c == '/').next().unwrap_or_default();
        match hint {
            "jpg" | "jpeg" => Some(ImageType::Jpeg),
            "png" => Some(ImageType::Png),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    #[default]
    Inline,
    Attachment,
}

/// Handle to an internal link destination, see `Document::add_link`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    Internal(LinkId),
    Uri(String),
}

impl From<LinkId> for LinkTarget {
    fn from(value: LinkId) -> Self {
        LinkTarget::Internal(value)
    }
}

impl From<&str> for LinkTarget {
    fn from(value: &str) -> Self {
        LinkTarget::Uri(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_scales() {
        assert_eq!(Unit::Pt.scale(), 1.0);
        assert!((Unit::Mm.scale() - 2.834645669).abs() < 1e-6);
        assert!((Unit::Cm.scale() - 28.34645669).abs() < 1e-6);
        assert_eq!(Unit::In.scale(), 72.0);
        assert!(Unit::parse("furlong").is_err());
        assert_eq!(Unit::parse("IN").unwrap(), Unit::In);
        assert_eq!(Orientation::parse("l").unwrap(), Orientation::Landscape);
        assert_eq!(Orientation::parse("Portrait").unwrap(), Orientation::Portrait);
        assert!(Orientation::parse("sideways").is_err());
    }

    #[test]
    fn custom_format_is_converted_with_scale() {
        let (w, h) = PageFormat::Custom {
            width: 100.0,
            height: 50.0,
        }
        .size_pt(Unit::Mm.scale())
        .unwrap();
        assert!((w - 283.46).abs() < 0.01);
        assert!((h - 141.73).abs() < 0.01);
        assert!(
            PageFormat::Custom {
                width: 0.0,
                height: 10.0
            }
            .size_pt(1.0)
            .is_err()
        );
        assert!(PageFormat::parse("tabloid").is_err());
    }

    #[test]
    fn color_operators() {
        assert_eq!(Color::gray(0).fill_operator(), "0.000 g");
        assert_eq!(Color::rgb(255, 0, 0).stroke_operator(), "1.000 0.000 0.000 RG");
        assert_eq!(
            Color::Cmyk(0.0, 0.5, 1.0, 0.0).fill_operator(),
            "0.000 0.500 1.000 0.000 k"
        );
    }

    #[test]
    fn style_and_sides_parse() {
        let style = FontStyle::parse("ub").unwrap();
        assert!(style.bold && style.underline && !style.italic);
        assert_eq!(FontStyle::parse("IB").unwrap().key_suffix(), "BI");
        assert!(FontStyle::parse("X").is_err());
        assert_eq!(FontStyle::BOLD | FontStyle::ITALIC, FontStyle::parse("bi").unwrap());

        let sides = Sides::parse("LR").unwrap();
        assert!(sides.left && sides.right && !sides.top && !sides.bottom);
        assert_eq!(sides | Sides::TOP | Sides::BOTTOM, Sides::parse("LTRB").unwrap());
    }

    #[test]
    fn image_type_hints() {
        assert_eq!(ImageType::from_hint("photo.JPG"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_hint("image/png"), Some(ImageType::Png));
        assert_eq!(ImageType::from_hint("anim.gif"), None);
        assert_eq!(DrawStyle::parse("DF").operator(), "B");
    }
}
