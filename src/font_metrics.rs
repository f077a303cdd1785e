use crate::core_fonts;
use crate::encoding::winansi_char;
use crate::error::PdfError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Advance widths in thousandths of an em, indexed by WinAnsi byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharWidths([u16; 256]);

impl CharWidths {
    pub fn new(widths: [u16; 256]) -> Self {
        Self(widths)
    }

    pub fn uniform(width: u16) -> Self {
        Self([width; 256])
    }

    pub fn width(&self, byte: u8) -> u16 {
        self.0[byte as usize]
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    Core,
    TrueType,
    Type1,
}

impl FontKind {
    pub(crate) fn subtype(self) -> &'static str {
        match self {
            FontKind::Core | FontKind::Type1 => "Type1",
            FontKind::TrueType => "TrueType",
        }
    }
}

/// Font program bytes to embed.
#[derive(Debug, Clone)]
pub struct FontProgram {
    /// Identity used to share one embedded stream between registrations.
    pub source: String,
    pub data: Vec<u8>,
    pub length1: usize,
    /// Type1 programs only.
    pub length2: Option<usize>,
    /// The data is already zlib-compressed.
    pub deflated: bool,
}

/// Everything needed to register and serialize a non-core font.
#[derive(Debug, Clone)]
pub struct FontDefinition {
    pub name: String,
    pub kind: FontKind,
    /// FontDescriptor entries, emitted in order as `/Key value`.
    pub descriptor: Vec<(String, String)>,
    pub underline_position: i32,
    pub underline_thickness: i32,
    pub widths: Arc<CharWidths>,
    /// `Some` means the font uses WinAnsi.
    pub encoding: Option<String>,
    /// Content of a `/Differences` array.
    pub differences: Option<String>,
    pub program: Option<FontProgram>,
}

/// Source of glyph widths and embeddable font definitions.
pub trait FontMetricsProvider: Send + Sync {
    /// Width table of a standard font keyed like `helveticaB`.
    fn core_widths(&self, key: &str) -> Result<Arc<CharWidths>, PdfError>;

    /// Loads the definition of an embeddable font. `style` is one of
    /// `""`, `"B"`, `"I"`, `"BI"`.
    fn font_definition(
        &self,
        family: &str,
        style: &str,
        file: Option<&Path>,
    ) -> Result<FontDefinition, PdfError>;
}

/// Bundled metrics for the standard fonts plus TrueType loading from disk.
#[derive(Debug, Default)]
pub struct StandardMetrics {
    cache: Mutex<HashMap<String, Arc<CharWidths>>>,
}

impl StandardMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FontMetricsProvider for StandardMetrics {
    fn core_widths(&self, key: &str) -> Result<Arc<CharWidths>, PdfError> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(widths) = cache.get(key) {
                return Ok(Arc::clone(widths));
            }
        }
        let table = core_fonts::core_widths(key).ok_or_else(|| {
            PdfError::Font(format!("no bundled metrics for standard font {}", key))
        })?;
        let widths = Arc::new(CharWidths::new(*table));
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key.to_string(), Arc::clone(&widths));
        }
        Ok(widths)
    }

    fn font_definition(
        &self,
        family: &str,
        style: &str,
        file: Option<&Path>,
    ) -> Result<FontDefinition, PdfError> {
        let path = file.ok_or_else(|| {
            PdfError::Font(format!(
                "no font file given for {}{}, only TrueType files can be loaded",
                family, style
            ))
        })?;
        let data = std::fs::read(path).map_err(|err| {
            PdfError::Font(format!("unable to read font file {}: {}", path.display(), err))
        })?;
        truetype_definition(&path.display().to_string(), data)
    }
}

/// Builds a WinAnsi-encoded TrueType definition from raw font bytes.
pub fn truetype_definition(source: &str, data: Vec<u8>) -> Result<FontDefinition, PdfError> {
    let face = ttf_parser::Face::parse(&data, 0)
        .map_err(|err| PdfError::Font(format!("unable to parse {}: {}", source, err)))?;
    if face.tables().cff.is_some() {
        return Err(PdfError::Font(format!(
            "{} is a CFF-flavoured OpenType font, only TrueType outlines can be embedded",
            source
        )));
    }

    let units_per_em = face.units_per_em().max(1);
    let scale = 1000.0 / units_per_em as f32;
    let scaled = |value: i16| (value as f32 * scale).round() as i32;
    let advance = |gid: ttf_parser::GlyphId| {
        face.glyph_hor_advance(gid)
            .map(|adv| (adv as f32 * scale).round() as u16)
    };

    let missing_width = advance(ttf_parser::GlyphId(0)).unwrap_or(0);
    let mut widths = [missing_width; 256];
    for (byte, slot) in widths.iter_mut().enumerate() {
        let Some(ch) = winansi_char(byte as u8) else {
            continue;
        };
        if let Some(width) = face.glyph_index(ch).and_then(|gid| advance(gid)) {
            *slot = width;
        }
    }

    let ascent = scaled(face.ascender());
    let descent = scaled(face.descender());
    let cap_height = face.capital_height().map(scaled).unwrap_or(ascent);
    let bbox = face.global_bounding_box();
    let italic_angle = face.italic_angle().map(|v| v.round() as i32).unwrap_or(0);
    let mut flags = 32;
    if face.is_monospaced() {
        flags |= 1;
    }
    if face.is_italic() {
        flags |= 64;
    }
    let stem_v = if face.is_bold() { 120 } else { 80 };
    let (underline_position, underline_thickness) = face
        .underline_metrics()
        .map(|metrics| (scaled(metrics.position), scaled(metrics.thickness)))
        .unwrap_or((-100, 50));

    let name = face
        .names()
        .into_iter()
        .filter(|name| name.name_id == ttf_parser::name::name_id::POST_SCRIPT_NAME)
        .find_map(|name| name.to_string())
        .map(|name| sanitize_font_name(&name))
        .unwrap_or_else(|| {
            let stem = Path::new(source)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("Embedded");
            sanitize_font_name(stem)
        });

    let descriptor = vec![
        ("Ascent".to_string(), ascent.to_string()),
        ("Descent".to_string(), descent.to_string()),
        ("CapHeight".to_string(), cap_height.to_string()),
        ("Flags".to_string(), flags.to_string()),
        (
            "FontBBox".to_string(),
            format!(
                "[{} {} {} {}]",
                scaled(bbox.x_min),
                scaled(bbox.y_min),
                scaled(bbox.x_max),
                scaled(bbox.y_max)
            ),
        ),
        ("ItalicAngle".to_string(), italic_angle.to_string()),
        ("StemV".to_string(), stem_v.to_string()),
        ("MissingWidth".to_string(), missing_width.to_string()),
    ];

    let length1 = data.len();
    Ok(FontDefinition {
        name,
        kind: FontKind::TrueType,
        descriptor,
        underline_position,
        underline_thickness,
        widths: Arc::new(CharWidths::new(widths)),
        encoding: Some("cp1252".to_string()),
        differences: None,
        program: Some(FontProgram {
            source: source.to_string(),
            data,
            length1,
            length2: None,
            deflated: false,
        }),
    })
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        "Embedded".to_string()
    } else {
        out
    }
}
