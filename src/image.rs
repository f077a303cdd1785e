use crate::error::ImageError;
use crate::types::ImageType;
use base64::Engine;
use std::collections::HashMap;
use std::io::Cursor;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    Indexed,
}

impl ColorSpace {
    pub(crate) fn name(self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRgb => "DeviceRGB",
            ColorSpace::DeviceCmyk => "DeviceCMYK",
            ColorSpace::Indexed => "Indexed",
        }
    }
}

/// Image data ready to be written as an XObject, still in its source
/// compression.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub bits_per_component: u8,
    pub filter: &'static str,
    pub decode_parms: Option<String>,
    /// RGB triples for indexed images.
    pub palette: Vec<u8>,
    /// Color-key mask values.
    pub transparency: Option<Vec<u8>>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub(crate) struct RegisteredImage {
    pub(crate) index: usize,
    pub(crate) info: ImageInfo,
}

/// Images keyed by their source identifier; each is embedded once.
#[derive(Default)]
pub(crate) struct ImageRegistry {
    images: Vec<RegisteredImage>,
    lookup: HashMap<String, usize>,
}

impl ImageRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lookup(&self, source: &str) -> Option<usize> {
        self.lookup.get(source).copied()
    }

    pub(crate) fn get(&self, slot: usize) -> Option<&RegisteredImage> {
        self.images.get(slot)
    }

    pub(crate) fn insert(&mut self, source: &str, info: ImageInfo) -> usize {
        if let Some(slot) = self.lookup(source) {
            return slot;
        }
        let slot = self.images.len();
        self.images.push(RegisteredImage {
            index: slot + 1,
            info,
        });
        self.lookup.insert(source.to_string(), slot);
        slot
    }

    pub(crate) fn images(&self) -> &[RegisteredImage] {
        &self.images
    }

    pub(crate) fn len(&self) -> usize {
        self.images.len()
    }
}

/// Reads an image source: a filesystem path or a `data:` URI. The type hint
/// comes from the extension or the MIME type.
pub(crate) fn load_source(source: &str) -> Result<(Vec<u8>, Option<ImageType>), ImageError> {
    if source.starts_with("data:") {
        let (mime, data) = parse_data_uri(source).ok_or_else(|| ImageError::Unreadable {
            source: truncate_source(source),
            message: "malformed data URI".to_string(),
        })?;
        return Ok((data, ImageType::from_hint(&mime)));
    }
    let data = std::fs::read(source).map_err(|err| ImageError::Unreadable {
        source: source.to_string(),
        message: err.to_string(),
    })?;
    Ok((data, ImageType::from_hint(source)))
}

pub(crate) fn parse(source: &str, data: Vec<u8>, kind: ImageType) -> Result<ImageInfo, ImageError> {
    match kind {
        ImageType::Png => parse_png(source, &data),
        ImageType::Jpeg => parse_jpeg(source, data),
    }
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let (header, payload) = uri.strip_prefix("data:")?.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|mime| !mime.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}

// Keeps error messages readable when the source is an inline payload.
fn truncate_source(source: &str) -> String {
    if source.len() <= 48 {
        return source.to_string();
    }
    let mut end = 48;
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &source[..end])
}

struct ChunkReader<'a> {
    source: &'a str,
    data: &'a [u8],
    pos: usize,
}

impl<'a> ChunkReader<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ImageError> {
        if self.remaining() < len {
            return Err(ImageError::Unreadable {
                source: self.source.to_string(),
                message: "unexpected end of PNG data".to_string(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, ImageError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u8(&mut self) -> Result<u8, ImageError> {
        Ok(self.take(1)?[0])
    }
}

pub(crate) fn parse_png(source: &str, data: &[u8]) -> Result<ImageInfo, ImageError> {
    let unsupported = |reason: &str| ImageError::UnsupportedFormat {
        source: source.to_string(),
        reason: reason.to_string(),
    };
    if !data.starts_with(&PNG_SIGNATURE) {
        return Err(ImageError::NotPng(source.to_string()));
    }
    let mut reader = ChunkReader {
        source,
        data,
        pos: PNG_SIGNATURE.len(),
    };
    reader.take(4)?;
    if reader.take(4)? != b"IHDR" {
        return Err(ImageError::Unreadable {
            source: source.to_string(),
            message: "incorrect PNG file, IHDR chunk missing".to_string(),
        });
    }
    let width = reader.read_u32()?;
    let height = reader.read_u32()?;
    let bits = reader.read_u8()?;
    if bits > 8 {
        return Err(unsupported("16-bit depth not supported"));
    }
    let color_type = reader.read_u8()?;
    let color_space = match color_type {
        0 => ColorSpace::DeviceGray,
        2 => ColorSpace::DeviceRgb,
        3 => ColorSpace::Indexed,
        _ => return Err(unsupported("alpha channel not supported")),
    };
    if reader.read_u8()? != 0 {
        return Err(unsupported("unknown compression method"));
    }
    if reader.read_u8()? != 0 {
        return Err(unsupported("unknown filter method"));
    }
    if reader.read_u8()? != 0 {
        return Err(unsupported("interlacing not supported"));
    }
    reader.take(4)?;

    let colors = if color_type == 2 { 3 } else { 1 };
    let decode_parms = format!(
        "/DecodeParms <</Predictor 15 /Colors {} /BitsPerComponent {} /Columns {}>>",
        colors, bits, width
    );

    let mut palette = Vec::new();
    let mut transparency = None;
    let mut idat = Vec::new();
    while reader.remaining() >= 8 {
        let len = reader.read_u32()? as usize;
        let kind = reader.take(4)?;
        match kind {
            b"PLTE" => {
                palette = reader.take(len)?.to_vec();
                reader.take(4)?;
            }
            b"tRNS" => {
                let chunk = reader.take(len)?;
                transparency = color_key(color_type, chunk);
                reader.take(4)?;
            }
            b"IDAT" => {
                idat.extend_from_slice(reader.take(len)?);
                reader.take(4)?;
            }
            b"IEND" => break,
            _ => {
                reader.take(len)?;
                reader.take(4)?;
            }
        }
    }

    if color_space == ColorSpace::Indexed && palette.is_empty() {
        return Err(ImageError::MissingPalette(source.to_string()));
    }

    Ok(ImageInfo {
        width,
        height,
        color_space,
        bits_per_component: bits,
        filter: "FlateDecode",
        decode_parms: Some(decode_parms),
        palette,
        transparency,
        data: idat,
    })
}

// Gray and RGB keys use the low byte of each 16-bit sample; indexed images
// mask the first fully transparent palette entry.
fn color_key(color_type: u8, chunk: &[u8]) -> Option<Vec<u8>> {
    match color_type {
        0 => chunk.get(1).map(|v| vec![*v]),
        2 => match (chunk.get(1), chunk.get(3), chunk.get(5)) {
            (Some(r), Some(g), Some(b)) => Some(vec![*r, *g, *b]),
            _ => None,
        },
        _ => chunk
            .iter()
            .position(|alpha| *alpha == 0)
            .and_then(|pos| u8::try_from(pos).ok())
            .map(|pos| vec![pos]),
    }
}

pub(crate) fn parse_jpeg(source: &str, data: Vec<u8>) -> Result<ImageInfo, ImageError> {
    if !matches!(image::guess_format(&data), Ok(image::ImageFormat::Jpeg)) {
        return Err(ImageError::NotJpeg(source.to_string()));
    }
    let (width, height) =
        image::ImageReader::with_format(Cursor::new(data.as_slice()), image::ImageFormat::Jpeg)
            .into_dimensions()
            .map_err(|err| ImageError::Unreadable {
                source: source.to_string(),
                message: err.to_string(),
            })?;
    let (bits, channels) = frame_header(&data).unwrap_or((8, 3));
    let color_space = match channels {
        3 => ColorSpace::DeviceRgb,
        4 => ColorSpace::DeviceCmyk,
        _ => ColorSpace::DeviceGray,
    };
    Ok(ImageInfo {
        width,
        height,
        color_space,
        bits_per_component: bits,
        filter: "DCTDecode",
        decode_parms: None,
        palette: Vec::new(),
        transparency: None,
        data,
    })
}

/// Precision and component count from the first start-of-frame segment.
fn frame_header(data: &[u8]) -> Option<(u8, u8)> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let kind = data[pos + 1];
        match kind {
            0xFF => {
                pos += 1;
                continue;
            }
            0x01 | 0xD0..=0xD8 => {
                pos += 2;
                continue;
            }
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let is_frame = matches!(kind, 0xC0..=0xCF) && !matches!(kind, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            let segment = data.get(pos + 4..pos + 2 + len)?;
            if segment.len() < 6 {
                return None;
            }
            return Some((segment[0], segment[5]));
        }
        pos += 2 + len;
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn encode_png(width: u32, height: u32, color: image::ExtendedColorType) -> Vec<u8> {
        use image::ImageEncoder;
        let channels = match color {
            image::ExtendedColorType::L8 => 1,
            image::ExtendedColorType::Rgb8 => 3,
            image::ExtendedColorType::Rgba8 => 4,
            _ => panic!("unsupported test color"),
        };
        let pixels = vec![0x7Fu8; (width * height * channels) as usize];
        let mut out = Vec::new();
        image::codecs::png::PngEncoder::new(&mut out)
            .write_image(&pixels, width, height, color)
            .expect("encode png");
        out
    }

    pub(crate) fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 80)
            .encode_image(&img)
            .expect("encode jpeg");
        out
    }

    fn chunk(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out.extend_from_slice(&[0, 0, 0, 0]);
        out
    }

    // Checksums are never verified, so hand-built files can carry zero CRCs.
    pub(crate) fn indexed_png(with_palette: bool) -> Vec<u8> {
        let mut out = PNG_SIGNATURE.to_vec();
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, 3, 0, 0, 0]);
        out.extend(chunk(b"IHDR", &ihdr));
        if with_palette {
            out.extend(chunk(b"PLTE", &[255, 0, 0, 0, 0, 255]));
            out.extend(chunk(b"tRNS", &[255, 0]));
        }
        out.extend(chunk(b"IDAT", &[0x78, 0x9C, 0x01]));
        out.extend(chunk(b"IEND", &[]));
        out
    }

    #[test]
    fn rgb_png_passes_idat_through() {
        let data = encode_png(3, 2, image::ExtendedColorType::Rgb8);
        let info = parse_png("rgb.png", &data).unwrap();
        assert_eq!((info.width, info.height), (3, 2));
        assert_eq!(info.color_space, ColorSpace::DeviceRgb);
        assert_eq!(info.bits_per_component, 8);
        assert_eq!(info.filter, "FlateDecode");
        assert_eq!(
            info.decode_parms.as_deref(),
            Some("/DecodeParms <</Predictor 15 /Colors 3 /BitsPerComponent 8 /Columns 3>>")
        );
        assert!(!info.data.is_empty());
        assert!(info.palette.is_empty());
    }

    #[test]
    fn indexed_png_keeps_palette_and_mask() {
        let info = parse_png("pal.png", &indexed_png(true)).unwrap();
        assert_eq!(info.color_space, ColorSpace::Indexed);
        assert_eq!(info.palette.len(), 6);
        assert_eq!(info.transparency, Some(vec![1]));
        assert_eq!(info.data, vec![0x78, 0x9C, 0x01]);
    }

    #[test]
    fn indexed_png_without_palette_fails() {
        let err = parse_png("nopal.png", &indexed_png(false)).unwrap_err();
        assert!(matches!(err, ImageError::MissingPalette(_)));
    }

    #[test]
    fn alpha_and_wrong_signature_are_rejected() {
        let rgba = encode_png(1, 1, image::ExtendedColorType::Rgba8);
        assert!(matches!(
            parse_png("a.png", &rgba),
            Err(ImageError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            parse_png("b.png", b"GIF89a......"),
            Err(ImageError::NotPng(_))
        ));
    }

    #[test]
    fn sixteen_bit_png_is_rejected() {
        let mut data = indexed_png(true);
        // IHDR bit depth lives right after width and height.
        data[24] = 16;
        let err = parse_png("deep.png", &data).unwrap_err();
        assert!(err.to_string().contains("16-bit"));
    }

    #[test]
    fn jpeg_is_passed_through_with_scanned_header() {
        let data = encode_jpeg(4, 3);
        let info = parse_jpeg("photo.jpg", data.clone()).unwrap();
        assert_eq!((info.width, info.height), (4, 3));
        assert_eq!(info.color_space, ColorSpace::DeviceRgb);
        assert_eq!(info.bits_per_component, 8);
        assert_eq!(info.filter, "DCTDecode");
        assert_eq!(info.data, data);
        assert!(matches!(
            parse_jpeg("fake.jpg", encode_png(1, 1, image::ExtendedColorType::L8)),
            Err(ImageError::NotJpeg(_))
        ));
    }

    #[test]
    fn data_uri_sources_decode() {
        let png = encode_png(1, 1, image::ExtendedColorType::L8);
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&png)
        );
        let (data, kind) = load_source(&uri).unwrap();
        assert_eq!(data, png);
        assert_eq!(kind, Some(ImageType::Png));
        assert!(load_source("data:image/png;base64").is_err());
        assert!(matches!(
            load_source("/nonexistent/pagewright.png"),
            Err(ImageError::Unreadable { .. })
        ));
    }

    #[test]
    fn registry_dedupes_by_source() {
        let info = parse_png("pal.png", &indexed_png(true)).unwrap();
        let mut registry = ImageRegistry::new();
        let a = registry.insert("pal.png", info.clone());
        let b = registry.insert("pal.png", info);
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(a).unwrap().index, 1);
    }
}
