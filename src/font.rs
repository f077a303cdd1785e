use crate::core_fonts;
use crate::error::PdfError;
use crate::font_metrics::{CharWidths, FontDefinition, FontKind, FontMetricsProvider, FontProgram};
use crate::types::FontStyle;
use std::collections::HashMap;
use std::sync::Arc;

/// A font registered with the document, addressed in content streams as
/// `/F{index}`.
#[derive(Debug, Clone)]
pub(crate) struct RegisteredFont {
    pub(crate) index: usize,
    pub(crate) key: String,
    pub(crate) name: String,
    pub(crate) kind: FontKind,
    pub(crate) underline_position: i32,
    pub(crate) underline_thickness: i32,
    pub(crate) widths: Arc<CharWidths>,
    pub(crate) descriptor: Vec<(String, String)>,
    pub(crate) encoding: Option<String>,
    /// 1-based index into the differences table.
    pub(crate) diff: Option<usize>,
    /// Index into the embedded font programs.
    pub(crate) program: Option<usize>,
    pub(crate) symbolic: bool,
}

#[derive(Default)]
pub(crate) struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
    differences: Vec<String>,
    programs: Vec<FontProgram>,
}

/// Lowercased family with the `arial` alias folded into `helvetica`.
pub(crate) fn normalize_family(family: &str) -> String {
    let family = family.trim().to_ascii_lowercase();
    if family == "arial" {
        "helvetica".to_string()
    } else {
        family
    }
}

/// Registry key such as `helveticaBI`. Symbolic families ignore style.
pub(crate) fn font_key(family: &str, style: FontStyle) -> String {
    if core_fonts::is_symbolic(family) {
        family.to_string()
    } else {
        format!("{}{}", family, style.key_suffix())
    }
}

impl FontRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lookup(&self, key: &str) -> Option<usize> {
        self.lookup.get(key).copied()
    }

    pub(crate) fn get(&self, slot: usize) -> Option<&RegisteredFont> {
        self.fonts.get(slot)
    }

    pub(crate) fn fonts(&self) -> &[RegisteredFont] {
        &self.fonts
    }

    pub(crate) fn differences(&self) -> &[String] {
        &self.differences
    }

    pub(crate) fn programs(&self) -> &[FontProgram] {
        &self.programs
    }

    pub(crate) fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Registers a standard font on first use. Returns its slot.
    pub(crate) fn register_core(
        &mut self,
        key: &str,
        provider: &dyn FontMetricsProvider,
    ) -> Result<usize, PdfError> {
        if let Some(slot) = self.lookup(key) {
            return Ok(slot);
        }
        let name = core_fonts::core_font_name(key)
            .ok_or_else(|| PdfError::Font(format!("undefined font: {}", key)))?;
        let widths = provider.core_widths(key)?;
        let slot = self.fonts.len();
        self.fonts.push(RegisteredFont {
            index: slot + 1,
            key: key.to_string(),
            name: name.to_string(),
            kind: FontKind::Core,
            underline_position: -100,
            underline_thickness: 50,
            widths,
            descriptor: Vec::new(),
            encoding: None,
            diff: None,
            program: None,
            symbolic: core_fonts::is_symbolic(key),
        });
        self.lookup.insert(key.to_string(), slot);
        Ok(slot)
    }

    /// Registers an embeddable font. Fails if the key is taken.
    pub(crate) fn register_definition(
        &mut self,
        key: &str,
        definition: FontDefinition,
    ) -> Result<usize, PdfError> {
        if self.lookup.contains_key(key) {
            return Err(PdfError::Font(format!("font already added: {}", key)));
        }
        let diff = definition.differences.map(|diff| {
            match self.differences.iter().position(|known| *known == diff) {
                Some(pos) => pos + 1,
                None => {
                    self.differences.push(diff);
                    self.differences.len()
                }
            }
        });
        let program = definition.program.map(|program| {
            match self
                .programs
                .iter()
                .position(|known| known.source == program.source)
            {
                Some(pos) => pos,
                None => {
                    self.programs.push(program);
                    self.programs.len() - 1
                }
            }
        });
        let slot = self.fonts.len();
        self.fonts.push(RegisteredFont {
            index: slot + 1,
            key: key.to_string(),
            name: definition.name,
            kind: definition.kind,
            underline_position: definition.underline_position,
            underline_thickness: definition.underline_thickness,
            widths: definition.widths,
            descriptor: definition.descriptor,
            encoding: definition.encoding,
            diff,
            program,
            symbolic: false,
        });
        self.lookup.insert(key.to_string(), slot);
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font_metrics::StandardMetrics;

    fn definition(name: &str, diff: Option<&str>, source: &str) -> FontDefinition {
        FontDefinition {
            name: name.to_string(),
            kind: FontKind::Type1,
            descriptor: vec![("Ascent".into(), "700".into())],
            underline_position: -120,
            underline_thickness: 40,
            widths: Arc::new(CharWidths::uniform(500)),
            encoding: Some("cp1252".into()),
            differences: diff.map(str::to_string),
            program: Some(FontProgram {
                source: source.to_string(),
                data: vec![1, 2, 3],
                length1: 2,
                length2: Some(1),
                deflated: false,
            }),
        }
    }

    #[test]
    fn keys_fold_aliases_and_symbolic_styles() {
        assert_eq!(normalize_family("Arial"), "helvetica");
        assert_eq!(font_key("helvetica", FontStyle::parse("IB").unwrap()), "helveticaBI");
        assert_eq!(font_key("symbol", FontStyle::BOLD), "symbol");
    }

    #[test]
    fn core_fonts_register_once_with_one_based_index() {
        let metrics = StandardMetrics::new();
        let mut registry = FontRegistry::new();
        let first = registry.register_core("helvetica", &metrics).unwrap();
        let again = registry.register_core("helvetica", &metrics).unwrap();
        let bold = registry.register_core("courierB", &metrics).unwrap();
        assert_eq!(first, again);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(bold).unwrap().index, 2);
        assert_eq!(registry.get(bold).unwrap().name, "Courier-Bold");
        assert!(registry.register_core("comic", &metrics).is_err());
    }

    #[test]
    fn differences_and_programs_are_shared() {
        let mut registry = FontRegistry::new();
        let a = registry
            .register_definition("fooB", definition("Foo-Bold", Some("128 /Euro"), "foo.pfb"))
            .unwrap();
        let b = registry
            .register_definition("foo", definition("Foo", Some("128 /Euro"), "foo.pfb"))
            .unwrap();
        let c = registry
            .register_definition("bar", definition("Bar", Some("130 /quotesinglbase"), "bar.pfb"))
            .unwrap();
        assert_eq!(registry.differences().len(), 2);
        assert_eq!(registry.programs().len(), 2);
        assert_eq!(registry.get(a).unwrap().diff, Some(1));
        assert_eq!(registry.get(b).unwrap().diff, Some(1));
        assert_eq!(registry.get(c).unwrap().diff, Some(2));
        assert_eq!(registry.get(b).unwrap().program, Some(0));
        assert!(matches!(
            registry.register_definition("foo", definition("Foo", None, "foo.pfb")),
            Err(PdfError::Font(_))
        ));
    }
}
