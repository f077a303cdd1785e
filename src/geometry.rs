use crate::error::PdfError;
use crate::types::{Orientation, PageFormat, Unit};

/// Page dimensions in points and user units, for the default and the
/// current orientation.
#[derive(Debug, Clone)]
pub(crate) struct PageGeometry {
    pub(crate) scale: f64,
    pub(crate) format_width_pt: f64,
    pub(crate) format_height_pt: f64,
    pub(crate) default_orientation: Orientation,
    pub(crate) current_orientation: Orientation,
    pub(crate) width_pt: f64,
    pub(crate) height_pt: f64,
    pub(crate) width: f64,
    pub(crate) height: f64,
}

impl PageGeometry {
    pub(crate) fn new(
        unit: Unit,
        format: PageFormat,
        orientation: Orientation,
    ) -> Result<Self, PdfError> {
        let scale = unit.scale();
        let (format_width_pt, format_height_pt) = format.size_pt(scale)?;
        let mut geometry = PageGeometry {
            scale,
            format_width_pt,
            format_height_pt,
            default_orientation: orientation,
            current_orientation: Orientation::Portrait,
            width_pt: format_width_pt,
            height_pt: format_height_pt,
            width: format_width_pt / scale,
            height: format_height_pt / scale,
        };
        geometry.apply_orientation(orientation);
        Ok(geometry)
    }

    pub(crate) fn apply_orientation(&mut self, orientation: Orientation) {
        let (w, h) = match orientation {
            Orientation::Portrait => (self.format_width_pt, self.format_height_pt),
            Orientation::Landscape => (self.format_height_pt, self.format_width_pt),
        };
        self.width_pt = w;
        self.height_pt = h;
        self.width = w / self.scale;
        self.height = h / self.scale;
        self.current_orientation = orientation;
    }

    /// Page size in points under the default orientation.
    pub(crate) fn default_size_pt(&self) -> (f64, f64) {
        match self.default_orientation {
            Orientation::Portrait => (self.format_width_pt, self.format_height_pt),
            Orientation::Landscape => (self.format_height_pt, self.format_width_pt),
        }
    }

    pub(crate) fn to_pt(&self, value: f64) -> f64 {
        value * self.scale
    }

    // Negative coordinates count from the right/bottom edge.
    pub(crate) fn resolve_x(&self, x: f64) -> f64 {
        if x < 0.0 { self.width + x } else { x }
    }

    pub(crate) fn resolve_y(&self, y: f64) -> f64 {
        if y < 0.0 { self.height + y } else { y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_swaps_dimensions() {
        let geometry =
            PageGeometry::new(Unit::Pt, PageFormat::A4, Orientation::Landscape).unwrap();
        assert_eq!(geometry.width_pt, 841.89);
        assert_eq!(geometry.height_pt, 595.28);
        assert_eq!(geometry.default_size_pt(), (841.89, 595.28));
    }

    #[test]
    fn user_units_follow_scale() {
        let mut geometry = PageGeometry::new(Unit::Mm, PageFormat::A4, Orientation::Portrait).unwrap();
        assert!((geometry.width - 210.0).abs() < 0.01);
        assert!((geometry.height - 297.0).abs() < 0.01);
        geometry.apply_orientation(Orientation::Landscape);
        assert!((geometry.width - 297.0).abs() < 0.01);
        assert_eq!(geometry.default_size_pt(), (595.28, 841.89));
        assert!((geometry.resolve_x(-10.0) - 287.0).abs() < 0.01);
        assert_eq!(geometry.resolve_y(5.0), 5.0);
    }
}
