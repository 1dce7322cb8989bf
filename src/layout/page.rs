//! A4 page geometry.

use crate::types::Orientation;

pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const PAGE_HEIGHT_MM: f64 = 297.0;
pub const MARGIN_MM: f64 = 10.0;
/// Largest margin that still leaves a printable area on a portrait page.
pub const MAX_MARGIN_MM: f64 = 100.0;

/// Portrait width between the default margins.
pub const PORTRAIT_PRINTABLE_WIDTH_MM: f64 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
/// Landscape width between the default margins.
pub const LANDSCAPE_PRINTABLE_WIDTH_MM: f64 = PAGE_HEIGHT_MM - 2.0 * MARGIN_MM;

/// Millimetres per typographic point.
pub const PT_TO_MM: f64 = 25.4 / 72.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_mm: f64,
    pub height_mm: f64,
    pub margin_mm: f64,
}

impl PageGeometry {
    pub fn new(orientation: Orientation, margin_mm: f64) -> Self {
        let (width_mm, height_mm) = match orientation {
            Orientation::Portrait => (PAGE_WIDTH_MM, PAGE_HEIGHT_MM),
            Orientation::Landscape => (PAGE_HEIGHT_MM, PAGE_WIDTH_MM),
        };
        Self {
            width_mm,
            height_mm,
            margin_mm,
        }
    }

    pub fn printable_width(&self) -> f64 {
        (self.width_mm - 2.0 * self.margin_mm).max(0.0)
    }

    pub fn printable_height(&self) -> f64 {
        (self.height_mm - 2.0 * self.margin_mm).max(0.0)
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::new(Orientation::Portrait, MARGIN_MM)
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn default_margins_give_fixed_printable_widths() {
        assert_eq!(
            PageGeometry::new(Orientation::Portrait, MARGIN_MM).printable_width(),
            PORTRAIT_PRINTABLE_WIDTH_MM
        );
        assert_eq!(
            PageGeometry::new(Orientation::Landscape, MARGIN_MM).printable_width(),
            LANDSCAPE_PRINTABLE_WIDTH_MM
        );
        assert_eq!(PORTRAIT_PRINTABLE_WIDTH_MM, 190.0);
        assert_eq!(LANDSCAPE_PRINTABLE_WIDTH_MM, 277.0);
    }
}
