use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::Deref;
use std::sync::Arc;

/// Font size used when a style does not carry one (points).
pub const DEFAULT_FONT_SIZE: f64 = 11.0;

/// Resolved cell style.
///
/// Styles are shared between cells through [`StyleRef`] and never mutated in
/// place; a changed style is always a new value.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    // Font
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,

    // Fill
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_type: Option<String>,
    /// Pattern foreground, which is the visible color of a solid fill.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,

    // Borders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_top: Option<Border>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_right: Option<Border>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_bottom: Option<Border>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_left: Option<Border>,

    // Alignment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align_h: Option<HAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align_v: Option<VAlign>,
    #[serde(default)]
    pub wrap: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indent: Option<u32>,
}

impl Style {
    /// Solid fill color, if the cell paints a background.
    pub fn solid_fill(&self) -> Option<&str> {
        match self.pattern_type.as_deref() {
            Some("solid") => self.fill_color.as_deref(),
            _ => None,
        }
    }

    /// Same style with the font forced bold; every other attribute is kept.
    #[must_use]
    pub fn emboldened(&self) -> Self {
        Self {
            bold: true,
            ..self.clone()
        }
    }

    pub fn borders(&self) -> [(BorderSide, Option<&Border>); 4] {
        [
            (BorderSide::Top, self.border_top.as_ref()),
            (BorderSide::Right, self.border_right.as_ref()),
            (BorderSide::Bottom, self.border_bottom.as_ref()),
            (BorderSide::Left, self.border_left.as_ref()),
        ]
    }
}

/// Shared, immutable handle to a [`Style`].
#[derive(Debug, Clone, Default)]
pub struct StyleRef(pub Arc<Style>);

impl StyleRef {
    pub fn new(style: Style) -> Self {
        Self(Arc::new(style))
    }

    /// Build a new handle from a modified copy; `self` is left untouched.
    #[must_use]
    pub fn derive(&self, f: impl FnOnce(&Style) -> Style) -> Self {
        Self::new(f(&self.0))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for StyleRef {
    type Target = Style;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for StyleRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0 == *other.0
    }
}

impl Serialize for StyleRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StyleRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let style = Style::deserialize(deserializer)?;
        Ok(Self(Arc::new(style)))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Border {
    pub style: BorderStyle,
    pub color: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderSide {
    Top,
    Right,
    Bottom,
    Left,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BorderStyle {
    Thin,
    Medium,
    Thick,
    Dashed,
    Dotted,
    Double,
    Hair,
    MediumDashed,
    DashDot,
    MediumDashDot,
    DashDotDot,
    MediumDashDotDot,
    SlantDashDot,
}

impl BorderStyle {
    pub fn from_xml(s: &str) -> Option<Self> {
        Some(match s {
            "thin" => Self::Thin,
            "medium" => Self::Medium,
            "thick" => Self::Thick,
            "dashed" => Self::Dashed,
            "dotted" => Self::Dotted,
            "double" => Self::Double,
            "hair" => Self::Hair,
            "mediumDashed" => Self::MediumDashed,
            "dashDot" => Self::DashDot,
            "mediumDashDot" => Self::MediumDashDot,
            "dashDotDot" => Self::DashDotDot,
            "mediumDashDotDot" => Self::MediumDashDotDot,
            "slantDashDot" => Self::SlantDashDot,
            _ => return None,
        })
    }

    pub fn as_xml(self) -> &'static str {
        match self {
            Self::Thin => "thin",
            Self::Medium => "medium",
            Self::Thick => "thick",
            Self::Dashed => "dashed",
            Self::Dotted => "dotted",
            Self::Double => "double",
            Self::Hair => "hair",
            Self::MediumDashed => "mediumDashed",
            Self::DashDot => "dashDot",
            Self::MediumDashDot => "mediumDashDot",
            Self::DashDotDot => "dashDotDot",
            Self::MediumDashDotDot => "mediumDashDotDot",
            Self::SlantDashDot => "slantDashDot",
        }
    }

    /// Stroke width in points.
    pub fn width_pt(self) -> f64 {
        match self {
            Self::Hair => 0.25,
            Self::Thin | Self::Dashed | Self::Dotted | Self::DashDot | Self::DashDotDot => 0.5,
            Self::Medium
            | Self::MediumDashed
            | Self::MediumDashDot
            | Self::MediumDashDotDot
            | Self::SlantDashDot => 1.0,
            Self::Thick | Self::Double => 1.5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum HAlign {
    General,
    Left,
    Center,
    Right,
    Justify,
    Fill,
    CenterContinuous,
    Distributed,
}

impl HAlign {
    pub fn from_xml(s: &str) -> Option<Self> {
        Some(match s {
            "general" => Self::General,
            "left" => Self::Left,
            "center" => Self::Center,
            "right" => Self::Right,
            "justify" => Self::Justify,
            "fill" => Self::Fill,
            "centerContinuous" => Self::CenterContinuous,
            "distributed" => Self::Distributed,
            _ => return None,
        })
    }

    pub fn as_xml(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Justify => "justify",
            Self::Fill => "fill",
            Self::CenterContinuous => "centerContinuous",
            Self::Distributed => "distributed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum VAlign {
    Top,
    Center,
    Bottom,
    Justify,
    Distributed,
}

impl VAlign {
    pub fn from_xml(s: &str) -> Option<Self> {
        Some(match s {
            "top" => Self::Top,
            "center" => Self::Center,
            "bottom" => Self::Bottom,
            "justify" => Self::Justify,
            "distributed" => Self::Distributed,
            _ => return None,
        })
    }

    pub fn as_xml(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Center => "center",
            Self::Bottom => "bottom",
            Self::Justify => "justify",
            Self::Distributed => "distributed",
        }
    }
}

// ---------------------------------------------------------------------------
// Raw styles.xml records, resolved into `Style` by the reader.
// ---------------------------------------------------------------------------

/// A color reference as it appears in styles.xml
#[derive(Debug, Clone, Default)]
pub struct ColorSpec {
    pub rgb: Option<String>,
    pub theme: Option<u32>,
    pub tint: Option<f64>,
    pub indexed: Option<u32>,
    pub auto: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RawFont {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub color: Option<ColorSpec>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RawFill {
    pub pattern_type: Option<String>,
    pub fg_color: Option<ColorSpec>,
    pub bg_color: Option<ColorSpec>,
}

#[derive(Debug, Clone, Default)]
pub struct RawBorderSide {
    pub style: String,
    pub color: Option<ColorSpec>,
}

#[derive(Debug, Clone, Default)]
pub struct RawBorder {
    pub left: Option<RawBorderSide>,
    pub right: Option<RawBorderSide>,
    pub top: Option<RawBorderSide>,
    pub bottom: Option<RawBorderSide>,
}

#[derive(Debug, Clone, Default)]
pub struct RawAlignment {
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
    pub wrap_text: bool,
    pub indent: Option<u32>,
}

/// Cell format record from `cellXfs` / `cellStyleXfs`.
///
/// The apply* attributes default to true when absent.
#[derive(Debug, Clone)]
pub struct CellXf {
    pub font_id: Option<u32>,
    pub fill_id: Option<u32>,
    pub border_id: Option<u32>,
    pub num_fmt_id: Option<u32>,
    pub alignment: Option<RawAlignment>,
    pub apply_font: bool,
    pub apply_fill: bool,
    pub apply_border: bool,
    pub apply_alignment: bool,
    pub xf_id: Option<u32>,
}

impl Default for CellXf {
    fn default() -> Self {
        Self {
            font_id: None,
            fill_id: None,
            border_id: None,
            num_fmt_id: None,
            alignment: None,
            apply_font: true,
            apply_fill: true,
            apply_border: true,
            apply_alignment: true,
            xf_id: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    pub num_fmts: Vec<(u32, String)>,
    pub fonts: Vec<RawFont>,
    pub fills: Vec<RawFill>,
    pub borders: Vec<RawBorder>,
    pub cell_xfs: Vec<CellXf>,
    pub cell_style_xfs: Vec<CellXf>,
    pub indexed_colors: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: Vec<String>,
    pub minor_font: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn emboldened_keeps_other_attributes() {
        let base = Style {
            font_family: Some("Arial".into()),
            font_size: Some(9.0),
            italic: true,
            fill_color: Some("#FFFF00".into()),
            pattern_type: Some("solid".into()),
            align_h: Some(HAlign::Right),
            ..Style::default()
        };
        let bold = base.emboldened();
        assert!(bold.bold);
        assert_eq!(Style { bold: false, ..bold }, base);
    }

    #[test]
    fn derive_never_touches_the_source() {
        let original = StyleRef::new(Style::default());
        let alias = original.clone();
        let derived = original.derive(Style::emboldened);
        assert!(derived.bold);
        assert!(!original.bold);
        assert!(alias.ptr_eq(&original));
        assert!(!derived.ptr_eq(&original));
    }

    #[test]
    fn solid_fill_requires_solid_pattern() {
        let mut s = Style {
            fill_color: Some("#FFFFFF".into()),
            ..Style::default()
        };
        assert_eq!(s.solid_fill(), None);
        s.pattern_type = Some("solid".into());
        assert_eq!(s.solid_fill(), Some("#FFFFFF"));
    }

    #[test]
    fn border_names_round_trip() {
        for name in ["thin", "medium", "thick", "dashed", "dotted", "double", "hair"] {
            let style = BorderStyle::from_xml(name).unwrap();
            assert_eq!(style.as_xml(), name);
        }
        assert!(BorderStyle::from_xml("none").is_none());
    }
}
