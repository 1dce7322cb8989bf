//! Export settings, loaded from TOML.
//!
//! ```toml
//! font_dir = "fonts"
//! default_font = "DejaVuSans"
//! default_font_size = 10.0
//! margin_mm = 10.0
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, XlsxtError};

/// Settings for HTML and PDF export.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Directory holding `<Family><Bold><Italic>.ttf` files. Required for PDF.
    pub font_dir: Option<PathBuf>,
    /// Family used for cells whose style names no font.
    pub default_font: String,
    /// Size used for cells whose style names no size (points).
    pub default_font_size: f64,
    /// Page margin on every side (mm).
    pub margin_mm: f64,
    /// Line height as a multiple of the font size.
    pub line_spacing: f64,
    /// Gap between a cell's left/right border and its text (mm); half of it
    /// is kept above and below the text.
    pub cell_padding_mm: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            font_dir: None,
            default_font: "Arial".to_string(),
            default_font_size: crate::types::DEFAULT_FONT_SIZE,
            margin_mm: crate::layout::page::MARGIN_MM,
            line_spacing: 1.2,
            cell_padding_mm: 0.5,
        }
    }
}

impl ExportConfig {
    /// Read a TOML file. Missing keys keep their defaults.
    ///
    /// # Errors
    /// `Io` when the file cannot be read, `Config` when it does not parse or
    /// holds an out-of-range value.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&text)
    }

    /// # Errors
    /// `Config` for malformed TOML or an out-of-range value.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.default_font_size.is_nan() || self.default_font_size <= 0.0 {
            return Err(XlsxtError::Config(format!(
                "default_font_size must be positive, got {}",
                self.default_font_size
            )));
        }
        if self.line_spacing.is_nan() || self.line_spacing < 1.0 {
            return Err(XlsxtError::Config(format!(
                "line_spacing must be at least 1.0, got {}",
                self.line_spacing
            )));
        }
        if !(0.0..=crate::layout::page::MAX_MARGIN_MM).contains(&self.margin_mm) {
            return Err(XlsxtError::Config(format!(
                "margin_mm out of range: {}",
                self.margin_mm
            )));
        }
        if self.cell_padding_mm < 0.0 {
            return Err(XlsxtError::Config(format!(
                "cell_padding_mm must not be negative, got {}",
                self.cell_padding_mm
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_font_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.font_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::panic
)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(ExportConfig::from_toml("").unwrap(), ExportConfig::default());
    }

    #[test]
    fn partial_file_overrides_given_keys() {
        let cfg = ExportConfig::from_toml("font_dir = \"/fonts\"\nmargin_mm = 15.0\n").unwrap();
        assert_eq!(cfg.font_dir.as_deref(), Some(Path::new("/fonts")));
        assert_eq!(cfg.margin_mm, 15.0);
        assert_eq!(cfg.line_spacing, 1.2);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            ExportConfig::from_toml("fonts = \"x\""),
            Err(XlsxtError::Config(_))
        ));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(ExportConfig::from_toml("line_spacing = 0.5").is_err());
        assert!(ExportConfig::from_toml("default_font_size = 0.0").is_err());
        assert!(ExportConfig::from_toml("margin_mm = 200.0").is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.toml");
        std::fs::write(&path, "default_font = \"DejaVuSans\"").unwrap();
        assert_eq!(ExportConfig::load(&path).unwrap().default_font, "DejaVuSans");
    }
}
