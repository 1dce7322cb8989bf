//! Font files, text measurement and word wrapping for PDF export.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, XlsxtError};
use crate::types::Style;

use super::page::PT_TO_MM;

/// One font face: family plus bold/italic variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontKey {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub fn for_style(style: &Style, default_family: &str) -> Self {
        let family = style
            .font_family
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(default_family);
        Self {
            family: family.to_string(),
            bold: style.bold,
            italic: style.italic,
        }
    }

    /// `<Family><Bold><Italic>.ttf`, with whitespace removed from the family.
    pub fn file_name(&self) -> String {
        let mut name: String = self.family.split_whitespace().collect();
        if self.bold {
            name.push_str("Bold");
        }
        if self.italic {
            name.push_str("Italic");
        }
        name.push_str(".ttf");
        name
    }
}

/// Width of a run of text at a given size.
pub trait TextMeasure {
    /// Width in millimetres, or `None` when the text cannot be measured.
    fn width_mm(&self, text: &str, size_pt: f64) -> Option<f64>;
}

/// Measures with the horizontal advances of a TrueType face.
pub struct TtfMeasure<'a> {
    face: ttf_parser::Face<'a>,
    units_per_em: f64,
}

impl<'a> TtfMeasure<'a> {
    /// `None` when the bytes are not a parseable font.
    pub fn new(data: &'a [u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let units_per_em = f64::from(face.units_per_em());
        if units_per_em <= 0.0 {
            return None;
        }
        Some(Self { face, units_per_em })
    }
}

impl TextMeasure for TtfMeasure<'_> {
    fn width_mm(&self, text: &str, size_pt: f64) -> Option<f64> {
        let mut units = 0.0;
        for ch in text.chars() {
            // Characters missing from the face fall back to .notdef.
            let glyph = self
                .face
                .glyph_index(ch)
                .unwrap_or(ttf_parser::GlyphId(0));
            units += f64::from(self.face.glyph_hor_advance(glyph)?);
        }
        Some(units / self.units_per_em * size_pt * PT_TO_MM)
    }
}

/// Every character is `em_ratio` of the font size wide.
#[derive(Debug, Clone, Copy)]
pub struct FixedWidth {
    pub em_ratio: f64,
}

impl TextMeasure for FixedWidth {
    fn width_mm(&self, text: &str, size_pt: f64) -> Option<f64> {
        let chars = u32::try_from(text.chars().count()).ok()?;
        Some(f64::from(chars) * self.em_ratio * size_pt * PT_TO_MM)
    }
}

/// Font bytes loaded from a directory, one file per [`FontKey`].
#[derive(Debug)]
pub struct FontStore {
    dir: PathBuf,
    fonts: HashMap<FontKey, Vec<u8>>,
}

impl FontStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fonts: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &FontKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Read the file for `key` unless it is already cached.
    ///
    /// # Errors
    /// `FontResolution` when the file is missing or unreadable.
    pub fn load(&mut self, key: &FontKey) -> Result<()> {
        if self.fonts.contains_key(key) {
            return Ok(());
        }
        let path = self.path_for(key);
        let bytes = std::fs::read(&path).map_err(|e| {
            XlsxtError::FontResolution(format!("{}: {e}", path.display()))
        })?;
        tracing::debug!(font = %path.display(), bytes = bytes.len(), "loaded font");
        self.fonts.insert(key.clone(), bytes);
        Ok(())
    }

    pub fn bytes(&self, key: &FontKey) -> Option<&[u8]> {
        self.fonts.get(key).map(Vec::as_slice)
    }

    pub fn measurer(&self, key: &FontKey) -> Option<TtfMeasure<'_>> {
        self.bytes(key).and_then(TtfMeasure::new)
    }
}

/// Greedily wrap `text` into lines no wider than `max_width` millimetres.
///
/// Hard newlines always break. A word wider than the line is broken by
/// character, so no text is ever dropped. Returns `None` when measuring
/// fails.
pub fn wrap_text(
    text: &str,
    max_width: f64,
    size_pt: f64,
    measure: &dyn TextMeasure,
) -> Option<Vec<String>> {
    let mut lines = Vec::new();
    for hard_line in text.split('\n') {
        wrap_line(hard_line, max_width, size_pt, measure, &mut lines)?;
    }
    Some(lines)
}

fn wrap_line(
    line: &str,
    max_width: f64,
    size_pt: f64,
    measure: &dyn TextMeasure,
    out: &mut Vec<String>,
) -> Option<()> {
    let fits = |s: &str| -> Option<bool> { Some(measure.width_mm(s, size_pt)? <= max_width) };

    let mut current = String::new();
    for word in line.split_whitespace() {
        if !current.is_empty() {
            let candidate = format!("{current} {word}");
            if fits(&candidate)? {
                current = candidate;
                continue;
            }
            out.push(std::mem::take(&mut current));
        }
        if fits(word)? {
            current = word.to_string();
        } else {
            let mut parts = break_word(word, &fits)?;
            current = parts.pop().unwrap_or_default();
            out.extend(parts);
        }
    }
    out.push(current);
    Some(())
}

/// Split a word that is too long for one line; every part holds at least
/// one character.
fn break_word(word: &str, fits: &dyn Fn(&str) -> Option<bool>) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut piece = String::new();
    for ch in word.chars() {
        piece.push(ch);
        if piece.chars().count() > 1 && !fits(&piece)? {
            piece.pop();
            parts.push(std::mem::take(&mut piece));
            piece.push(ch);
        }
    }
    parts.push(piece);
    Some(parts)
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
    use crate::types::StyleRef;

    /// 1 mm per character at any size.
    struct OneMm;

    impl TextMeasure for OneMm {
        fn width_mm(&self, text: &str, _size_pt: f64) -> Option<f64> {
            Some(text.chars().count() as f64)
        }
    }

    struct Broken;

    impl TextMeasure for Broken {
        fn width_mm(&self, _text: &str, _size_pt: f64) -> Option<f64> {
            None
        }
    }

    #[test]
    fn file_names_follow_variant_suffixes() {
        let key = |bold, italic| FontKey {
            family: "Times New Roman".into(),
            bold,
            italic,
        };
        assert_eq!(key(false, false).file_name(), "TimesNewRoman.ttf");
        assert_eq!(key(true, false).file_name(), "TimesNewRomanBold.ttf");
        assert_eq!(key(false, true).file_name(), "TimesNewRomanItalic.ttf");
        assert_eq!(key(true, true).file_name(), "TimesNewRomanBoldItalic.ttf");
    }

    #[test]
    fn key_falls_back_to_default_family() {
        let style = StyleRef::default().derive(Style::emboldened);
        let key = FontKey::for_style(&style, "Arial");
        assert_eq!(key.family, "Arial");
        assert!(key.bold);
    }

    #[test]
    fn missing_font_is_a_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FontStore::new(dir.path());
        let key = FontKey {
            family: "Nope".into(),
            bold: false,
            italic: false,
        };
        assert!(matches!(store.load(&key), Err(XlsxtError::FontResolution(_))));
    }

    #[test]
    fn unparseable_font_has_no_measurer() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Junk.ttf"), b"not a font").unwrap();
        let mut store = FontStore::new(dir.path());
        let key = FontKey {
            family: "Junk".into(),
            bold: false,
            italic: false,
        };
        store.load(&key).unwrap();
        assert!(store.bytes(&key).is_some());
        assert!(store.measurer(&key).is_none());
    }

    #[test]
    fn words_wrap_greedily() {
        let lines = wrap_text("aaa bbb ccc dd", 7.0, 10.0, &OneMm).unwrap();
        assert_eq!(lines, ["aaa bbb", "ccc dd"]);
    }

    #[test]
    fn hard_newlines_are_kept() {
        let lines = wrap_text("one\n\ntwo", 50.0, 10.0, &OneMm).unwrap();
        assert_eq!(lines, ["one", "", "two"]);
    }

    #[test]
    fn long_words_are_broken_not_truncated() {
        let lines = wrap_text("abcdefghij xy", 4.0, 10.0, &OneMm).unwrap();
        assert_eq!(lines, ["abcd", "efgh", "ij", "xy"]);
        assert_eq!(lines.concat(), "abcdefghijxy");
    }

    #[test]
    fn narrow_columns_still_make_progress() {
        let lines = wrap_text("abc", 0.5, 10.0, &OneMm).unwrap();
        assert_eq!(lines, ["a", "b", "c"]);
    }

    #[test]
    fn measurement_failure_is_reported() {
        assert!(wrap_text("some text", 10.0, 10.0, &Broken).is_none());
    }

    #[test]
    fn fixed_width_scales_with_size() {
        let m = FixedWidth { em_ratio: 0.5 };
        let w10 = m.width_mm("abcd", 10.0).unwrap();
        let w20 = m.width_mm("abcd", 20.0).unwrap();
        assert!((w20 - 2.0 * w10).abs() < 1e-9);
    }
}
