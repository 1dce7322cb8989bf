//! Cell renderer: substitution followed by directive extraction.
//!
//! Directives are plain-text markers a template author places in a cell.
//! They are removed from the rendered text and reported as [`Directives`]
//! for the merge resolver.

use once_cell::sync::Lazy;
use regex::Regex;

use super::engine::{has_expression, Scope, TemplateEngine};

#[allow(clippy::expect_used)]
static V_MERGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s?v-merge(?::\s?(\d+))?\s?\]").expect("valid regex"));

#[allow(clippy::expect_used)]
static INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s?index:\s?([\d\s,]*)\]").expect("valid regex"));

#[allow(clippy::expect_used)]
static BOLD_TOGGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[BR\]").expect("valid regex"));

/// Markers found in one rendered cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    /// `[v-merge]`: merge with identical cells above.
    pub merge_candidate: bool,
    /// `[v-merge: N]`: explicit span of `N` extra rows.
    pub merge_span: Option<u32>,
    /// Numbers from `[index: ...]`; reserved, no effect on output.
    pub index: Vec<u32>,
    /// Number of `[BR]` markers.
    pub bold_toggles: u32,
}

impl Directives {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn toggles_bold(&self) -> bool {
        self.bold_toggles % 2 == 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedCell {
    pub text: String,
    pub directives: Directives,
}

fn has_directive(text: &str) -> bool {
    text.contains('[') && (V_MERGE.is_match(text) || INDEX.is_match(text) || BOLD_TOGGLE.is_match(text))
}

/// Strip every directive from `text`.
pub fn extract_directives(text: &str) -> RenderedCell {
    let mut directives = Directives::default();

    for caps in V_MERGE.captures_iter(text) {
        match caps.get(1).and_then(|n| n.as_str().parse::<u32>().ok()) {
            Some(n) if n > 0 => directives.merge_span = Some(n),
            Some(_) => {}
            None => directives.merge_candidate = true,
        }
    }
    for caps in INDEX.captures_iter(text) {
        if let Some(list) = caps.get(1) {
            directives.index.extend(
                list.as_str()
                    .split(',')
                    .filter_map(|n| n.trim().parse::<u32>().ok()),
            );
        }
    }
    directives.bold_toggles = u32::try_from(BOLD_TOGGLE.find_iter(text).count()).unwrap_or(u32::MAX);

    let stripped = V_MERGE.replace_all(text, "");
    let stripped = INDEX.replace_all(&stripped, "");
    let stripped = BOLD_TOGGLE.replace_all(&stripped, "");

    RenderedCell {
        text: stripped.into_owned(),
        directives,
    }
}

/// Render one cell's text against `scope` and pull out its directives.
///
/// Text without template syntax or directives is returned unchanged.
///
/// # Errors
/// The MiniJinja error when the expression is malformed.
pub fn render_cell(
    engine: &TemplateEngine,
    text: &str,
    scope: &Scope,
) -> Result<RenderedCell, minijinja::Error> {
    let rendered = if has_expression(text) {
        engine.render(text, scope)?
    } else if has_directive(text) {
        text.to_string()
    } else {
        return Ok(RenderedCell {
            text: text.to_string(),
            directives: Directives::default(),
        });
    };
    Ok(extract_directives(&rendered))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::template::engine::BaseScope;
    use crate::template::shape::Scalar;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use test_case::test_case;

    #[test_case("A[v-merge]", "A", true, None; "plain marker")]
    #[test_case("[ v-merge ]B", "B", true, None; "padded marker")]
    #[test_case("C[v-merge: 3]", "C", false, Some(3); "explicit span")]
    #[test_case("D[v-merge:0]", "D", false, None; "zero span ignored")]
    #[test_case("E", "E", false, None; "no marker")]
    fn merge_markers(input: &str, text: &str, candidate: bool, span: Option<u32>) {
        let cell = extract_directives(input);
        assert_eq!(cell.text, text);
        assert_eq!(cell.directives.merge_candidate, candidate);
        assert_eq!(cell.directives.merge_span, span);
    }

    #[test]
    fn index_and_bold_markers_are_stripped() {
        let cell = extract_directives("[BR]Total[index: 1, 2,3] due[BR][BR]");
        assert_eq!(cell.text, "Total due");
        assert_eq!(cell.directives.index, vec![1, 2, 3]);
        assert_eq!(cell.directives.bold_toggles, 3);
        assert!(cell.directives.toggles_bold());
    }

    #[test]
    fn directives_in_substituted_values_are_honoured() {
        let mut flat = BTreeMap::new();
        flat.insert("Name".to_string(), Scalar::Str("Alpha".into()));
        let base = BaseScope::default();
        let scope = Scope::new(&base, Arc::new(flat));
        let engine = TemplateEngine::new();
        let cell = render_cell(&engine, "{{ Name }}[v-merge]", &scope).unwrap();
        assert_eq!(cell.text, "Alpha");
        assert!(cell.directives.merge_candidate);
    }

    #[test]
    fn literal_text_is_copied_verbatim() {
        let flat = BTreeMap::new();
        let base = BaseScope::default();
        let scope = Scope::new(&base, Arc::new(flat));
        let engine = TemplateEngine::new();
        let cell = render_cell(&engine, "  [not a marker] ", &scope).unwrap();
        assert_eq!(cell.text, "  [not a marker] ");
        assert!(cell.directives.is_empty());
    }
}
