//! Row expander.
//!
//! A template row repeats when one of its `{{ path }}` references walks into
//! a sequence of the bound object; it is then cloned once per element of
//! that sequence, bound to the first flat context produced under the
//! element. Any other row is rendered once against the bound object itself.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Row;

use super::flatten::{join_path, FlatContext};
use super::shape::Shape;

#[allow(clippy::expect_used)]
static TEMPLATE_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([\w|\.]+)\s*\}\}").expect("valid regex"));

/// Dotted paths of every `{{ path }}` reference in `text`, in order.
pub fn template_paths(text: &str) -> Vec<String> {
    TEMPLATE_ITEM
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Flat path of the deepest sequence `path` reaches, if any.
///
/// Unknown segments end the walk; they are treated as non-repeating.
fn sequence_path(path: &str, root: &Shape) -> Option<String> {
    let mut current = root;
    let mut prefix = String::new();
    let mut found: Option<String> = None;

    for segment in path.split('.') {
        let Some(next) = current.field(segment) else {
            break;
        };
        prefix = join_path(&prefix, segment);
        current = match next {
            Shape::Seq(items) => {
                found = Some(prefix.clone());
                // Element types are looked up through the first element.
                match items.first() {
                    Some(first) => first,
                    None => break,
                }
            }
            other => other,
        };
    }
    found
}

/// Repeat path of a row: the first cell reference that reaches a sequence.
///
/// A later reference into the same family refines the path to the deeper
/// sequence; a reference into an unrelated family is ignored with a warning.
pub fn repeat_path(row: &Row, root: &Shape) -> Option<String> {
    let mut chosen: Option<String> = None;
    for cell in &row.cells {
        for path in template_paths(&cell.text) {
            let Some(candidate) = sequence_path(&path, root) else {
                continue;
            };
            match chosen.as_deref() {
                None => chosen = Some(candidate),
                Some(current) if is_within(&candidate, current) => chosen = Some(candidate),
                Some(current) if is_within(current, &candidate) => {}
                Some(current) => {
                    tracing::warn!(
                        kept = current,
                        ignored = %candidate,
                        "row references two unrelated collections; repeating over the first"
                    );
                }
            }
        }
    }
    chosen
}

fn is_within(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with(super::flatten::PATH_SEP))
}

/// What a cloned row is rendered against.
#[derive(Debug, Clone, Copy)]
pub enum Binding<'a> {
    /// The bound object itself (non-repeating row).
    Static(&'a Shape),
    /// One flattened context (repeating row).
    Flat(&'a FlatContext),
}

/// A template row clone awaiting rendering.
#[derive(Debug, Clone)]
pub struct RowInstance<'a> {
    pub row: Row,
    pub binding: Binding<'a>,
}

/// Expand one template row into the rows it produces.
pub fn expand<'a>(
    row: &Row,
    static_ctx: &'a Shape,
    contexts: &'a [FlatContext],
) -> Vec<RowInstance<'a>> {
    let Some(path) = repeat_path(row, static_ctx) else {
        return vec![RowInstance {
            row: row.clone(),
            binding: Binding::Static(static_ctx),
        }];
    };

    let mut seen: HashSet<&'a [(String, usize)]> = HashSet::new();
    let mut instances = Vec::new();
    for ctx in contexts.iter().filter(|ctx| ctx.is_within(&path)) {
        // Deeper leaves of an element already emitted add no row.
        if let Some(key) = ctx.element_key(&path) {
            if !seen.insert(key) {
                continue;
            }
        }
        instances.push(RowInstance {
            row: row.clone(),
            binding: Binding::Flat(ctx),
        });
    }
    tracing::debug!(repeat_path = %path, rows = instances.len(), "expanded repeating row");
    instances
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
    use crate::template::flatten::flatten;
    use crate::types::Cell;

    fn row(texts: &[&str]) -> Row {
        Row {
            cells: texts.iter().map(|t| Cell::new(*t)).collect(),
            ..Row::default()
        }
    }

    fn data() -> Shape {
        Shape::from_json(serde_json::json!({
            "Title": "T",
            "Items": [
                {"Name": "item1", "SubItems": [{"Name": "1"}, {"Name": "2"}]},
                {"Name": "item2", "SubItems": [{"Name": "1"}, {"Name": "2"}, {"Name": "3"}]}
            ],
            "Other": [{"X": 1}]
        }))
    }

    #[test]
    fn paths_are_collected_in_order() {
        assert_eq!(
            template_paths("{{ a.b }} and {{c}} but not {{ d + 1 }}"),
            vec!["a.b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn static_rows_render_once() {
        let data = data();
        let contexts = flatten(&data);
        let out = expand(&row(&["{{ Title }}", "plain", "{{ Missing.Items }}"]), &data, &contexts);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0].binding, Binding::Static(_)));
    }

    #[test]
    fn repeat_path_descends_to_deepest_sequence() {
        let data = data();
        assert_eq!(
            repeat_path(&row(&["{{ Items.SubItems.Name }}"]), &data).as_deref(),
            Some("Items_SubItems")
        );
        assert_eq!(
            repeat_path(&row(&["{{ Items.Name }}", "{{ Items.SubItems.Name }}"]), &data)
                .as_deref(),
            Some("Items_SubItems")
        );
        assert_eq!(
            repeat_path(&row(&["{{ Other.X }}", "{{ Items.Name }}"]), &data).as_deref(),
            Some("Other")
        );
    }

    #[test]
    fn repeating_rows_follow_context_order() {
        let data = data();
        let contexts = flatten(&data);
        let out = expand(&row(&["{{ Items.Name }}", "{{ Items.SubItems.Name }}"]), &data, &contexts);
        assert_eq!(out.len(), 5);
        let names: Vec<String> = out
            .iter()
            .map(|inst| match inst.binding {
                Binding::Flat(ctx) => ctx.get("Items_SubItems_Name").unwrap().to_string(),
                Binding::Static(_) => panic!("expected flat binding"),
            })
            .collect();
        assert_eq!(names, ["1", "2", "1", "2", "3"]);
    }

    #[test]
    fn outer_collection_rows_repeat_once_per_element() {
        let data = data();
        let contexts = flatten(&data);
        let out = expand(&row(&["{{ Items.Name }}", "{{ Items_SubItems_length }}"]), &data, &contexts);
        let rows: Vec<(String, String)> = out
            .iter()
            .map(|inst| match inst.binding {
                Binding::Flat(ctx) => (
                    ctx.get("Items_Name").unwrap().to_string(),
                    ctx.get("Items_SubItems_length").unwrap().to_string(),
                ),
                Binding::Static(_) => panic!("expected flat binding"),
            })
            .collect();
        assert_eq!(
            rows,
            [
                ("item1".to_string(), "2".to_string()),
                ("item2".to_string(), "3".to_string())
            ]
        );
    }

    #[test]
    fn empty_collection_produces_no_rows() {
        let data = Shape::from_json(serde_json::json!({"Items": []}));
        let contexts = flatten(&data);
        assert_eq!(repeat_path(&row(&["{{ Items.Name }}"]), &data).as_deref(), Some("Items"));
        assert!(expand(&row(&["{{ Items.Name }}"]), &data, &contexts).is_empty());
    }
}
