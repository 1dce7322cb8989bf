//! String-template collaborator backed by MiniJinja.
//!
//! Cell text is rendered with `{{ ... }}` expressions against a [`Scope`]:
//! the bound object's top-level fields overlaid with the flat keys of one
//! binding context. Dotted paths are mapped onto flat keys before rendering,
//! so `{{ Items.SubItems.Name }}` reads `Items_SubItems_Name`.

use minijinja::value::Object;
use minijinja::{Environment, UndefinedBehavior, Value};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::flatten::PATH_SEP;
use super::shape::{Scalar, Shape};

#[allow(clippy::expect_used)]
static EXPRESSION_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{.*?\}\}").expect("valid regex"));

#[allow(clippy::expect_used)]
static DOTTED_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z_]\w*(?:\.\w+)+").expect("valid regex"));

/// True when `text` contains template syntax.
pub fn has_expression(text: &str) -> bool {
    text.contains("{{") || text.contains("{%")
}

/// Top-level fields of the bound object, converted once per sheet.
#[derive(Debug, Clone, Default)]
pub struct BaseScope {
    fields: Arc<BTreeMap<String, Value>>,
}

impl BaseScope {
    pub fn new(root: &Shape) -> Self {
        let fields = match root {
            Shape::Record(entries) | Shape::Map(entries) => entries
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_serialize(v)))
                .collect(),
            _ => BTreeMap::new(),
        };
        Self {
            fields: Arc::new(fields),
        }
    }
}

/// Template context for one row instance. Flat keys are converted on
/// lookup and take precedence over fields of the bound object.
#[derive(Debug)]
struct Layered {
    base: Arc<BTreeMap<String, Value>>,
    flat: Arc<BTreeMap<String, Scalar>>,
}

impl Object for Layered {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let key = key.as_str()?;
        match self.flat.get(key) {
            Some(scalar) => Some(Value::from_serialize(scalar)),
            None => self.base.get(key).cloned(),
        }
    }
}

/// Everything one row instance can see while its cells are rendered.
pub struct Scope {
    flat: Arc<BTreeMap<String, Scalar>>,
    value: Value,
}

impl Scope {
    pub fn new(base: &BaseScope, flat: Arc<BTreeMap<String, Scalar>>) -> Self {
        let value = Value::from_object(Layered {
            base: Arc::clone(&base.fields),
            flat: Arc::clone(&flat),
        });
        Self { flat, value }
    }

    fn has_key(&self, key: &str) -> bool {
        self.flat.contains_key(key)
    }
}

/// Rewrite dotted paths inside `{{ }}` blocks onto the longest
/// underscore-joined prefix that exists as a flat key.
pub fn rewrite_paths(text: &str, scope: &Scope) -> String {
    EXPRESSION_BLOCK
        .replace_all(text, |block: &Captures<'_>| {
            let block = block.get(0).map_or("", |m| m.as_str());
            DOTTED_PATH
                .replace_all(block, |path: &Captures<'_>| {
                    let path = path.get(0).map_or("", |m| m.as_str());
                    rewrite_path(path, scope)
                })
                .into_owned()
        })
        .into_owned()
}

fn rewrite_path(path: &str, scope: &Scope) -> String {
    let segments: Vec<&str> = path.split('.').collect();
    let sep = PATH_SEP.to_string();
    for split in (2..=segments.len()).rev() {
        let (head, tail) = segments.split_at(split);
        let key = head.join(sep.as_str());
        if scope.has_key(&key) {
            return if tail.is_empty() {
                key
            } else {
                format!("{key}.{}", tail.join("."))
            };
        }
    }
    path.to_string()
}

/// The `render(text, bindings)` collaborator.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Render one piece of cell text.
    ///
    /// # Errors
    /// The MiniJinja error for malformed syntax or a failing expression.
    pub fn render(&self, text: &str, scope: &Scope) -> Result<String, minijinja::Error> {
        let source = rewrite_paths(text, scope);
        self.env.render_str(&source, &scope.value)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
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

    fn flat(pairs: &[(&str, Scalar)]) -> Arc<BTreeMap<String, Scalar>> {
        Arc::new(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn dotted_paths_map_onto_flat_keys() {
        let values = flat(&[
            ("Items_Name", Scalar::Str("item1".into())),
            ("Items_SubItems_Name", Scalar::Str("2".into())),
            ("Items_SubItems_length", Scalar::UInt(3)),
        ]);
        let base = BaseScope::default();
        let scope = Scope::new(&base, values);
        let engine = TemplateEngine::new();
        let out = engine
            .render(
                "{{ Items.Name }} / {{Items.SubItems.Name}} of {{ Items.SubItems_length }}",
                &scope,
            )
            .unwrap();
        assert_eq!(out, "item1 / 2 of 3");
    }

    #[test]
    fn unknown_paths_fall_back_to_the_bound_object() {
        let root = Shape::from_json(serde_json::json!({"Customer": {"Name": "ACME"}}));
        let base = BaseScope::new(&root);
        let scope = Scope::new(&base, flat(&[]));
        let engine = TemplateEngine::new();
        assert_eq!(engine.render("{{ Customer.Name }}", &scope).unwrap(), "ACME");
        assert_eq!(engine.render("[{{ Missing.Field }}]", &scope).unwrap(), "[]");
    }

    #[test]
    fn flat_keys_shadow_fields_of_the_bound_object() {
        let root = Shape::from_json(serde_json::json!({"Title": "bound", "Count": 2}));
        let base = BaseScope::new(&root);
        let engine = TemplateEngine::new();

        let first = Scope::new(&base, flat(&[("Title", Scalar::Str("row 1".into()))]));
        let second = Scope::new(&base, flat(&[("Title", Scalar::Str("row 2".into()))]));
        assert_eq!(engine.render("{{ Title }} of {{ Count }}", &first).unwrap(), "row 1 of 2");
        assert_eq!(engine.render("{{ Title }} of {{ Count }}", &second).unwrap(), "row 2 of 2");
    }

    #[test]
    fn longest_prefix_wins() {
        let values = flat(&[("a_b", Scalar::Str("x".into()))]);
        let base = BaseScope::default();
        let scope = Scope::new(&base, values);
        assert_eq!(rewrite_paths("{{ a.b.c }}", &scope), "{{ a_b.c }}");
        assert_eq!(rewrite_paths("a.b outside", &scope), "a.b outside");
    }

    #[test]
    fn malformed_expression_is_an_error() {
        let base = BaseScope::default();
        let scope = Scope::new(&base, flat(&[]));
        assert!(TemplateEngine::new().render("{{ a + }}", &scope).is_err());
    }

    #[test]
    fn expression_detection() {
        assert!(has_expression("{{ x }}"));
        assert!(has_expression("{% if x %}y{% endif %}"));
        assert!(!has_expression("plain [v-merge]"));
    }
}
