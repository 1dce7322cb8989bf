//! Object flattener.
//!
//! Turns a [`Shape`] into one flat binding context per leaf combination of
//! repeated elements. Keys are the ancestor path joined with `_`
//! (`Items_SubItems_Name`); every branch point also publishes
//! `<path>_length` with the number of children sharing that path.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::shape::{Scalar, Shape};

/// Separator between path segments in flat keys.
pub const PATH_SEP: char = '_';

/// Suffix of the synthesized sibling-count keys.
pub const LENGTH_SUFFIX: &str = "_length";

/// One level of the flattened object graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingNode {
    pub name: String,
    pub path: String,
    pub scalars: BTreeMap<String, Scalar>,
    pub children: Vec<BindingNode>,
}

/// Fully qualified bindings for one repeated row instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatContext {
    pub values: Arc<BTreeMap<String, Scalar>>,
    /// Path of the node that produced this context, e.g. `Items_SubItems`.
    pub leaf_path: String,
    /// Path and position of every collection element on the way to the leaf.
    pub ancestry: Vec<(String, usize)>,
}

impl FlatContext {
    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.values.get(key)
    }

    /// True when this context was produced at `path` or below it.
    pub fn is_within(&self, path: &str) -> bool {
        self.leaf_path == path
            || self
                .leaf_path
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with(PATH_SEP))
    }

    /// Ancestry up to and including the element bound at `path`.
    ///
    /// Contexts sharing this key descend from the same element.
    pub fn element_key(&self, path: &str) -> Option<&[(String, usize)]> {
        let end = self.ancestry.iter().position(|(p, _)| p == path)?;
        self.ancestry.get(..=end)
    }
}

pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}{PATH_SEP}{name}")
    }
}

/// Map entries in canonical (lexicographic) key order.
fn sorted_entries(entries: &[(String, Shape)]) -> Vec<&(String, Shape)> {
    let mut sorted: Vec<&(String, Shape)> = entries.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
}

/// Attach `value`, found under field `name` of a record at `prefix`, to `node`.
fn add_field(node: &mut BindingNode, prefix: &str, name: &str, value: &Shape) {
    let path = join_path(prefix, name);
    match value {
        Shape::Null => {}
        Shape::Scalar(s) => {
            node.scalars.insert(path, s.clone());
        }
        // Nested records are inlined under their field name.
        Shape::Record(fields) => {
            for (k, v) in fields {
                add_field(node, &path, k, v);
            }
        }
        Shape::Seq(items) => {
            for item in items {
                node.children.push(element_node(item, name, &path));
            }
        }
        Shape::Map(entries) => {
            for (k, v) in sorted_entries(entries) {
                node.children.push(element_node(v, k, &join_path(&path, k)));
            }
        }
    }
}

/// Node for one collection element bound at `path`.
fn element_node(value: &Shape, name: &str, path: &str) -> BindingNode {
    let mut node = BindingNode {
        name: name.to_string(),
        path: path.to_string(),
        ..BindingNode::default()
    };
    match value {
        Shape::Null => {}
        Shape::Scalar(s) => {
            node.scalars.insert(path.to_string(), s.clone());
        }
        Shape::Record(fields) => {
            for (k, v) in fields {
                add_field(&mut node, path, k, v);
            }
        }
        Shape::Seq(items) => push_indexed(&mut node, items),
        Shape::Map(entries) => {
            for (k, v) in sorted_entries(entries) {
                node.children.push(element_node(v, k, &join_path(path, k)));
            }
        }
    }
    node
}

/// Elements of a collection that has no field name of its own: the index is
/// appended to the name.
fn push_indexed(node: &mut BindingNode, items: &[Shape]) {
    for (idx, item) in items.iter().enumerate() {
        let name = format!("{}{idx}", node.name);
        let path = format!("{}{idx}", node.path);
        node.children.push(element_node(item, &name, &path));
    }
}

/// Build the binding tree for `root`.
pub fn build_tree(root: &Shape) -> BindingNode {
    let mut node = BindingNode::default();
    match root {
        Shape::Null | Shape::Scalar(_) => {}
        Shape::Record(fields) => {
            for (k, v) in fields {
                add_field(&mut node, "", k, v);
            }
        }
        Shape::Seq(items) => push_indexed(&mut node, items),
        Shape::Map(entries) => {
            for (k, v) in sorted_entries(entries) {
                node.children.push(element_node(v, k, k));
            }
        }
    }
    node
}

/// Flatten `root` into one context per leaf, in depth-first order.
pub fn flatten(root: &Shape) -> Vec<FlatContext> {
    let tree = build_tree(root);
    let mut out = Vec::new();
    collect(&tree, &BTreeMap::new(), &mut Vec::new(), &mut out);
    out
}

fn collect(
    node: &BindingNode,
    inherited: &BTreeMap<String, Scalar>,
    ancestry: &mut Vec<(String, usize)>,
    out: &mut Vec<FlatContext>,
) {
    let mut values = inherited.clone();
    values.extend(node.scalars.iter().map(|(k, v)| (k.clone(), v.clone())));

    if node.children.is_empty() {
        out.push(FlatContext {
            values: Arc::new(values),
            leaf_path: node.path.clone(),
            ancestry: ancestry.clone(),
        });
        return;
    }

    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for child in &node.children {
        *counts.entry(child.path.as_str()).or_default() += 1;
    }
    for (path, count) in counts {
        values.insert(format!("{path}{LENGTH_SUFFIX}"), Scalar::UInt(count));
    }

    for (idx, child) in node.children.iter().enumerate() {
        ancestry.push((child.path.clone(), idx));
        collect(child, &values, ancestry, out);
        ancestry.pop();
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
    use crate::template::shape::to_shape;
    use serde::Serialize;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct SubItem {
        #[serde(rename = "Name")]
        name: String,
    }

    #[derive(Serialize)]
    struct Item {
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "SubItems")]
        sub_items: Vec<SubItem>,
    }

    #[derive(Serialize)]
    struct Root {
        #[serde(rename = "Title")]
        title: String,
        #[serde(rename = "Items")]
        items: Vec<Item>,
    }

    fn sample() -> Root {
        let sub = |n: &str| SubItem { name: n.into() };
        Root {
            title: "Report".into(),
            items: vec![
                Item {
                    name: "item1".into(),
                    sub_items: vec![sub("1"), sub("2")],
                },
                Item {
                    name: "item2".into(),
                    sub_items: vec![sub("1"), sub("2"), sub("3")],
                },
            ],
        }
    }

    fn text(ctx: &FlatContext, key: &str) -> String {
        ctx.get(key).map(ToString::to_string).unwrap_or_default()
    }

    #[test]
    fn nested_collections_yield_one_context_per_leaf() {
        let contexts = flatten(&to_shape(&sample()).unwrap());
        assert_eq!(contexts.len(), 5);
        assert!(contexts.iter().all(|c| c.leaf_path == "Items_SubItems"));

        let rows: Vec<(String, String, String, String)> = contexts
            .iter()
            .map(|c| {
                (
                    text(c, "Items_Name"),
                    text(c, "Items_SubItems_Name"),
                    text(c, "Items_length"),
                    text(c, "Items_SubItems_length"),
                )
            })
            .collect();
        let expected = [
            ("item1", "1", "2", "2"),
            ("item1", "2", "2", "2"),
            ("item2", "1", "2", "3"),
            ("item2", "2", "2", "3"),
            ("item2", "3", "2", "3"),
        ];
        for (got, want) in rows.iter().zip(expected) {
            assert_eq!(
                (got.0.as_str(), got.1.as_str(), got.2.as_str(), got.3.as_str()),
                want
            );
        }
        assert!(contexts.iter().all(|c| text(c, "Title") == "Report"));
    }

    #[test]
    fn scalar_root_record_yields_single_context() {
        #[derive(Serialize)]
        struct Flat {
            a: u8,
            b: Option<String>,
        }
        let contexts = flatten(&to_shape(&Flat { a: 1, b: None }).unwrap());
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].leaf_path, "");
        assert_eq!(contexts[0].get("a"), Some(&Scalar::UInt(1)));
        assert!(contexts[0].get("b").is_none());
    }

    #[test]
    fn nested_records_are_inlined_with_prefix() {
        let shape = Shape::from_json(serde_json::json!({
            "Customer": {"Name": "ACME", "Address": {"City": "Oslo"}}
        }));
        let contexts = flatten(&shape);
        assert_eq!(text(&contexts[0], "Customer_Name"), "ACME");
        assert_eq!(text(&contexts[0], "Customer_Address_City"), "Oslo");
    }

    #[test]
    fn map_children_follow_sorted_key_order() {
        #[derive(Serialize)]
        struct Prices {
            by_region: HashMap<String, u32>,
        }
        let prices = Prices {
            by_region: HashMap::from([
                ("west".to_string(), 3),
                ("east".to_string(), 1),
                ("north".to_string(), 2),
            ]),
        };
        let contexts = flatten(&to_shape(&prices).unwrap());
        let leaves: Vec<&str> = contexts.iter().map(|c| c.leaf_path.as_str()).collect();
        assert_eq!(
            leaves,
            ["by_region_east", "by_region_north", "by_region_west"]
        );
        assert_eq!(text(&contexts[0], "by_region_east"), "1");
        assert_eq!(text(&contexts[0], "by_region_east_length"), "1");
    }

    #[test]
    fn top_level_sequence_elements_get_their_index() {
        let shape = Shape::from_json(serde_json::json!([{"A": 1}, {"A": 2}]));
        let contexts = flatten(&shape);
        let leaves: Vec<&str> = contexts.iter().map(|c| c.leaf_path.as_str()).collect();
        assert_eq!(leaves, ["0", "1"]);
        assert_eq!(text(&contexts[1], "1_A"), "2");
    }

    #[test]
    fn scalar_elements_bind_under_their_path() {
        let shape = Shape::from_json(serde_json::json!({"Tags": ["x", "y"]}));
        let contexts = flatten(&shape);
        assert_eq!(contexts.len(), 2);
        assert_eq!(text(&contexts[1], "Tags"), "y");
        assert_eq!(text(&contexts[1], "Tags_length"), "2");
    }

    #[test]
    fn contexts_record_their_element_ancestry() {
        let contexts = flatten(&to_shape(&sample()).unwrap());
        let outer: Vec<usize> = contexts
            .iter()
            .map(|c| c.element_key("Items").unwrap().len())
            .collect();
        assert_eq!(outer, [1, 1, 1, 1, 1]);

        // Leaves of the same item share the outer key but not the inner one.
        assert_eq!(contexts[0].element_key("Items"), contexts[1].element_key("Items"));
        assert_ne!(contexts[1].element_key("Items"), contexts[2].element_key("Items"));
        assert_ne!(
            contexts[0].element_key("Items_SubItems"),
            contexts[1].element_key("Items_SubItems")
        );
        assert!(contexts[0].element_key("Other").is_none());
    }

    #[test]
    fn is_within_matches_whole_segments() {
        let ctx = FlatContext {
            leaf_path: "Items_SubItems".into(),
            ..FlatContext::default()
        };
        assert!(ctx.is_within("Items"));
        assert!(ctx.is_within("Items_SubItems"));
        assert!(!ctx.is_within("Item"));
        assert!(!ctx.is_within("Items_Sub"));
    }
}
