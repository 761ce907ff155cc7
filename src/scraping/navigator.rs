//! Safe access into untyped nested-array documents.
//!
//! The form payload is an array-of-arrays with no schema. Nothing here knows
//! about forms: `dig_path` walks an index path and `walk_all` enumerates every
//! nested array depth-first.

use serde_json::Value;

/// Follow `path` from `node`, one array index per step.
///
/// Returns `None` as soon as a step lands on a non-array or indexes past the end.
pub fn dig_path<'a>(node: &'a Value, path: &[usize]) -> Option<&'a Value> {
    let mut cur = node;
    for &idx in path {
        cur = cur.as_array()?.get(idx)?;
    }
    Some(cur)
}

/// String at `path`, if that is what lives there.
pub fn dig_str<'a>(node: &'a Value, path: &[usize]) -> Option<&'a str> {
    dig_path(node, path).and_then(Value::as_str)
}

/// Non-blank string at `path`, trimmed.
pub fn dig_text<'a>(node: &'a Value, path: &[usize]) -> Option<&'a str> {
    dig_str(node, path).map(str::trim).filter(|s| !s.is_empty())
}

/// Array at `path`.
pub fn dig_array<'a>(node: &'a Value, path: &[usize]) -> Option<&'a Vec<Value>> {
    dig_path(node, path).and_then(Value::as_array)
}

/// Depth-first pre-order walk over every array reachable from `node`,
/// `node` itself first when it is an array.
///
/// Single pass; call again on the same root for a fresh walk.
pub fn walk_all(node: &Value) -> WalkAll<'_> {
    WalkAll { stack: vec![node] }
}

pub struct WalkAll<'a> {
    stack: Vec<&'a Value>,
}

impl<'a> Iterator for WalkAll<'a> {
    type Item = &'a Vec<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            if let Value::Array(items) = node {
                // reversed so the leftmost child is visited first
                self.stack
                    .extend(items.iter().rev().filter(|v| v.is_array()));
                return Some(items);
            }
        }
        None
    }
}

/// First non-blank string held directly by any array in the walk, trimmed.
pub fn first_text(node: &Value) -> Option<&str> {
    walk_all(node).find_map(|arr| {
        arr.iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|s| !s.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dig_path_follows_indices() {
        let doc = json!([0, [10, [20, "deep"]]]);
        assert_eq!(dig_path(&doc, &[1, 1, 1]), Some(&json!("deep")));
        assert_eq!(dig_path(&doc, &[]), Some(&doc));
        assert_eq!(dig_str(&doc, &[1, 1, 1]), Some("deep"));
    }

    #[test]
    fn dig_path_absent_on_malformed_shapes() {
        let doc = json!([0, [10, "leaf"]]);
        // first index out of bounds
        assert_eq!(dig_path(&doc, &[5]), None);
        assert_eq!(dig_path(&doc, &[5, 0]), None);
        // stepping into a number / string
        assert_eq!(dig_path(&doc, &[0, 0]), None);
        assert_eq!(dig_path(&doc, &[1, 1, 0]), None);
        // root not a sequence
        assert_eq!(dig_path(&json!("x"), &[0]), None);
        assert_eq!(dig_path(&Value::Null, &[0]), None);
        assert_eq!(dig_path(&json!({"a": 1}), &[0]), None);
    }

    #[test]
    fn dig_text_skips_blank() {
        let doc = json!(["  ", " hi "]);
        assert_eq!(dig_text(&doc, &[0]), None);
        assert_eq!(dig_text(&doc, &[1]), Some("hi"));
    }

    #[test]
    fn walk_all_is_preorder() {
        let doc = json!([1, [2, [3]], [4]]);
        let firsts: Vec<Value> = walk_all(&doc)
            .map(|a| a.first().cloned().unwrap_or(Value::Null))
            .collect();
        assert_eq!(firsts, vec![json!(1), json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn walk_all_skips_non_array_root_and_restarts() {
        assert_eq!(walk_all(&json!("leaf")).count(), 0);
        let doc = json!([[[]], []]);
        assert_eq!(walk_all(&doc).count(), 4);
        assert_eq!(walk_all(&doc).count(), 4);
    }

    #[test]
    fn first_text_finds_shallowest_leftmost() {
        let doc = json!([null, [" ", [7, "inner"]], "outer"]);
        assert_eq!(first_text(&doc), Some("outer"));
        let doc = json!([null, [" ", [7, "inner"]]]);
        assert_eq!(first_text(&doc), Some("inner"));
    }
}
