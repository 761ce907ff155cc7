use super::{ExtractionError, FormParser};
use crate::scraping::navigator::{dig_array, dig_path, dig_text, first_text, walk_all};
use crate::types::QuestionType;
use serde_json::Value;

/// Smallest number that is taken for a field identifier when scanning an item.
const MIN_ENTRY_ID: u64 = 10_000;

/// Paths inside an item where the field identifier usually sits.
const ENTRY_ID_PATHS: &[&[usize]] = &[&[4, 0, 0], &[4, 0, 3, 0], &[4, 0, 0, 0], &[0]];

impl FormParser {
    /// The array holding one entry per question.
    ///
    /// `[1, 1]` is the usual home. When that does not look like a question list,
    /// every nested array is scored by how many of its children carry a
    /// non-blank string. At least two such children, and at least a third of
    /// the array rounded down, qualify it; the largest qualifying one wins.
    pub(super) fn guess_items_root(data: &Value) -> Result<&Vec<Value>, ExtractionError> {
        if let Some(items) = dig_array(data, &[1, 1]) {
            if Self::looks_like_item_list(items) {
                return Ok(items);
            }
        }

        let mut best: Option<&Vec<Value>> = None;
        for node in walk_all(data) {
            if node.is_empty() {
                continue;
            }
            let with_text = node.iter().filter(|v| has_direct_text(v)).count();
            let qualifies = with_text >= 2.max(node.len() / 3);
            if qualifies && best.map_or(true, |b| node.len() > b.len()) {
                best = Some(node);
            }
        }
        best.ok_or(ExtractionError::ItemsRootNotFound)
    }

    fn looks_like_item_list(items: &[Value]) -> bool {
        !items.is_empty() && items.iter().any(has_direct_text)
    }

    pub(super) fn question_text(item: &Value) -> Option<String> {
        dig_text(item, &[1])
            .or_else(|| dig_text(item, &[0, 1]))
            .or_else(|| first_text(item))
            .map(str::to_string)
    }

    /// Type code at index 3, else a guess from the option shape.
    pub(super) fn question_type(
        item: &Value,
        choices: Option<&[String]>,
        columns: Option<&[String]>,
    ) -> QuestionType {
        if let Some(kind) = dig_path(item, &[3])
            .and_then(Value::as_i64)
            .and_then(QuestionType::from_code)
        {
            return kind;
        }
        let has_choices = choices.is_some_and(|c| !c.is_empty());
        let has_columns = columns.is_some_and(|c| !c.is_empty());
        match (has_choices, has_columns) {
            (true, true) => QuestionType::Grid,
            (true, false) => QuestionType::Choice,
            _ => QuestionType::Text,
        }
    }

    /// Best effort: last boolean under `[4, 0]` (one level deep), else the
    /// first boolean anywhere in the item.
    pub(super) fn is_required(item: &Value) -> Option<bool> {
        if let Some(node) = dig_array(item, &[4, 0]) {
            for v in node.iter().rev() {
                match v {
                    Value::Bool(b) => return Some(*b),
                    Value::Array(inner) => {
                        if let Some(b) = inner.iter().rev().find_map(Value::as_bool) {
                            return Some(b);
                        }
                    }
                    _ => {}
                }
            }
        }
        walk_all(item).find_map(|node| node.iter().find_map(Value::as_bool))
    }

    /// Options (rows for grids) and grid columns.
    pub(super) fn extract_choices(item: &Value) -> (Option<Vec<String>>, Option<Vec<String>>) {
        if let Some(rows) = dig_path(item, &[4, 0, 1]).and_then(list_of_lists) {
            let choices = option_labels(rows);
            let columns = dig_path(item, &[4, 0, 2])
                .and_then(list_of_lists)
                .map(|cols| option_labels(cols));
            return (non_empty(choices), columns);
        }

        // largest list-of-lists whose first entry holds text
        let mut best: Option<&Vec<Value>> = None;
        for node in walk_all(item) {
            let Some(rows) = list_of_lists_slice(node) else {
                continue;
            };
            let sample_has_text = rows[0]
                .as_array()
                .is_some_and(|s| s.iter().any(is_non_blank_str));
            if sample_has_text && best.map_or(true, |b| rows.len() > b.len()) {
                best = Some(node);
            }
        }
        (best.map(|rows| option_labels(rows)).and_then(non_empty), None)
    }

    /// Numeric identifier embedded in the item. Known paths first, then the
    /// longest qualifying number anywhere in the item.
    pub(super) fn entry_id_from_item(item: &Value) -> Option<String> {
        for path in ENTRY_ID_PATHS {
            match dig_path(item, path) {
                Some(Value::Array(values)) => {
                    if let Some(id) = values.iter().find_map(large_int) {
                        return Some(id.to_string());
                    }
                }
                Some(v) => {
                    if let Some(id) = large_int(v) {
                        return Some(id.to_string());
                    }
                }
                None => {}
            }
        }

        let mut best: Option<String> = None;
        for node in walk_all(item) {
            for id in node.iter().filter_map(large_int) {
                let s = id.to_string();
                if best.as_ref().map_or(true, |b| s.len() > b.len()) {
                    best = Some(s);
                }
            }
        }
        best
    }
}

fn is_non_blank_str(v: &Value) -> bool {
    v.as_str().is_some_and(|s| !s.trim().is_empty())
}

/// An array child holding a non-blank string at its own level.
fn has_direct_text(v: &Value) -> bool {
    v.as_array().is_some_and(|a| a.iter().any(is_non_blank_str))
}

fn list_of_lists(v: &Value) -> Option<&Vec<Value>> {
    v.as_array().and_then(|a| list_of_lists_slice(a).map(|_| a))
}

fn list_of_lists_slice(a: &[Value]) -> Option<&[Value]> {
    (!a.is_empty() && a.iter().all(Value::is_array)).then_some(a)
}

/// Label of each option row: the string at index 0, else at index 1.
fn option_labels(rows: &[Value]) -> Vec<String> {
    rows.iter()
        .filter_map(Value::as_array)
        .filter_map(|row| match (row.first(), row.get(1)) {
            (Some(Value::String(s)), _) => Some(s.clone()),
            (_, Some(Value::String(s))) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

fn non_empty(v: Vec<String>) -> Option<Vec<String>> {
    (!v.is_empty()).then_some(v)
}

fn large_int(v: &Value) -> Option<u64> {
    v.as_u64().filter(|n| *n >= MIN_ENTRY_ID)
}
