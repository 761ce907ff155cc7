//! Map free-form model output onto a question's declared options.
//!
//! Both entry points are pure: the same `(text, options)` pair always yields the
//! same result. "No match" is `None`, never an empty string.

use super::normalize;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

static MULTI_SPLIT: OnceLock<Regex> = OnceLock::new();

const PREFIX_SEPARATORS: &[char] = &[':', '-', '\u{2013}', '\u{2014}'];
const QUOTES: &[char] = &['"', '\'', '\u{ab}', '\u{bb}'];

/// Pick one option for `text`.
///
/// Tried in order: 1-based ordinal, exact normalized match, exact match after
/// dropping a `label:` style prefix, then a unique containment match.
pub fn resolve_single<'a, S: AsRef<str>>(text: &str, options: &'a [S]) -> Option<&'a str> {
    if options.is_empty() {
        return None;
    }
    let normalized: Vec<String> = options.iter().map(|o| normalize(o.as_ref())).collect();
    let mut answer = normalize(text);
    if answer.is_empty() {
        return None;
    }

    if answer.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(k) = answer.parse::<usize>() {
            if (1..=options.len()).contains(&k) {
                return Some(options[k - 1].as_ref());
            }
        }
    }

    if let Some(i) = normalized.iter().position(|o| *o == answer) {
        return Some(options[i].as_ref());
    }

    if let Some(stripped) = strip_label_prefix(&answer) {
        if let Some(i) = normalized.iter().position(|o| o == stripped) {
            return Some(options[i].as_ref());
        }
        answer = stripped.to_string();
    }

    let mut hits = normalized
        .iter()
        .enumerate()
        .filter(|(_, o)| !o.is_empty() && (o.contains(&answer) || answer.contains(o.as_str())))
        .map(|(i, _)| i);
    match (hits.next(), hits.next()) {
        (Some(i), None) => Some(options[i].as_ref()),
        _ => None,
    }
}

/// Pick several options for `text`: a JSON array of values, or a list split on
/// `,` `;` `/` and newlines. Unmatched pieces are dropped; duplicates collapse
/// to the first occurrence.
pub fn resolve_multiple<'a, S: AsRef<str>>(text: &str, options: &'a [S]) -> Option<Vec<&'a str>> {
    if options.is_empty() {
        return None;
    }
    let trimmed = text.trim();

    let pieces: Vec<String> = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => items.iter().map(json_item_text).collect(),
        _ => {
            let re = MULTI_SPLIT.get_or_init(|| Regex::new(r"[,;/\n]+").expect("split regex"));
            re.split(trimmed)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        }
    };

    let mut picked: Vec<&'a str> = Vec::new();
    for piece in &pieces {
        if let Some(found) = resolve_single(piece, options) {
            if !picked.contains(&found) {
                picked.push(found);
            }
        }
    }
    (!picked.is_empty()).then_some(picked)
}

/// `"Answer: B"` → `"b"`; splits at the last separator.
fn strip_label_prefix(answer: &str) -> Option<&str> {
    let idx = answer.rfind(PREFIX_SEPARATORS)?;
    let sep_len = answer[idx..].chars().next().map_or(1, char::len_utf8);
    let rest = answer[idx + sep_len..].trim().trim_matches(QUOTES).trim();
    (!rest.is_empty()).then_some(rest)
}

fn json_item_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
