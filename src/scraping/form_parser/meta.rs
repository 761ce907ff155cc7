use super::{ExtractionError, FormParser};
use crate::nlp::normalize;
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;

static PAYLOAD_SCRIPT: OnceLock<Regex> = OnceLock::new();
static PAYLOAD_LOOSE: OnceLock<Regex> = OnceLock::new();
static ENTRY_NAME: OnceLock<Regex> = OnceLock::new();

/// Everything recovered from the page markup itself (outside the JSON blob).
#[derive(Debug, Clone, Default)]
pub struct MarkupMeta {
    pub action: String,
    pub fbzx: String,
    /// Distinct `entry.<id>` names in first-seen order.
    pub entry_ids: Vec<String>,
    /// Normalized aria-label / placeholder text → entry id.
    pub label_map: IndexMap<String, String>,
}

impl MarkupMeta {
    pub fn from_markup(markup: &str, document: &Html, source_url: &str) -> Self {
        Self {
            action: extract_action(document).unwrap_or_else(|| derive_action(source_url)),
            fbzx: extract_fbzx(document).unwrap_or_default(),
            entry_ids: extract_entry_ids(markup),
            label_map: extract_label_map(document),
        }
    }

    /// Entry id whose label equals, contains, or is contained in the question text.
    pub fn match_label(&self, question_text: &str) -> Option<String> {
        let key = normalize(question_text);
        if key.is_empty() {
            return None;
        }
        if let Some(id) = self.label_map.get(&key) {
            return Some(id.clone());
        }
        self.label_map
            .iter()
            .find(|(label, _)| key.contains(label.as_str()) || label.contains(key.as_str()))
            .map(|(_, id)| id.clone())
    }
}

impl FormParser {
    /// Locate and parse the `FB_PUBLIC_LOAD_DATA_` array literal.
    pub(super) fn extract_payload(markup: &str) -> Result<Value, ExtractionError> {
        let script = PAYLOAD_SCRIPT.get_or_init(|| {
            Regex::new(r"(?s)var\s+FB_PUBLIC_LOAD_DATA_\s*=\s*(\[.+?\]);\s*</script>")
                .expect("payload regex")
        });
        let loose = PAYLOAD_LOOSE.get_or_init(|| {
            Regex::new(r"(?s)FB_PUBLIC_LOAD_DATA_\s*=\s*(\[.+?\]);").expect("payload regex")
        });

        let literal = script
            .captures(markup)
            .or_else(|| loose.captures(markup))
            .and_then(|c| c.get(1))
            .ok_or(ExtractionError::PayloadNotFound)?;

        Ok(serde_json::from_str(literal.as_str())?)
    }
}

/// Literal `<form action=".../formResponse">`.
fn extract_action(document: &Html) -> Option<String> {
    let selector = Selector::parse("form[action]").ok()?;
    document
        .select(&selector)
        .filter_map(|form| form.value().attr("action"))
        .find(|action| action.ends_with("/formResponse"))
        .map(str::to_string)
}

/// `.../viewform?x=y` → `.../formResponse`.
pub(crate) fn derive_action(source_url: &str) -> String {
    let replaced = source_url.replace("/viewform", "/formResponse");
    replaced
        .split_once('?')
        .map(|(base, _)| base.to_string())
        .unwrap_or(replaced)
}

fn extract_fbzx(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"input[name="fbzx"]"#).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("value"))
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn extract_entry_ids(markup: &str) -> Vec<String> {
    let re = ENTRY_NAME
        .get_or_init(|| Regex::new(r#"name="entry\.(\d+)""#).expect("entry name regex"));
    let ids: IndexSet<&str> = re
        .captures_iter(markup)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();
    ids.into_iter().map(str::to_string).collect()
}

/// `entry.123` → `123`; anything else (e.g. `entry.123_sentinel`) → `None`.
fn entry_id_from_name(name: &str) -> Option<&str> {
    let id = name.strip_prefix("entry.")?;
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}

/// aria-label entries win over placeholder entries; first label seen wins.
fn extract_label_map(document: &Html) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    let Ok(selector) = Selector::parse("[name]") else {
        return map;
    };

    for attr in ["aria-label", "placeholder"] {
        for el in document.select(&selector) {
            let Some(id) = el.value().attr("name").and_then(entry_id_from_name) else {
                continue;
            };
            let Some(label) = el.value().attr(attr) else {
                continue;
            };
            let key = normalize(label);
            if key.is_empty() {
                continue;
            }
            map.entry(key).or_insert_with(|| id.to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <form action="https://docs.google.com/forms/d/e/abc/formResponse" method="POST">
          <input type="hidden" name="entry.111" value="">
          <input type="text" name="entry.222" aria-label="Your  Name">
          <input type="text" name="entry.333" placeholder="E-mail&nbsp;address">
          <input type="hidden" name="entry.222" value="">
          <input type="hidden" name="entry.444_sentinel">
          <input type="hidden" name="fbzx" value="-123456789">
        </form>
        <script>var FB_PUBLIC_LOAD_DATA_ = [null,[null,[]]];</script>
        </body></html>"#;

    fn meta() -> MarkupMeta {
        let doc = Html::parse_document(PAGE);
        MarkupMeta::from_markup(PAGE, &doc, "https://example.com/viewform")
    }

    #[test]
    fn recovers_action_token_and_ordered_ids() {
        let m = meta();
        assert_eq!(m.action, "https://docs.google.com/forms/d/e/abc/formResponse");
        assert_eq!(m.fbzx, "-123456789");
        assert_eq!(m.entry_ids, vec!["111", "222", "333"]);
    }

    #[test]
    fn label_map_uses_normalized_keys() {
        let m = meta();
        assert_eq!(m.label_map.get("your name").map(String::as_str), Some("222"));
        assert_eq!(m.label_map.get("e-mail address").map(String::as_str), Some("333"));
        assert_eq!(m.match_label("YOUR NAME (full)").as_deref(), Some("222"));
        assert_eq!(m.match_label("address").as_deref(), Some("333"));
        assert_eq!(m.match_label("unrelated"), None);
    }

    #[test]
    fn action_falls_back_to_url_substitution() {
        assert_eq!(
            derive_action("https://docs.google.com/forms/d/XYZ/viewform?edit_requested=true"),
            "https://docs.google.com/forms/d/XYZ/formResponse"
        );
        let doc = Html::parse_document("<p>no form</p>");
        let m = MarkupMeta::from_markup("", &doc, "https://x/forms/d/1/viewform");
        assert_eq!(m.action, "https://x/forms/d/1/formResponse");
        assert_eq!(m.fbzx, "");
        assert!(m.entry_ids.is_empty());
    }

    #[test]
    fn payload_missing_is_an_error() {
        assert!(matches!(
            FormParser::extract_payload("<html></html>"),
            Err(ExtractionError::PayloadNotFound)
        ));
        assert!(matches!(
            FormParser::extract_payload("<script>var FB_PUBLIC_LOAD_DATA_ = [1,;</script>"),
            Err(ExtractionError::PayloadNotFound) | Err(ExtractionError::PayloadMalformed(_))
        ));
        let v = FormParser::extract_payload(PAGE).unwrap();
        assert!(v.is_array());
    }
}
