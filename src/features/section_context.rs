//! Numbered sections ("1.", "2)") with lettered subparts ("a)", "б.").
//!
//! A subpart question on its own is often meaningless; the intro of the
//! section it belongs to is prepended to its prompt.

use crate::types::Question;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

static SECTION: OnceLock<Regex> = OnceLock::new();
static SUBPART: OnceLock<Regex> = OnceLock::new();
static FIRST_SUBPART_LINE: OnceLock<Regex> = OnceLock::new();

fn section_re() -> &'static Regex {
    SECTION.get_or_init(|| Regex::new(r"^\s*\d+[.)]").expect("section regex"))
}

fn subpart_re() -> &'static Regex {
    SUBPART.get_or_init(|| Regex::new(r"(?i)^\s*[a-zа-я][).]").expect("subpart regex"))
}

fn first_subpart_line_re() -> &'static Regex {
    FIRST_SUBPART_LINE
        .get_or_init(|| Regex::new(r"(?i)\n\s*[a-zа-я][).]\s+").expect("subpart line regex"))
}

pub fn is_section_heading(text: &str) -> bool {
    section_re().is_match(text)
}

pub fn is_subpart(text: &str) -> bool {
    subpart_re().is_match(text)
}

/// Shared stem of a section heading: everything before the first line that
/// opens a subpart, or the whole trimmed text. Empty for non-headings.
pub fn extract_section_intro(text: &str) -> String {
    if !is_section_heading(text) {
        return String::new();
    }
    match first_subpart_line_re().find(text) {
        Some(m) => text[..m.start()].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// entry id → section intro for every subpart question (and for headings that
/// embed their own subparts).
pub fn make_section_context_map(questions: &[Question]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let mut current = String::new();

    for q in questions {
        let text = q.text.trim();
        if text.is_empty() {
            continue;
        }
        if is_section_heading(text) {
            let intro = extract_section_intro(text);
            current = if intro.is_empty() { text.to_string() } else { intro };
            if let Some(id) = &q.entry_id {
                if first_subpart_line_re().is_match(text) {
                    map.insert(id.clone(), current.clone());
                }
            }
            continue;
        }
        if let Some(id) = &q.entry_id {
            if !current.is_empty() && is_subpart(text) {
                map.insert(id.clone(), current.clone());
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionType;

    fn q(id: &str, text: &str) -> Question {
        let mut q = Question::new(text, QuestionType::ShortAnswer);
        q.entry_id = Some(id.to_string());
        q
    }

    #[test]
    fn heading_and_subpart_patterns() {
        assert!(is_section_heading("1. Sets"));
        assert!(is_section_heading("  12) Graphs"));
        assert!(!is_section_heading("a) part"));
        assert!(is_subpart("a) part"));
        assert!(is_subpart("Б. часть"));
        assert!(!is_subpart("ab) no"));
    }

    #[test]
    fn intro_stops_before_first_subpart_line() {
        let text = "2. Let A = {1, 2}.\nAnswer the following.\na) |A|?\nb) Is 3 in A?";
        assert_eq!(extract_section_intro(text), "2. Let A = {1, 2}.\nAnswer the following.");
        assert_eq!(extract_section_intro(" 3) Whole stem "), "3) Whole stem");
        assert_eq!(extract_section_intro("What is your name?"), "");
    }

    #[test]
    fn subparts_inherit_current_section() {
        let questions = vec![
            q("1", "Your name?"),
            q("2", "1. Consider f(x) = x^2."),
            q("3", "a) f(2)?"),
            q("4", "b) f(3)?"),
            q("5", "2. Stem two\na) first inline"),
            q("6", "в) Cyrillic subpart"),
            q("7", "Free comment"),
        ];
        let map = make_section_context_map(&questions);
        assert_eq!(map.get("3").map(String::as_str), Some("1. Consider f(x) = x^2."));
        assert_eq!(map.get("4").map(String::as_str), Some("1. Consider f(x) = x^2."));
        assert_eq!(map.get("5").map(String::as_str), Some("2. Stem two"));
        assert_eq!(map.get("6").map(String::as_str), Some("2. Stem two"));
        assert!(!map.contains_key("1"));
        assert!(!map.contains_key("2"));
        assert!(!map.contains_key("7"));
    }

    #[test]
    fn subpart_before_any_section_has_no_context() {
        let map = make_section_context_map(&[q("1", "a) orphan")]);
        assert!(map.is_empty());
    }
}
