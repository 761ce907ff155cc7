use regex::Regex;
use std::sync::OnceLock;

static WHITESPACE: OnceLock<Regex> = OnceLock::new();

fn whitespace_re() -> &'static Regex {
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

/// Comparison key for labels and answers: NBSP folded to a space, whitespace
/// runs collapsed, trimmed, lower-cased.
pub fn normalize(s: &str) -> String {
    let folded = s.replace('\u{a0}', " ");
    whitespace_re()
        .replace_all(&folded, " ")
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_nbsp_case_and_runs() {
        assert_eq!(normalize("  Your\u{a0}\u{a0}NAME \n please "), "your name please");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("\t\n"), "");
    }
}
